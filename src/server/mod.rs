//! HTTP adapter over the plan, task and suggestion managers

pub mod app;
pub mod auth;
pub mod handlers;
pub mod models;
pub mod routes;

pub use app::{create_router, AppState, PlanGenieServer};
