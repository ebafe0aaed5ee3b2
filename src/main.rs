use clap::Parser;
use plangenie::cli::{Cli, Commands};
use plangenie::cli_handlers::{
    handle_config_command, handle_plan_command, handle_suggestions_command,
};
use plangenie::config::AppConfig;
use plangenie::context::AppContext;
use plangenie::error::{PlanError, Result};
use plangenie::logging::{init_logging, ApplicationMode, LoggingConfig};
use plangenie::server::PlanGenieServer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = match &cli.command {
        Commands::Serve { log_file, .. } => {
            let mut config = if cli.quiet || cli.verbose > 0 || cli.json {
                LoggingConfig::from_args(cli.quiet, cli.verbose > 0, cli.json)
            } else {
                plangenie::logging::config_from_env(ApplicationMode::Server)
            };
            if log_file.is_some() {
                config = config.with_file_output(log_file.clone());
            }
            config
        },
        _ if cli.quiet || cli.verbose > 0 || cli.json => {
            LoggingConfig::from_args(cli.quiet, cli.verbose > 0, cli.json)
        },
        _ => LoggingConfig::for_mode(ApplicationMode::Cli),
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        let error_response = e.to_error_response();
        match serde_json::to_string_pretty(&error_response) {
            Ok(body) => eprintln!("{}", body),
            Err(_) => eprintln!("{}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { port, .. } => {
            let ctx = AppContext::load(cli.db).await?;
            let port = match port {
                Some(port) => port,
                None => AppConfig::resolve(&ctx.pool).await?.port,
            };
            let db_path = ctx.db_path.clone();
            ctx.pool.close().await;

            PlanGenieServer::new(port, db_path)
                .run()
                .await
                .map_err(PlanError::OtherError)?;
        },

        Commands::Plans(cmd) => handle_plan_command(cli.db, cmd).await?,

        Commands::Suggestions(cmd) => handle_suggestions_command(cli.db, cmd).await?,

        Commands::Config(cmd) => handle_config_command(cli.db, cmd).await?,
    }

    Ok(())
}
