mod common;

use common::{add_tasks, create_plan, setup_test_db, titles};
use plangenie::error::PlanError;
use plangenie::tasks::{NewTask, ReorderItem, TaskManager};

#[tokio::test]
async fn test_move_before_earlier_task() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B", "C"]).await;
    let manager = TaskManager::new(&pool);

    manager
        .move_task(&plan.id, &tasks[2].id, Some(&tasks[1].id))
        .await
        .unwrap();

    let after = manager.list_tasks(&plan.id).await.unwrap();
    assert_eq!(titles(&after), vec!["A", "C", "B"]);
    assert_eq!(after.iter().map(|t| t.order).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_move_is_idempotent() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B", "C", "D"]).await;
    let manager = TaskManager::new(&pool);

    manager.move_task(&plan.id, &tasks[3].id, Some(&tasks[0].id)).await.unwrap();
    let once = manager.list_tasks(&plan.id).await.unwrap();
    manager.move_task(&plan.id, &tasks[3].id, Some(&tasks[0].id)).await.unwrap();
    let twice = manager.list_tasks(&plan.id).await.unwrap();

    assert_eq!(titles(&once), vec!["D", "A", "B", "C"]);
    assert_eq!(titles(&once), titles(&twice));
    assert_eq!(
        once.iter().map(|t| t.order).collect::<Vec<_>>(),
        twice.iter().map(|t| t.order).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_missing_anchor_appends() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B", "C"]).await;
    let manager = TaskManager::new(&pool);

    manager
        .move_task(&plan.id, &tasks[0].id, Some("00000000-0000-4000-8000-000000000000"))
        .await
        .unwrap();
    assert_eq!(titles(&manager.list_tasks(&plan.id).await.unwrap()), vec!["B", "C", "A"]);

    manager.move_task(&plan.id, &tasks[1].id, None).await.unwrap();
    assert_eq!(titles(&manager.list_tasks(&plan.id).await.unwrap()), vec!["C", "A", "B"]);
}

#[tokio::test]
async fn test_move_of_unknown_task_is_noop() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B"]).await;
    let manager = TaskManager::new(&pool);

    manager.move_task(&plan.id, "nope", Some(&tasks[0].id)).await.unwrap();
    let after = manager.list_tasks(&plan.id).await.unwrap();
    assert_eq!(titles(&after), vec!["A", "B"]);
    assert_eq!(after[0].updated_at, tasks[0].updated_at);
}

#[tokio::test]
async fn test_move_normalizes_sentinel_orders() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let manager = TaskManager::new(&pool);
    add_tasks(&pool, &plan.id, &["A", "B"]).await;
    let late = manager
        .add_task_at(&plan.id, NewTask::titled("Late", None), 999)
        .await
        .unwrap();
    let tasks = manager.list_tasks(&plan.id).await.unwrap();

    manager.move_task(&plan.id, &late.id, Some(&tasks[1].id)).await.unwrap();

    let after = manager.list_tasks(&plan.id).await.unwrap();
    assert_eq!(titles(&after), vec!["A", "Late", "B"]);
    assert_eq!(after.iter().map(|t| t.order).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_bulk_reorder_is_all_or_nothing_on_missing_task() {
    let (_dir, pool) = setup_test_db().await;
    let plan = create_plan(&pool, "u1", "Plan").await;
    let tasks = add_tasks(&pool, &plan.id, &["A", "B"]).await;
    let manager = TaskManager::new(&pool);

    let err = manager
        .bulk_reorder(&[
            ReorderItem {
                task_id: tasks[0].id.clone(),
                new_order: 5,
            },
            ReorderItem {
                task_id: "missing".to_string(),
                new_order: 1,
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::TaskNotFound(_)));
    assert_eq!(manager.get_task(&tasks[0].id).await.unwrap().order, 1);

    let updated = manager
        .bulk_reorder(&[
            ReorderItem {
                task_id: tasks[0].id.clone(),
                new_order: 2,
            },
            ReorderItem {
                task_id: tasks[1].id.clone(),
                new_order: 1,
            },
        ])
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(titles(&manager.list_tasks(&plan.id).await.unwrap()), vec!["B", "A"]);
}
