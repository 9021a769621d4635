//! Exercises the feature coordinator's layer sequencing and cross-layer
//! type-drift validation against a real change-plan engine and task
//! repository (spec §4.8 Expansion, §4.11).

mod common;

use std::collections::HashMap;

use taskforge::domain::models::{
    AgentType, ExecutionStatus, FeatureRequirement, FileChange, FileOperation, Layer, Task,
};
use taskforge::domain::ports::TaskRepository;
use taskforge::services::{ChangePlanEngine, FeatureCoordinator};

fn coordinator(db: &common::TestDb) -> FeatureCoordinator {
    let engine = ChangePlanEngine::new(common::fake_vcs(), common::resource_registry(db));
    FeatureCoordinator::new(std::sync::Arc::new(engine), db.tasks())
}

#[tokio::test]
async fn layers_apply_in_database_api_ui_order_and_the_task_is_untouched() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let coord = coordinator(&db);

    let mut task = Task::new("add profile bio field", "TASK-feature", AgentType::Build);
    tasks.create(&task).await.unwrap();

    let feature = FeatureRequirement {
        id: uuid::Uuid::new_v4(),
        description: "add bio to profile".to_string(),
        affected_areas: vec![Layer::Database, Layer::Api],
        pass_criteria: vec!["profile API returns bio".to_string()],
    };

    let mut files_by_layer = HashMap::new();
    files_by_layer.insert(
        Layer::Database,
        vec![FileChange::new("schema.sql", FileOperation::Create, "add bio column")],
    );
    files_by_layer.insert(
        Layer::Api,
        vec![FileChange::new("profile_api.rs", FileOperation::Create, "expose bio field")],
    );

    let mut contents = HashMap::new();
    contents.insert(
        "schema.sql".to_string(),
        b"CREATE TABLE profiles (\n    bio TEXT\n);".to_vec(),
    );
    contents.insert("profile_api.rs".to_string(), b"pub struct Profile {\n    bio: String,\n}".to_vec());

    let outcome = coord
        .coordinate(&feature, &mut task, files_by_layer, &contents, "worker-1")
        .await
        .unwrap();

    assert!(!outcome.needs_review);
    assert_eq!(outcome.layer_results.len(), 2);
    assert_eq!(outcome.layer_results[0].0, Layer::Database);
    assert_eq!(outcome.layer_results[1].0, Layer::Api);
    for (_, result) in &outcome.layer_results {
        assert_eq!(result.status, ExecutionStatus::Applied);
    }

    let stored = tasks.get(task.id).await.unwrap().unwrap();
    assert!(!stored.needs_review);
}

#[tokio::test]
async fn a_type_mismatch_between_schema_and_api_layer_flags_the_task_for_review() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let coord = coordinator(&db);

    let mut task = Task::new("add view count", "TASK-mismatch", AgentType::Build);
    tasks.create(&task).await.unwrap();

    let feature = FeatureRequirement {
        id: uuid::Uuid::new_v4(),
        description: "add view_count to posts".to_string(),
        affected_areas: vec![Layer::Database, Layer::Api],
        pass_criteria: vec!["view_count is numeric".to_string()],
    };

    let mut files_by_layer = HashMap::new();
    files_by_layer.insert(
        Layer::Database,
        vec![FileChange::new("posts_schema.sql", FileOperation::Create, "add view_count column")],
    );
    files_by_layer.insert(
        Layer::Api,
        vec![FileChange::new("posts_api.rs", FileOperation::Create, "expose view_count field")],
    );

    let mut contents = HashMap::new();
    contents.insert(
        "posts_schema.sql".to_string(),
        b"CREATE TABLE posts (\n    view_count INTEGER\n);".to_vec(),
    );
    // Wrong: the schema says INTEGER but the API layer declares a String.
    contents.insert("posts_api.rs".to_string(), b"pub struct Post {\n    view_count: String,\n}".to_vec());

    let outcome = coord
        .coordinate(&feature, &mut task, files_by_layer, &contents, "worker-2")
        .await
        .unwrap();

    assert!(outcome.needs_review);
    assert!(task.needs_review);
    assert!(task.review_reason.as_ref().unwrap().contains("view_count"));

    // The database layer's own change is preserved, not rolled back.
    assert_eq!(outcome.layer_results[0].1.status, ExecutionStatus::Applied);

    let stored = tasks.get(task.id).await.unwrap().unwrap();
    assert!(stored.needs_review);
}
