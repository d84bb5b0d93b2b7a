//! Integration tests for schema creation and the query modules

use leadgen_common::db::{
    self, leads, profiles, runs, scripts, GenerationState, NewLead, RunOutcome,
    PLACEHOLDER_SCRIPT_BODY,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Single-connection in-memory pool (each SQLite memory connection is its own database)
async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::create_schema(&pool).await.expect("Failed to create schema");
    pool
}

fn plumber() -> NewLead {
    NewLead {
        first_name: "Sam".to_string(),
        company_name: "Sam&#39;s Plumbing".to_string(),
        email: "sam@x.com".to_string(),
        business_type: "Plumber".to_string(),
        business_description: "drain cleaning".to_string(),
        city: "Austin".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_init_database_creates_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("leadgen.db");

    let pool = db::init_database(&db_path).await.expect("first init");
    assert!(db_path.exists());
    leads::insert_lead(&pool, &plumber()).await.unwrap();
    pool.close().await;

    let pool = db::init_database(&db_path).await.expect("second init");
    assert_eq!(leads::count_leads(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_insert_and_find_lead_by_both_identifiers() {
    let pool = memory_pool().await;
    let lead = leads::insert_lead(&pool, &plumber()).await.unwrap();

    assert_eq!(lead.short_hash.len(), 32);
    assert!(lead.crm_contact_id.is_none());

    let by_id = leads::find_lead_by_identifier(&pool, &lead.id.to_string())
        .await
        .unwrap()
        .expect("lead by id");
    assert_eq!(by_id, lead);

    let by_hash = leads::find_lead_by_identifier(&pool, &lead.short_hash)
        .await
        .unwrap()
        .expect("lead by hash");
    assert_eq!(by_hash.id, lead.id);

    assert!(leads::find_lead_by_identifier(&pool, "nope")
        .await
        .unwrap()
        .is_none());
    assert!(leads::find_lead_by_identifier(&pool, &Uuid::new_v4().to_string())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_leads_newest_first_and_by_user() {
    let pool = memory_pool().await;
    let first = leads::insert_lead(&pool, &plumber()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut owned = plumber();
    owned.user_id = Some("user-1".to_string());
    let second = leads::insert_lead(&pool, &owned).await.unwrap();

    let all = leads::list_leads(&pool).await.unwrap();
    assert_eq!(all.iter().map(|l| l.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let mine = leads::list_leads_for_user(&pool, "user-1").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, second.id);
}

#[tokio::test]
async fn test_set_crm_contact_id() {
    let pool = memory_pool().await;
    let lead = leads::insert_lead(&pool, &plumber()).await.unwrap();

    assert!(leads::set_crm_contact_id(&pool, lead.id, "ghl-123").await.unwrap());
    let stored = leads::find_lead_by_id(&pool, lead.id).await.unwrap().unwrap();
    assert_eq!(stored.crm_contact_id.as_deref(), Some("ghl-123"));

    assert!(!leads::set_crm_contact_id(&pool, Uuid::new_v4(), "x").await.unwrap());
}

#[tokio::test]
async fn test_scripts_ordered_and_position_unique() {
    let pool = memory_pool().await;
    let lead = leads::insert_lead(&pool, &plumber()).await.unwrap();

    scripts::insert_script(&pool, lead.id, "Second", "b", 2).await.unwrap();
    scripts::insert_script(&pool, lead.id, "First", "a", 1).await.unwrap();
    scripts::insert_script(&pool, lead.id, "Third", PLACEHOLDER_SCRIPT_BODY, 3)
        .await
        .unwrap();

    let listed = scripts::list_scripts_for_lead(&pool, lead.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|s| s.order_index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(listed[2].is_placeholder());
    assert!(!listed[0].is_placeholder());

    let duplicate = scripts::insert_script(&pool, lead.id, "Again", "c", 2).await;
    let err = duplicate.expect_err("duplicate position must be rejected");
    assert!(err.is_unique_violation());
    assert_eq!(scripts::count_scripts_for_lead(&pool, lead.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_script_requires_existing_lead() {
    let pool = memory_pool().await;
    let result = scripts::insert_script(&pool, Uuid::new_v4(), "Orphan", "x", 1).await;
    assert!(result.is_err(), "foreign key should reject orphan script");
}

#[tokio::test]
async fn test_scripts_for_user() {
    let pool = memory_pool().await;
    let mut owned = plumber();
    owned.user_id = Some("user-7".to_string());
    let lead = leads::insert_lead(&pool, &owned).await.unwrap();
    let other = leads::insert_lead(&pool, &plumber()).await.unwrap();

    scripts::insert_script(&pool, lead.id, "Mine", "a", 1).await.unwrap();
    scripts::insert_script(&pool, other.id, "Not mine", "b", 1).await.unwrap();

    let mine = scripts::list_scripts_for_user(&pool, "user-7").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Mine");
}

#[tokio::test]
async fn test_profiles_upsert_and_toggle() {
    let pool = memory_pool().await;

    assert!(!profiles::is_user_admin(&pool, "ghost").await.unwrap());

    let created = profiles::upsert_profile(&pool, "u1", Some("a@b.com"), false)
        .await
        .unwrap();
    assert!(!created.is_admin);
    assert_eq!(created.email.as_deref(), Some("a@b.com"));

    let promoted = profiles::set_admin_flag(&pool, "u1", true)
        .await
        .unwrap()
        .expect("existing profile");
    assert!(promoted.is_admin);
    assert!(profiles::is_user_admin(&pool, "u1").await.unwrap());

    // Upsert without email keeps the stored one
    let again = profiles::upsert_profile(&pool, "u1", None, true).await.unwrap();
    assert_eq!(again.email.as_deref(), Some("a@b.com"));

    assert!(profiles::set_admin_flag(&pool, "missing", true)
        .await
        .unwrap()
        .is_none());
    assert_eq!(profiles::list_profiles(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_lifecycle_and_requeue() {
    let pool = memory_pool().await;
    let lead = leads::insert_lead(&pool, &plumber()).await.unwrap();

    runs::queue_run(&pool, lead.id, 5).await.unwrap();
    let queued = runs::find_run(&pool, lead.id).await.unwrap().unwrap();
    assert_eq!(queued.state, GenerationState::Queued);
    assert_eq!(queued.target_count, 5);
    assert!(queued.started_at.is_none());

    // Only failed runs can be requeued
    assert!(!runs::requeue_failed_run(&pool, lead.id).await.unwrap());

    runs::mark_running(&pool, lead.id).await.unwrap();
    runs::finish_run(
        &pool,
        lead.id,
        GenerationState::Failed,
        RunOutcome::default(),
        Some("titles step failed"),
    )
    .await
    .unwrap();

    let failed = runs::find_run(&pool, lead.id).await.unwrap().unwrap();
    assert_eq!(failed.state, GenerationState::Failed);
    assert_eq!(failed.error.as_deref(), Some("titles step failed"));
    assert!(failed.started_at.is_some());
    assert!(failed.finished_at.is_some());

    assert!(runs::requeue_failed_run(&pool, lead.id).await.unwrap());
    assert!(!runs::requeue_failed_run(&pool, lead.id).await.unwrap());
    let requeued = runs::find_run(&pool, lead.id).await.unwrap().unwrap();
    assert_eq!(requeued.state, GenerationState::Queued);
    assert!(requeued.error.is_none());
}

#[tokio::test]
async fn test_finish_run_rejects_non_terminal_state() {
    let pool = memory_pool().await;
    let lead = leads::insert_lead(&pool, &plumber()).await.unwrap();
    runs::queue_run(&pool, lead.id, 5).await.unwrap();

    let result = runs::finish_run(
        &pool,
        lead.id,
        GenerationState::Running,
        RunOutcome::default(),
        None,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_fail_interrupted_runs() {
    let pool = memory_pool().await;
    let running = leads::insert_lead(&pool, &plumber()).await.unwrap();
    let queued = leads::insert_lead(&pool, &plumber()).await.unwrap();
    let done = leads::insert_lead(&pool, &plumber()).await.unwrap();

    runs::queue_run(&pool, running.id, 5).await.unwrap();
    runs::mark_running(&pool, running.id).await.unwrap();
    runs::queue_run(&pool, queued.id, 5).await.unwrap();
    runs::queue_run(&pool, done.id, 5).await.unwrap();
    runs::finish_run(
        &pool,
        done.id,
        GenerationState::Completed,
        RunOutcome {
            titles_found: 5,
            scripts_saved: 5,
            placeholders: 0,
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(runs::fail_interrupted_runs(&pool).await.unwrap(), 2);

    for id in [running.id, queued.id] {
        let run = runs::find_run(&pool, id).await.unwrap().unwrap();
        assert_eq!(run.state, GenerationState::Failed);
        assert_eq!(run.error.as_deref(), Some(runs::INTERRUPTED_RUN_ERROR));
        assert!(run.finished_at.is_some());
        // Interrupted runs become eligible for regenerate
        assert!(runs::requeue_failed_run(&pool, id).await.unwrap());
    }

    let completed = runs::find_run(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(completed.state, GenerationState::Completed);

    // The requeued runs count again; after that nothing is left
    assert_eq!(runs::fail_interrupted_runs(&pool).await.unwrap(), 2);
    assert_eq!(runs::fail_interrupted_runs(&pool).await.unwrap(), 0);
}
