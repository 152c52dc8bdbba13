//! Service-level tests against a real PostgreSQL instance. Set
//! TEST_DATABASE_URL to run them; without it each test is skipped, in the
//! same style the rest of the suite gates external dependencies.

use crate::config::SecurityConfig;
use crate::db::migrations;
use crate::db::seed;
use crate::db::models::incident_models::{IncidentType, Severity};
use crate::db::models::user_models::{User, UserPatch, UserRole};
use crate::db::repositories::users::UsersRepository;
use crate::error::Error;
use crate::security::SessionUser;
use crate::services::incident_manager::IncidentManager;
use crate::services::sensor_poller::SensorPoller;
use crate::services::user_roster::UserRoster;
use anyhow::Result;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Tests share one database, so they serialize on this gate and each one
/// starts from truncated tables.
static DB_GATE: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

fn test_database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            println!("Skipping database test. Set TEST_DATABASE_URL to run.");
            None
        }
    }
}

fn security_config() -> SecurityConfig {
    SecurityConfig {
        password_hash_cost: 4, // minimum bcrypt cost keeps tests fast
        ..SecurityConfig::default()
    }
}

async fn fresh_pool(url: &str) -> Result<Arc<PgPool>> {
    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
    migrations::run_migrations(&pool).await?;
    sqlx::query("TRUNCATE audit_log, incidents, sensor_readings, sensors, cameras, users CASCADE")
        .execute(&pool)
        .await?;
    Ok(Arc::new(pool))
}

async fn insert_user(pool: &Arc<PgPool>, username: &str, role: UserRole) -> Result<User> {
    let repo = UsersRepository::new(pool.clone());
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@psim.local", username),
        password_hash: "$2b$04$testtesttesttesttesttehashhashhashhashhashhashhashha".to_string(),
        role,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    repo.create(&user).await
}

fn session(user: &User) -> SessionUser {
    SessionUser {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
    }
}

fn expect_error(result: Result<impl std::fmt::Debug>) -> Error {
    let err = result.expect_err("expected a typed failure");
    err.downcast_ref::<Error>()
        .cloned()
        .unwrap_or_else(|| panic!("unexpected error type: {:?}", err))
}

#[tokio::test]
async fn incident_lifecycle_walks_forward_only() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let operator = insert_user(&pool, "op1", UserRole::Operator).await?;
    let actor = session(&operator);
    let manager = IncidentManager::new(pool.clone());

    let incident = manager
        .create(IncidentType::Fire, Severity::High, Some("test"))
        .await?;
    assert!(!incident.acknowledged);
    assert!(!incident.resolved);
    assert!(incident.acknowledged_at.is_none());

    let listed = manager.list(&actor).await?;
    assert!(listed.iter().any(|i| i.id == incident.id && !i.acknowledged));

    // Open -> Acknowledged
    let acked = manager.acknowledge(incident.id, &actor).await?;
    assert!(acked.acknowledged);
    assert_eq!(acked.acknowledged_by, Some(operator.id));
    assert!(acked.acknowledged_at.is_some());

    // Re-acknowledging is an idempotent success that keeps the original
    // acknowledger and timestamp.
    let admin = insert_user(&pool, "admin1", UserRole::Admin).await?;
    let again = manager.acknowledge(incident.id, &session(&admin)).await?;
    assert_eq!(again.acknowledged_by, Some(operator.id));
    assert_eq!(again.acknowledged_at, acked.acknowledged_at);

    // Acknowledged -> Resolved
    let resolved = manager.resolve(incident.id, &actor).await?;
    assert!(resolved.resolved);
    assert!(resolved.acknowledged);
    assert!(resolved.resolved_at.is_some());

    // Re-resolving is idempotent
    let resolved_again = manager.resolve(incident.id, &actor).await?;
    assert_eq!(resolved_again.resolved_at, resolved.resolved_at);

    // The acknowledger's email appears in the joined listing
    let listed = manager.list(&actor).await?;
    let row = listed.iter().find(|i| i.id == incident.id).unwrap();
    assert_eq!(row.acknowledged_by_email.as_deref(), Some("op1@psim.local"));

    Ok(())
}

#[tokio::test]
async fn resolve_requires_prior_acknowledgment() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let operator = insert_user(&pool, "op1", UserRole::Operator).await?;
    let actor = session(&operator);
    let manager = IncidentManager::new(pool.clone());

    let incident = manager
        .create(IncidentType::Gas, Severity::Low, None)
        .await?;

    match expect_error(manager.resolve(incident.id, &actor).await) {
        Error::NotAcknowledged(id) => assert_eq!(id, incident.id),
        other => panic!("expected NotAcknowledged, got {:?}", other),
    }

    // The failed resolve left the record untouched
    let stored = manager.acknowledge(incident.id, &actor).await?;
    assert!(!stored.resolved);
    assert!(stored.resolved_at.is_none());

    Ok(())
}

#[tokio::test]
async fn acknowledging_a_missing_incident_is_not_found() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let operator = insert_user(&pool, "op1", UserRole::Operator).await?;
    let manager = IncidentManager::new(pool.clone());

    match expect_error(manager.acknowledge(999_999, &session(&operator)).await) {
        Error::NotFound(_) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn simulated_incidents_stay_in_the_allowed_domain() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let manager = IncidentManager::new(pool.clone());
    for _ in 0..10 {
        let incident = manager.simulate().await?;
        assert!(IncidentType::ALL.contains(&incident.incident_type));
        assert!((1..=3).contains(&incident.severity.level()));
        assert!(!incident.acknowledged);
        assert!(!incident.resolved);
    }

    Ok(())
}

#[tokio::test]
async fn demoting_the_sole_admin_is_rejected_without_mutation() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let admin = insert_user(&pool, "admin1", UserRole::Admin).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());
    let actor = session(&admin);

    let patch = UserPatch {
        role: Some(UserRole::Operator),
        ..UserPatch::default()
    };
    match expect_error(roster.update(&actor, &admin.id, patch).await) {
        Error::LastAdminViolation(id) => assert_eq!(id, admin.id),
        other => panic!("expected LastAdminViolation, got {:?}", other),
    }

    // Stored role is unchanged
    let repo = UsersRepository::new(pool.clone());
    let stored = repo.get_by_id(&admin.id).await?.unwrap();
    assert_eq!(stored.role, UserRole::Admin);
    assert!(stored.active);

    Ok(())
}

#[tokio::test]
async fn deactivating_the_sole_admin_is_rejected() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let admin = insert_user(&pool, "admin1", UserRole::Admin).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());

    let patch = UserPatch {
        active: Some(false),
        ..UserPatch::default()
    };
    match expect_error(roster.update(&session(&admin), &admin.id, patch).await) {
        Error::LastAdminViolation(_) => {}
        other => panic!("expected LastAdminViolation, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn concurrent_deletes_leave_exactly_one_admin() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let admin_a = insert_user(&pool, "admin_a", UserRole::Admin).await?;
    let admin_b = insert_user(&pool, "admin_b", UserRole::Admin).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());

    // Each deletion is authorized by the other admin, and both race.
    let actor_a = session(&admin_a);
    let actor_b = session(&admin_b);
    let delete_a = roster.delete(&actor_b, &admin_a.id);
    let delete_b = roster.delete(&actor_a, &admin_b.id);
    let (result_a, result_b) = tokio::join!(delete_a, delete_b);

    let successes = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(successes, 1, "exactly one deletion must win the race");

    let loser = if result_a.is_err() { result_a } else { result_b };
    match expect_error(loser) {
        Error::LastAdminViolation(_) => {}
        other => panic!("expected LastAdminViolation, got {:?}", other),
    }

    let repo = UsersRepository::new(pool.clone());
    assert_eq!(repo.count_active_admins().await?, 1);

    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let admin = insert_user(&pool, "admin1", UserRole::Admin).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());
    let actor = session(&admin);

    roster
        .create(&actor, "dup@psim.local", "first", "pw", UserRole::Operator)
        .await?;

    match expect_error(
        roster
            .create(&actor, "dup@psim.local", "second", "pw", UserRole::Operator)
            .await,
    ) {
        Error::DuplicateEmail(email) => assert_eq!(email, "dup@psim.local"),
        other => panic!("expected DuplicateEmail, got {:?}", other),
    }

    // Moving another user onto the taken email is also a conflict
    let other = roster
        .create(&actor, "other@psim.local", "other", "pw", UserRole::Operator)
        .await?;
    let patch = UserPatch {
        email: Some("dup@psim.local".to_string()),
        ..UserPatch::default()
    };
    match expect_error(roster.update(&actor, &other.id, patch).await) {
        Error::DuplicateEmail(_) => {}
        other => panic!("expected DuplicateEmail, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn update_without_password_keeps_the_stored_hash() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let admin = insert_user(&pool, "admin1", UserRole::Admin).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());
    let actor = session(&admin);

    let user = roster
        .create(&actor, "op@psim.local", "op", "initial-pw", UserRole::Operator)
        .await?;
    let original_hash = user.password_hash.clone();

    let patch = UserPatch {
        username: Some("renamed".to_string()),
        ..UserPatch::default()
    };
    let updated = roster.update(&actor, &user.id, patch).await?;
    assert_eq!(updated.username, "renamed");
    assert_eq!(updated.password_hash, original_hash);

    let patch = UserPatch {
        password: Some("new-pw".to_string()),
        ..UserPatch::default()
    };
    let rehashed = roster.update(&actor, &user.id, patch).await?;
    assert_ne!(rehashed.password_hash, original_hash);

    Ok(())
}

#[tokio::test]
async fn operator_cannot_manage_the_roster() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let operator = insert_user(&pool, "op1", UserRole::Operator).await?;
    let roster = UserRoster::new(pool.clone(), &security_config());
    let actor = session(&operator);

    match expect_error(
        roster
            .create(&actor, "x@psim.local", "x", "pw", UserRole::Operator)
            .await,
    ) {
        Error::Authorization(_) => {}
        other => panic!("expected Authorization, got {:?}", other),
    }

    // Denied before any side effect: the user was not created
    let repo = UsersRepository::new(pool.clone());
    assert!(repo.get_by_email("x@psim.local").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn seeding_runs_once_and_leaves_non_empty_rosters_alone() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    std::env::set_var("PSIM_SEED_ADMIN_PASSWORD", "bootstrap-pw");
    seed::seed_initial_users(pool.clone(), &security_config()).await?;

    let repo = UsersRepository::new(pool.clone());
    let admin = repo
        .get_by_email("admin@psim.local")
        .await?
        .expect("seeded admin");
    assert_eq!(admin.role, UserRole::Admin);
    assert_eq!(repo.count().await?, 1);

    // A deactivated admin still makes the roster non-empty: re-seeding must
    // skip instead of colliding with the stored bootstrap email.
    sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
        .bind(admin.id)
        .execute(&*pool)
        .await?;
    seed::seed_initial_users(pool.clone(), &security_config()).await?;
    assert_eq!(repo.count().await?, 1);

    std::env::remove_var("PSIM_SEED_ADMIN_PASSWORD");
    Ok(())
}

#[tokio::test]
async fn sensor_poll_publishes_latest_reading_per_sensor() -> Result<()> {
    let Some(url) = test_database_url() else {
        return Ok(());
    };
    let _gate = DB_GATE.lock().await;
    let pool = fresh_pool(&url).await?;

    let sensor_id: i64 = sqlx::query_scalar(
        "INSERT INTO sensors (name, sensor_type, location) VALUES ('t1', 'temperature', 'hall') RETURNING id",
    )
    .fetch_one(&*pool)
    .await?;
    sqlx::query(
        "INSERT INTO sensor_readings (sensor_id, value, timestamp) VALUES ($1, 20.0, NOW() - INTERVAL '1 minute'), ($1, 23.5, NOW())",
    )
    .bind(sensor_id)
    .execute(&*pool)
    .await?;
    // Inactive sensors are excluded from the snapshot
    sqlx::query(
        "INSERT INTO sensors (name, sensor_type, active) VALUES ('dead', 'gas', FALSE)",
    )
    .execute(&*pool)
    .await?;

    let poller = Arc::new(SensorPoller::new(pool.clone(), 30));
    let feed = poller.subscribe();
    poller.poll_once().await?;

    let snapshots = feed.borrow().clone();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].sensor_id, sensor_id);
    assert_eq!(snapshots[0].latest_value, 23.5);

    Ok(())
}
