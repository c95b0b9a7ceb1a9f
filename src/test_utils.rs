//! Shared test fixtures: in-memory database setup, roster seeding, and
//! who-log builders.

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::wholog::Sighting;

/// In-memory SQLite with all migrations applied. A single connection so
/// every query in a test sees the same database.
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub(crate) async fn seed_account(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO accounts (name) VALUES (?1)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub(crate) async fn seed_character(
    pool: &SqlitePool,
    name: &str,
    account_id: Option<i64>,
    class: Option<&str>,
    level: Option<i64>,
) {
    sqlx::query(
        "INSERT INTO characters (name, account_id, class, level, status, last_modified)
         VALUES (?1, ?2, ?3, ?4, 'main', ?5)",
    )
    .bind(name)
    .bind(account_id)
    .bind(class)
    .bind(level)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
}

pub(crate) async fn seed_event(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query(
        "INSERT INTO raid_events (name, status, created_by, created_at)
         VALUES (?1, 'active', 'officer', ?2)",
    )
    .bind(name)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub(crate) async fn seed_call(
    pool: &SqlitePool,
    event_id: i64,
    raid_name: &str,
    modifier: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO raid_calls
            (event_id, raid_name, modifier, raw_log, sort_order, created_by, created_at)
         VALUES (?1, ?2, ?3, '', 1, 'officer', ?4)",
    )
    .bind(event_id)
    .bind(raid_name)
    .bind(modifier)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub(crate) fn who_line(name: &str) -> String {
    format!("[Thu May 25 22:10:50 2023] [60 Warlock] {name} (Iksar) <Ex Astra>")
}

pub(crate) fn who_log(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| who_line(name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn sighting(name: &str) -> Sighting {
    Sighting {
        timestamp: Utc::now(),
        level: Some(60),
        class_name: Some("Warlock".to_string()),
        name: name.to_string(),
        guild: Some("Ex Astra".to_string()),
    }
}
