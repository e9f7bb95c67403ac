// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users, authentication providers and auth points
//! - Plans (with owner profile joined in)
//! - Plan entries (availability windows)

use crate::db::{PlanRepository, UserRepository};
use crate::error::AppError;
use crate::models::{
    AuthenticationProvider, NewEntry, NewPlan, Plan, PlanEntry, User, UserAuthPoint,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 8;

/// Schema, applied idempotently on connect.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        avatar_url TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS authentication_providers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS user_auth_points (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        provider_id INTEGER NOT NULL REFERENCES authentication_providers(id),
        identifier TEXT NOT NULL,
        UNIQUE (user_id, provider_id)
    )",
    "CREATE TABLE IF NOT EXISTS plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id),
        identifier TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        start_date TEXT NOT NULL,
        duration_days INTEGER NOT NULL,
        min_availability_seconds INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS plans_owner ON plans (owner_id)",
    "CREATE TABLE IF NOT EXISTS plan_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id INTEGER NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id),
        start_time_unix INTEGER NOT NULL,
        duration_seconds INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS plan_entries_by_user
        ON plan_entries (plan_id, user_id, start_time_unix)",
];

const PLAN_SELECT: &str = "SELECT p.id, p.owner_id, p.identifier, p.title, p.start_date,
        p.duration_days, p.min_availability_seconds, p.created_at,
        u.display_name AS owner_display_name, u.avatar_url AS owner_avatar_url
    FROM plans p JOIN users u ON u.id = p.owner_id";

const ENTRY_SELECT: &str = "SELECT e.id, e.plan_id, e.user_id, e.start_time_unix,
        e.duration_seconds, e.created_at,
        u.display_name AS user_display_name, u.avatar_url AS user_avatar_url
    FROM plan_entries e JOIN users u ON u.id = e.user_id";

/// Half-open overlap guard: the new window [?3, ?3 + ?4) must not intersect
/// any window [s, s + d) of the same user on the same plan.
const GUARDED_ENTRY_INSERT: &str = "INSERT INTO plan_entries
        (plan_id, user_id, start_time_unix, duration_seconds, created_at)
    SELECT ?1, ?2, ?3, ?4, ?5
    WHERE NOT EXISTS (
        SELECT 1 FROM plan_entries
        WHERE plan_id = ?1 AND user_id = ?2
          AND ((?3 >= start_time_unix AND ?3 < start_time_unix + duration_seconds)
            OR (start_time_unix >= ?3 AND start_time_unix < ?3 + ?4))
    )";

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open (or create) the database file and apply the schema.
    pub async fn connect(path: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {}: {}", path, e)))?;

        tracing::info!(path, "Connected to SQLite");
        Self::with_pool(pool).await
    }

    /// Private in-memory database, used by tests.
    ///
    /// A single connection is kept alive for the lifetime of the pool since
    /// every new in-memory connection would see an empty database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, AppError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| AppError::Database(format!("Failed to apply schema: {}", e)))?;
        }
        Ok(Self { pool })
    }

    async fn get_plan_by_id(&self, plan_id: i64) -> Result<Option<Plan>, AppError> {
        let sql = format!("{PLAN_SELECT} WHERE p.id = ?");
        Ok(sqlx::query_as::<_, Plan>(&sql)
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl PlanRepository for SqliteDb {
    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan, AppError> {
        let result = sqlx::query(
            "INSERT INTO plans (owner_id, identifier, title, start_date, duration_days,
                min_availability_seconds, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(plan.owner_id)
        .bind(&plan.identifier)
        .bind(&plan.title)
        .bind(plan.start_date)
        .bind(plan.duration_days)
        .bind(plan.min_availability_seconds)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed creating plan: {}", e)))?;

        self.get_plan_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::Database("Created plan could not be read back".to_string()))
    }

    async fn get_plan(&self, identifier: &str) -> Result<Option<Plan>, AppError> {
        let sql = format!("{PLAN_SELECT} WHERE p.identifier = ?");
        Ok(sqlx::query_as::<_, Plan>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_plans_by_owner(&self, owner_id: i64) -> Result<Vec<Plan>, AppError> {
        let sql = format!("{PLAN_SELECT} WHERE p.owner_id = ? ORDER BY p.id");
        Ok(sqlx::query_as::<_, Plan>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_plan(&self, plan_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM plan_entries WHERE plan_id = ?")
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_entries_for_plan(&self, plan_id: i64) -> Result<Vec<PlanEntry>, AppError> {
        let sql = format!("{ENTRY_SELECT} WHERE e.plan_id = ? ORDER BY e.start_time_unix, e.id");
        Ok(sqlx::query_as::<_, PlanEntry>(&sql)
            .bind(plan_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_entries_by_user(
        &self,
        plan_id: i64,
        user_id: i64,
    ) -> Result<Vec<PlanEntry>, AppError> {
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.plan_id = ? AND e.user_id = ? ORDER BY e.start_time_unix, e.id"
        );
        Ok(sqlx::query_as::<_, PlanEntry>(&sql)
            .bind(plan_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_entry_if_free(&self, entry: &NewEntry) -> Result<Option<PlanEntry>, AppError> {
        let result = sqlx::query(GUARDED_ENTRY_INSERT)
            .bind(entry.plan_id)
            .bind(entry.user_id)
            .bind(entry.start_time_unix)
            .bind(entry.duration_seconds)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed creating plan entry: {}", e)))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_entry(result.last_insert_rowid()).await
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Option<PlanEntry>, AppError> {
        let sql = format!("{ENTRY_SELECT} WHERE e.id = ?");
        Ok(sqlx::query_as::<_, PlanEntry>(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_entry(&self, entry_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM plan_entries WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteDb {
    async fn seed_providers(&self, names: &[String]) -> Result<(), AppError> {
        for name in names {
            sqlx::query(
                "INSERT INTO authentication_providers (name) VALUES (?)
                ON CONFLICT(name) DO NOTHING",
            )
            .bind(name)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!(count = names.len(), "Authentication providers seeded");
        Ok(())
    }

    async fn get_provider(&self, name: &str) -> Result<Option<AuthenticationProvider>, AppError> {
        Ok(sqlx::query_as::<_, AuthenticationProvider>(
            "SELECT id, name FROM authentication_providers WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_providers(&self) -> Result<Vec<AuthenticationProvider>, AppError> {
        Ok(sqlx::query_as::<_, AuthenticationProvider>(
            "SELECT id, name FROM authentication_providers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_or_create_user(
        &self,
        email: &str,
        display_name: &str,
        avatar_url: &str,
    ) -> Result<User, AppError> {
        sqlx::query(
            "INSERT INTO users (email, display_name, avatar_url, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO NOTHING",
        )
        .bind(email)
        .bind(display_name)
        .bind(avatar_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::Database(format!("User {} vanished after insert", email)))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, avatar_url, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_or_create_auth_point(
        &self,
        user_id: i64,
        provider_id: i64,
        identifier: &str,
    ) -> Result<UserAuthPoint, AppError> {
        sqlx::query(
            "INSERT INTO user_auth_points (user_id, provider_id, identifier)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, provider_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(provider_id)
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, UserAuthPoint>(
            "SELECT id, user_id, provider_id, identifier FROM user_auth_points
            WHERE user_id = ? AND provider_id = ?",
        )
        .bind(user_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Database("Auth point vanished after insert".to_string()))
    }

    async fn get_auth_points(&self, user_id: i64) -> Result<Vec<UserAuthPoint>, AppError> {
        Ok(sqlx::query_as::<_, UserAuthPoint>(
            "SELECT id, user_id, provider_id, identifier FROM user_auth_points
            WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn db_with_user(email: &str) -> (SqliteDb, User) {
        let db = SqliteDb::in_memory().await.unwrap();
        let user = db
            .get_or_create_user(email, "Tester", "https://example.com/a.png")
            .await
            .unwrap();
        (db, user)
    }

    fn new_plan(owner_id: i64, identifier: &str) -> NewPlan {
        NewPlan {
            owner_id,
            identifier: identifier.to_string(),
            title: "Offsite".to_string(),
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            duration_days: 3,
            min_availability_seconds: 1,
        }
    }

    fn entry(plan_id: i64, user_id: i64, start: i64, duration: i64) -> NewEntry {
        NewEntry {
            plan_id,
            user_id,
            start_time_unix: start,
            duration_seconds: duration,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let (db, first) = db_with_user("ada@example.com").await;

        let second = db
            .get_or_create_user("ada@example.com", "Someone Else", "https://other/b.png")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.display_name, "Tester");
    }

    #[tokio::test]
    async fn test_auth_point_created_once_per_provider() {
        let (db, user) = db_with_user("ada@example.com").await;
        db.seed_providers(&["discord".to_string(), "discord".to_string()])
            .await
            .unwrap();
        assert_eq!(db.list_providers().await.unwrap().len(), 1);

        let provider = db.get_provider("discord").await.unwrap().unwrap();
        let first = db
            .get_or_create_auth_point(user.id, provider.id, "1234")
            .await
            .unwrap();
        let second = db
            .get_or_create_auth_point(user.id, provider.id, "1234")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(db.get_auth_points(user.id).await.unwrap().len(), 1);
        assert!(db.get_provider("github").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plan_roundtrip_with_owner() {
        let (db, user) = db_with_user("ada@example.com").await;
        let created = db.create_plan(&new_plan(user.id, "abc")).await.unwrap();

        assert_eq!(created.owner_display_name, "Tester");
        assert_eq!(created.start_date, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        let fetched = db.get_plan("abc").await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(db.get_plan("missing").await.unwrap().is_none());
        assert_eq!(db.get_plans_by_owner(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected() {
        let (db, user) = db_with_user("ada@example.com").await;
        db.create_plan(&new_plan(user.id, "abc")).await.unwrap();

        let err = db.create_plan(&new_plan(user.id, "abc")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_guarded_insert_half_open_overlap() {
        let (db, user) = db_with_user("ada@example.com").await;
        let other = db
            .get_or_create_user("bob@example.com", "Bob", "")
            .await
            .unwrap();
        let plan = db.create_plan(&new_plan(user.id, "abc")).await.unwrap();

        // Existing [10, 20)
        assert!(db
            .insert_entry_if_free(&entry(plan.id, user.id, 10, 10))
            .await
            .unwrap()
            .is_some());

        for start in [10, 15, 19] {
            assert!(
                db.insert_entry_if_free(&entry(plan.id, user.id, start, 5))
                    .await
                    .unwrap()
                    .is_none(),
                "start {start} should conflict"
            );
        }

        // New window containing the existing start
        assert!(db
            .insert_entry_if_free(&entry(plan.id, user.id, 5, 6))
            .await
            .unwrap()
            .is_none());

        // Touching windows on either side are fine
        assert!(db
            .insert_entry_if_free(&entry(plan.id, user.id, 20, 5))
            .await
            .unwrap()
            .is_some());
        assert!(db
            .insert_entry_if_free(&entry(plan.id, user.id, 5, 5))
            .await
            .unwrap()
            .is_some());

        // Another user may take the same span
        assert!(db
            .insert_entry_if_free(&entry(plan.id, other.id, 10, 10))
            .await
            .unwrap()
            .is_some());

        assert_eq!(
            db.get_entries_by_user(plan.id, user.id).await.unwrap().len(),
            3
        );
        assert_eq!(db.get_entries_for_plan(plan.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_plan_removes_entries() {
        let (db, user) = db_with_user("ada@example.com").await;
        let plan = db.create_plan(&new_plan(user.id, "abc")).await.unwrap();
        let created = db
            .insert_entry_if_free(&entry(plan.id, user.id, 10, 10))
            .await
            .unwrap()
            .unwrap();

        db.delete_plan(plan.id).await.unwrap();

        assert!(db.get_plan("abc").await.unwrap().is_none());
        assert!(db.get_entry(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (db, user) = db_with_user("ada@example.com").await;
        let plan = db.create_plan(&new_plan(user.id, "abc")).await.unwrap();
        let created = db
            .insert_entry_if_free(&entry(plan.id, user.id, 10, 10))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.user_display_name, "Tester");
        db.delete_entry(created.id).await.unwrap();
        assert!(db.get_entry(created.id).await.unwrap().is_none());
    }
}
