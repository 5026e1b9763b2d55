//! Login sessions: one row per (user, client IP).

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{is_unique_violation, now_timestamp};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub ip: String,
    pub device: String,
    pub created_at: String,
    pub last_seen_at: String,
}

impl Session {
    pub async fn find(
        db: &SqlitePool,
        user_id: &str,
        ip: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sessions WHERE user_id = ? AND ip = ?")
            .bind(user_id)
            .bind(ip)
            .fetch_optional(db)
            .await
    }

    /// Like `find`, but ignores sessions last seen before `idle_cutoff`
    pub async fn find_active(
        db: &SqlitePool,
        user_id: &str,
        ip: &str,
        idle_cutoff: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM sessions WHERE user_id = ? AND ip = ? AND last_seen_at >= ?",
        )
        .bind(user_id)
        .bind(ip)
        .bind(idle_cutoff)
        .fetch_optional(db)
        .await
    }

    /// Insert a session. If a concurrent login already inserted the same
    /// (user, ip) row, that row is returned instead of an error.
    pub async fn create(
        db: &SqlitePool,
        user_id: &str,
        ip: &str,
        device: &str,
    ) -> Result<Session, sqlx::Error> {
        let now = now_timestamp();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            ip: ip.to_string(),
            device: device.to_string(),
            created_at: now.clone(),
            last_seen_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, ip, device, created_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.ip)
        .bind(&session.device)
        .bind(&session.created_at)
        .bind(&session.last_seen_at)
        .execute(db)
        .await;

        match inserted {
            Ok(_) => Ok(session),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(user_id, ip, "Session already created by a concurrent login");
                Self::find(db, user_id, ip)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh `last_seen_at`
    pub async fn touch(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Record a successful login: reuse the (user, ip) session if there is
    /// one, otherwise create it. Returns the session and whether it is new.
    pub async fn record_login(
        db: &SqlitePool,
        user_id: &str,
        ip: &str,
        device: &str,
    ) -> Result<(Session, bool), sqlx::Error> {
        match Self::find(db, user_id, ip).await? {
            Some(session) => {
                Self::touch(db, &session.id).await?;
                Ok((session, false))
            }
            None => {
                let session = Self::create(db, user_id, ip, device).await?;
                Ok((session, true))
            }
        }
    }

    /// Revoke the session for (user, ip). Returns false if there was none.
    pub async fn delete(db: &SqlitePool, user_id: &str, ip: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND ip = ?")
            .bind(user_id)
            .bind(ip)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session last seen before `cutoff`
    pub async fn prune_idle(db: &SqlitePool, cutoff: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_seen_at < ?")
            .bind(cutoff)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_user(db: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await
    }
}
