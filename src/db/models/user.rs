//! User accounts and the auth request/response payloads.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;

use super::common::now_timestamp;

/// Account role, stored and serialized as `user` / `admin` / `super-admin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status; `Pending` until the emailed OTP is verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating an account. Role and status are never
/// taken from the client.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub name: String,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a pending `user`-role account
    pub async fn create(db: &SqlitePool, new_user: NewUser) -> Result<User, sqlx::Error> {
        Self::insert(db, new_user, Role::User, UserStatus::Pending).await
    }

    pub(crate) async fn insert(
        db: &SqlitePool,
        new_user: NewUser,
        role: Role,
        status: UserStatus,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, phone, name, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.phone)
        .bind(&new_user.name)
        .bind(role)
        .bind(status)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Ok(User {
            id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            phone: new_user.phone,
            name: new_user.name,
            role,
            status,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Flip a pending account to active. Returns false if no row changed.
    pub async fn activate(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET status = 'active', updated_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// User as returned to clients (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            name: user.name,
            role: user.role,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh_token: String,
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: Some("+1".to_string()),
            name: "A".to_string(),
        }
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super-admin\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(UserStatus::Pending.to_string(), "pending");
    }

    #[tokio::test]
    async fn test_create_and_activate() {
        let db = connect("sqlite::memory:").await.unwrap();

        let user = User::create(&db, new_user("a@x.com")).await.unwrap();
        assert_eq!(user.status, UserStatus::Pending);
        assert_eq!(user.role, Role::User);

        let stored = User::find_by_email(&db, "a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, user.id);
        assert_eq!(stored.role, Role::User);
        assert!(!stored.is_active());

        assert!(User::activate(&db, &user.id).await.unwrap());
        // Second activation is a no-op
        assert!(!User::activate(&db, &user.id).await.unwrap());

        let stored = User::find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = connect("sqlite::memory:").await.unwrap();

        User::create(&db, new_user("a@x.com")).await.unwrap();
        let err = User::create(&db, new_user("a@x.com")).await.unwrap_err();

        assert!(crate::db::is_unique_violation(&err));
    }
}
