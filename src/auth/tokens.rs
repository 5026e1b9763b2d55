//! Access and refresh token issuance.
//!
//! Both token kinds are HS256 JWTs whose `sub` claim is the user id. Access
//! tokens additionally carry the role and account status so the auth gate
//! can decide without a user lookup. The two kinds are signed with
//! different secrets and carry a `typ` claim, so one can never be accepted
//! as the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::db::{Role, User, UserStatus};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

trait Typed {
    fn kind(&self) -> TokenKind;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    pub typ: TokenKind,
    pub role: Role,
    pub status: UserStatus,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User id
    pub sub: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Typed for AccessClaims {
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

impl Typed for RefreshClaims {
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: SigningKeys::from_secret(&config.access_secret),
            refresh: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        }
    }

    /// Issue an access token for `user` valid from now
    pub fn issue_access(&self, user: &User) -> Result<String, TokenError> {
        self.issue_access_at(user, Utc::now())
    }

    /// Issue an access token as if it had been issued at `issued_at`
    pub fn issue_access_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AccessClaims {
            sub: user.id.clone(),
            typ: TokenKind::Access,
            role: user.role,
            status: user.status,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.access_ttl).timestamp(),
        };
        sign(&claims, &self.access.encoding)
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_refresh_at(user_id, Utc::now())
    }

    pub fn issue_refresh_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            typ: TokenKind::Refresh,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.refresh_ttl).timestamp(),
        };
        sign(&claims, &self.refresh.encoding)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access.decoding, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh.decoding, TokenKind::Refresh)
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(TokenError::Encode)
}

fn verify<T: DeserializeOwned + Typed>(
    token: &str,
    key: &DecodingKey,
    expected: TokenKind,
) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let claims = decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

    if claims.kind() != expected {
        return Err(TokenError::Invalid);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            ..AuthConfig::default()
        })
    }

    fn user(status: UserStatus) -> User {
        User {
            id: "user-1".to_string(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            phone: None,
            name: "A".to_string(),
            role: Role::Admin,
            status,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_access_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_access(&user(UserStatus::Active)).unwrap();
        let claims = issuer.verify_access(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.status, UserStatus::Active);
        assert_eq!(claims.exp - claims.iat, 40 * 60);
    }

    #[test]
    fn test_refresh_uses_user_id_subject() {
        let issuer = issuer();
        let token = issuer.issue_refresh("user-1").unwrap();
        let claims = issuer.verify_refresh(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 14 * 24 * 3600);
    }

    #[test]
    fn test_expired_is_distinguished() {
        let issuer = issuer();
        let issued_at = Utc::now() - Duration::hours(2);
        let token = issuer
            .issue_access_at(&user(UserStatus::Active), issued_at)
            .unwrap();

        assert!(matches!(issuer.verify_access(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_malformed_and_wrong_secret_are_invalid() {
        let issuer = issuer();
        assert!(matches!(issuer.verify_access("not.a.jwt"), Err(TokenError::Invalid)));
        assert!(matches!(issuer.verify_access(""), Err(TokenError::Invalid)));

        let refresh = issuer.issue_refresh("user-1").unwrap();
        assert!(matches!(issuer.verify_access(&refresh), Err(TokenError::Invalid)));

        let access = issuer.issue_access(&user(UserStatus::Active)).unwrap();
        assert!(matches!(issuer.verify_refresh(&access), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_kinds_not_interchangeable_with_shared_secret() {
        let issuer = TokenIssuer::new(&AuthConfig {
            access_secret: "same".to_string(),
            refresh_secret: "same".to_string(),
            ..AuthConfig::default()
        });

        let access = issuer.issue_access(&user(UserStatus::Active)).unwrap();
        assert!(matches!(issuer.verify_refresh(&access), Err(TokenError::Invalid)));

        let refresh = issuer.issue_refresh("user-1").unwrap();
        assert!(matches!(issuer.verify_access(&refresh), Err(TokenError::Invalid)));

        assert_eq!(issuer.verify_access(&access).unwrap().typ, TokenKind::Access);
        assert_eq!(issuer.verify_refresh(&refresh).unwrap().typ, TokenKind::Refresh);
    }

    #[test]
    fn test_status_claim_reflects_user() {
        let issuer = issuer();
        let token = issuer.issue_access(&user(UserStatus::Pending)).unwrap();
        assert_eq!(issuer.verify_access(&token).unwrap().status, UserStatus::Pending);
    }
}
