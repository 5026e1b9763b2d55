//! Authentication gate for protected routes.
//!
//! One middleware, parameterized by the set of roles allowed through. A
//! request passes when it carries a valid access token for an active
//! account, a session exists for that user from the request's IP, and the
//! token's role is in the allowed set. The verified claims are then placed
//! in the request extensions as [`CurrentUser`].

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiError;
use super::metrics::GATE_REJECTIONS_TOTAL;
use crate::auth::AccessClaims;
use crate::db::{Role, Session, UserStatus};
use crate::AppState;

/// Roles allowed through a gate. An empty set admits any authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const ANY: RoleSet = RoleSet(&[]);
    pub const ADMIN: RoleSet = RoleSet(&[Role::Admin]);
    pub const EDITORS: RoleSet = RoleSet(&[Role::Admin, Role::SuperAdmin]);

    pub fn allows(&self, role: Role) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }
}

/// Middleware state: the shared app state plus the roles this gate admits
#[derive(Clone)]
pub struct Gate {
    state: Arc<AppState>,
    roles: RoleSet,
}

impl Gate {
    pub fn new(state: Arc<AppState>, roles: RoleSet) -> Self {
        Self { state, roles }
    }
}

impl FromRef<Gate> for Arc<AppState> {
    fn from_ref(gate: &Gate) -> Self {
        gate.state.clone()
    }
}

/// The authenticated caller, available to handlers behind the gate
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: AccessClaims,
    pub ip: String,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.claims.sub
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Token not provided"))
    }
}

/// Client IP address of the request.
///
/// The socket peer address, or the first proxy header value when
/// `server.trust_proxy_headers` is enabled. "unknown" when neither exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);
        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr);

        Ok(ClientIp(client_ip(
            &parts.headers,
            peer,
            app.config.server.trust_proxy_headers,
        )))
    }
}

/// Resolve the client IP from proxy headers (when trusted) or the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        // X-Forwarded-For is a comma-separated list, the first entry is the client
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
            if let Some(first_ip) = forwarded.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
            let ip = real_ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Run every gate check for a request coming from `ip`
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    ip: &str,
    roles: RoleSet,
) -> Result<AccessClaims, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::unauthorized("Token not provided"))?;

    let claims = state.tokens.verify_access(token)?;

    if claims.status != UserStatus::Active {
        return Err(ApiError::unauthorized("Account is not verified"));
    }

    let cutoff = state.config.auth.session_idle_cutoff();
    if Session::find_active(&state.db, &claims.sub, ip, &cutoff)
        .await?
        .is_none()
    {
        return Err(ApiError::unauthorized(
            "No session detected, please log in again",
        ));
    }

    if !roles.allows(claims.role) {
        return Err(ApiError::forbidden("You are not allowed to access this route"));
    }

    Ok(claims)
}

/// Gate middleware. Use with `middleware::from_fn_with_state(Gate::new(..), auth_gate)`.
pub async fn auth_gate(
    State(gate): State<Gate>,
    ClientIp(ip): ClientIp,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers().clone();
    match authorize(&gate.state, &headers, &ip, gate.roles).await {
        Ok(claims) => {
            request.extensions_mut().insert(CurrentUser { claims, ip });
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::debug!(
                ip = %ip,
                path = %request.uri().path(),
                code = ?err.code(),
                reason = %err.message(),
                "Request rejected by auth gate"
            );
            metrics::counter!(
                GATE_REJECTIONS_TOTAL,
                "status" => err.status().as_u16().to_string()
            )
            .increment(1);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_role_sets() {
        assert!(RoleSet::ANY.allows(Role::User));
        assert!(RoleSet::ADMIN.allows(Role::Admin));
        assert!(!RoleSet::ADMIN.allows(Role::SuperAdmin));
        assert!(!RoleSet::ADMIN.allows(Role::User));
        assert!(RoleSet::EDITORS.allows(Role::SuperAdmin));
        assert!(!RoleSet::EDITORS.allows(Role::User));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let peer: SocketAddr = "10.0.0.2:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.2");
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_proxy_header_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers, None, true), "198.51.100.4");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, None, true), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_unknown() {
        assert_eq!(client_ip(&HeaderMap::new(), None, false), "unknown");
    }
}
