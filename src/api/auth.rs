//! Account endpoints: registration, OTP verification, login, token refresh
//! and logout.

use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::gate::{ClientIp, CurrentUser};
use super::metrics::{record_login, record_registration, record_verification};
use super::validation::{
    normalize_email, validate_email, validate_name, validate_password, validate_phone,
};
use crate::auth::{describe_user_agent, hash_password, verify_password};
use crate::db::{
    is_unique_violation, LoginRequest, MessageResponse, NewUser, RefreshRequest, RegisterRequest,
    ResendOtpRequest, Role, Session, TokenPair, User, UserResponse, UserStatus, VerifyRequest,
};
use crate::{AppState, DbPool};

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }

    errors.finish()
}

fn hash_or_internal(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Something went wrong")
    })
}

/// Issue a fresh access/refresh pair for `user`
fn issue_pair(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    Ok(TokenPair {
        refresh_token: state.tokens.issue_refresh(&user.id)?,
        access_token: state.tokens.issue_access(user)?,
    })
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_register_request(&req)?;

    let email = normalize_email(&req.email);
    let password_hash = hash_or_internal(&req.password)?;
    let phone = req
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        phone,
        name: req.name.trim().to_string(),
    };

    let user = match User::create(&state.db, new_user).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("A user with this email already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    record_registration();
    tracing::info!(user_id = %user.id, email = %user.email, "User registered");

    let code = state.otp.generate(&email)?;
    if let Err(e) = state.mailer.send_otp(&email, &user.name, &code).await {
        // The account exists; the user can ask for a new code via /auth/resend-otp
        tracing::warn!(email = %email, error = %e, "Failed to send verification email");
    }

    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let email = normalize_email(&req.email);

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        record_login("not_found");
        return Err(ApiError::not_found("User not found"));
    };

    if !verify_password(&req.password, &user.password_hash) {
        record_login("bad_password");
        tracing::info!(user_id = %user.id, ip = %ip, "Login with incorrect password");
        return Err(ApiError::unauthorized("Password is incorrect"));
    }

    if !user.is_active() {
        record_login("unverified");
        return Err(ApiError::bad_request(
            "Your account is not verified, please verify it",
        ));
    }

    let tokens = issue_pair(&state, &user)?;

    let user_agent = headers.get(USER_AGENT).and_then(|h| h.to_str().ok());
    let device = describe_user_agent(user_agent);
    let (session, created) = Session::record_login(&state.db, &user.id, &ip, &device).await?;

    if created {
        tracing::info!(user_id = %user.id, ip = %ip, device = %session.device, "New session");
    }
    record_login("success");

    Ok(Json(tokens))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, current.id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

/// POST /auth/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&req.email);

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !state.otp.verify(req.code.trim(), &email)? {
        record_verification("invalid");
        return Err(ApiError::bad_request("Invalid or expired code"));
    }

    // A correct code for an already active account changes nothing
    if user.is_active() {
        return Ok(Json(MessageResponse::new("Verified")));
    }

    User::activate(&state.db, &user.id).await?;
    record_verification("success");
    tracing::info!(user_id = %user.id, "Account verified");

    Ok(Json(MessageResponse::new("Verified")))
}

/// POST /auth/resend-otp
pub async fn resend_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&req.email);

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_active() {
        return Err(ApiError::bad_request("Account is already verified"));
    }

    let code = state.otp.generate(&email)?;
    state
        .mailer
        .send_otp(&email, &user.name, &code)
        .await
        .map_err(|e| {
            tracing::error!(email = %email, error = %e, "Failed to send verification email");
            ApiError::internal("Failed to send verification email")
        })?;

    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let claims = state.tokens.verify_refresh(req.refresh_token.trim())?;

    let user = User::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !user.is_active() {
        return Err(ApiError::bad_request(
            "Your account is not verified, please verify it",
        ));
    }

    // Refreshing from a known IP counts as activity on that session
    if let Some(session) = Session::find(&state.db, &user.id, &ip).await? {
        Session::touch(&state.db, &session.id).await?;
    }

    Ok(Json(issue_pair(&state, &user)?))
}

/// POST /auth/logout - revoke the caller's session for this IP
pub async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    Session::delete(&state.db, current.id(), &current.ip).await?;
    tracing::info!(user_id = %current.id(), ip = %current.ip, "Logged out");

    Ok(Json(MessageResponse::new("Logged out")))
}

/// Create an active admin account for `email` unless that email is taken
pub async fn ensure_admin_user(db: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email);
    if let Err(e) = validate_email(&email) {
        anyhow::bail!("Invalid bootstrap admin email: {}", e);
    }
    if let Err(e) = validate_password(password) {
        anyhow::bail!("Invalid bootstrap admin password: {}", e);
    }

    if User::find_by_email(db, &email).await?.is_some() {
        tracing::debug!(email = %email, "Bootstrap admin already exists");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        phone: None,
        name: "Administrator".to_string(),
    };
    User::insert(db, new_user, Role::Admin, UserStatus::Active).await?;

    tracing::info!(email = %email, "Created bootstrap admin user");
    Ok(())
}
