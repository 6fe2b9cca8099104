use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, SessionResponse,
            VerifyEmailRequest,
        },
        errors::AuthError,
        extractors::{AuthUser, CurrentUser},
        services::{
            hash_password, is_valid_email, normalize_email, verify_password, JwtKeys, TokenKind,
            MIN_PASSWORD_LEN,
        },
    },
    error::ApiError,
    notifications::{email::Mailbox, templates::EmailVerification},
    state::AppState,
    users::{model::NewUser, Account, ClientStatus, UserDocument},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/verify-email/resend", post(resend_verification))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/auth/session", get(get_session))
}

fn issue_tokens(state: &AppState, user: &UserDocument) -> Result<AuthResponse, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AuthError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AuthError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        session: user.into(),
    })
}

/// Mails a verification link. Failures are logged; signup goes on regardless.
async fn send_verification(state: &AppState, user: &UserDocument) {
    let token = match JwtKeys::from_ref(state).sign_verification(user.id) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "jwt sign verification failed");
            return;
        }
    };
    let template = EmailVerification {
        name: user.greeting_name(),
        verify_url: format!("{}/verify-email?token={}", state.config.app_url, token),
    };
    let to = Mailbox {
        email: user.email.clone(),
        name: user.display_name.clone(),
    };
    if let Err(e) = state.notifier.send(user.id, to, &template).await {
        warn!(error = %e, user_id = %user.id, "could not record verification email");
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::InvalidEmail.into());
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN).into());
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AuthError::Internal(e)
    })?;

    let user = state
        .users
        .create(NewUser {
            email: payload.email,
            password_hash: hash,
            display_name: payload
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            account: Account::Client(ClientStatus::PendingProfile),
        })
        .await
        .map_err(AuthError::from)?;

    send_verification(&state, &user).await;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::InvalidEmail.into());
    }

    if let Err(wait) = state.login_throttle.check(&payload.email) {
        warn!(email = %payload.email, "login throttled");
        let minutes = wait.as_secs().div_ceil(60).max(1);
        return Err(AuthError::TooManyAttempts(minutes).into());
    }

    let (user, password_hash) = match state
        .users
        .find_credentials(&payload.email)
        .await
        .map_err(AuthError::from)?
    {
        Some(found) => found,
        None => {
            warn!(email = %payload.email, "login unknown email");
            state.login_throttle.record_failure(&payload.email);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let ok = verify_password(&payload.password, &password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        AuthError::Internal(e)
    })?;

    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        state.login_throttle.record_failure(&payload.email);
        return Err(AuthError::InvalidCredentials.into());
    }

    if user.disabled {
        warn!(user_id = %user.id, "login on disabled account");
        return Err(AuthError::AccountDisabled.into());
    }

    state.login_throttle.reset(&payload.email);
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let user = state
        .users
        .get(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if user.disabled {
        return Err(AuthError::AccountDisabled.into());
    }

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Tokens are stateless; the client discards them.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> StatusCode {
    info!(%user_id, "user logged out");
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let claims = JwtKeys::from_ref(&state)
        .verify_kind(&payload.token, TokenKind::EmailVerification)
        .map_err(|_| AuthError::InvalidToken)?;

    let user = state.users.mark_email_verified(claims.sub).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(SessionResponse::from(&user)))
}

#[instrument(skip(state, user))]
pub async fn resend_verification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    if user.email_verified {
        return Err(ApiError::conflict("Email is already verified", None));
    }
    send_verification(&state, &user).await;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(user))]
pub async fn get_session(CurrentUser(user): CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse::from(&user))
}
