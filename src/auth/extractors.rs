use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::services::{JwtKeys, TokenKind};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::UserDocument;

/// Extracts and validates the access token, returning the user ID.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::unauthorized("Invalid or expired token"));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// The signed-in user's document, loaded once per request.
/// This is the explicit session context handlers work from.
pub struct CurrentUser(pub UserDocument);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let doc = state
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;
        if doc.disabled {
            return Err(ApiError::Forbidden("This account has been disabled".into()));
        }
        Ok(CurrentUser(doc))
    }
}

impl CurrentUser {
    /// Rejects anyone who is not on the team (staff or admin).
    pub fn require_team(&self) -> Result<(), ApiError> {
        if self.0.account.is_team() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Staff access required".into()))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.account == crate::users::Account::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required".into()))
        }
    }
}
