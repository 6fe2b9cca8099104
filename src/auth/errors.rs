use axum::http::StatusCode;

use crate::error::{ApiError, StoreError};

/// Sign-in and sign-up failures, each tied to the form field it concerns.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("This account has been disabled, please contact support")]
    AccountDisabled,

    #[error("Too many attempts, try again in {0} minutes")]
    TooManyAttempts(u64),

    #[error("This link is invalid or has expired")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail | Self::WeakPassword(_) => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::TooManyAttempts(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidEmail | Self::EmailTaken | Self::AccountDisabled => Some("email"),
            Self::WeakPassword(_) | Self::InvalidCredentials => Some("password"),
            _ => None,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(StoreError::DuplicateEmail) => AuthError::EmailTaken.into(),
            AuthError::Store(other) => other.into(),
            AuthError::Internal(other) => ApiError::Internal(other),
            other => ApiError::Field {
                status: other.status(),
                field: other.field().map(str::to_string),
                message: other.to_string(),
            },
        }
    }
}
