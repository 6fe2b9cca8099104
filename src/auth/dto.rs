use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::routing::destination_for;
use crate::users::{Account, UserDocument};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub verify_ttl: Duration,
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Session context handed to the client on every auth-state change.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub account: Account,
    pub step_completed: u8,
}

impl From<&UserDocument> for SessionView {
    fn from(doc: &UserDocument) -> Self {
        Self {
            user_id: doc.id,
            email: doc.email.clone(),
            display_name: doc.display_name.clone(),
            email_verified: doc.email_verified,
            account: doc.account,
            step_completed: doc.step_completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionView,
    pub redirect_to: String,
}

impl From<&UserDocument> for SessionResponse {
    fn from(doc: &UserDocument) -> Self {
        Self {
            session: doc.into(),
            redirect_to: destination_for(doc).path(),
        }
    }
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(flatten)]
    pub session: SessionResponse,
}
