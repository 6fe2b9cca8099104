use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::model::{Account, ClientStatus, Completion, OnboardingProfile, UserDocument};

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never leaves the auth module
    pub display_name: Option<String>,
    pub role: String,
    pub status: Option<String>,
    pub email_verified: bool,
    pub disabled: bool,
    pub step_completed: i32,
    pub profile: Json<OnboardingProfile>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub onboarding_completed_at: Option<OffsetDateTime>,
}

pub(crate) const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, status, \
     email_verified, disabled, step_completed, profile, created_at, updated_at, \
     onboarding_completed_at";

impl UserRow {
    pub fn into_document(self) -> Result<(UserDocument, String), StoreError> {
        let account = Account::from_columns(&self.role, self.status.as_deref())?;
        let step_completed = u8::try_from(self.step_completed)
            .map_err(|_| StoreError::Corrupt(format!("step_completed {}", self.step_completed)))?;
        let doc = UserDocument {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            account,
            email_verified: self.email_verified,
            disabled: self.disabled,
            step_completed,
            profile: self.profile.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
            onboarding_completed_at: self.onboarding_completed_at,
        };
        Ok((doc, self.password_hash))
    }
}

/// Row returned by the terminal onboarding update.
#[derive(Debug, Clone, FromRow)]
pub struct CompletionRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub previous_status: Option<String>,
}

impl CompletionRow {
    pub fn into_completion(self) -> Result<Completion, StoreError> {
        let previous = self
            .previous_status
            .as_deref()
            .and_then(ClientStatus::parse)
            .ok_or_else(|| StoreError::Corrupt(format!("previous status {:?}", self.previous_status)))?;
        let (user, _) = self.user.into_document()?;
        Ok(Completion { user, previous })
    }
}
