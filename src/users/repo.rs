use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::model::{ClientStatus, Completion, NewUser, StepUpdate, UserDocument};
use crate::users::repo_types::{CompletionRow, UserRow, USER_COLUMNS};

/// Document store for user profiles, keyed by user id.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<UserDocument, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<UserDocument>, StoreError>;
    /// Document and password hash for a login attempt.
    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserDocument, String)>, StoreError>;
    /// Merges the step's fields and raises `step_completed`. Rejected unless
    /// the user is a client still in `pending_profile`.
    async fn apply_step(&self, id: Uuid, update: &StepUpdate) -> Result<UserDocument, StoreError>;
    /// Single-row terminal update: step, `waitlisted`, completion time.
    /// Reports the status the row held when this update took it.
    async fn complete_onboarding(
        &self,
        id: Uuid,
        terminal_step: u8,
        at: OffsetDateTime,
    ) -> Result<Completion, StoreError>;
    async fn mark_email_verified(&self, id: Uuid) -> Result<UserDocument, StoreError>;
    /// `waitlisted` → `active`.
    async fn activate(&self, id: Uuid) -> Result<UserDocument, StoreError>;
    async fn list_by_status(
        &self,
        status: Option<ClientStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserDocument>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn doc(row: UserRow) -> Result<UserDocument, StoreError> {
    row.into_document().map(|(d, _)| d)
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<UserDocument, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, display_name, role, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.account.role_str())
        .bind(user.account.status().map(ClientStatus::as_str))
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        doc(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UserDocument>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(doc).transpose()
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserDocument, String)>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(UserRow::into_document).transpose()
    }

    async fn apply_step(&self, id: Uuid, update: &StepUpdate) -> Result<UserDocument, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET profile = profile || $2,
                   step_completed = GREATEST(step_completed, $3),
                   updated_at = now()
             WHERE id = $1 AND role = 'client' AND status = 'pending_profile'
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(serde_json::Value::Object(update.patch.clone())))
        .bind(i32::from(update.step_index))
        .fetch_optional(&self.db)
        .await?;
        debug!(user_id = %id, step = update.step_index, applied = row.is_some(), "apply_step");
        row.map(doc)
            .transpose()?
            .ok_or_else(|| StoreError::Conflict("onboarding is closed for this account".into()))
    }

    async fn complete_onboarding(
        &self,
        id: Uuid,
        terminal_step: u8,
        at: OffsetDateTime,
    ) -> Result<Completion, StoreError> {
        // the row lock makes a concurrent submit wait and then see `waitlisted`
        let row = sqlx::query_as::<_, CompletionRow>(&format!(
            r#"
            WITH prev AS (
                SELECT id AS prev_id, status AS previous_status
                  FROM users
                 WHERE id = $1
                   FOR UPDATE
            )
            UPDATE users
               SET step_completed = $2,
                   status = 'waitlisted',
                   onboarding_completed_at = $3,
                   updated_at = now()
              FROM prev
             WHERE id = prev_id AND role = 'client' AND status IN ('pending_profile', 'waitlisted')
            RETURNING {USER_COLUMNS}, previous_status
            "#
        ))
        .bind(id)
        .bind(i32::from(terminal_step))
        .bind(at)
        .fetch_optional(&self.db)
        .await?;
        row.map(CompletionRow::into_completion)
            .transpose()?
            .ok_or_else(|| StoreError::Conflict("account is already active".into()))
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<UserDocument, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET email_verified = TRUE, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(doc).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn activate(&self, id: Uuid) -> Result<UserDocument, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET status = 'active', updated_at = now()
             WHERE id = $1 AND role = 'client' AND status = 'waitlisted'
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(doc)
            .transpose()?
            .ok_or_else(|| StoreError::Conflict("only waitlisted clients can be activated".into()))
    }

    async fn list_by_status(
        &self,
        status: Option<ClientStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserDocument>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status.map(ClientStatus::as_str))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(doc).collect()
    }
}
