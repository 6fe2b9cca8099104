use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::model::{
    Account, ClientStatus, Completion, NewUser, OnboardingProfile, StepUpdate, UserDocument,
};
use crate::users::repo::UserStore;

/// In-process store used by handler tests.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, (UserDocument, String)>>,
    fail_writes: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent update fail like a dropped connection.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a ready-made document, bypassing signup.
    pub async fn insert(&self, doc: UserDocument, password_hash: &str) {
        self.users
            .lock()
            .await
            .insert(doc.id, (doc, password_hash.to_string()));
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn update<F>(&self, id: Uuid, f: F) -> Result<UserDocument, StoreError>
    where
        F: FnOnce(&mut UserDocument) -> Result<(), StoreError>,
    {
        self.check_writable()?;
        let mut users = self.users.lock().await;
        let (doc, _) = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        // work on a copy so a rejected update leaves the stored doc untouched
        let mut next = doc.clone();
        f(&mut next)?;
        next.updated_at = OffsetDateTime::now_utc();
        *doc = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<UserDocument, StoreError> {
        self.check_writable()?;
        let mut users = self.users.lock().await;
        if users.values().any(|(d, _)| d.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let doc = UserDocument {
            id: Uuid::new_v4(),
            email: user.email,
            display_name: user.display_name,
            account: user.account,
            email_verified: false,
            disabled: false,
            step_completed: 0,
            profile: OnboardingProfile::default(),
            created_at: now,
            updated_at: now,
            onboarding_completed_at: None,
        };
        users.insert(doc.id, (doc.clone(), user.password_hash));
        Ok(doc)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UserDocument>, StoreError> {
        Ok(self.users.lock().await.get(&id).map(|(d, _)| d.clone()))
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserDocument, String)>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|(d, _)| d.email == email)
            .cloned())
    }

    async fn apply_step(&self, id: Uuid, update: &StepUpdate) -> Result<UserDocument, StoreError> {
        self.update(id, |doc| {
            if doc.account != Account::Client(ClientStatus::PendingProfile) {
                return Err(StoreError::Conflict("onboarding is closed for this account".into()));
            }
            doc.profile = doc.profile.merged(&update.patch)?;
            doc.step_completed = doc.step_completed.max(update.step_index);
            Ok(())
        })
        .await
    }

    async fn complete_onboarding(
        &self,
        id: Uuid,
        terminal_step: u8,
        at: OffsetDateTime,
    ) -> Result<Completion, StoreError> {
        let mut previous = None;
        let user = self
            .update(id, |doc| match doc.account {
                Account::Client(status) if status.can_move_to(ClientStatus::Waitlisted) => {
                    previous = Some(status);
                    doc.step_completed = terminal_step;
                    doc.account = Account::Client(ClientStatus::Waitlisted);
                    doc.onboarding_completed_at = Some(at);
                    Ok(())
                }
                _ => Err(StoreError::Conflict("account is already active".into())),
            })
            .await?;
        let previous = previous.ok_or_else(|| StoreError::Corrupt("no previous status".into()))?;
        Ok(Completion { user, previous })
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<UserDocument, StoreError> {
        self.update(id, |doc| {
            doc.email_verified = true;
            Ok(())
        })
        .await
    }

    async fn activate(&self, id: Uuid) -> Result<UserDocument, StoreError> {
        self.update(id, |doc| match doc.account {
            Account::Client(ClientStatus::Waitlisted) => {
                doc.account = Account::Client(ClientStatus::Active);
                Ok(())
            }
            _ => Err(StoreError::Conflict("only waitlisted clients can be activated".into())),
        })
        .await
    }

    async fn list_by_status(
        &self,
        status: Option<ClientStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserDocument>, StoreError> {
        let users = self.users.lock().await;
        let mut docs: Vec<UserDocument> = users
            .values()
            .map(|(d, _)| d.clone())
            .filter(|d| status.is_none() || d.account.status() == status)
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
