use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::notifications::{email::Mailbox, templates::WaitingListWelcome};
use crate::onboarding::dto::{step_fields, ReviewSection, ReviewView};
use crate::onboarding::machine::{plan_submit, TransitionError};
use crate::onboarding::steps::OnboardingStep;
use crate::state::AppState;
use crate::storage::{display_url, StorageClient};
use crate::users::model::Completion;
use crate::users::{ClientStatus, UserDocument};

/// Read-only summary of every data step. Stored resume keys come back presigned.
pub async fn build_review(doc: &UserDocument, storage: &dyn StorageClient) -> anyhow::Result<ReviewView> {
    let mut sections = Vec::new();
    for step in OnboardingStep::data_steps() {
        let mut fields = step_fields(&doc.profile, step);
        if let Some(Value::String(url)) = fields.get("resume_url").cloned() {
            let shown = display_url(storage, &url).await?;
            fields.insert("resume_url".into(), Value::String(shown));
        }
        sections.push(ReviewSection {
            step,
            title: step.title(),
            fields,
            edit_route: step.route(),
        });
    }
    Ok(ReviewView {
        sections,
        step_completed: doc.step_completed,
        can_submit: plan_submit(doc).is_ok(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] crate::error::StoreError),
}

/// Moves the client to the waiting list in one update, then sends the welcome
/// mail. Mail trouble is logged and does not undo the submission.
#[instrument(skip(state, doc), fields(user_id = %doc.id))]
pub async fn submit(state: &AppState, doc: &UserDocument) -> Result<UserDocument, SubmitError> {
    let terminal = plan_submit(doc)?;

    let Completion { user, previous } = state
        .users
        .complete_onboarding(doc.id, terminal, OffsetDateTime::now_utc())
        .await?;
    // decided by the row the update took, so racing submits mail once
    let first_time = previous == ClientStatus::PendingProfile;
    info!(first_time, "profile submitted for review");

    if first_time {
        let welcome = WaitingListWelcome {
            name: user.greeting_name(),
            email: user.email.clone(),
        };
        let to = Mailbox {
            email: user.email.clone(),
            name: Some(user.greeting_name()),
        };
        if let Err(e) = state.notifier.send(user.id, to, &welcome).await {
            warn!(error = %e, "could not record welcome email");
        }
    }
    Ok(user)
}
