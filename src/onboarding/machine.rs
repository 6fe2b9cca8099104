//! The single place onboarding progress is decided.
//!
//! Handlers never touch `step_completed` or `status` directly: they ask this
//! module for a plan and hand the result to the store.

use crate::onboarding::command::{CommandError, StepCommand};
use crate::onboarding::steps::{OnboardingStep, STEP_COUNT};
use crate::users::model::{Account, ClientStatus, StepUpdate, UserDocument};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("onboarding is only for client accounts")]
    NotClient,

    #[error("onboarding is closed once the profile is submitted")]
    Closed(ClientStatus),

    #[error("please finish the {expected} step first")]
    OutOfOrder { expected: OnboardingStep },

    #[error("account is already active")]
    AlreadyActive,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Validates a step submission against the document and builds the update.
pub fn plan_step(doc: &UserDocument, command: StepCommand) -> Result<StepUpdate, TransitionError> {
    match doc.account {
        Account::Client(ClientStatus::PendingProfile) => {}
        Account::Client(status) => return Err(TransitionError::Closed(status)),
        Account::Admin | Account::Staff => return Err(TransitionError::NotClient),
    }

    let step = command.step();
    let expected = OnboardingStep::first_incomplete(doc.step_completed);
    if step > expected {
        return Err(TransitionError::OutOfOrder { expected });
    }

    let patch = command.into_patch(doc.id)?;
    Ok(StepUpdate {
        // re-saving an earlier step never lowers progress
        step_index: doc.step_completed.max(step.index()).min(STEP_COUNT),
        patch,
    })
}

/// Checks that the review can be submitted. Resubmitting a waitlisted
/// profile is allowed and re-issues the same terminal update.
pub fn plan_submit(doc: &UserDocument) -> Result<u8, TransitionError> {
    match doc.account {
        Account::Client(status) if status.can_move_to(ClientStatus::Waitlisted) => {}
        Account::Client(_) => return Err(TransitionError::AlreadyActive),
        Account::Admin | Account::Staff => return Err(TransitionError::NotClient),
    }
    let expected = OnboardingStep::first_incomplete(doc.step_completed);
    if expected != OnboardingStep::Review {
        return Err(TransitionError::OutOfOrder { expected });
    }
    Ok(STEP_COUNT)
}
