//! Where a signed-in user belongs.
//!
//! Evaluated on every auth-state change (register, login, refresh, session
//! fetch) so the client never gets two different answers for the same user.

use serde::Serialize;

use crate::onboarding::steps::OnboardingStep;
use crate::users::model::{Account, ClientStatus, UserDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Destination {
    VerifyEmail,
    AdminDashboard,
    StaffDashboard,
    ClientDashboard,
    Onboarding(OnboardingStep),
    Waiting,
}

impl Destination {
    pub fn path(&self) -> String {
        match self {
            Self::VerifyEmail => "/verify-email".into(),
            Self::AdminDashboard => "/admin/dashboard".into(),
            Self::StaffDashboard => "/staff/dashboard".into(),
            Self::ClientDashboard => "/dashboard".into(),
            Self::Onboarding(step) => step.route(),
            Self::Waiting => "/waiting".into(),
        }
    }
}

/// Decision table. Verification wins over role and status.
pub fn destination(account: Account, email_verified: bool, step_completed: u8) -> Destination {
    if !email_verified {
        return Destination::VerifyEmail;
    }
    match account {
        Account::Admin => Destination::AdminDashboard,
        Account::Staff => Destination::StaffDashboard,
        Account::Client(ClientStatus::Active) => Destination::ClientDashboard,
        Account::Client(ClientStatus::PendingProfile) => {
            Destination::Onboarding(OnboardingStep::first_incomplete(step_completed))
        }
        Account::Client(ClientStatus::Waitlisted) => Destination::Waiting,
    }
}

pub fn destination_for(doc: &UserDocument) -> Destination {
    destination(doc.account, doc.email_verified, doc.step_completed)
}
