use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Client lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    PendingProfile,
    Waitlisted,
    Active,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingProfile => "pending_profile",
            Self::Waitlisted => "waitlisted",
            Self::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_profile" => Some(Self::PendingProfile),
            "waitlisted" => Some(Self::Waitlisted),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    /// Staying put counts as allowed; going back never does.
    pub fn can_move_to(self, next: ClientStatus) -> bool {
        next >= self
    }
}

/// Role and, for clients, their lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "status", rename_all = "snake_case")]
pub enum Account {
    Admin,
    Staff,
    Client(ClientStatus),
}

impl Account {
    pub fn role_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Client(_) => "client",
        }
    }

    pub fn status(&self) -> Option<ClientStatus> {
        match self {
            Self::Client(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_team(&self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }

    pub fn from_columns(role: &str, status: Option<&str>) -> Result<Self, StoreError> {
        match (role, status) {
            ("admin", _) => Ok(Self::Admin),
            ("staff", _) => Ok(Self::Staff),
            ("client", Some(s)) => ClientStatus::parse(s)
                .map(Self::Client)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown client status {s}"))),
            ("client", None) => Err(StoreError::Corrupt("client without status".into())),
            (other, _) => Err(StoreError::Corrupt(format!("unknown role {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    PreferNotToSay,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyStatus {
    Citizen,
    PermanentResident,
    WorkVisa,
    StudentVisa,
    Other,
}

/// Fields collected by the onboarding steps. Stored as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub gender: Option<Gender>,
    pub gender_custom: Option<String>,
    pub country: Option<String>,
    pub age: Option<u16>,
    pub residency_status: Option<ResidencyStatus>,
    pub visa_type: Option<String>,
    pub resume_url: Option<String>,
    pub preferred_email: Option<String>,
    pub allow_phone_contact: Option<bool>,
    pub phone_number: Option<String>,
    pub job_boards: Option<BTreeSet<String>>,
    pub job_boards_other: Option<String>,
    pub job_boards_consent: Option<bool>,
    pub gmail_consent: Option<bool>,
    pub ai_tracking_consent: Option<bool>,
}

impl OnboardingProfile {
    /// Shallow merge of top-level keys, the same semantics as jsonb `||`.
    pub fn merged(&self, patch: &serde_json::Map<String, serde_json::Value>) -> Result<Self, StoreError> {
        let mut doc = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(StoreError::Corrupt(e.to_string())),
        };
        for (k, v) in patch {
            doc.insert(k.clone(), v.clone());
        }
        serde_json::from_value(serde_json::Value::Object(doc))
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// The per-user document: identity, account, onboarding progress.
#[derive(Debug, Clone, Serialize)]
pub struct UserDocument {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub account: Account,
    pub email_verified: bool,
    pub disabled: bool,
    pub step_completed: u8,
    pub profile: OnboardingProfile,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub onboarding_completed_at: Option<OffsetDateTime>,
}

impl UserDocument {
    /// Name used to greet the user in mail.
    pub fn greeting_name(&self) -> String {
        self.profile
            .first_name
            .clone()
            .or_else(|| self.display_name.clone())
            .unwrap_or_else(|| self.email.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub account: Account,
}

/// Outcome of the terminal onboarding update, with the status the row had
/// when the update took it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub user: UserDocument,
    pub previous: ClientStatus,
}

/// Fields written by one onboarding step plus the step it completes.
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub step_index: u8,
    pub patch: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_never_moves_backwards() {
        use ClientStatus::*;
        assert!(PendingProfile.can_move_to(Waitlisted));
        assert!(Waitlisted.can_move_to(Active));
        assert!(Waitlisted.can_move_to(Waitlisted));
        assert!(!Active.can_move_to(Waitlisted));
        assert!(!Waitlisted.can_move_to(PendingProfile));
    }

    #[test]
    fn account_serializes_as_role_and_status() {
        let v = serde_json::to_value(Account::Client(ClientStatus::PendingProfile)).unwrap();
        assert_eq!(v, json!({"role": "client", "status": "pending_profile"}));
        let v = serde_json::to_value(Account::Staff).unwrap();
        assert_eq!(v, json!({"role": "staff"}));
    }

    #[test]
    fn account_from_columns() {
        assert_eq!(Account::from_columns("admin", None).unwrap(), Account::Admin);
        assert_eq!(
            Account::from_columns("client", Some("waitlisted")).unwrap(),
            Account::Client(ClientStatus::Waitlisted)
        );
        // staff rows never carry a client status into the domain
        assert_eq!(Account::from_columns("staff", Some("active")).unwrap(), Account::Staff);
        assert!(Account::from_columns("client", None).is_err());
        assert!(Account::from_columns("owner", None).is_err());
    }

    #[test]
    fn merge_only_touches_patched_keys() {
        let profile = OnboardingProfile {
            first_name: Some("Ada".into()),
            country: Some("UK".into()),
            ..Default::default()
        };
        let mut patch = serde_json::Map::new();
        patch.insert("country".into(), json!("FR"));
        patch.insert("visa_type".into(), serde_json::Value::Null);

        let merged = profile.merged(&patch).unwrap();
        assert_eq!(merged.first_name.as_deref(), Some("Ada"));
        assert_eq!(merged.country.as_deref(), Some("FR"));
        assert!(merged.visa_type.is_none());
    }

    #[test]
    fn greeting_falls_back_to_email() {
        let now = OffsetDateTime::now_utc();
        let doc = UserDocument {
            id: Uuid::new_v4(),
            email: "ada@x.com".into(),
            display_name: None,
            account: Account::Client(ClientStatus::PendingProfile),
            email_verified: true,
            disabled: false,
            step_completed: 0,
            profile: OnboardingProfile::default(),
            created_at: now,
            updated_at: now,
            onboarding_completed_at: None,
        };
        assert_eq!(doc.greeting_name(), "ada@x.com");
    }
}
