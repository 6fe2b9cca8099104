use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::services::is_valid_email;
use crate::onboarding::steps::OnboardingStep;
use crate::storage::owns_resume_key;
use crate::users::model::{Gender, ResidencyStatus};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("malformed {step} form: {reason}")]
    Malformed { step: OnboardingStep, reason: String },

    #[error("the review step has no fields to save")]
    NoFields,
}

fn invalid(field: &'static str, message: &str) -> CommandError {
    CommandError::Invalid {
        field,
        message: message.to_string(),
    }
}

fn required(field: &'static str, value: &str) -> Result<String, CommandError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(invalid(field, "This field is required"));
    }
    Ok(v.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicsFields {
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub gender: Gender,
    #[serde(default)]
    pub gender_custom: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationFields {
    pub country: String,
    pub age: u16,
    pub residency_status: ResidencyStatus,
    #[serde(default)]
    pub visa_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeFields {
    pub resume_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactFields {
    pub preferred_email: String,
    pub allow_phone_contact: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobBoardsFields {
    #[serde(default)]
    pub job_boards: BTreeSet<String>,
    #[serde(default)]
    pub job_boards_other: Option<String>,
    pub job_boards_consent: bool,
    #[serde(default)]
    pub gmail_consent: bool,
    #[serde(default)]
    pub ai_tracking_consent: bool,
}

/// One step's form submission. Each variant owns exactly the fields its step writes.
#[derive(Debug, Clone)]
pub enum StepCommand {
    Basics(BasicsFields),
    Location(LocationFields),
    Resume(ResumeFields),
    Contact(ContactFields),
    JobBoards(JobBoardsFields),
}

pub const MIN_AGE: u16 = 16;
pub const MAX_AGE: u16 = 100;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]{6,19}$").unwrap();
}

impl StepCommand {
    pub fn parse(step: OnboardingStep, body: Value) -> Result<Self, CommandError> {
        fn from<T: serde::de::DeserializeOwned>(
            step: OnboardingStep,
            body: Value,
        ) -> Result<T, CommandError> {
            serde_json::from_value(body).map_err(|e| CommandError::Malformed {
                step,
                reason: e.to_string(),
            })
        }
        Ok(match step {
            OnboardingStep::Basics => Self::Basics(from(step, body)?),
            OnboardingStep::Location => Self::Location(from(step, body)?),
            OnboardingStep::Resume => Self::Resume(from(step, body)?),
            OnboardingStep::Contact => Self::Contact(from(step, body)?),
            OnboardingStep::JobBoards => Self::JobBoards(from(step, body)?),
            OnboardingStep::Review => return Err(CommandError::NoFields),
        })
    }

    pub fn step(&self) -> OnboardingStep {
        match self {
            Self::Basics(_) => OnboardingStep::Basics,
            Self::Location(_) => OnboardingStep::Location,
            Self::Resume(_) => OnboardingStep::Resume,
            Self::Contact(_) => OnboardingStep::Contact,
            Self::JobBoards(_) => OnboardingStep::JobBoards,
        }
    }

    /// Validates and normalizes into the field set to persist for `owner`.
    /// Sub-fields hidden by the current answers are written as null.
    pub fn into_patch(self, owner: Uuid) -> Result<Map<String, Value>, CommandError> {
        let step = self.step();
        let value = match self {
            Self::Basics(f) => {
                let gender_custom = match f.gender {
                    Gender::Custom => Some(required("gender_custom", f.gender_custom.as_deref().unwrap_or(""))?),
                    _ => None,
                };
                json!({
                    "first_name": required("first_name", &f.first_name)?,
                    "last_name": required("last_name", &f.last_name)?,
                    "job_title": required("job_title", &f.job_title)?,
                    "gender": f.gender,
                    "gender_custom": gender_custom,
                })
            }
            Self::Location(f) => {
                if !(MIN_AGE..=MAX_AGE).contains(&f.age) {
                    return Err(invalid("age", "Please enter a valid age"));
                }
                let visa_type = match f.residency_status {
                    ResidencyStatus::PermanentResident => {
                        Some(required("visa_type", f.visa_type.as_deref().unwrap_or(""))?)
                    }
                    _ => None,
                };
                json!({
                    "country": required("country", &f.country)?,
                    "age": f.age,
                    "residency_status": f.residency_status,
                    "visa_type": visa_type,
                })
            }
            Self::Resume(f) => {
                let url = required("resume_url", &f.resume_url)?;
                let external = url.starts_with("https://") || url.starts_with("http://");
                if !external && !owns_resume_key(owner, &url) {
                    return Err(invalid("resume_url", "Please upload your resume"));
                }
                json!({ "resume_url": url })
            }
            Self::Contact(f) => {
                let email = required("preferred_email", &f.preferred_email)?.to_lowercase();
                if !is_valid_email(&email) {
                    return Err(invalid("preferred_email", "Please enter a valid email address"));
                }
                let phone_number = if f.allow_phone_contact {
                    let phone = required("phone_number", f.phone_number.as_deref().unwrap_or(""))?;
                    if !PHONE_RE.is_match(&phone) {
                        return Err(invalid("phone_number", "Please enter a valid phone number"));
                    }
                    Some(phone)
                } else {
                    None
                };
                json!({
                    "preferred_email": email,
                    "allow_phone_contact": f.allow_phone_contact,
                    "phone_number": phone_number,
                })
            }
            Self::JobBoards(f) => {
                let boards: BTreeSet<String> = f
                    .job_boards
                    .into_iter()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect();
                let other = optional(f.job_boards_other);
                if boards.is_empty() && other.is_none() {
                    return Err(invalid("job_boards", "Pick at least one job board"));
                }
                if !f.job_boards_consent {
                    return Err(invalid(
                        "job_boards_consent",
                        "We need your consent to apply on your behalf",
                    ));
                }
                json!({
                    "job_boards": boards,
                    "job_boards_other": other,
                    "job_boards_consent": true,
                    "gmail_consent": f.gmail_consent,
                    "ai_tracking_consent": f.ai_tracking_consent,
                })
            }
        };
        match value {
            Value::Object(map) => Ok(map),
            other => Err(CommandError::Malformed {
                step,
                reason: format!("expected an object, built {other}"),
            }),
        }
    }
}
