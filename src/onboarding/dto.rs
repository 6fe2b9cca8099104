use serde::Serialize;
use serde_json::{Map, Value};

use crate::onboarding::steps::OnboardingStep;
use crate::users::{ClientStatus, OnboardingProfile};

/// Picks the keys one step owns out of the profile document.
pub fn step_fields(profile: &OnboardingProfile, step: OnboardingStep) -> Map<String, Value> {
    let mut all = match serde_json::to_value(profile) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    step.fields()
        .iter()
        .map(|k| (k.to_string(), all.remove(*k).unwrap_or(Value::Null)))
        .collect()
}

/// A step form, pre-filled from the stored profile.
#[derive(Debug, Serialize)]
pub struct StepView {
    pub step: OnboardingStep,
    pub index: u8,
    pub title: &'static str,
    pub fields: Map<String, Value>,
    pub back_route: Option<String>,
    pub next_route: Option<String>,
    pub step_completed: u8,
}

impl StepView {
    pub fn new(step: OnboardingStep, profile: &OnboardingProfile, step_completed: u8) -> Self {
        Self {
            step,
            index: step.index(),
            title: step.title(),
            fields: step_fields(profile, step),
            back_route: step.previous().map(OnboardingStep::route),
            next_route: step.next().map(OnboardingStep::route),
            step_completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepSaved {
    pub step: OnboardingStep,
    pub step_completed: u8,
    pub next_route: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewSection {
    pub step: OnboardingStep,
    pub title: &'static str,
    pub fields: Map<String, Value>,
    pub edit_route: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub sections: Vec<ReviewSection>,
    pub step_completed: u8,
    pub can_submit: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: ClientStatus,
    pub step_completed: u8,
    pub redirect_to: String,
}

#[derive(Debug, Serialize)]
pub struct UploadedResume {
    pub resume_url: String,
    pub preview_url: String,
}
