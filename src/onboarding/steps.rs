use serde::{Deserialize, Serialize};

/// Number of onboarding steps; also the terminal `step_completed` value.
pub const STEP_COUNT: u8 = 6;

/// Onboarding steps in the order the client walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStep {
    Basics,
    Location,
    Resume,
    Contact,
    JobBoards,
    Review,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; STEP_COUNT as usize] = [
        Self::Basics,
        Self::Location,
        Self::Resume,
        Self::Contact,
        Self::JobBoards,
        Self::Review,
    ];

    /// 1-based position; the value `step_completed` takes once this step is done.
    pub fn index(self) -> u8 {
        match self {
            Self::Basics => 1,
            Self::Location => 2,
            Self::Resume => 3,
            Self::Contact => 4,
            Self::JobBoards => 5,
            Self::Review => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index).checked_sub(1)?).copied()
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Basics => "basics",
            Self::Location => "location",
            Self::Resume => "resume",
            Self::Contact => "contact",
            Self::JobBoards => "job-boards",
            Self::Review => "review",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Basics => "About you",
            Self::Location => "Where you are",
            Self::Resume => "Your resume",
            Self::Contact => "How to reach you",
            Self::JobBoards => "Job boards & consent",
            Self::Review => "Review",
        }
    }

    pub fn route(self) -> String {
        format!("/onboarding/{}", self.slug())
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_index(self.index() - 1)
    }

    /// Step the user should land on given how far they got.
    pub fn first_incomplete(step_completed: u8) -> Self {
        Self::from_index(step_completed.saturating_add(1)).unwrap_or(Self::Review)
    }

    /// Steps that collect data, i.e. everything before review.
    pub fn data_steps() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|s| *s != Self::Review)
    }

    /// Profile keys this step owns.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Basics => &["first_name", "last_name", "job_title", "gender", "gender_custom"],
            Self::Location => &["country", "age", "residency_status", "visa_type"],
            Self::Resume => &["resume_url"],
            Self::Contact => &["preferred_email", "allow_phone_contact", "phone_number"],
            Self::JobBoards => &[
                "job_boards",
                "job_boards_other",
                "job_boards_consent",
                "gmail_consent",
                "ai_tracking_consent",
            ],
            Self::Review => &[],
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}
