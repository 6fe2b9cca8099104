use serde::Deserialize;
use uuid::Uuid;

use crate::notifications::{render::Variables, repo::Priority};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    /// `pending_profile`, `waitlisted` or `active`; omitted lists everyone.
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Free-form send of a registered template.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: Uuid,
    pub template: String,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub priority: Option<Priority>,
}
