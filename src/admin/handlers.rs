use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    admin::dto::{SendNotificationRequest, UserListQuery},
    auth::extractors::CurrentUser,
    error::ApiError,
    notifications::{
        email::Mailbox,
        repo::{Notification, Priority},
        templates::{AccountActivated, OnboardingReminder, TemplateKey},
    },
    onboarding::steps::OnboardingStep,
    state::AppState,
    users::{Account, ClientStatus, UserDocument},
};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/activate", post(activate_user))
        .route("/admin/users/:id/remind", post(remind_user))
        .route("/admin/notifications", post(send_notification))
}

fn mailbox(user: &UserDocument) -> Mailbox {
    Mailbox {
        email: user.email.clone(),
        name: Some(user.greeting_name()),
    }
}

#[instrument(skip(state, me))]
pub async fn list_users(
    State(state): State<AppState>,
    me: CurrentUser,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Vec<UserDocument>>, ApiError> {
    me.require_team()?;
    let status = match q.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            ClientStatus::parse(s).ok_or_else(|| ApiError::validation("status", "Unknown status"))?,
        ),
    };
    let limit = q.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = q.offset.unwrap_or(0).max(0);
    Ok(Json(state.users.list_by_status(status, limit, offset).await?))
}

/// Waitlisted -> active, then the activation mail. Mail trouble is only logged.
#[instrument(skip(state, me))]
pub async fn activate_user(
    State(state): State<AppState>,
    me: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDocument>, ApiError> {
    me.require_admin()?;
    let user = state.users.activate(id).await?;
    info!(user_id = %user.id, by = %me.0.id, "client activated");

    let template = AccountActivated {
        name: user.greeting_name(),
        dashboard_url: format!("{}/dashboard", state.config.app_url),
    };
    if let Err(e) = state.notifier.send(user.id, mailbox(&user), &template).await {
        warn!(error = %e, user_id = %user.id, "could not record activation email");
    }
    Ok(Json(user))
}

/// Nudges a client who has not finished onboarding back to their next step.
#[instrument(skip(state, me))]
pub async fn remind_user(
    State(state): State<AppState>,
    me: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    me.require_team()?;
    let user = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    if user.account != Account::Client(ClientStatus::PendingProfile) {
        return Err(ApiError::conflict("Only clients still onboarding can be reminded", None));
    }

    let next = OnboardingStep::first_incomplete(user.step_completed);
    let template = OnboardingReminder {
        name: user.greeting_name(),
        continue_url: format!("{}{}", state.config.app_url, next.route()),
    };
    let sent = state.notifier.send(user.id, mailbox(&user), &template).await?;
    info!(user_id = %user.id, by = %me.0.id, step = %next.route(), "onboarding reminder sent");
    Ok(Json(sent))
}

#[instrument(skip(state, me, payload), fields(template = %payload.template))]
pub async fn send_notification(
    State(state): State<AppState>,
    me: CurrentUser,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<Json<Notification>, ApiError> {
    me.require_admin()?;
    let key: TemplateKey = payload
        .template
        .parse()
        .map_err(|e: String| ApiError::validation("template", e))?;
    let user = state
        .users
        .get(payload.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let mut vars = payload.variables;
    vars.entry("name".into())
        .or_insert_with(|| Value::String(user.greeting_name()));
    vars.entry("email".into())
        .or_insert_with(|| Value::String(user.email.clone()));

    let sent = state
        .notifier
        .send_template(
            user.id,
            mailbox(&user),
            key,
            vars,
            payload.priority.unwrap_or(Priority::Normal),
        )
        .await?;
    Ok(Json(sent))
}
