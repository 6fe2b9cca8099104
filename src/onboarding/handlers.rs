use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::extractors::CurrentUser,
    error::ApiError,
    onboarding::{
        command::{CommandError, StepCommand},
        dto::{ReviewView, StepSaved, StepView, SubmitResponse, UploadedResume},
        machine::{plan_step, TransitionError},
        review::{self, SubmitError},
        steps::OnboardingStep,
    },
    routing::{destination, Destination},
    state::AppState,
    storage::{display_url, ext_from_mime, resume_key, MAX_RESUME_BYTES},
    users::{Account, ClientStatus, UserDocument},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/onboarding/review", get(get_review))
        .route("/onboarding/review/submit", post(submit_review))
        .route(
            "/onboarding/resume/file",
            post(upload_resume).layer(DefaultBodyLimit::max(MAX_RESUME_BYTES + 64 * 1024)),
        )
        .route("/onboarding/:step", get(get_step).put(save_step))
}

/// Maps a refused transition to a response that tells the client where to go.
fn transition_error(e: TransitionError, doc: &UserDocument) -> ApiError {
    let message = e.to_string();
    match e {
        TransitionError::NotClient => ApiError::Forbidden("Onboarding is only for clients".into()),
        TransitionError::Closed(_) | TransitionError::AlreadyActive => ApiError::conflict(
            message,
            Some(destination(doc.account, true, doc.step_completed).path()),
        ),
        TransitionError::OutOfOrder { expected } => {
            ApiError::conflict(message, Some(expected.route()))
        }
        TransitionError::Command(CommandError::Invalid { field, message }) => {
            ApiError::validation(field, message)
        }
        TransitionError::Command(other) => ApiError::Field {
            status: StatusCode::BAD_REQUEST,
            field: None,
            message: other.to_string(),
        },
    }
}

fn data_step(slug: &str) -> Result<OnboardingStep, ApiError> {
    OnboardingStep::from_slug(slug)
        .filter(|s| *s != OnboardingStep::Review)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown onboarding step '{slug}'")))
}

fn require_client(doc: &UserDocument) -> Result<ClientStatus, ApiError> {
    match doc.account {
        Account::Client(status) => Ok(status),
        _ => Err(transition_error(TransitionError::NotClient, doc)),
    }
}

#[instrument(skip(state, doc), fields(user_id = %doc.id))]
pub async fn get_step(
    State(state): State<AppState>,
    CurrentUser(doc): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<StepView>, ApiError> {
    let step = data_step(&slug)?;
    if require_client(&doc)? == ClientStatus::PendingProfile {
        let expected = OnboardingStep::first_incomplete(doc.step_completed);
        if step > expected {
            return Err(transition_error(TransitionError::OutOfOrder { expected }, &doc));
        }
    }

    let mut view = StepView::new(step, &doc.profile, doc.step_completed);
    if let Some(Value::String(url)) = view.fields.get("resume_url").cloned() {
        let shown = display_url(state.storage.as_ref(), &url).await?;
        view.fields.insert("resume_url".into(), Value::String(shown));
    }
    Ok(Json(view))
}

#[instrument(skip(state, doc, body), fields(user_id = %doc.id))]
pub async fn save_step(
    State(state): State<AppState>,
    CurrentUser(doc): CurrentUser,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<StepSaved>, ApiError> {
    let step = data_step(&slug)?;
    let command = StepCommand::parse(step, body)
        .map_err(|e| transition_error(TransitionError::Command(e), &doc))?;
    let update = plan_step(&doc, command).map_err(|e| {
        warn!(%step, error = %e, "step rejected");
        transition_error(e, &doc)
    })?;

    let saved = state.users.apply_step(doc.id, &update).await.map_err(|e| {
        error!(%step, error = %e, "saving step failed");
        ApiError::from(e)
    })?;

    info!(%step, step_completed = saved.step_completed, "step saved");
    Ok(Json(StepSaved {
        step,
        step_completed: saved.step_completed,
        next_route: step.next().map(OnboardingStep::route),
    }))
}

/// POST /onboarding/resume/file (multipart, field `file`)
#[instrument(skip(state, doc, mp), fields(user_id = %doc.id))]
pub async fn upload_resume(
    State(state): State<AppState>,
    CurrentUser(doc): CurrentUser,
    mut mp: Multipart,
) -> Result<Json<UploadedResume>, ApiError> {
    require_client(&doc)?;

    let bad_upload = |message: String| ApiError::Field {
        status: StatusCode::BAD_REQUEST,
        field: Some("file".into()),
        message,
    };

    while let Some(field) = mp.next_field().await.map_err(|e| bad_upload(e.to_string()))? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let ext = ext_from_mime(&content_type)
            .ok_or_else(|| ApiError::validation("file", "Upload a PDF, DOC or DOCX file"))?;
        let data = field.bytes().await.map_err(|e| bad_upload(e.to_string()))?;
        if data.is_empty() {
            return Err(ApiError::validation("file", "The uploaded file is empty"));
        }
        if data.len() > MAX_RESUME_BYTES {
            return Err(ApiError::Field {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                field: Some("file".into()),
                message: "Resume must be 10 MB or smaller".into(),
            });
        }

        let key = resume_key(doc.id, ext);
        state.storage.put_object(&key, data, &content_type).await?;
        let preview_url = display_url(state.storage.as_ref(), &key).await?;
        info!(%key, "resume uploaded");
        return Ok(Json(UploadedResume {
            resume_url: key,
            preview_url,
        }));
    }
    Err(ApiError::validation("file", "Please choose a file to upload"))
}

#[instrument(skip(state, doc), fields(user_id = %doc.id))]
pub async fn get_review(
    State(state): State<AppState>,
    CurrentUser(doc): CurrentUser,
) -> Result<Json<ReviewView>, ApiError> {
    require_client(&doc)?;
    Ok(Json(review::build_review(&doc, state.storage.as_ref()).await?))
}

#[instrument(skip(state, doc), fields(user_id = %doc.id))]
pub async fn submit_review(
    State(state): State<AppState>,
    CurrentUser(doc): CurrentUser,
) -> Result<Json<SubmitResponse>, ApiError> {
    match review::submit(&state, &doc).await {
        Ok(updated) => Ok(Json(SubmitResponse {
            status: updated.account.status().unwrap_or(ClientStatus::Waitlisted),
            step_completed: updated.step_completed,
            redirect_to: Destination::Waiting.path(),
        })),
        Err(SubmitError::Transition(e)) => Err(transition_error(e, &doc)),
        Err(SubmitError::Store(e)) => {
            error!(error = %e, "submit failed, status unchanged");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fakes::{read_json, Fakes};
    use crate::users::OnboardingProfile;
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use time::OffsetDateTime;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn client(status: ClientStatus, step_completed: u8) -> UserDocument {
        let now = OffsetDateTime::now_utc();
        UserDocument {
            id: Uuid::new_v4(),
            email: "ada@x.com".into(),
            display_name: None,
            account: Account::Client(status),
            email_verified: true,
            disabled: false,
            step_completed,
            profile: OnboardingProfile::default(),
            created_at: now,
            updated_at: now,
            onboarding_completed_at: None,
        }
    }

    async fn seed(app: &Fakes, doc: UserDocument) -> String {
        let token = app.access_token(doc.id);
        app.users.insert(doc, "x").await;
        token
    }

    async fn call(app: &Fakes, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json");
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let res = app.router().oneshot(req.body(body).unwrap()).await.unwrap();
        read_json(res).await
    }

    fn form(step: OnboardingStep) -> Value {
        match step {
            OnboardingStep::Basics => json!({
                "first_name": "Ada", "last_name": "Lovelace",
                "job_title": "Engineer", "gender": "female"
            }),
            OnboardingStep::Location => json!({
                "country": "New Zealand", "age": 30, "residency_status": "citizen"
            }),
            OnboardingStep::Resume => json!({ "resume_url": "https://cv.example.com/ada.pdf" }),
            OnboardingStep::Contact => json!({
                "preferred_email": "Ada@X.com", "allow_phone_contact": false
            }),
            OnboardingStep::JobBoards => json!({
                "job_boards": ["linkedin", "seek"], "job_boards_consent": true
            }),
            OnboardingStep::Review => json!({}),
        }
    }

    #[tokio::test]
    async fn steps_need_a_session() {
        let app = Fakes::new();
        let res = app
            .router()
            .oneshot(Request::get("/api/v1/onboarding/basics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, body) = read_json(res).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["redirect_to"], "/login");
    }

    #[tokio::test]
    async fn full_walk_ends_on_waiting_list() {
        let app = Fakes::new();
        let doc = client(ClientStatus::PendingProfile, 0);
        let id = doc.id;
        let token = seed(&app, doc).await;

        for step in OnboardingStep::data_steps() {
            let uri = format!("/api/v1{}", step.route());
            let (status, body) = call(&app, "PUT", &uri, &token, Some(form(step))).await;
            assert_eq!(status, StatusCode::OK, "{step}: {body}");
            assert_eq!(body["step_completed"], step.index());
        }

        let (status, review) = call(&app, "GET", "/api/v1/onboarding/review", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(review["can_submit"], true);
        assert_eq!(review["sections"].as_array().unwrap().len(), 5);
        assert_eq!(review["sections"][0]["edit_route"], "/onboarding/basics");
        assert_eq!(review["sections"][3]["fields"]["preferred_email"], "ada@x.com");

        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirect_to"], "/waiting");
        assert_eq!(body["status"], "waitlisted");
        assert_eq!(body["step_completed"], 6);

        let stored = app.state.users.get(id).await.unwrap().unwrap();
        assert_eq!(stored.account, Account::Client(ClientStatus::Waitlisted));
        assert!(stored.onboarding_completed_at.is_some());

        let sent = app.mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Ada"));
        assert!(!sent[0].subject.contains("{{name}}"));
    }

    #[tokio::test]
    async fn skipping_ahead_points_back_to_first_incomplete() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 1)).await;

        let (status, body) = call(
            &app,
            "PUT",
            "/api/v1/onboarding/contact",
            &token,
            Some(form(OnboardingStep::Contact)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["redirect_to"], "/onboarding/location");

        let (status, body) = call(&app, "GET", "/api/v1/onboarding/resume", &token, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["redirect_to"], "/onboarding/location");
    }

    #[tokio::test]
    async fn resaving_an_earlier_step_keeps_progress() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 3)).await;
        let (status, body) = call(
            &app,
            "PUT",
            "/api/v1/onboarding/basics",
            &token,
            Some(form(OnboardingStep::Basics)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step_completed"], 3);
        assert_eq!(body["next_route"], "/onboarding/location");
    }

    #[tokio::test]
    async fn conditional_fields_are_enforced_and_cleared() {
        let app = Fakes::new();
        let doc = client(ClientStatus::PendingProfile, 0);
        let id = doc.id;
        let token = seed(&app, doc).await;

        let mut basics = form(OnboardingStep::Basics);
        basics["gender"] = json!("custom");
        let (status, body) =
            call(&app, "PUT", "/api/v1/onboarding/basics", &token, Some(basics.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "gender_custom");

        basics["gender_custom"] = json!("agender");
        call(&app, "PUT", "/api/v1/onboarding/basics", &token, Some(basics.clone())).await;
        basics["gender"] = json!("male");
        call(&app, "PUT", "/api/v1/onboarding/basics", &token, Some(basics)).await;

        let stored = app.state.users.get(id).await.unwrap().unwrap();
        assert_eq!(stored.profile.gender_custom, None);

        let (status, view) = call(&app, "GET", "/api/v1/onboarding/basics", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["fields"]["first_name"], "Ada");
        assert_eq!(view["back_route"], Value::Null);
        assert_eq!(view["next_route"], "/onboarding/location");
    }

    #[tokio::test]
    async fn unknown_step_is_404() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 0)).await;
        let (status, _) = call(&app, "GET", "/api/v1/onboarding/hobbies", &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn waitlisted_clients_cannot_edit_steps() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::Waitlisted, 6)).await;
        let (status, body) = call(
            &app,
            "PUT",
            "/api/v1/onboarding/basics",
            &token,
            Some(form(OnboardingStep::Basics)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["redirect_to"], "/waiting");
    }

    #[tokio::test]
    async fn submit_before_all_steps_done_conflicts() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 4)).await;
        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["redirect_to"], "/onboarding/job-boards");
    }

    #[tokio::test]
    async fn failed_submit_leaves_status_unchanged() {
        let app = Fakes::new();
        let doc = client(ClientStatus::PendingProfile, 5);
        let id = doc.id;
        let token = seed(&app, doc).await;
        app.users.fail_writes(true);

        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some());

        let stored = app.state.users.get(id).await.unwrap().unwrap();
        assert_eq!(stored.account, Account::Client(ClientStatus::PendingProfile));
        assert_eq!(stored.step_completed, 5);
        assert!(app.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn mail_outage_does_not_fail_submit() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 5)).await;
        app.mailer.failing(true);
        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirect_to"], "/waiting");
        let records = app.notifications.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, crate::notifications::repo::DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn resubmitting_is_idempotent_and_active_is_rejected() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::Waitlisted, 6)).await;
        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "waitlisted");
        assert!(app.mailer.sent.lock().await.is_empty());

        let token = seed(&app, client(ClientStatus::Active, 6)).await;
        let (status, body) =
            call(&app, "POST", "/api/v1/onboarding/review/submit", &token, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["redirect_to"], "/dashboard");
    }

    fn multipart(content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    async fn upload(app: &Fakes, token: &str, content_type: &str, data: &[u8]) -> (StatusCode, Value) {
        let (ct, body) = multipart(content_type, data);
        let res = app
            .router()
            .oneshot(
                Request::post("/api/v1/onboarding/resume/file")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        read_json(res).await
    }

    #[tokio::test]
    async fn resume_upload_returns_storage_key() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 2)).await;

        let (status, body) = upload(&app, &token, "application/pdf", b"%PDF-1.4 fake").await;
        assert_eq!(status, StatusCode::OK);
        let key = body["resume_url"].as_str().unwrap();
        assert!(key.starts_with("resumes/") && key.ends_with(".pdf"));
        assert_eq!(body["preview_url"], format!("https://fake.local/{key}"));

        let (status, _) = call(
            &app,
            "PUT",
            "/api/v1/onboarding/resume",
            &token,
            Some(json!({ "resume_url": key })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn another_users_resume_key_cannot_be_claimed() {
        let app = Fakes::new();
        let doc = client(ClientStatus::PendingProfile, 2);
        let id = doc.id;
        let token = seed(&app, doc).await;

        let foreign = format!("resumes/{}/secret.pdf", Uuid::new_v4());
        let (status, body) = call(
            &app,
            "PUT",
            "/api/v1/onboarding/resume",
            &token,
            Some(json!({ "resume_url": foreign })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "resume_url");

        let stored = app.state.users.get(id).await.unwrap().unwrap();
        assert_eq!(stored.profile.resume_url, None);
        assert_eq!(stored.step_completed, 2);
    }

    #[tokio::test]
    async fn resume_upload_rejects_other_types() {
        let app = Fakes::new();
        let token = seed(&app, client(ClientStatus::PendingProfile, 2)).await;
        let (status, body) = upload(&app, &token, "image/png", b"\x89PNG").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "file");
    }
}
