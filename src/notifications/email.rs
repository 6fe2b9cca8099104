use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request body of the transactional e-mail API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEmail {
    pub sender: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email api unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email api rejected the message ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Posts one message. Returns the provider's message id.
    async fn send(&self, email: &OutboundEmail) -> Result<String, EmailError>;
}

pub struct HttpEmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    api_key_header: String,
}

impl HttpEmailClient {
    pub fn new(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            api_key_header: cfg.api_key_header.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailClient {
    async fn send(&self, email: &OutboundEmail) -> Result<String, EmailError> {
        let res = self
            .http
            .post(&self.api_url)
            .header(self.api_key_header.as_str(), &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(email)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "email api returned an error");
            return Err(EmailError::Rejected { status, body });
        }

        // some providers answer 201/202 with an empty body
        let body = res.bytes().await?;
        let message_id = serde_json::from_slice::<SendResponse>(&body)
            .ok()
            .and_then(|r| r.message_id)
            .unwrap_or_default();
        debug!(%message_id, "email accepted");
        Ok(message_id)
    }
}
