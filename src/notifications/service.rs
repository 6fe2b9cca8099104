use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::email::{EmailSender, Mailbox, OutboundEmail};
use super::render::Variables;
use super::repo::{Channel, Delivery, NewNotification, Notification, NotificationStore, Priority};
use super::templates::{render_template, EmailTemplate, TemplateKey};
use crate::config::EmailConfig;
use crate::error::StoreError;

/// Renders templates, keeps the notification ledger and hands mail to the provider.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    sender: Arc<dyn EmailSender>,
    from: Mailbox,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        sender: Arc<dyn EmailSender>,
        cfg: &EmailConfig,
    ) -> Self {
        Self {
            store,
            sender,
            from: Mailbox {
                email: cfg.sender_email.clone(),
                name: Some(cfg.sender_name.clone()),
            },
        }
    }

    pub fn store(&self) -> &dyn NotificationStore {
        self.store.as_ref()
    }

    /// Sends a typed template.
    pub async fn send<T: EmailTemplate>(
        &self,
        user_id: Uuid,
        to: Mailbox,
        template: &T,
    ) -> Result<Notification, StoreError> {
        self.send_template(user_id, to, T::KEY, template.variables(), Priority::Normal)
            .await
    }

    /// Records a pending notification, posts it, and stores the outcome.
    /// A provider failure is recorded on the notification, not returned.
    #[instrument(skip(self, to, vars), fields(template = key.as_str()))]
    pub async fn send_template(
        &self,
        user_id: Uuid,
        to: Mailbox,
        key: TemplateKey,
        vars: Variables,
        priority: Priority,
    ) -> Result<Notification, StoreError> {
        let rendered = render_template(key, &vars);
        let pending = self
            .store
            .create(NewNotification {
                user_id,
                channel: Channel::Email,
                title: rendered.subject.clone(),
                message: rendered.text.clone(),
                priority,
                metadata: json!({
                    "template": key.as_str(),
                    "variables": vars,
                    "rendered": rendered,
                    "to": to.email,
                }),
            })
            .await?;

        let email = OutboundEmail {
            sender: self.from.clone(),
            to: vec![to],
            subject: rendered.subject,
            html_content: rendered.html,
            text_content: rendered.text,
        };

        let delivery = match self.sender.send(&email).await {
            Ok(message_id) => {
                info!(notification_id = %pending.id, %user_id, "email sent");
                Delivery::Sent { message_id }
            }
            Err(e) => {
                warn!(notification_id = %pending.id, %user_id, error = %e, "email failed");
                Delivery::Failed { error: e.to_string() }
            }
        };
        self.store.record_delivery(pending.id, &delivery).await
    }
}
