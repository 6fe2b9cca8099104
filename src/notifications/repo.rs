use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Whatsapp,
    InApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self { $(Self::$variant => $s),+ }
            }
            pub fn parse(s: &str) -> Result<Self, StoreError> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(StoreError::Corrupt(format!(
                        concat!("unknown ", stringify!($ty), " {}"), other
                    ))),
                }
            }
        }
    };
}

text_enum!(Channel { Email => "email", Whatsapp => "whatsapp", InApp => "in_app" });
text_enum!(Priority { Low => "low", Normal => "normal", High => "high" });
text_enum!(DeliveryStatus { Pending => "pending", Sent => "sent", Failed => "failed" });

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub status: DeliveryStatus,
    /// Template key, variables, rendered content and the provider outcome.
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub channel: Channel,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub metadata: serde_json::Value,
}

/// Outcome of a delivery attempt, merged into `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent { message_id: String },
    Failed { error: String },
}

impl Delivery {
    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Sent { .. } => DeliveryStatus::Sent,
            Self::Failed { .. } => DeliveryStatus::Failed,
        }
    }

    fn metadata_patch(&self) -> serde_json::Value {
        match self {
            Self::Sent { message_id } => serde_json::json!({ "provider_message_id": message_id }),
            Self::Failed { error } => serde_json::json!({ "error": error }),
        }
    }
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts a `pending` record.
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError>;
    async fn record_delivery(&self, id: Uuid, delivery: &Delivery) -> Result<Notification, StoreError>;
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, StoreError>;
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    channel: String,
    title: String,
    message: String,
    priority: String,
    status: String,
    metadata: Json<serde_json::Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(r: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            channel: Channel::parse(&r.channel)?,
            title: r.title,
            message: r.message,
            priority: Priority::parse(&r.priority)?,
            status: DeliveryStatus::parse(&r.status)?,
            metadata: r.metadata.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const COLUMNS: &str =
    "id, user_id, channel, title, message, priority, status, metadata, created_at, updated_at";

#[derive(Clone)]
pub struct PgNotificationStore {
    db: PgPool,
}

impl PgNotificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications (user_id, channel, title, message, priority, status, metadata)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.channel.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.priority.as_str())
        .bind(Json(&new.metadata))
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn record_delivery(&self, id: Uuid, delivery: &Delivery) -> Result<Notification, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            UPDATE notifications
               SET status = $2, metadata = metadata || $3, updated_at = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delivery.status().as_str())
        .bind(Json(delivery.metadata_patch()))
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {COLUMNS}
              FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }
}
