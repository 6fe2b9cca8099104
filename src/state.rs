use crate::auth::throttle::LoginThrottle;
use crate::config::AppConfig;
use crate::notifications::{
    email::{EmailSender, HttpEmailClient},
    repo::{NotificationStore, PgNotificationStore},
    service::Notifier,
};
use crate::storage::{Storage, StorageClient};
use crate::users::{PgUserStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub notifier: Notifier,
    pub storage: Arc<dyn StorageClient>,
    pub login_throttle: Arc<LoginThrottle>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let notifications = Arc::new(PgNotificationStore::new(db)) as Arc<dyn NotificationStore>;
        let mailer = Arc::new(HttpEmailClient::new(&config.email)?) as Arc<dyn EmailSender>;
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(config, users, notifications, mailer, storage))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        notifications: Arc<dyn NotificationStore>,
        mailer: Arc<dyn EmailSender>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        let notifier = Notifier::new(notifications, mailer, &config.email);
        let login_throttle = Arc::new(LoginThrottle::from_config(&config.login_throttle));
        Self {
            config,
            users,
            notifier,
            storage,
            login_throttle,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        fakes::Fakes::new().state
    }
}
