use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub verify_ttl_minutes: i64,
}

/// Transactional e-mail API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_key_header: String,
    pub sender_email: String,
    pub sender_name: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub max_failures: usize,
    pub window_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Public URL of the portal, used for links in outgoing mail.
    pub app_url: String,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub storage: StorageConfig,
    pub login_throttle: ThrottleConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "careerdesk"),
            audience: env_or("JWT_AUDIENCE", "careerdesk-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
            verify_ttl_minutes: env_parse("JWT_VERIFY_TTL_MINUTES", 60 * 24),
        };
        let email = EmailConfig {
            api_url: env_or("EMAIL_API_URL", "https://api.brevo.com/v3/smtp/email"),
            api_key: std::env::var("EMAIL_API_KEY")?,
            api_key_header: env_or("EMAIL_API_KEY_HEADER", "api-key"),
            sender_email: env_or("EMAIL_SENDER", "hello@careerdesk.io"),
            sender_name: env_or("EMAIL_SENDER_NAME", "CareerDesk"),
            timeout_secs: env_parse("EMAIL_TIMEOUT_SECS", 10),
        };
        let storage = StorageConfig {
            endpoint: env_or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: env_or("MINIO_BUCKET", "careerdesk"),
            access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
            region: env_or("MINIO_REGION", "us-east-1"),
        };
        let login_throttle = ThrottleConfig {
            max_failures: env_parse("LOGIN_MAX_FAILURES", 5),
            window_minutes: env_parse("LOGIN_WINDOW_MINUTES", 15),
        };
        Ok(Self {
            database_url,
            app_url: env_or("APP_URL", "http://localhost:3000"),
            jwt,
            email,
            storage,
            login_throttle,
        })
    }
}
