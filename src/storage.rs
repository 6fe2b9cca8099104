use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

/// Key prefix of uploaded resumes; values stored in `resume_url` with this
/// prefix are object keys, anything else is an external URL.
pub const RESUME_PREFIX: &str = "resumes/";
pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        _ => None,
    }
}

pub fn resume_key(user_id: Uuid, ext: &str) -> String {
    format!("{}{}/{}.{}", RESUME_PREFIX, user_id, Uuid::new_v4(), ext)
}

/// Whether `key` lies under `user_id`'s own resume prefix with no empty or
/// relative path segments.
pub fn owns_resume_key(user_id: Uuid, key: &str) -> bool {
    let prefix = format!("{}{}/", RESUME_PREFIX, user_id);
    let Some(rest) = key.strip_prefix(prefix.as_str()) else {
        return false;
    };
    !rest.contains('\\')
        && rest
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Presigns storage keys; external URLs pass through.
pub async fn display_url(storage: &dyn StorageClient, resume_url: &str) -> anyhow::Result<String> {
    if !resume_url.starts_with(RESUME_PREFIX) {
        return Ok(resume_url.to_string());
    }
    storage
        .presign_get(resume_url, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for key {}", resume_url))
}
