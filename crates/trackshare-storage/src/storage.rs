use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

use crate::asset::{is_safe_asset_name, unique_asset_name, AssetKind};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid asset name: {0}")]
    InvalidName(String),
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Storage capability for uploaded assets.
///
/// Callers only ever handle the stored name returned by [`StorageBackend::put`];
/// where and how the bytes live is up to the backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `data` under a freshly generated unique name and return that name.
    async fn put(
        &self,
        kind: AssetKind,
        original_name: &str,
        fallback_ext: &str,
        data: &[u8],
    ) -> Result<String, StorageError>;

    async fn read(&self, kind: AssetKind, name: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, kind: AssetKind, name: &str) -> bool;

    /// Remove a stored asset. Removing something that is already gone is not an error.
    async fn delete(&self, kind: AssetKind, name: &str) -> Result<(), StorageError>;
}

fn check_name(name: &str) -> Result<(), StorageError> {
    if is_safe_asset_name(name) {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

// ─── Local Filesystem Backend ──────────────────────────────────────

/// Stores assets as `<base>/audio/<name>` and `<base>/images/<name>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create both content directories up front.
    pub async fn init(&self) -> Result<(), StorageError> {
        for kind in [AssetKind::Audio, AssetKind::Image] {
            fs::create_dir_all(self.base_path.join(kind.dir())).await?;
        }
        Ok(())
    }

    pub fn full_path(&self, kind: AssetKind, name: &str) -> PathBuf {
        self.base_path.join(kind.dir()).join(name)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(
        &self,
        kind: AssetKind,
        original_name: &str,
        fallback_ext: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let dir = self.base_path.join(kind.dir());
        fs::create_dir_all(&dir).await?;

        let mut name = unique_asset_name(kind, original_name, fallback_ext);
        while fs::try_exists(dir.join(&name)).await? {
            name = unique_asset_name(kind, original_name, fallback_ext);
        }

        fs::write(dir.join(&name), data).await?;
        tracing::debug!(%kind, %name, bytes = data.len(), "stored asset");
        Ok(name)
    }

    async fn read(&self, kind: AssetKind, name: &str) -> Result<Vec<u8>, StorageError> {
        check_name(name)?;
        fs::read(self.full_path(kind, name))
            .await
            .map_err(|_| StorageError::NotFound(format!("{kind}/{name}")))
    }

    async fn exists(&self, kind: AssetKind, name: &str) -> bool {
        if check_name(name).is_err() {
            return false;
        }
        fs::metadata(self.full_path(kind, name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn delete(&self, kind: AssetKind, name: &str) -> Result<(), StorageError> {
        check_name(name)?;
        match fs::remove_file(self.full_path(kind, name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── S3 Backend ────────────────────────────────────────────────────

/// Stores assets as objects keyed `<prefix>/<audio|images>/<name>`.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn from_config(
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<Self, StorageError> {
        if bucket.is_empty() {
            return Err(StorageError::Config("S3 bucket name is empty".to_string()));
        }

        let creds =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "trackshare");

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(creds)
            .behavior_version_latest();

        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(config_builder.build());

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    fn s3_key(&self, kind: AssetKind, name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/{name}", kind.dir())
        } else {
            format!("{}/{}/{name}", self.prefix.trim_end_matches('/'), kind.dir())
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(
        &self,
        kind: AssetKind,
        original_name: &str,
        fallback_ext: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let name = unique_asset_name(kind, original_name, fallback_ext);
        let key = self.s3_key(kind, &name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .content_type(crate::asset::content_type_for(&name))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("PutObject failed: {e}")))?;

        tracing::debug!(%kind, %name, bytes = data.len(), "stored asset in S3");
        Ok(name)
    }

    async fn read(&self, kind: AssetKind, name: &str) -> Result<Vec<u8>, StorageError> {
        check_name(name)?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.s3_key(kind, name))
            .send()
            .await
            .map_err(|_| StorageError::NotFound(format!("{kind}/{name}")))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("Read body: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn exists(&self, kind: AssetKind, name: &str) -> bool {
        if check_name(name).is_err() {
            return false;
        }
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(self.s3_key(kind, name))
            .send()
            .await
            .is_ok()
    }

    async fn delete(&self, kind: AssetKind, name: &str) -> Result<(), StorageError> {
        check_name(name)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.s3_key(kind, name))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("DeleteObject failed: {e}")))?;
        Ok(())
    }
}
