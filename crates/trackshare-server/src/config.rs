use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;
use trackshare_storage::AssetKind;

const DEV_JWT_SECRET: &str = "dev-secret-change-me-in-production";
const MB: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required when STORAGE_BACKEND=s3")]
    MissingS3Setting(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("refusing to start: JWT_SECRET must be set to a secure value in production")]
    InsecureJwtSecret,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }
}

/// Per-field size ceilings for multipart uploads, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_audio_bytes: usize,
    pub max_image_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_audio_bytes: 20 * MB,
            max_image_bytes: 5 * MB,
        }
    }
}

impl UploadLimits {
    pub fn max_for(&self, kind: AssetKind) -> usize {
        match kind {
            AssetKind::Audio => self.max_audio_bytes,
            AssetKind::Image => self.max_image_bytes,
        }
    }

    /// Request body ceiling for multipart routes: both files plus room for
    /// the text fields and multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_audio_bytes + self.max_image_bytes + MB
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        upload_dir: PathBuf,
    },
    S3 {
        endpoint: Option<String>,
        region: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        prefix: String,
    },
}

/// Everything the server needs besides the database settings, which live in
/// `trackshare_db::DatabaseConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub upload_limits: UploadLimits,
    pub cors_origins: Vec<String>,
    pub auth_rate_limit: bool,
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            key,
            value: v.to_string(),
        }),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let production = get("TRACKSHARE_ENV").is_some_and(|v| v == "production");

        let secret = get("JWT_SECRET").filter(|s| !s.trim().is_empty());
        let secret = match secret {
            Some(s) if s != DEV_JWT_SECRET => s,
            _ if production => return Err(ConfigError::InsecureJwtSecret),
            _ => {
                tracing::warn!("JWT_SECRET is not set, using the development fallback");
                DEV_JWT_SECRET.to_string()
            }
        };
        if production && secret.len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 characters");
        }

        let jwt = JwtConfig {
            secret,
            access_ttl_minutes: parse_or("JWT_ACCESS_TTL_MINUTES", get("JWT_ACCESS_TTL_MINUTES"), 15)?,
            refresh_ttl_days: parse_or("JWT_REFRESH_TTL_DAYS", get("JWT_REFRESH_TTL_DAYS"), 7)?,
        };

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "s3" => {
                let required = |key: &'static str| {
                    get(key)
                        .filter(|v| !v.is_empty())
                        .ok_or(ConfigError::MissingS3Setting(key))
                };
                StorageConfig::S3 {
                    endpoint: get("S3_ENDPOINT").filter(|v| !v.is_empty()),
                    region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    access_key: required("S3_ACCESS_KEY")?,
                    secret_key: required("S3_SECRET_KEY")?,
                    bucket: required("S3_BUCKET")?,
                    prefix: get("S3_PREFIX").unwrap_or_default(),
                }
            }
            "local" | "" => StorageConfig::Local {
                upload_dir: PathBuf::from(
                    get("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
                ),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let max_audio_mb: usize = parse_or("MAX_AUDIO_UPLOAD_MB", get("MAX_AUDIO_UPLOAD_MB"), 20)?;
        let max_image_mb: usize = parse_or("MAX_IMAGE_UPLOAD_MB", get("MAX_IMAGE_UPLOAD_MB"), 5)?;

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: parse_or("HOST", get("HOST"), IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or("PORT", get("PORT"), 8080)?,
            jwt,
            storage,
            upload_limits: UploadLimits {
                max_audio_bytes: max_audio_mb * MB,
                max_image_bytes: max_image_mb * MB,
            },
            cors_origins,
            auth_rate_limit: parse_flag("AUTH_RATE_LIMIT", get("AUTH_RATE_LIMIT"), true)?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
