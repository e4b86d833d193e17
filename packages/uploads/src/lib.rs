#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Presigned S3 upload URLs for user avatars and bus photos.
//!
//! The API never handles file bytes. A signed-in client asks for an upload
//! URL, `PUT`s the file straight to S3 with it, and then stores the
//! returned `objectUrl` on its profile or bus record.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `UPLOAD_BUCKET` | No | Bucket to sign uploads for; uploads are disabled when unset |
//! | `AWS_REGION` | No | Bucket region (default `ap-south-1`) |
//! | `UPLOAD_URL_EXPIRY_SECS` | No | Lifetime of a signed URL (default 300) |
//! | `UPLOAD_PUBLIC_BASE_URL` | No | Base of returned object URLs (default `https://{bucket}.s3.{region}.amazonaws.com`) |
//!
//! Credentials come from the standard AWS provider chain.

use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Default signed URL lifetime.
pub const DEFAULT_EXPIRY_SECS: u64 = 300;

/// Default bucket region.
const DEFAULT_REGION: &str = "ap-south-1";

/// Errors that can occur while issuing upload URLs.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The upload request was incomplete or not an image.
    #[error("{message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// Upload configuration is invalid.
    #[error("Invalid upload configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// S3 request signing failed.
    #[error("Failed to presign s3://{bucket}/{key}: {source}")]
    Presign {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// What an upload is for; decides the key prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UploadKind {
    /// Profile picture.
    #[default]
    Avatar,
    /// Photo attached to a bus record.
    BusPhoto,
}

impl UploadKind {
    /// Parses the request's optional `type` field. Anything other than
    /// `bus_photo` is an avatar upload.
    #[must_use]
    pub fn from_request(kind: Option<&str>) -> Self {
        kind.and_then(|k| k.parse().ok()).unwrap_or_default()
    }

    /// Key prefix for this kind of upload.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Avatar => "avatars",
            Self::BusPhoto => "bus-photos",
        }
    }
}

/// Upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Target bucket.
    pub bucket: String,
    /// Bucket region.
    pub region: String,
    /// Signed URL lifetime.
    pub expiry: Duration,
    /// Base of public object URLs, without a trailing slash.
    pub public_base_url: String,
}

impl UploadConfig {
    /// Creates a configuration with default expiry and public URL base.
    #[must_use]
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let region = region.into();
        Self {
            public_base_url: format!("https://{bucket}.s3.{region}.amazonaws.com"),
            bucket,
            region,
            expiry: Duration::from_secs(DEFAULT_EXPIRY_SECS),
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// Returns `Ok(None)` when `UPLOAD_BUCKET` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Config`] if `UPLOAD_URL_EXPIRY_SECS` isn't a
    /// positive integer.
    pub fn from_env() -> Result<Option<Self>, UploadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, treating blank values as
    /// unset.
    ///
    /// # Errors
    ///
    /// See [`UploadConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, UploadError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let Some(bucket) = get("UPLOAD_BUCKET") else {
            return Ok(None);
        };

        let region = get("AWS_REGION")
            .or_else(|| get("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut config = Self::new(bucket, region);

        if let Some(secs) = get("UPLOAD_URL_EXPIRY_SECS") {
            let secs = secs
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| UploadError::Config {
                    message: format!("UPLOAD_URL_EXPIRY_SECS must be a positive integer, got {secs}"),
                })?;
            config.expiry = Duration::from_secs(secs);
        }

        if let Some(base) = get("UPLOAD_PUBLIC_BASE_URL") {
            config.public_base_url = base.trim_end_matches('/').to_string();
        }

        Ok(Some(config))
    }

    /// Public URL of an object key.
    #[must_use]
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

/// A signed upload slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// URL to `PUT` the file to.
    pub upload_url: String,
    /// URL the file will be readable at.
    pub object_url: String,
    /// Object key.
    pub key: String,
    /// Bucket name.
    pub bucket: String,
}

/// Replaces anything outside `[A-Za-z0-9._-]` (and `@` when `keep_at`) so a
/// value is safe as a key segment.
fn sanitize(value: &str, keep_at: bool) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') || (keep_at && c == '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Checks an upload request's file name and content type.
///
/// # Errors
///
/// Returns [`UploadError::InvalidRequest`] if either is blank or the
/// content type isn't `image/*`.
pub fn validate_request(file_name: &str, content_type: &str) -> Result<(), UploadError> {
    if file_name.trim().is_empty() || content_type.trim().is_empty() {
        return Err(UploadError::InvalidRequest {
            message: "fileName and contentType are required".to_string(),
        });
    }
    if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(UploadError::InvalidRequest {
            message: format!("Only image uploads are allowed, got {content_type}"),
        });
    }
    Ok(())
}

/// Builds the object key `{prefix}/{user}/{uuid}-{fileName}`.
#[must_use]
pub fn object_key(kind: UploadKind, user_email: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        kind.prefix(),
        sanitize(user_email, true),
        uuid::Uuid::new_v4(),
        sanitize(file_name, false),
    )
}

/// Issues presigned S3 `PutObject` URLs.
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: aws_sdk_s3::Client,
    config: UploadConfig,
}

impl UploadClient {
    /// Creates a client using the standard AWS credential chain.
    pub async fn new(config: UploadConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        log::info!(
            "Upload URLs enabled for s3://{} ({}s expiry)",
            config.bucket,
            config.expiry.as_secs()
        );

        Self::from_conf(aws_sdk_s3::Config::from(&sdk_config), config)
    }

    /// Creates a client from an explicit S3 configuration.
    #[must_use]
    pub fn from_conf(s3_config: aws_sdk_s3::Config, config: UploadConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Signs an upload of `file_name` for `user_email`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidRequest`] for a bad request and
    /// [`UploadError::Presign`] if signing fails.
    pub async fn presign(
        &self,
        file_name: &str,
        content_type: &str,
        kind: UploadKind,
        user_email: &str,
    ) -> Result<PresignedUpload, UploadError> {
        validate_request(file_name, content_type)?;

        let key = object_key(kind, user_email, file_name);
        let bucket = &self.config.bucket;

        let presigning = PresigningConfig::expires_in(self.config.expiry).map_err(|e| {
            UploadError::Config {
                message: e.to_string(),
            }
        })?;

        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type(content_type.trim())
            .presigned(presigning)
            .await
            .map_err(|e| UploadError::Presign {
                bucket: bucket.clone(),
                key: key.clone(),
                source: Box::new(e),
            })?;

        log::debug!("Signed {kind} upload s3://{bucket}/{key}");

        Ok(PresignedUpload {
            upload_url: request.uri().to_string(),
            object_url: self.config.object_url(&key),
            key,
            bucket: bucket.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_s3::config::Credentials;

    use super::*;

    #[test]
    fn kind_defaults_to_avatar() {
        assert_eq!(UploadKind::from_request(None), UploadKind::Avatar);
        assert_eq!(UploadKind::from_request(Some("banner")), UploadKind::Avatar);
        assert_eq!(
            UploadKind::from_request(Some("bus_photo")),
            UploadKind::BusPhoto
        );
    }

    #[test]
    fn keys_are_prefixed_and_sanitized() {
        let key = object_key(UploadKind::BusPhoto, "a.b@c.lk", "my photo (1).jpg");
        assert!(key.starts_with("bus-photos/a.b@c.lk/"));
        assert!(key.ends_with("-my_photo__1_.jpg"));

        let key = object_key(UploadKind::Avatar, "x/../y@z.lk", "a.png");
        assert!(key.starts_with("avatars/x_.._y@z.lk/"));
    }

    #[test]
    fn only_images_are_accepted() {
        assert!(validate_request("a.png", "image/png").is_ok());
        assert!(validate_request("a.pdf", "application/pdf").is_err());
        assert!(validate_request(" ", "image/png").is_err());
        assert!(validate_request("a.png", "").is_err());
    }

    #[test]
    fn config_from_lookup() {
        assert_eq!(UploadConfig::from_lookup(|_| None).unwrap(), None);

        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_BUCKET" => Some("bus-media".to_string()),
            "UPLOAD_URL_EXPIRY_SECS" => Some("60".to_string()),
            _ => None,
        })
        .unwrap()
        .unwrap();
        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.expiry, Duration::from_secs(60));
        assert_eq!(
            config.object_url("avatars/a.png"),
            "https://bus-media.s3.ap-south-1.amazonaws.com/avatars/a.png"
        );

        assert!(
            UploadConfig::from_lookup(|key| match key {
                "UPLOAD_BUCKET" => Some("bus-media".to_string()),
                "UPLOAD_URL_EXPIRY_SECS" => Some("0".to_string()),
                _ => None,
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn presign_signs_put_for_key() {
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("ap-south-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .build();
        let client = UploadClient::from_conf(s3_config, UploadConfig::new("bus-media", "ap-south-1"));

        let upload = client
            .presign("bus.jpg", "image/jpeg", UploadKind::BusPhoto, "a@b.lk")
            .await
            .unwrap();

        assert!(upload.key.starts_with("bus-photos/a@b.lk/"));
        assert_eq!(upload.bucket, "bus-media");
        assert!(upload.upload_url.contains("X-Amz-Signature="));
        assert_eq!(
            upload.object_url,
            format!("https://bus-media.s3.ap-south-1.amazonaws.com/{}", upload.key)
        );

        assert!(matches!(
            client
                .presign("notes.txt", "text/plain", UploadKind::Avatar, "a@b.lk")
                .await,
            Err(UploadError::InvalidRequest { .. })
        ));
    }
}
