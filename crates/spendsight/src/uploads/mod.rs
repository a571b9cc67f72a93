//! Upload authorization.
//!
//! Issues time-limited, single-use credentials for depositing receipt
//! images into the object store without giving clients direct write
//! access. A credential is an AES-sealed ticket binding the generated
//! object key and the declared content type to an expiry instant; the
//! upload endpoint verifies and consumes it.

use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::secrets::TicketCipher;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid upload token: {0}")]
    InvalidToken(String),

    #[error("Upload token does not authorize key '{0}'")]
    KeyMismatch(String),

    #[error("Upload token authorizes content type '{expected}', got '{actual}'")]
    ContentTypeMismatch { expected: String, actual: String },

    #[error("Upload credential expired at {0}")]
    Expired(String),

    #[error("Upload credential for '{0}' was already used")]
    AlreadyUsed(String),

    #[error("Failed to seal upload ticket: {0}")]
    Seal(String),
}

/// Claims sealed inside an upload token.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketClaims {
    key: String,
    content_type: String,
    expires_at: DateTime<Utc>,
}

/// A granted upload credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    /// Full URL the client PUTs the image to, token included.
    pub upload_url: String,
    /// The generated object key.
    pub filename: String,
}

/// Issues and validates upload credentials.
pub struct UploadAuthorizer {
    cipher: TicketCipher,
    public_url: String,
    prefix: String,
    ttl: Duration,
    /// Keys whose credential has been consumed. Entries expire with the
    /// credential itself, so the cache stays bounded.
    used: Cache<String, ()>,
}

impl UploadAuthorizer {
    pub fn new(cipher: TicketCipher, public_url: &str, prefix: &str, ttl_secs: u64) -> Self {
        Self {
            cipher,
            public_url: public_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            ttl: Duration::seconds(ttl_secs as i64),
            used: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(ttl_secs.max(1)))
                .build(),
        }
    }

    /// Maps a content type to the object key extension: the subtype of
    /// the declared type, with `jpeg` shortened to `jpg`.
    fn extension_for(content_type: &str) -> String {
        let subtype = content_type.rsplit('/').next().unwrap_or(content_type);
        if subtype == "jpeg" {
            "jpg".to_string()
        } else {
            subtype.to_string()
        }
    }

    /// Generates a fresh object key: `<prefix>/<timestamp>-<8 hex>.<ext>`.
    ///
    /// Second-resolution timestamp plus a random suffix makes collisions
    /// vanishingly unlikely; the create-only object store catches the
    /// remainder.
    fn generate_key(&self, content_type: &str, now: DateTime<Utc>) -> String {
        let timestamp = now.format("%Y%m%d-%H%M%S");
        let unique = Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}-{}.{}",
            self.prefix,
            timestamp,
            &unique[..8],
            Self::extension_for(content_type)
        )
    }

    /// Issues a credential for exactly one write of `content_type` to a
    /// freshly generated key.
    pub fn authorize(&self, content_type: &str) -> Result<UploadGrant, UploadError> {
        self.authorize_at(content_type, Utc::now())
    }

    fn authorize_at(
        &self,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<UploadGrant, UploadError> {
        let key = self.generate_key(content_type, now);
        let claims = TicketClaims {
            key: key.clone(),
            content_type: content_type.to_string(),
            expires_at: now + self.ttl,
        };

        let claims_json =
            serde_json::to_string(&claims).map_err(|e| UploadError::Seal(e.to_string()))?;
        let token = self
            .cipher
            .seal(&claims_json)
            .map_err(|e| UploadError::Seal(e.to_string()))?;

        Ok(UploadGrant {
            upload_url: format!("{}/api/uploads/{}?token={}", self.public_url, key, token),
            filename: key,
        })
    }

    /// Validates a presented token against the target key and declared
    /// content type, and consumes it. Each credential authorizes exactly
    /// one write.
    pub fn verify_and_consume(
        &self,
        token: &str,
        key: &str,
        content_type: &str,
    ) -> Result<(), UploadError> {
        self.verify_and_consume_at(token, key, content_type, Utc::now())
    }

    fn verify_and_consume_at(
        &self,
        token: &str,
        key: &str,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<(), UploadError> {
        let claims_json = self
            .cipher
            .open(token)
            .map_err(|e| UploadError::InvalidToken(e.to_string()))?;
        let claims: TicketClaims = serde_json::from_str(&claims_json)
            .map_err(|e| UploadError::InvalidToken(e.to_string()))?;

        if claims.key != key {
            return Err(UploadError::KeyMismatch(key.to_string()));
        }
        if claims.content_type != content_type {
            return Err(UploadError::ContentTypeMismatch {
                expected: claims.content_type,
                actual: content_type.to_string(),
            });
        }
        if claims.expires_at < now {
            return Err(UploadError::Expired(claims.expires_at.to_rfc3339()));
        }
        if self.used.contains_key(key) {
            return Err(UploadError::AlreadyUsed(key.to_string()));
        }

        self.used.insert(key.to_string(), ());
        Ok(())
    }
}
