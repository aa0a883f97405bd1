//! Inline attachment decoding and naming
//!
//! Attachments arrive as `data:<mime>;base64,<payload>` URLs. Each one is
//! decoded to bytes and stored in the repository under a random prefix so
//! two uploads with the same original name never collide.

use base64::Engine;
use sdk::types::Attachment;
use thiserror::Error;
use uuid::Uuid;

/// Why a data URL could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("data url must start with 'data:'")]
    MissingScheme,

    #[error("data url has no ',' separating metadata from payload")]
    MissingPayload,

    #[error("data url is not base64 encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// A decoded data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Declared media type, empty when the URL names none
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Decode a base64 data URL
    pub fn parse(url: &str) -> Result<Self, DataUrlError> {
        let rest = url.strip_prefix("data:").ok_or(DataUrlError::MissingScheme)?;
        let (meta, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or(DataUrlError::NotBase64)?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| DataUrlError::Decode(e.to_string()))?;

        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }
}

/// An attachment ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAttachment {
    /// Name as submitted
    pub original_name: String,
    /// Collision-resistant repository path
    pub stored_name: String,
    pub bytes: Vec<u8>,
}

impl PreparedAttachment {
    /// Decode `attachment` and give it a fresh stored name
    pub fn prepare(attachment: &Attachment) -> Result<Self, DataUrlError> {
        let decoded = DataUrl::parse(&attachment.url)?;
        Ok(Self {
            original_name: attachment.name.clone(),
            stored_name: stored_name(&attachment.name),
            bytes: decoded.bytes,
        })
    }

    /// Path the generated page should use to reference this file
    pub fn relative_url(&self) -> String {
        format!("./{}", self.stored_name)
    }
}

/// `<uuid>-<basename>`; directory components of the submitted name are dropped
pub fn stored_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("attachment");
    format!("{}-{}", Uuid::new_v4(), base)
}
