use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::UPLOADS_DIR_NAME;

/// Kind of media a record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// `video/*` is a video, anything else that passed validation is an image
    pub fn from_mime(mime: &str) -> Self {
        if mime.to_ascii_lowercase().starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// One entry of the metadata document
///
/// Field names match the JSON stored on disk:
/// ```json
/// { "id": "1700000000000", "url": "/uploads/1700000000000.jpg", "type": "image",
///   "uploadedAt": "2023-11-14T22:13:20.000Z" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl MediaFile {
    /// Build the record for a file stored as `<id>.<extension>`
    pub fn new(
        id_ms: i64,
        extension: &str,
        media_type: MediaType,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id_ms.to_string(),
            url: format!("/{}/{}", UPLOADS_DIR_NAME, stored_file_name(id_ms, extension)),
            media_type,
            uploaded_at: Some(uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// File name of an upload inside the uploads directory
pub fn stored_file_name(id_ms: i64, extension: &str) -> String {
    format!("{}.{}", id_ms, extension)
}
