use axum::http::StatusCode;
use std::error::Error as StdError;
use std::fmt;

use crate::constants::UPLOAD_DISABLED_MESSAGE;
use crate::media::MediaType;
use crate::store::StoreError;

const MAX_EXTENSION_LEN: usize = 10;
const FALLBACK_EXTENSION: &str = "bin";
const SVG_MIME: &str = "image/svg+xml";

/// Upload failures, each mapped to a fixed HTTP status
#[derive(Debug)]
pub enum UploadError {
    /// Uploads are switched off in this deployment
    Disabled,
    /// Multipart body had no `file` field
    NoFile,
    /// File exceeded the configured limit (in MB)
    TooLarge { max_mb: u64 },
    /// Content type is neither image nor video
    UnsupportedType(String),
    /// Multipart body could not be read
    InvalidRequest(String),
    /// Writing the file or the metadata document failed
    Storage(StoreError),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            UploadError::NoFile
            | UploadError::TooLarge { .. }
            | UploadError::UnsupportedType(_)
            | UploadError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client (internal details stay in the logs)
    pub fn client_message(&self) -> String {
        match self {
            UploadError::InvalidRequest(_) => "Invalid upload request".to_string(),
            UploadError::Storage(_) => "Upload failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Disabled => write!(f, "{}", UPLOAD_DISABLED_MESSAGE),
            UploadError::NoFile => write!(f, "No file uploaded"),
            UploadError::TooLarge { max_mb } => {
                write!(f, "File size must be less than {}MB", max_mb)
            }
            UploadError::UnsupportedType(_) => write!(f, "Only images and videos are allowed"),
            UploadError::InvalidRequest(msg) => write!(f, "Invalid upload request: {}", msg),
            UploadError::Storage(err) => write!(f, "Upload failed: {}", err),
        }
    }
}

impl StdError for UploadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            UploadError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        UploadError::Storage(err)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Storage(StoreError::Io(err))
    }
}

/// Check an upload's type and size, returning the media type it will be stored as
pub fn validate_upload(
    content_type: &str,
    size: u64,
    max_bytes: u64,
) -> Result<MediaType, UploadError> {
    check_size(size, max_bytes)?;
    validate_content_type(content_type)
}

/// Reject sizes above the limit; called again for every streamed chunk
pub fn check_size(size: u64, max_bytes: u64) -> Result<(), UploadError> {
    if size > max_bytes {
        return Err(UploadError::TooLarge {
            max_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Only `image/*` and `video/*` are accepted; SVG is refused since it can carry script
pub fn validate_content_type(content_type: &str) -> Result<MediaType, UploadError> {
    let essence = mime_essence(content_type);
    let is_media = essence.starts_with("image/") || essence.starts_with("video/");
    if is_media && essence != SVG_MIME {
        Ok(MediaType::from_mime(&essence))
    } else {
        Err(UploadError::UnsupportedType(content_type.to_string()))
    }
}

/// Lowercase `type/subtype` without parameters
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pick the content type of an upload
///
/// A declared type wins unless it is missing or the generic
/// `application/octet-stream`; then the file name decides.
pub fn resolve_content_type(declared: Option<&str>, file_name: Option<&str>) -> String {
    let octet_stream = mime_guess::mime::APPLICATION_OCTET_STREAM.essence_str();
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && mime_essence(ct) != octet_stream => ct.to_string(),
        _ => file_name
            .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
            .unwrap_or_else(|| mime_guess::mime::APPLICATION_OCTET_STREAM.to_string()),
    }
}

/// Extension used for the stored file
///
/// Taken from the original file name when it is a short ASCII alphanumeric
/// suffix that maps back to `content_type`, otherwise derived from the
/// content type. The stored file is served by extension, so it must never
/// disagree with the type that was validated.
pub fn file_extension(file_name: Option<&str>, content_type: &str) -> String {
    let essence = mime_essence(content_type);
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .iter()
                .any(|mime| mime.essence_str() == essence)
        });

    if let Some(ext) = from_name {
        return ext;
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
