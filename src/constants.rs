/// Directory (relative to the public dir) holding uploaded media and the metadata document
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Metadata document file name inside the uploads directory
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Lock file serializing writers of the metadata document
pub const METADATA_LOCK_FILE_NAME: &str = ".metadata.lock";

/// Default upload size limit in megabytes
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Slack added to the request body limit for multipart boundaries and headers
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Returned by the upload endpoint while uploads are switched off
pub const UPLOAD_DISABLED_MESSAGE: &str =
    "Upload functionality is currently disabled. Contact administrator to add media.";

/// Largest upload limit whose byte count still fits in a u64
pub const MAX_UPLOAD_MB_LIMIT: u64 = u64::MAX / (1024 * 1024);

/// Convert a megabyte limit to bytes, saturating at u64::MAX
pub fn mb_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}
