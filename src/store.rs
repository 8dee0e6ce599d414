use chrono::Utc;
use fs2::FileExt;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{NamedTempFile, TempPath};

use crate::constants::{METADATA_FILE_NAME, METADATA_LOCK_FILE_NAME, UPLOADS_DIR_NAME};
use crate::media::{stored_file_name, MediaFile, MediaType};
use crate::validation::{file_extension, resolve_content_type, validate_content_type};

/// Metadata store errors
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    Io(io::Error),
    /// Metadata document is not a valid JSON array of records
    Json(serde_json::Error),
    /// File handed to `import_file` is not an image or video
    UnsupportedFile(PathBuf),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "I/O error: {}", err),
            StoreError::Json(err) => write!(f, "Invalid metadata document: {}", err),
            StoreError::UnsupportedFile(path) => {
                write!(f, "Not an image or video: {}", path.display())
            }
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Json(err) => Some(err),
            StoreError::UnsupportedFile(_) => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err)
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Io(err.error)
    }
}

impl From<tempfile::PathPersistError> for StoreError {
    fn from(err: tempfile::PathPersistError) -> Self {
        StoreError::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Owner of the uploads directory and its metadata document
///
/// Layout under the public directory:
/// ```text
/// uploads/
///   metadata.json     JSON array of MediaFile records
///   .metadata.lock    held exclusively while the document is rewritten
///   <id>.<ext>        uploaded media
/// ```
///
/// Writers are serialized twice: a mutex for threads of this process and an
/// exclusive file lock for other processes (e.g. the `add` command running
/// next to the server). The document is always replaced atomically, so
/// readers never need the lock.
pub struct MetadataStore {
    uploads_dir: PathBuf,
    metadata_path: PathBuf,
    write_lock: Mutex<()>,
}

impl MetadataStore {
    pub fn new(public_dir: impl AsRef<Path>) -> Self {
        let uploads_dir = public_dir.as_ref().join(UPLOADS_DIR_NAME);
        let metadata_path = uploads_dir.join(METADATA_FILE_NAME);
        Self {
            uploads_dir,
            metadata_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Read every record; a missing document is an empty gallery
    pub fn list(&self) -> Result<Vec<MediaFile>> {
        let content = match fs::read_to_string(&self.metadata_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Like `list`, but any failure is logged and reported as an empty gallery
    pub fn list_or_empty(&self) -> Vec<MediaFile> {
        self.list().unwrap_or_else(|e| {
            error!("Error reading media from {}: {}", self.metadata_path.display(), e);
            Vec::new()
        })
    }

    /// Create a hidden temporary file in the uploads directory to stream an upload into
    ///
    /// Living in the same directory as the final file keeps the later rename atomic.
    /// The file is removed when dropped unless committed.
    pub fn new_upload_temp(&self) -> Result<NamedTempFile> {
        fs::create_dir_all(&self.uploads_dir)?;
        let temp = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(&self.uploads_dir)?;
        Ok(temp)
    }

    /// Move a fully written temporary file into place and append its record
    ///
    /// Returns the appended record. On failure nothing is left behind: the
    /// temporary file is deleted and the document is untouched.
    pub fn commit_upload(
        &self,
        temp: TempPath,
        extension: &str,
        media_type: MediaType,
    ) -> Result<MediaFile> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _lock_file = self.acquire_file_lock()?;
        // Lock is held until _lock_file is dropped

        let mut records = self.list()?;
        let taken: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();

        let uploaded_at = Utc::now();
        let mut id_ms = uploaded_at.timestamp_millis();
        while taken.contains(id_ms.to_string().as_str())
            || self
                .uploads_dir
                .join(stored_file_name(id_ms, extension))
                .exists()
        {
            debug!("Media id {} already taken, trying next millisecond", id_ms);
            id_ms += 1;
        }

        let record = MediaFile::new(id_ms, extension, media_type, uploaded_at);
        let final_path = self.uploads_dir.join(stored_file_name(id_ms, extension));
        temp.persist_noclobber(&final_path)?;

        records.push(record.clone());
        if let Err(e) = self.write_document(&records) {
            warn!(
                "Failed to update {}, removing {}",
                self.metadata_path.display(),
                final_path.display()
            );
            if let Err(remove_err) = fs::remove_file(&final_path) {
                error!("Failed to remove {}: {}", final_path.display(), remove_err);
            }
            return Err(e);
        }

        info!(
            "Stored {} {} ({} records total)",
            record.media_type.as_str(),
            record.url,
            records.len()
        );
        Ok(record)
    }

    /// Copy a local image or video into the gallery
    pub fn import_file(&self, path: &Path) -> Result<MediaFile> {
        let file_name = path.file_name().and_then(|n| n.to_str());
        let content_type = resolve_content_type(None, file_name);
        let media_type = validate_content_type(&content_type)
            .map_err(|_| StoreError::UnsupportedFile(path.to_path_buf()))?;
        let extension = file_extension(file_name, &content_type);

        let mut source = File::open(path)?;
        let mut temp = self.new_upload_temp()?;
        io::copy(&mut source, temp.as_file_mut())?;
        temp.as_file().sync_all()?;

        self.commit_upload(temp.into_temp_path(), &extension, media_type)
    }

    fn acquire_file_lock(&self) -> Result<File> {
        fs::create_dir_all(&self.uploads_dir)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.uploads_dir.join(METADATA_LOCK_FILE_NAME))?;
        lock_file.lock_exclusive()?;
        Ok(lock_file)
    }

    fn write_document(&self, records: &[MediaFile]) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.uploads_dir)?;
        serde_json::to_writer_pretty(&mut temp, records)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.metadata_path)?;
        Ok(())
    }
}
