use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use memorial_gallery::store::StoreError;
use memorial_gallery::{MediaFile, MediaType, MetadataStore};

/// Helper to stream some bytes into an upload temp file, as the upload handler does
fn write_temp(store: &MetadataStore, data: &[u8]) -> tempfile::TempPath {
    let mut temp = store.new_upload_temp().unwrap();
    temp.write_all(data).unwrap();
    temp.into_temp_path()
}

/// Media files in the uploads directory (everything but the document, lock and temp files)
fn media_files_on_disk(uploads_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(uploads_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name != "metadata.json" && !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[test]
fn test_list_without_metadata_returns_empty() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());

    assert!(store.list().unwrap().is_empty());
    assert!(store.list_or_empty().is_empty());
    // Listing never creates anything
    assert!(!store.uploads_dir().exists());
}

#[test]
fn test_corrupt_document_lists_as_empty() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());
    fs::create_dir_all(store.uploads_dir()).unwrap();
    fs::write(store.metadata_path(), "{ not json").unwrap();

    assert!(matches!(store.list(), Err(StoreError::Json(_))));
    assert!(store.list_or_empty().is_empty());
}

#[test]
fn test_commit_appends_exactly_one_record() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());

    let temp = write_temp(&store, b"fake png bytes");
    let record = store.commit_upload(temp, "png", MediaType::Image).unwrap();

    assert_eq!(record.url, format!("/uploads/{}.png", record.id));
    assert_eq!(record.media_type, MediaType::Image);
    assert!(record.uploaded_at.as_deref().unwrap().ends_with('Z'));

    let records = store.list().unwrap();
    assert_eq!(records, vec![record.clone()]);

    let stored = store.uploads_dir().join(format!("{}.png", record.id));
    assert_eq!(fs::read(stored).unwrap(), b"fake png bytes");
    assert_eq!(
        media_files_on_disk(store.uploads_dir()),
        vec![format!("{}.png", record.id)]
    );
}

#[test]
fn test_document_is_pretty_printed_camel_case() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());

    let temp = write_temp(&store, b"video");
    store.commit_upload(temp, "mp4", MediaType::Video).unwrap();

    let content = fs::read_to_string(store.metadata_path()).unwrap();
    assert!(content.starts_with("[\n  {"));
    assert!(content.contains("\"uploadedAt\""));
    assert!(content.contains("\"type\": \"video\""));
}

#[test]
fn test_commit_keeps_manually_added_records() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());
    fs::create_dir_all(store.uploads_dir()).unwrap();
    fs::write(
        store.metadata_path(),
        r#"[{"id":"1","url":"/uploads/1.jpg","type":"image"}]"#,
    )
    .unwrap();

    let temp = write_temp(&store, b"data");
    let record = store.commit_upload(temp, "jpg", MediaType::Image).unwrap();

    let records = store.list().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "1");
    assert!(records[0].uploaded_at.is_none());
    assert_eq!(records[1], record);
}

#[test]
fn test_ids_unique_for_back_to_back_commits() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());

    for _ in 0..20 {
        let temp = write_temp(&store, b"x");
        store.commit_upload(temp, "gif", MediaType::Image).unwrap();
    }

    let records = store.list().unwrap();
    let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(records.len(), 20);
    assert_eq!(ids.len(), 20, "Every record should get its own id");
    assert_eq!(media_files_on_disk(store.uploads_dir()).len(), 20);
}

#[test]
fn test_concurrent_commits_lose_no_records() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MetadataStore::new(temp_dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    let data = format!("worker {} file {}", worker, i);
                    let temp = write_temp(&store, data.as_bytes());
                    store.commit_upload(temp, "jpg", MediaType::Image).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = store.list().unwrap();
    assert_eq!(records.len(), 40, "No upload may be dropped from the document");

    let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 40);

    // Every record points at a file that exists
    for record in &records {
        let name = record.url.trim_start_matches("/uploads/");
        assert!(store.uploads_dir().join(name).exists(), "{} missing", name);
    }
}

#[test]
fn test_commit_on_corrupt_document_leaves_nothing_behind() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path());
    fs::create_dir_all(store.uploads_dir()).unwrap();
    fs::write(store.metadata_path(), "garbage").unwrap();

    let temp = write_temp(&store, b"data");
    let result = store.commit_upload(temp, "png", MediaType::Image);

    assert!(matches!(result, Err(StoreError::Json(_))));
    assert_eq!(fs::read_to_string(store.metadata_path()).unwrap(), "garbage");
    assert!(media_files_on_disk(store.uploads_dir()).is_empty());

    // Temporary upload was removed as well
    let leftovers: Vec<_> = fs::read_dir(store.uploads_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(".upload-"))
        .collect();
    assert!(leftovers.is_empty(), "Leftover temp files: {:?}", leftovers);
}

#[test]
fn test_import_file_copies_media() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("Beach Day.JPG");
    fs::write(&source, b"jpeg data").unwrap();

    let store = MetadataStore::new(temp_dir.path().join("public"));
    let record = store.import_file(&source).unwrap();

    assert_eq!(record.media_type, MediaType::Image);
    assert!(record.url.ends_with(".jpg"));
    assert!(source.exists(), "Source file must be left in place");

    let stored = store
        .uploads_dir()
        .join(record.url.trim_start_matches("/uploads/"));
    assert_eq!(fs::read(stored).unwrap(), b"jpeg data");

    let records: Vec<MediaFile> = store.list().unwrap();
    assert_eq!(records, vec![record]);
}

#[test]
fn test_import_video_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = temp_dir.path().join("clip.mp4");
    fs::write(&source, b"mp4 data").unwrap();

    let store = MetadataStore::new(temp_dir.path().join("public"));
    let record = store.import_file(&source).unwrap();

    assert_eq!(record.media_type, MediaType::Video);
    assert!(record.url.ends_with(".mp4"));
}

#[test]
fn test_import_rejects_non_media() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = temp_dir.path().join("notes.txt");
    fs::write(&source, b"hello").unwrap();

    let store = MetadataStore::new(temp_dir.path().join("public"));
    let result = store.import_file(&source);

    assert!(matches!(result, Err(StoreError::UnsupportedFile(_))));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_import_missing_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(temp_dir.path().join("public"));

    let result = store.import_file(&temp_dir.path().join("missing.png"));
    assert!(matches!(result, Err(StoreError::Io(_))));
    assert!(store.list().unwrap().is_empty());
}
