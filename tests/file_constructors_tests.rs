use gcs_transfer_core::{Download, Upload};

#[test]
fn download_from_file_refuses_to_overwrite_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.bin");
    std::fs::write(&path, b"already here").unwrap();

    let err = Download::from_file(&path, false).unwrap_err();
    assert!(matches!(err, gcs_transfer_core::TransferError::InvalidUserInput(_)));

    let download = Download::from_file(&path, true).unwrap();
    assert!(!download.initialized());
}

#[test]
fn upload_from_file_guesses_mime_type_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    std::fs::write(&path, b"{\"a\":1}").unwrap();

    let upload = Upload::from_file(&path, None).unwrap();
    assert_eq!(upload.mime_type(), "application/json");
    assert_eq!(upload.total_size(), Some(7));
}

#[test]
fn upload_from_file_errors_on_unknown_extension_without_explicit_mime_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.zzzzz");
    std::fs::write(&path, b"whatever").unwrap();

    let err = Upload::from_file(&path, None).unwrap_err();
    assert!(matches!(err, gcs_transfer_core::TransferError::InvalidUserInput(_)));
}

#[test]
fn upload_from_file_missing_path_is_not_found() {
    let err = Upload::from_file("/no/such/path/object.json", None).unwrap_err();
    assert!(matches!(err, gcs_transfer_core::TransferError::NotFound(_)));
}
