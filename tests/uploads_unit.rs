use chrono::{Duration, Utc};
use uuid::Uuid;

use renderiq::models::{ResumableUpload, UploadStatus, UploadedPart};
use renderiq::s3_utils::{build_public_url, file_extension, sanitize_filename, UploadTarget};
use renderiq::uploads::{is_expired, progress_percent, UploadProgress};

#[test]
fn progress_is_rounded_and_clamped() {
    assert_eq!(progress_percent(50, 200), 25);
    assert_eq!(progress_percent(1, 3), 33);
    assert_eq!(progress_percent(2, 3), 67);
    assert_eq!(progress_percent(300, 200), 100);
    assert_eq!(progress_percent(10, 0), 0);
}

#[test]
fn sessions_expire_after_their_deadline() {
    let now = Utc::now();
    assert!(is_expired(now - Duration::seconds(1), now));
    assert!(!is_expired(now + Duration::hours(1), now));
}

#[test]
fn progress_snapshot_of_a_session() {
    let session = ResumableUpload {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        bucket: "test-bucket".into(),
        file_path: "uploads/u/f.png".into(),
        content_type: "image/png".into(),
        provider_upload_id: "mpu-1".into(),
        total_size: 1000,
        uploaded_bytes: 400,
        parts: vec![UploadedPart {
            part_number: 1,
            etag: "\"etag-1\"".into(),
            size: 400,
        }],
        status: UploadStatus::Uploading,
        expires_at: Utc::now() + Duration::hours(24),
        created_at: Utc::now(),
    };

    let progress = UploadProgress::of(&session);
    assert_eq!(progress.progress, 40);
    assert_eq!(progress.parts, 1);

    let json = serde_json::to_value(&progress).unwrap();
    assert_eq!(json["sessionId"], session.id.to_string());
    assert_eq!(json["status"], "uploading");
    assert_eq!(json["uploadedBytes"], 400);
}

#[test]
fn terminal_statuses() {
    assert!(UploadStatus::Finalized.is_terminal());
    assert!(UploadStatus::Failed.is_terminal());
    assert!(!UploadStatus::Uploading.is_terminal());
}

#[test]
fn public_urls() {
    assert_eq!(
        build_public_url("https://cdn.example.com/", "assets", "uploads/a.png"),
        "https://cdn.example.com/assets/uploads/a.png"
    );
    assert_eq!(
        build_public_url("https://assets.s3.amazonaws.com", "assets", "uploads/a.png"),
        "https://assets.s3.amazonaws.com/uploads/a.png"
    );
    assert_eq!(
        build_public_url("https://{bucket}.r2.dev/{key}", "assets", "uploads/a.png"),
        "https://assets.r2.dev/uploads/a.png"
    );
}

#[test]
fn filenames_and_extensions() {
    assert_eq!(sanitize_filename("my plan (v2).PNG"), "myplanv2.PNG");
    assert_eq!(file_extension(Some("Site.JPG"), "image/png"), "jpg");
    assert_eq!(file_extension(None, "image/webp"), "webp");
    assert_eq!(file_extension(Some("noext"), "text/plain"), "bin");
}

#[test]
fn object_keys_by_target() {
    let user = Uuid::new_v4();
    let object = Uuid::new_v4();

    assert_eq!(
        UploadTarget::parse(Some("project"), Some("Lake House")),
        UploadTarget::Project {
            slug: "lake-house".into()
        }
    );
    assert_eq!(UploadTarget::parse(Some("project"), None), UploadTarget::User);
    assert_eq!(UploadTarget::parse(None, None), UploadTarget::User);

    assert_eq!(
        UploadTarget::parse(Some("render"), None).object_key(user, object, "png"),
        format!("renders/{user}/{object}.png")
    );
    assert_eq!(
        UploadTarget::parse(Some("project"), Some("Lake House")).object_key(user, object, "jpg"),
        format!("projects/lake-house/{user}/{object}.jpg")
    );
}
