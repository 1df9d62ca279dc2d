// Helpers for object keys and public S3-compatible URLs.

use uuid::Uuid;

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    // Allow simple templating: https://host/{bucket}/{key} or https://bucket.host/{key}
    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    // If the base already includes the bucket, append only the key.
    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

/// Keeps alphanumerics, `.`, `_` and `-`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Lowercase extension of `filename`, or one derived from the MIME type.
pub fn file_extension(filename: Option<&str>, content_type: &str) -> String {
    let from_name = filename
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| sanitize_filename(ext).to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8);
    if let Some(ext) = from_name {
        return ext;
    }

    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/pdf" => "pdf",
        _ => "bin",
    }
    .to_string()
}

/// Where an uploaded object is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// `uploads/{user}/{id}.{ext}`
    User,
    /// `projects/{slug}/{user}/{id}.{ext}`
    Project { slug: String },
    /// `renders/{user}/{id}.{ext}`
    Render,
    /// `receipts/{user}/{id}.{ext}`
    Receipt,
}

impl UploadTarget {
    pub fn parse(kind: Option<&str>, project_slug: Option<&str>) -> Self {
        match (kind.unwrap_or("upload"), project_slug) {
            ("project", Some(slug)) => UploadTarget::Project {
                slug: crate::security::slugify(slug),
            },
            ("render", _) => UploadTarget::Render,
            ("receipt", _) => UploadTarget::Receipt,
            _ => UploadTarget::User,
        }
    }

    pub fn object_key(&self, user_id: Uuid, object_id: Uuid, ext: &str) -> String {
        match self {
            UploadTarget::User => format!("uploads/{user_id}/{object_id}.{ext}"),
            UploadTarget::Project { slug } => format!("projects/{slug}/{user_id}/{object_id}.{ext}"),
            UploadTarget::Render => format!("renders/{user_id}/{object_id}.{ext}"),
            UploadTarget::Receipt => format!("receipts/{user_id}/{object_id}.{ext}"),
        }
    }
}
