// src/security.rs
//
// Input checks shared by the handlers.

pub const MAX_PROMPT_LEN: usize = 5000;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_INPUT_LEN: usize = 10_000;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp", "image/gif"];

pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 255 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Catches `on<event>=` handler attributes, ignoring whitespace before `=`.
fn has_event_handler(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    let mut i = 0;
    while let Some(pos) = lower[i..].find("on") {
        let start = i + pos + 2;
        let mut j = start;
        while j < bytes.len() && bytes[j].is_ascii_alphanumeric() {
            j += 1;
        }
        let word_len = j - start;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if word_len > 0 && j < bytes.len() && bytes[j] == b'=' {
            return true;
        }
        i = start;
    }
    false
}

/// Strips angle brackets, `javascript:` and inline handlers, trims and caps
/// the length.
pub fn sanitize_input(input: &str) -> String {
    let mut out: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();

    loop {
        let lower = out.to_ascii_lowercase();
        let Some(pos) = lower.find("javascript:") else {
            break;
        };
        out.replace_range(pos..pos + "javascript:".len(), "");
    }

    let trimmed = out.trim();
    trimmed.chars().take(MAX_INPUT_LEN).collect()
}

/// Returns the sanitized prompt or a user-facing error.
pub fn validate_prompt(prompt: &str) -> Result<String, &'static str> {
    if prompt.trim().is_empty() {
        return Err("Prompt is required");
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err("Prompt exceeds maximum length");
    }
    let lower = prompt.to_ascii_lowercase();
    if lower.contains("<script") || lower.contains("javascript:") || has_event_handler(&lower) {
        log::warn!("rejected prompt with script-like content");
        return Err("Invalid characters in prompt");
    }
    Ok(sanitize_input(prompt))
}

pub fn is_valid_image_type(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    IMAGE_TYPES.contains(&mime.as_str())
}

pub fn is_valid_file_size(size: usize, max_bytes: usize) -> bool {
    size > 0 && size <= max_bytes
}

/// Lowercase, dash-separated slug of at most 60 characters.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug: String = slug.chars().take(60).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
