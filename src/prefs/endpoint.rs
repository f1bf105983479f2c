use url::Url;

use crate::error::SyncError;

/// Validate a user-entered base URL and normalize it to end with `/`.
///
/// Only `https://` endpoints with a host are accepted.
pub fn normalize_base_url(raw: &str) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| SyncError::InvalidEndpoint {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("base URL is empty"));
    }
    if !trimmed.starts_with("https://") {
        return Err(invalid("base URL must start with https://"));
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let parsed = Url::parse(&with_slash).map_err(|e| invalid(&e.to_string()))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(with_slash),
        _ => Err(invalid("base URL has no valid host")),
    }
}
