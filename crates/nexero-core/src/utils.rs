//! Common utility functions

use url::Url;
use uuid::Uuid;

/// Generate a new UUID v4
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Hide the password of a connection URL before it is logged.
///
/// Strings that are not URLs, or carry no password, are returned as-is.
pub fn redact_url_password(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("***")).is_err() {
                return "***".to_string();
            }
            url.to_string()
        }
        _ => raw.to_string(),
    }
}
