//! Request field validation helpers

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects field errors for one request
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    /// `Err` with every collected error, or `Ok` when there were none
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 160 && EMAIL_RE.is_match(email)
}

/// Accepts http(s) URLs, and bare `host.tld/path` forms the way link
/// fields are commonly filled in.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.chars().any(char::is_whitespace) {
        return false;
    }

    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    match Url::parse(&candidate) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed
                    .host_str()
                    .map(|host| host.contains('.') || host == "localhost")
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// Trimmed, lowercased address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@uni.ac.uk"));
        assert!(!is_valid_email("ada@"));
        assert!(!is_valid_email("ada example.com"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("https://doi.org/10.1000/xyz"));
        assert!(is_valid_url("http://localhost:3000/paper"));
        assert!(is_valid_url("arxiv.org/abs/1706.03762"));
        assert!(!is_valid_url("ftp://files.example.com/a.pdf"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("nodot"));
    }

    #[test]
    fn test_field_errors() {
        let mut errors = FieldErrors::new();
        assert!(FieldErrors::new().finish().is_ok());
        errors.add("title", "Title is required");
        assert_eq!(
            errors.finish(),
            Err(vec![FieldError::new("title", "Title is required")])
        );
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
