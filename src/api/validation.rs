//! Request field validation.

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::{ApiError, FieldError};

pub const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_EMAIL_LENGTH: usize = 254;

/// Collects field errors and turns them into a single 400 response.
#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn check(&mut self, ok: bool, field: &'static str, message: &'static str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError { field, message });
        }
        self
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Trim and lower-case an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shallow structural check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Parse an RFC 3339 timestamp and normalise it to UTC with millisecond
/// precision, so stored dates sort lexicographically.
pub fn normalize_date(date: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(date.trim()).ok()?;
    Some(
        parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@b@x.com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_password_length_counts_chars() {
        assert!(is_valid_password("secret"));
        assert!(!is_valid_password("12345"));
        assert!(is_valid_password("éééééé"));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(
            normalize_date("2025-06-01T10:30:00+02:00").as_deref(),
            Some("2025-06-01T08:30:00.000Z")
        );
        assert_eq!(
            normalize_date("2025-06-01T08:30:00Z").as_deref(),
            Some("2025-06-01T08:30:00.000Z")
        );
        assert!(normalize_date("2025-06-01").is_none());
        assert!(normalize_date("tomorrow").is_none());
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let mut v = Validator::default();
        v.check(false, "email", "Invalid email address")
            .check(true, "name", "Name is required")
            .check(false, "password", "Password too short");

        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, ["email", "password"]);
            }
            _ => panic!("expected validation error"),
        }
    }
}
