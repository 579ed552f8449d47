//! Format checks for well-known string shapes
//!
//! Pre-compiled regexes for email, URL, UUID and ISO 8601 date/time strings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constraints::StringFormat;

// ============================================================================
// Pre-compiled Regex Patterns
// ============================================================================

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}$").unwrap()
});

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap()
});

/// Any RFC 4122 version (1-8) plus the nil UUID
static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-8][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}|00000000-0000-0000-0000-000000000000)$",
    )
    .unwrap()
});

static DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d{1,9})?(Z|[+-]\d{2}:\d{2})$",
    )
    .unwrap()
});

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").unwrap()
});

static TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d):([0-5]\d)(\.\d{1,9})?$").unwrap()
});

// ============================================================================
// Format Checks
// ============================================================================

/// Check a string against a predefined format.
///
/// # Example
/// ```
/// use keel_validation::formats::matches;
/// use keel_validation::StringFormat;
///
/// assert!(matches(StringFormat::Email, "ada@example.com"));
/// assert!(!matches(StringFormat::Date, "19/01/2024"));
/// ```
pub fn matches(format: StringFormat, value: &str) -> bool {
    match format {
        StringFormat::Email => is_email(value),
        StringFormat::Url => is_url(value),
        StringFormat::Uuid => is_uuid(value),
        StringFormat::DateTime => is_datetime(value),
        StringFormat::Date => is_date(value),
        StringFormat::Time => is_time(value),
    }
}

pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Only `http` and `https` URLs are accepted.
pub fn is_url(value: &str) -> bool {
    URL_REGEX.is_match(value)
}

pub fn is_uuid(value: &str) -> bool {
    UUID_REGEX.is_match(value)
}

/// ISO 8601 timestamp with a mandatory offset (`Z` or `+hh:mm`).
pub fn is_datetime(value: &str) -> bool {
    DATETIME_REGEX.is_match(value)
}

pub fn is_date(value: &str) -> bool {
    DATE_REGEX.is_match(value)
}

pub fn is_time(value: &str) -> bool {
    TIME_REGEX.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_email("user@example.com"));
        assert!(is_email("test.user+tag@subdomain.example.co.uk"));

        assert!(!is_email("invalid-email"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("user@"));
        assert!(!is_email("user@.com"));
        assert!(!is_email("user@example"));
    }

    #[test]
    fn test_url() {
        assert!(is_url("https://example.com"));
        assert!(is_url("http://localhost:8080/users?page=2"));

        assert!(!is_url("ftp://example.com"));
        assert!(!is_url("example.com"));
    }

    #[test]
    fn test_uuid_any_version() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_uuid("6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
        assert!(is_uuid("00000000-0000-0000-0000-000000000000"));

        assert!(!is_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!is_uuid("550e8400-e29b-01d4-a716-446655440000"));
    }

    #[test]
    fn test_datetime() {
        assert!(is_datetime("2024-01-19T12:00:00Z"));
        assert!(is_datetime("2024-01-19T12:00:00.123+08:00"));

        assert!(!is_datetime("2024-01-19 12:00:00"));
        assert!(!is_datetime("2024-01-19T12:00:00"));
        assert!(!is_datetime("2024-13-19T12:00:00Z"));
    }

    #[test]
    fn test_date_and_time() {
        assert!(is_date("2000-12-31"));
        assert!(!is_date("2024-1-19"));
        assert!(!is_date("2024-02-32"));

        assert!(is_time("23:59:59.999"));
        assert!(!is_time("24:00:00"));
        assert!(!is_time("12:00"));
    }

    #[test]
    fn test_matches_dispatch() {
        assert!(matches(StringFormat::Uuid, "550e8400-e29b-41d4-a716-446655440000"));
        assert!(!matches(StringFormat::Url, "mailto:ada@example.com"));
    }
}
