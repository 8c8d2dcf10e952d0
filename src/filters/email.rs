use std::sync::OnceLock;

use regex::Regex;

use super::FilterError;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| unreachable!("{e}"))
    })
}

/// Loose shape check: something@something.something, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Empty input is accepted and means "no email filter".
pub fn validate_email(email: &str) -> Result<(), FilterError> {
    if email.is_empty() || is_valid_email(email) {
        Ok(())
    } else {
        Err(FilterError::InvalidEmail(email.to_string()))
    }
}
