//! Email address normalization shared by identity and store code.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Trims and lowercases `raw`, returning `None` when it is not a plausible
/// email address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    if EMAIL_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(
            normalize_email("  Educator@School.ORG "),
            Some("educator@school.org".to_string())
        );
    }

    #[test]
    fn rejects_implausible_values() {
        for raw in ["", "educator", "a@b", "a b@c.org", "@c.org"] {
            assert_eq!(normalize_email(raw), None, "{raw}");
        }
    }
}
