// src/features/normalize.rs
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Organisation-name noise words stripped before token comparison.
pub const STOPWORDS: [&str; 28] = [
    "a", "an", "the", "and", "or", "of", "for", "in", "at", "inc", "incorporated", "corp",
    "corporation", "llc", "ltd", "limited", "company", "co", "group", "organization",
    "organisation", "foundation", "association", "society", "center", "centre", "services",
    "service",
];

/// Lowercases, strips punctuation, and collapses whitespace.
pub fn normalize_string(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let stripped = NON_ALNUM.replace_all(&lowered, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").to_string()
}

/// Splits a normalized string into comparison tokens, dropping stopwords and
/// one-character fragments.
pub fn tokenize(value: &str) -> HashSet<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    normalize_string(value)
        .split_whitespace()
        .filter(|t| t.len() > 1 && !stopwords.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Canonicalises an email address: case folding, plus-tag removal, and the
/// gmail dot/domain-alias quirks.
pub fn normalize_email(email: &str) -> String {
    let trimmed = email.trim().to_lowercase();
    let Some((local_full, domain)) = trimmed.split_once('@') else {
        return trimmed;
    };

    let local = local_full.split('+').next().unwrap_or("");
    let domain = match domain {
        "googlemail.com" => "gmail.com",
        other => other,
    };
    let local = if domain == "gmail.com" {
        local.replace('.', "")
    } else {
        local.to_string()
    };

    if local.is_empty() {
        String::new()
    } else {
        format!("{}@{}", local, domain)
    }
}

/// Extracts the domain part of an email address after normalisation.
pub fn email_domain(email: &str) -> Option<String> {
    let normalized = normalize_email(email);
    normalized
        .split_once('@')
        .map(|(_, domain)| domain.to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("  ACME Flying-School, Inc. "), "acme flying school inc");
        assert_eq!(normalize_string("Café   du  Nord"), "caf du nord");
        assert_eq!(normalize_string(""), "");
    }

    #[test]
    fn test_tokenize_strips_stopwords() {
        let tokens = tokenize("The Acme Flying School, Inc.");
        assert!(tokens.contains("acme"));
        assert!(tokens.contains("flying"));
        assert!(tokens.contains("school"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("inc"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("Info@Acme.Example"), "info@acme.example");
        assert_eq!(normalize_email("john.doe+tag@gmail.com"), "johndoe@gmail.com");
        assert_eq!(normalize_email("jane@googlemail.com"), "jane@gmail.com");
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
        assert_eq!(normalize_email("+tag@example.org"), "");
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("info@acme.example"), Some("acme.example".to_string()));
        assert_eq!(email_domain("garbage"), None);
    }
}
