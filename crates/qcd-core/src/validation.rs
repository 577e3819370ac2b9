//! Request-validation rules shared by the HTTP surface and the executor's
//! pre-flight checks (spec §6 "Validation rules").

const MAX_QUERY_LEN: usize = 500;

/// Tokens that cause an NL query to be rejected outright. Checked
/// case-insensitively as whole-word matches, plus three punctuation
/// patterns checked as raw substrings.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "EXEC", "GRANT", "REVOKE",
    "UNION",
];
const FORBIDDEN_SUBSTRINGS: &[&str] = &["--", "/*", ";", "or 1=1"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Empty,
    TooLong { len: usize, max: usize },
    ForbiddenToken(String),
}

impl ValidationIssue {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ValidationIssue::Empty => "query must not be empty".to_string(),
            ValidationIssue::TooLong { len, max } => {
                format!("query is {len} characters, exceeding the {max}-character limit")
            }
            ValidationIssue::ForbiddenToken(tok) => {
                format!("query contains a disallowed token: \"{tok}\"")
            }
        }
    }

    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ValidationIssue::Empty => vec!["describe what product or platform you're asking about".to_string()],
            ValidationIssue::TooLong { max, .. } => {
                vec![format!("shorten your query to {max} characters or fewer")]
            }
            ValidationIssue::ForbiddenToken(_) => {
                vec!["rephrase your query in plain language without SQL syntax".to_string()]
            }
        }
    }
}

/// Validates a natural-language query string per spec §6: non-empty,
/// at most 500 characters, free of SQL-injection-shaped tokens.
///
/// # Errors
///
/// Returns the first [`ValidationIssue`] found.
pub fn validate_query_text(query: &str) -> Result<(), ValidationIssue> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ValidationIssue::Empty);
    }
    if trimmed.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationIssue::TooLong {
            len: trimmed.chars().count(),
            max: MAX_QUERY_LEN,
        });
    }

    let upper = trimmed.to_uppercase();
    for keyword in FORBIDDEN_KEYWORDS {
        if contains_word(&upper, keyword) {
            return Err(ValidationIssue::ForbiddenToken((*keyword).to_string()));
        }
    }
    let lower = trimmed.to_lowercase();
    for substr in FORBIDDEN_SUBSTRINGS {
        if lower.contains(substr) {
            return Err(ValidationIssue::ForbiddenToken((*substr).to_string()));
        }
    }
    Ok(())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|tok| tok == word)
}

/// `min_discount` must be in `[0, 100]` per spec §6.
#[must_use]
pub fn validate_discount_percent(value: i32) -> bool {
    (0..=100).contains(&value)
}

/// Clamps a caller-supplied `limit` to `[1, max]`, defaulting to `default`
/// when absent.
#[must_use]
pub fn validate_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_query() {
        assert_eq!(validate_query_text("   "), Err(ValidationIssue::Empty));
    }

    #[test]
    fn rejects_query_over_500_chars() {
        let long = "a".repeat(501);
        assert!(matches!(
            validate_query_text(&long),
            Err(ValidationIssue::TooLong { len: 501, max: 500 })
        ));
    }

    #[test]
    fn rejects_drop_table_injection() {
        let result = validate_query_text("SELECT * FROM users; DROP TABLE products;");
        assert!(matches!(result, Err(ValidationIssue::ForbiddenToken(_))));
    }

    #[test]
    fn accepts_plain_query() {
        assert!(validate_query_text("Which app has cheapest onions right now?").is_ok());
    }

    #[test]
    fn limit_clamps_to_max() {
        assert_eq!(validate_limit(Some(1_000), 50, 100), 100);
        assert_eq!(validate_limit(None, 50, 100), 50);
        assert_eq!(validate_limit(Some(0), 50, 100), 1);
    }

    #[test]
    fn discount_percent_bounds() {
        assert!(validate_discount_percent(0));
        assert!(validate_discount_percent(100));
        assert!(!validate_discount_percent(101));
        assert!(!validate_discount_percent(-1));
    }
}
