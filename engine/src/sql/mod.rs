//! SQL rendering for the hot and cold stores
//!
//! `insert` builds the bulk inserts the hot cache flushes; `migration` builds
//! the count/copy/delete statements the migrators run.

pub mod insert;
pub mod migration;

pub use insert::BatchSqlBuilder;

use chrono::{DateTime, Utc};
use strata_shared::utils::time::format_datetime64;

/// Quote a string literal.
///
/// Backslashes are escaped before quotes so an input ending in `\` cannot
/// swallow the escape added for a following quote. `?` is written as a hex
/// escape because the HTTP client treats a bare `?` as a bind placeholder.
pub fn quote_str(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('?', "\\x3F");
    format!("'{}'", escaped)
}

/// `DateTime64(3)` literal pinned to UTC.
pub fn datetime_literal(dt: &DateTime<Utc>) -> String {
    format!("toDateTime64({}, 3, 'UTC')", quote_str(&format_datetime64(dt)))
}

/// Plain identifier check for database and table names taken from config.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote_str("BTCUSDT"), "'BTCUSDT'");
    }

    #[test]
    fn test_quote_escapes_backslash_before_quote() {
        // A trailing backslash must not turn the closing quote into an escape.
        assert_eq!(quote_str(r"a\"), r"'a\\'");
        assert_eq!(quote_str("it's"), r"'it\'s'");
        assert_eq!(quote_str(r"\'"), r"'\\\''");
    }

    #[test]
    fn test_quote_hides_placeholder() {
        assert_eq!(quote_str("what?"), r"'what\x3F'");
    }

    #[test]
    fn test_datetime_literal() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            datetime_literal(&dt),
            "toDateTime64('2024-01-02 03:04:05.000', 3, 'UTC')"
        );
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("market_cold"));
        assert!(is_identifier("_tmp2"));
        assert!(!is_identifier("2cold"));
        assert!(!is_identifier("cold.db"));
        assert!(!is_identifier(""));
    }
}
