//! Per-run artifact tokens.
//!
//! A token is the UTC time with millisecond precision followed by eight hex
//! digits of randomness, e.g. `20240501T120000123_9f3a01bc`. Tokens sort by
//! creation time and concurrent runs in the same millisecond do not collide.

use std::fmt;

use chrono::{DateTime, Utc};

/// Unique prefix shared by all files of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunToken(String);

impl RunToken {
    /// Creates a token for the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_parts(Utc::now(), rand::random::<u32>())
    }

    /// Creates a token from an explicit time and random suffix.
    #[must_use]
    pub fn from_parts(time: DateTime<Utc>, suffix: u32) -> Self {
        Self(format!("{}_{suffix:08x}", time.format("%Y%m%dT%H%M%S%3f")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_format() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 4).unwrap()
            + chrono::Duration::milliseconds(56);
        let token = RunToken::from_parts(time, 0xab);
        assert_eq!(token.as_str(), "20240501T120304056_000000ab");
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let tokens: HashSet<_> = (0..256).map(|_| RunToken::generate()).collect();
        assert_eq!(tokens.len(), 256);
        let sample = RunToken::generate();
        let (time, suffix) = sample.as_str().split_once('_').unwrap();
        assert_eq!(time.len(), 18);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn prop_tokens_sort_by_time(
            a in 0_i64..4_000_000_000_000,
            b in 0_i64..4_000_000_000_000,
            sa: u32,
            sb: u32,
        ) {
            prop_assume!(a != b);
            let ta = RunToken::from_parts(chrono::DateTime::from_timestamp_millis(a).unwrap(), sa);
            let tb = RunToken::from_parts(chrono::DateTime::from_timestamp_millis(b).unwrap(), sb);
            prop_assert_eq!(a < b, ta < tb);
        }
    }
}
