//! Migration version numbers.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered identifier of a migration unit.
///
/// Versions are totally ordered and define application order. They display
/// zero-padded (`v003`) and parse from plain integers, zero-padded sequence
/// prefixes (`003`, `004_add_blog_features`) or the displayed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u32);

impl Version {
    /// Create a version from its number.
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// Return the version number.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Ledger representation (`BIGINT` / `INTEGER`).
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl From<u32> for Version {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

impl TryFrom<i64> for Version {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Version)
            .map_err(|_| CoreError::InvalidVersion {
                input: value.to_string(),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03}", self.0)
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let digits_end = body
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(body.len());
        let (digits, rest) = body.split_at(digits_end);
        // A sequence prefix must be followed by a separator, not more text.
        let rest_ok = rest.is_empty() || rest.starts_with(['_', '-', '.']);
        if digits.is_empty() || !rest_ok {
            return Err(CoreError::InvalidVersion {
                input: s.to_string(),
            });
        }
        digits
            .parse::<u32>()
            .map(Version)
            .map_err(|_| CoreError::InvalidVersion {
                input: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(Version::new(3).to_string(), "v003");
        assert_eq!(Version::new(1234).to_string(), "v1234");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("3".parse::<Version>().unwrap(), Version::new(3));
        assert_eq!("003".parse::<Version>().unwrap(), Version::new(3));
        assert_eq!("v012".parse::<Version>().unwrap(), Version::new(12));
        assert_eq!(
            "004_add_blog_features".parse::<Version>().unwrap(),
            Version::new(4)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("abc".parse::<Version>().is_err());
        assert!("12abc".parse::<Version>().is_err());
        assert!("-1".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut versions = vec![Version::new(10), Version::new(2), Version::new(1)];
        versions.sort();
        assert_eq!(
            versions,
            vec![Version::new(1), Version::new(2), Version::new(10)]
        );
    }

    #[test]
    fn test_try_from_i64() {
        assert_eq!(Version::try_from(7_i64).unwrap(), Version::new(7));
        assert!(Version::try_from(-1_i64).is_err());
        assert!(Version::try_from(i64::MAX).is_err());
    }
}
