#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the zero-padded decimal version strings.
pub const PAD_LEN: usize = 19;

/// Left-pad `value` with zeros to `width` digits. Values wider than `width`
/// are returned unpadded.
pub fn padded_int(width: usize, value: u64) -> String {
    format!("{value:0>width$}")
}

/// Version identifier of a stored secret.
///
/// Numeric versions are always kept in their padded form so that the derived
/// lexicographic ordering matches numeric ordering. Arbitrary strings are kept
/// verbatim; they sort lexicographically and cannot be auto-incremented.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Version(String);

impl Version {
    /// Numeric version rendered at [`PAD_LEN`] width.
    pub fn padded(value: u64) -> Self {
        Self(padded_int(PAD_LEN, value))
    }

    /// Version assigned when a caller does not supply one.
    pub fn initial() -> Self {
        Self::padded(1)
    }

    /// Version reported for a secret with no stored versions.
    pub fn zero() -> Self {
        Self::padded(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse the version as a base-10 integer.
    pub fn as_int(&self) -> Option<u64> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }

    /// Numeric versions re-rendered at [`PAD_LEN`] width, anything else as-is.
    pub fn normalized(self) -> Self {
        match self.as_int() {
            Some(value) => Self::padded(value),
            None => self,
        }
    }

    /// Padded successor of a numeric version.
    pub fn next(&self) -> Option<Self> {
        self.as_int()
            .and_then(|value| value.checked_add(1))
            .map(Self::padded)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self::padded(value)
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_fixed_width() {
        assert_eq!(Version::padded(1).as_str(), "0000000000000000001");
        assert_eq!(Version::initial(), Version::from(1));
        assert_eq!(padded_int(4, 12345), "12345");
    }

    #[test]
    fn lexicographic_order_matches_numeric_order() {
        let mut versions: Vec<Version> = [10u64, 2, 9, 100, 1]
            .into_iter()
            .map(Version::from)
            .collect();
        versions.sort();
        let ints: Vec<u64> = versions.iter().filter_map(Version::as_int).collect();
        assert_eq!(ints, vec![1, 2, 9, 10, 100]);
    }

    #[test]
    fn non_numeric_versions_are_kept_verbatim() {
        let version = Version::from("hello world");
        assert_eq!(version.as_str(), "hello world");
        assert_eq!(version.as_int(), None);
        assert_eq!(version.next(), None);
        assert_eq!(Version::from("-1").as_int(), None);
    }

    #[test]
    fn next_increments_numeric_versions() {
        assert_eq!(Version::zero().next(), Some(Version::padded(1)));
        assert_eq!(
            Version::from("0000000000000000041").next(),
            Some(Version::padded(42))
        );
        assert_eq!(Version::padded(u64::MAX).next(), None);
    }

    #[test]
    fn normalized_pads_numeric_strings_only() {
        assert_eq!(Version::from("6").normalized(), Version::padded(6));
        assert_eq!(Version::from("v2").normalized().as_str(), "v2");
    }
}
