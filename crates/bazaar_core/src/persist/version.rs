//! Save-format version tags and the text header that carries them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PersistError;

/// Prefix of the first line of every versioned payload.
pub const HEADER_PREFIX: &str = "Version: ";

/// A `major.minor.patch` save-format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VersionTag {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl VersionTag {
    /// Version assumed for payloads written without a header.
    pub const UNVERSIONED: Self = Self::new(0, 0, 0);

    /// Creates a version tag.
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Renders the header line for this version (without a newline).
    #[must_use]
    pub fn header(self) -> String {
        format!("{HEADER_PREFIX}{self}")
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionTag {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PersistError::InvalidVersion(s.to_string());

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, PersistError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<u32>()
                .map_err(|_| invalid())
        };

        let tag = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(tag)
    }
}

/// Splits a payload into its version and body.
///
/// A payload whose first line doesn't start with [`HEADER_PREFIX`] is
/// treated as unversioned and returned whole.
///
/// # Errors
///
/// Returns `InvalidVersion` if a header is present but malformed.
pub fn split_header(text: &str) -> Result<(VersionTag, &str), PersistError> {
    let (first, rest) = match text.split_once('\n') {
        Some((first, rest)) => (first.trim_end_matches('\r'), rest),
        None => (text, ""),
    };

    match first.strip_prefix(HEADER_PREFIX) {
        Some(raw) => Ok((raw.parse()?, rest)),
        None => Ok((VersionTag::UNVERSIONED, text)),
    }
}
