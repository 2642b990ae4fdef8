//! Session token codec.
//!
//! A token is a random 128-bit value rendered as a hyphenated lowercase
//! UUID.  Parsing accepts exactly what [`SessionToken::generate`] can
//! produce (lowercase hyphenated, version 4, RFC 4122 variant); anything
//! else is "no token", never an error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::{Uuid, Variant};

/// Opaque client-held identifier naming a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Mint a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a raw cookie value.  Returns `None` for absent, empty or
    /// malformed input.  Never touches the store.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        // RFC 6265 allows the value to be wrapped in double quotes.
        let raw = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw);
        // Lowercase hyphenated form only: exactly what `Display` produces.
        if raw.len() != 36 || raw.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let uuid = Uuid::try_parse(raw).ok()?;
        if uuid.get_version_num() != 4 || uuid.get_variant() != Variant::RFC4122 {
            return None;
        }
        Some(Self(uuid))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    /// Canonical textual form, used as the outbound cookie value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Malformed token text.  Only surfaced through `FromStr`; resolution goes
/// through [`SessionToken::parse`] which folds this into `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedToken;

impl fmt::Display for MalformedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed session token")
    }
}

impl std::error::Error for MalformedToken {}

impl FromStr for SessionToken {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(Some(s)).ok_or(MalformedToken)
    }
}
