use crate::variant::SessionVariant;

/// Shared error type used across all webioc crates.
///
/// Malformed and unknown session tokens have no variant here: both mean
/// "no session yet" and lead to creation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A session looked up by token is not (or no longer) in the store.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The session store cannot serve requests (e.g. closed at shutdown).
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// A session exists under the token but was created for another variant.
    #[error("session {token} is a {found} session, expected {expected}")]
    VariantMismatch {
        token: String,
        expected: SessionVariant,
        found: SessionVariant,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
