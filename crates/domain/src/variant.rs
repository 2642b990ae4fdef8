use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag naming the concrete shape of a stored session.
///
/// Every variant shares the same token space; consumers ask the resolver
/// for the variant they need and get a `VariantMismatch` if the token names
/// a session of another shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionVariant {
    /// Plain session: identity plus free-form attributes.
    Base,
    /// GRIB viewer session: base capabilities plus layer/legend state.
    #[default]
    Grib,
}

impl SessionVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Grib => "grib",
        }
    }
}

impl fmt::Display for SessionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
