//! Session cookie parsing and `Set-Cookie` rendering.

use std::fmt;

use serde::Serialize;

use crate::token::SessionToken;

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

/// Cookie naming, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
}

impl CookieSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Outbound session cookie instruction.
///
/// Produced by the resolver when it creates a session; written to the
/// response by whichever binder owns the interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Shared caches may store a response carrying this cookie.
    pub shareable: bool,
    pub path: String,
}

impl SessionCookie {
    /// The session cookie for `token`, with the fixed attribute set.
    /// Only `Secure` varies, mirroring the inbound transport.
    pub fn for_token(settings: &CookieSettings, token: SessionToken, secure: bool) -> Self {
        Self {
            name: settings.name.clone(),
            value: token.to_string(),
            secure,
            http_only: true,
            same_site: SameSite::Strict,
            shareable: false,
            path: "/".into(),
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out.push_str("; SameSite=");
        out.push_str(&self.same_site.to_string());
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

/// Find the value of the cookie called `name` in a `Cookie` request header
/// (`a=1; sid=...; b=2`).  The first occurrence wins.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}
