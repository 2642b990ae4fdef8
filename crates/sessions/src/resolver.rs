//! Resolve-or-create: turn an inbound cookie value into a session.
//!
//! Resolution is two-phase: [`SessionResolver::resolve`] returns the
//! session *and* an optional [`SessionCookie`] instruction.  Writing the
//! cookie is left to the binder that owns the response, so the side effect
//! stays visible.

use std::sync::Arc;

use wi_domain::error::{Error, Result};
use wi_domain::trace::TraceEvent;
use wi_domain::SessionVariant;

use crate::cookie::{find_cookie, CookieSettings, SessionCookie};
use crate::model::{SessionKind, StoredSession};
use crate::store::SessionStore;
use crate::token::SessionToken;

/// Outcome of a resolution.
#[derive(Debug, Clone)]
pub struct Resolution<S> {
    pub session: S,
    /// Present only when a new session was created.
    pub set_cookie: Option<SessionCookie>,
}

impl<S> Resolution<S> {
    pub fn is_new(&self) -> bool {
        self.set_cookie.is_some()
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Resolution<T> {
        Resolution {
            session: f(self.session),
            set_cookie: self.set_cookie,
        }
    }
}

enum Lookup {
    Found(StoredSession),
    /// `presented` is true when a well-formed token was sent but the store
    /// does not know it (e.g. a cookie from before a restart).
    Absent { presented: bool },
}

/// Resolves inbound cookie values against the shared store.
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    cookie: CookieSettings,
    default_variant: SessionVariant,
}

impl SessionResolver {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cookie: CookieSettings,
        default_variant: SessionVariant,
    ) -> Self {
        Self {
            store,
            cookie,
            default_variant,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    /// Pick the session cookie's raw value out of a `Cookie` header.
    pub fn cookie_value<'a>(&self, cookie_header: Option<&'a str>) -> Option<&'a str> {
        cookie_header.and_then(|h| find_cookie(h, &self.cookie.name))
    }

    /// Resolve the session for `raw_cookie_value`, creating a `V` if the
    /// value is absent, malformed or unknown.
    ///
    /// `secure` tells whether the inbound interaction arrived over a secure
    /// transport; it becomes the cookie's `Secure` attribute.
    pub fn resolve<V: SessionKind>(
        &self,
        raw_cookie_value: Option<&str>,
        secure: bool,
    ) -> Result<Resolution<Arc<V>>> {
        match self.lookup(raw_cookie_value)? {
            Lookup::Found(stored) => {
                let session = self.bind::<V>(&stored)?;
                emit_resolved(&stored, false);
                Ok(Resolution {
                    session,
                    set_cookie: None,
                })
            }
            Lookup::Absent { presented } => {
                let fresh = V::into_stored(Arc::new(V::create(SessionToken::generate())));
                let (stored, set_cookie) = self.create(fresh, presented, secure)?;
                let session = self.bind::<V>(&stored)?;
                Ok(Resolution {
                    session,
                    set_cookie: Some(set_cookie),
                })
            }
        }
    }

    /// Variant-agnostic resolution for consumers that only need the base
    /// capabilities.  New sessions use the configured default variant.
    pub fn resolve_any(
        &self,
        raw_cookie_value: Option<&str>,
        secure: bool,
    ) -> Result<Resolution<StoredSession>> {
        match self.lookup(raw_cookie_value)? {
            Lookup::Found(stored) => {
                emit_resolved(&stored, false);
                Ok(Resolution {
                    session: stored,
                    set_cookie: None,
                })
            }
            Lookup::Absent { presented } => {
                let fresh = StoredSession::create(self.default_variant, SessionToken::generate());
                let (stored, set_cookie) = self.create(fresh, presented, secure)?;
                Ok(Resolution {
                    session: stored,
                    set_cookie: Some(set_cookie),
                })
            }
        }
    }

    fn lookup(&self, raw_cookie_value: Option<&str>) -> Result<Lookup> {
        let Some(token) = SessionToken::parse(raw_cookie_value) else {
            return Ok(Lookup::Absent { presented: false });
        };
        if !self.store.contains(&token)? {
            return Ok(Lookup::Absent { presented: true });
        }
        match self.store.get(&token) {
            Ok(stored) => Ok(Lookup::Found(stored)),
            // Removed between `contains` and `get` (idle expiry).
            Err(Error::NotFound(_)) => Ok(Lookup::Absent { presented: true }),
            Err(e) => Err(e),
        }
    }

    fn bind<V: SessionKind>(&self, stored: &StoredSession) -> Result<Arc<V>> {
        V::from_stored(stored).ok_or_else(|| {
            TraceEvent::VariantMismatch {
                session_id: stored.id().to_string(),
                expected: V::VARIANT,
                found: stored.variant(),
            }
            .emit();
            Error::VariantMismatch {
                token: stored.id().to_string(),
                expected: V::VARIANT,
                found: stored.variant(),
            }
        })
    }

    /// Store `fresh` and build the cookie for whichever instance became
    /// canonical under its token.
    fn create(
        &self,
        fresh: StoredSession,
        replaced_unknown: bool,
        secure: bool,
    ) -> Result<(StoredSession, SessionCookie)> {
        let (stored, inserted) = self.store.get_or_insert(fresh)?;
        if inserted {
            TraceEvent::SessionCreated {
                session_id: stored.id().to_string(),
                variant: stored.variant(),
                replaced_unknown,
            }
            .emit();
        }
        emit_resolved(&stored, true);
        let cookie = SessionCookie::for_token(&self.cookie, stored.id(), secure);
        Ok((stored, cookie))
    }
}

fn emit_resolved(stored: &StoredSession, is_new: bool) {
    TraceEvent::SessionResolved {
        session_id: stored.id().to_string(),
        variant: stored.variant(),
        is_new,
    }
    .emit();
}
