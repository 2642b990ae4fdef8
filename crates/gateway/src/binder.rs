//! Scoped session binding.
//!
//! - **Per request** (web pages, JSON API): [`session_scope`] opens a
//!   [`RequestScope`] for each request.  The first [`Session`] or
//!   [`AnySession`] extractor resolves the session and caches it there, so
//!   every extractor in the same request sees the same `Arc`.  On the way
//!   out the middleware writes the pending `Set-Cookie`, if any.
//! - **Per connection** (hub): [`resolve_handshake`] runs once on the
//!   WebSocket upgrade; the hub keeps the result for the whole connection.
//! - **Singletons** (store, resolver, legend service, hub registry) live in
//!   [`AppState`] and are shared by every scope.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::header::{CACHE_CONTROL, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request, Uri};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;

use wi_sessions::{Resolution, SessionCookie, SessionKind, StoredSession};

use crate::error::ApiError;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether the inbound interaction arrived over a secure transport.
pub fn is_secure(uri: &Uri, headers: &HeaderMap, trust_forwarded_proto: bool) -> bool {
    if matches!(uri.scheme_str(), Some("https") | Some("wss")) {
        return true;
    }
    trust_forwarded_proto
        && headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// All `Cookie` headers joined into one (HTTP/2 may split them).
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Write a session cookie instruction onto a response.
pub fn apply_cookie(headers: &mut HeaderMap, cookie: &SessionCookie) {
    match HeaderValue::from_str(&cookie.to_header_value()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
            if !cookie.shareable {
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache=\"Set-Cookie\""));
            }
        }
        Err(e) => tracing::warn!(error = %e, cookie = %cookie.name, "unencodable session cookie"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-request scope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct ScopeState {
    session: Option<StoredSession>,
    set_cookie: Option<SessionCookie>,
}

/// The session cached for one request.
#[derive(Clone, Default)]
pub struct RequestScope {
    inner: Arc<Mutex<ScopeState>>,
}

impl RequestScope {
    /// Return the cached session, resolving it with `resolve` on first use.
    ///
    /// The scope lock is held while resolving so two extractors in one
    /// request never create two sessions.
    fn get_or_resolve(
        &self,
        resolve: impl FnOnce() -> Result<Resolution<StoredSession>, ApiError>,
    ) -> Result<StoredSession, ApiError> {
        let mut scope = self.inner.lock();
        if let Some(session) = &scope.session {
            return Ok(session.clone());
        }
        let resolution = resolve()?;
        scope.session = Some(resolution.session.clone());
        scope.set_cookie = resolution.set_cookie;
        Ok(resolution.session)
    }

    fn take_cookie(&self) -> Option<SessionCookie> {
        self.inner.lock().set_cookie.take()
    }
}

/// Middleware opening a [`RequestScope`] and emitting its pending cookie.
/// Attach with `axum::middleware::from_fn`.
pub async fn session_scope(mut req: Request<Body>, next: Next) -> Response {
    let scope = RequestScope::default();
    req.extensions_mut().insert(scope.clone());

    let mut response = next.run(req).await;

    if let Some(cookie) = scope.take_cookie() {
        apply_cookie(response.headers_mut(), &cookie);
    }
    response
}

fn request_scope(parts: &Parts) -> Result<RequestScope, ApiError> {
    parts
        .extensions
        .get::<RequestScope>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("session scope middleware not installed".into()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extractors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The request's session bound to variant `V`.
pub struct Session<V>(pub Arc<V>);

/// The request's session with only the base capabilities.
pub struct AnySession(pub StoredSession);

#[async_trait]
impl<V: SessionKind> FromRequestParts<AppState> for Session<V> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let scope = request_scope(parts)?;
        let stored = scope.get_or_resolve(|| {
            let header = cookie_header(&parts.headers);
            let raw = state.resolver.cookie_value(header.as_deref());
            let secure = is_secure(&parts.uri, &parts.headers, state.config.server.trust_forwarded_proto);
            let resolution = state.resolver.resolve::<V>(raw, secure)?;
            Ok(resolution.map(V::into_stored))
        })?;
        // A cached session may have been resolved for another variant by an
        // earlier extractor in this request.
        let session = V::from_stored(&stored).ok_or_else(|| wi_domain::Error::VariantMismatch {
            token: stored.id().to_string(),
            expected: V::VARIANT,
            found: stored.variant(),
        })?;
        Ok(Session(session))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AnySession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let scope = request_scope(parts)?;
        let stored = scope.get_or_resolve(|| {
            let header = cookie_header(&parts.headers);
            let raw = state.resolver.cookie_value(header.as_deref());
            let secure = is_secure(&parts.uri, &parts.headers, state.config.server.trust_forwarded_proto);
            Ok(state.resolver.resolve_any(raw, secure)?)
        })?;
        Ok(AnySession(stored))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-connection binding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the session for a connection from its handshake request.
/// Called once per connection; the caller keeps the result for the
/// connection's lifetime and attaches any cookie to the upgrade response.
pub fn resolve_handshake<V: SessionKind>(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Resolution<Arc<V>>, ApiError> {
    let header = cookie_header(headers);
    let raw = state.resolver.cookie_value(header.as_deref());
    let secure = is_secure(uri, headers, state.config.server.trust_forwarded_proto);
    Ok(state.resolver.resolve::<V>(raw, secure)?)
}
