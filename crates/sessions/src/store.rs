//! Process-wide session store.
//!
//! The store is the only owner of live sessions; requests and connections
//! hold `Arc` handles for the duration of their scope.  It is injected as an
//! `Arc<dyn SessionStore>` from the process root, never reached through a
//! static.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use wi_domain::error::{Error, Result};
use wi_domain::SessionVariant;

use crate::model::StoredSession;
use crate::token::SessionToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concurrent token → session mapping.
///
/// All operations on one token are linearizable: a completed `set` is
/// visible to every `get` that starts after it, and no reader ever sees a
/// partially written entry.  The store is variant-agnostic.
pub trait SessionStore: Send + Sync {
    /// True iff a session with this token currently exists.
    fn contains(&self, token: &SessionToken) -> Result<bool>;

    /// The canonical instance for `token`, or `Error::NotFound`.
    fn get(&self, token: &SessionToken) -> Result<StoredSession>;

    /// Insert or overwrite the entry keyed by the session's id.
    fn set(&self, session: StoredSession) -> Result<()>;

    /// Insert `session` unless its id is already present.  Returns the
    /// canonical instance and whether `session` was the one inserted.
    fn get_or_insert(&self, session: StoredSession) -> Result<(StoredSession, bool)>;

    fn remove(&self, token: &SessionToken) -> Result<Option<StoredSession>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn list(&self) -> Result<Vec<SessionSummary>>;

    /// Evict sessions not accessed within `max_idle`.  Tokens for which
    /// `pinned` returns true are kept and marked as accessed now.  Returns
    /// the number removed.
    fn prune_idle(&self, max_idle: Duration, pinned: &dyn Fn(&SessionToken) -> bool)
        -> Result<usize>;

    /// Stop serving.  Every later call fails with `StoreUnavailable`.
    fn close(&self);
}

/// Introspection view of a stored session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionToken,
    pub variant: SessionVariant,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Entries evicted per capacity pass: 1/64 of the bound, at least one.
fn eviction_batch(max_sessions: usize) -> usize {
    (max_sessions / 64).max(1)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Entry {
    session: StoredSession,
    last_seen: Mutex<DateTime<Utc>>,
}

impl Entry {
    fn new(session: StoredSession) -> Self {
        Self {
            session,
            last_seen: Mutex::new(Utc::now()),
        }
    }

    fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock()
    }
}

/// In-memory [`SessionStore`] behind a single `RwLock`.
///
/// Reads share the lock; every mutation takes it exclusively, so the map
/// never exposes a half-applied insert.  The lock is never held across an
/// `.await` (all methods are synchronous).
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, Entry>>,
    max_sessions: Option<usize>,
    closed: AtomicBool,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Store holding at most `max_sessions` sessions.  Inserting a new one
    /// at capacity evicts the least recently accessed sessions, a batch of
    /// 1/64 of the bound at a time.
    pub fn with_capacity(max_sessions: Option<usize>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::StoreUnavailable("session store is closed".into()));
        }
        Ok(())
    }

    /// Make room for one more entry.  Caller holds the write lock.
    ///
    /// Finding the least recently seen entries is an O(n) pass over the
    /// map, so each pass evicts a batch of [`eviction_batch`] entries
    /// rather than one.
    fn evict_for_insert(&self, sessions: &mut HashMap<SessionToken, Entry>) {
        let Some(max) = self.max_sessions else {
            return;
        };
        if sessions.len() < max {
            return;
        }
        let needed = sessions.len() + 1 - max;
        let count = needed.max(eviction_batch(max)).min(sessions.len());
        if count == 0 {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, SessionToken)> = sessions
            .iter()
            .map(|(token, e)| (e.last_seen(), *token))
            .collect();
        if count < by_age.len() {
            by_age.select_nth_unstable(count - 1);
            by_age.truncate(count);
        }
        for (_, token) in &by_age {
            sessions.remove(token);
        }
        tracing::debug!(evicted = by_age.len(), max_sessions = max, "sessions evicted at capacity");
    }

    /// Remove entries last accessed at or before `cutoff`, except pinned
    /// ones, which are refreshed instead.
    fn prune_before(
        &self,
        cutoff: DateTime<Utc>,
        pinned: &dyn Fn(&SessionToken) -> bool,
    ) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|token, e| {
            if pinned(token) {
                *e.last_seen.lock() = now;
                return true;
            }
            e.last_seen() > cutoff
        });
        before - sessions.len()
    }
}

impl SessionStore for MemorySessionStore {
    fn contains(&self, token: &SessionToken) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.sessions.read().contains_key(token))
    }

    fn get(&self, token: &SessionToken) -> Result<StoredSession> {
        self.ensure_open()?;
        let sessions = self.sessions.read();
        let entry = sessions
            .get(token)
            .ok_or_else(|| Error::NotFound(token.to_string()))?;
        *entry.last_seen.lock() = Utc::now();
        Ok(entry.session.clone())
    }

    fn set(&self, session: StoredSession) -> Result<()> {
        self.ensure_open()?;
        let token = session.id();
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(&token) {
            self.evict_for_insert(&mut sessions);
        }
        sessions.insert(token, Entry::new(session));
        Ok(())
    }

    fn get_or_insert(&self, session: StoredSession) -> Result<(StoredSession, bool)> {
        self.ensure_open()?;
        let token = session.id();
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(&token) {
            *existing.last_seen.lock() = Utc::now();
            return Ok((existing.session.clone(), false));
        }
        self.evict_for_insert(&mut sessions);
        sessions.insert(token, Entry::new(session.clone()));
        Ok((session, true))
    }

    fn remove(&self, token: &SessionToken) -> Result<Option<StoredSession>> {
        self.ensure_open()?;
        Ok(self.sessions.write().remove(token).map(|e| e.session))
    }

    fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.sessions.read().len())
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        self.ensure_open()?;
        Ok(self
            .sessions
            .read()
            .values()
            .map(|e| SessionSummary {
                id: e.session.id(),
                variant: e.session.variant(),
                created_at: e.session.created_at(),
                last_seen: e.last_seen(),
            })
            .collect())
    }

    fn prune_idle(
        &self,
        max_idle: Duration,
        pinned: &dyn Fn(&SessionToken) -> bool,
    ) -> Result<usize> {
        self.ensure_open()?;
        let max_idle = chrono::Duration::from_std(max_idle)
            .map_err(|e| Error::Other(format!("idle duration out of range: {e}")))?;
        Ok(self.prune_before(Utc::now() - max_idle, pinned))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(sessions = self.sessions.read().len(), "session store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseSession, SessionKind};
    use std::sync::Arc;

    fn base() -> StoredSession {
        StoredSession::create(SessionVariant::Base, SessionToken::generate())
    }

    #[test]
    fn set_then_get() {
        let store = MemorySessionStore::new();
        let s = base();
        let id = s.id();
        assert!(!store.contains(&id).unwrap());
        store.set(s.clone()).unwrap();
        assert!(store.contains(&id).unwrap());
        assert!(store.get(&id).unwrap().ptr_eq(&s));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store.get(&SessionToken::generate()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn set_overwrites() {
        let store = MemorySessionStore::new();
        let id = SessionToken::generate();
        let first = StoredSession::create(SessionVariant::Base, id);
        let second = StoredSession::create(SessionVariant::Grib, id);
        store.set(first).unwrap();
        store.set(second.clone()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get(&id).unwrap().ptr_eq(&second));
    }

    #[test]
    fn get_or_insert_keeps_first() {
        let store = MemorySessionStore::new();
        let id = SessionToken::generate();
        let first = StoredSession::create(SessionVariant::Base, id);
        let second = StoredSession::create(SessionVariant::Base, id);

        let (canon, inserted) = store.get_or_insert(first.clone()).unwrap();
        assert!(inserted);
        assert!(canon.ptr_eq(&first));

        let (canon, inserted) = store.get_or_insert(second).unwrap();
        assert!(!inserted);
        assert!(canon.ptr_eq(&first));
    }

    #[test]
    fn remove_then_get_is_not_found() {
        let store = MemorySessionStore::new();
        let s = base();
        let id = s.id();
        store.set(s).unwrap();
        assert!(store.remove(&id).unwrap().is_some());
        assert!(store.remove(&id).unwrap().is_none());
        assert!(matches!(store.get(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn capacity_evicts_least_recently_seen() {
        let store = MemorySessionStore::with_capacity(Some(2));
        let a = base();
        let b = base();
        let c = base();
        store.set(a.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.set(b.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // Touch `a` so `b` becomes the oldest.
        store.get(&a.id()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.set(c.clone()).unwrap();

        assert_eq!(store.len().unwrap(), 2);
        assert!(store.contains(&a.id()).unwrap());
        assert!(!store.contains(&b.id()).unwrap());
        assert!(store.contains(&c.id()).unwrap());
    }

    #[test]
    fn capacity_evicts_oldest_batch_at_once() {
        let store = MemorySessionStore::with_capacity(Some(640));
        let oldest: Vec<StoredSession> = (0..10).map(|_| base()).collect();
        for s in &oldest {
            store.set(s.clone()).unwrap();
        }
        std::thread::sleep(Duration::from_millis(5));
        for _ in 0..630 {
            store.set(base()).unwrap();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.len().unwrap(), 640);

        // One insert at capacity frees a batch of 640 / 64 = 10.
        let newest = base();
        store.set(newest.clone()).unwrap();
        assert_eq!(store.len().unwrap(), 631);
        assert!(store.contains(&newest.id()).unwrap());
        for s in &oldest {
            assert!(!store.contains(&s.id()).unwrap());
        }

        // The freed headroom absorbs the next inserts without another pass.
        for _ in 0..9 {
            store.set(base()).unwrap();
        }
        assert_eq!(store.len().unwrap(), 640);
    }

    #[test]
    fn overwrite_at_capacity_does_not_evict() {
        let store = MemorySessionStore::with_capacity(Some(1));
        let s = base();
        store.set(s.clone()).unwrap();
        store.set(s.clone()).unwrap();
        assert!(store.contains(&s.id()).unwrap());
    }

    #[test]
    fn prune_idle_removes_stale_entries() {
        let store = MemorySessionStore::new();
        store.set(base()).unwrap();
        store.set(base()).unwrap();
        assert_eq!(store.prune_idle(Duration::from_secs(3600), &|_: &SessionToken| false).unwrap(), 0);
        assert_eq!(store.prune_idle(Duration::ZERO, &|_: &SessionToken| false).unwrap(), 2);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn prune_idle_keeps_pinned_entries() {
        let store = MemorySessionStore::new();
        let kept = base();
        let dropped = base();
        store.set(kept.clone()).unwrap();
        store.set(dropped.clone()).unwrap();
        let kept_id = kept.id();

        let removed = store
            .prune_idle(Duration::ZERO, &|t: &SessionToken| *t == kept_id)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&kept_id).unwrap().ptr_eq(&kept));
        assert!(!store.contains(&dropped.id()).unwrap());
    }

    #[test]
    fn pinned_entries_are_refreshed() {
        let store = MemorySessionStore::with_capacity(Some(2));
        let pinned = base();
        let other = base();
        store.set(pinned.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.set(other.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let pinned_id = pinned.id();
        store
            .prune_idle(Duration::from_secs(3600), &|t: &SessionToken| *t == pinned_id)
            .unwrap();
        // `other` is now the least recently seen and goes first at capacity.
        store.set(base()).unwrap();
        assert!(store.contains(&pinned_id).unwrap());
        assert!(!store.contains(&other.id()).unwrap());
    }

    #[test]
    fn closed_store_is_unavailable() {
        let store = MemorySessionStore::new();
        let s = base();
        store.set(s.clone()).unwrap();
        store.close();
        assert!(matches!(store.contains(&s.id()), Err(Error::StoreUnavailable(_))));
        assert!(matches!(store.get(&s.id()), Err(Error::StoreUnavailable(_))));
        assert!(matches!(store.set(base()), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn list_reports_variants() {
        let store = MemorySessionStore::new();
        let grib = StoredSession::create(SessionVariant::Grib, SessionToken::generate());
        store.set(grib.clone()).unwrap();
        store
            .set(BaseSession::into_stored(Arc::new(BaseSession::new(SessionToken::generate()))))
            .unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list
            .iter()
            .any(|s| s.id == grib.id() && s.variant == SessionVariant::Grib));
    }
}
