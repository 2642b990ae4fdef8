use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Barrier;

use wi_domain::SessionVariant;
use wi_sessions::{
    CookieSettings, GribSession, MemorySessionStore, SessionModel, SessionResolver, SessionStore,
    SessionToken, StoredSession,
};

const K: usize = 128;

fn resolver() -> Arc<SessionResolver> {
    Arc::new(SessionResolver::new(
        Arc::new(MemorySessionStore::new()),
        CookieSettings::new("sid"),
        SessionVariant::Grib,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_tokenless_resolves_create_distinct_sessions() {
    let resolver = resolver();
    let barrier = Arc::new(Barrier::new(K));

    let mut handles = Vec::with_capacity(K);
    for _ in 0..K {
        let resolver = resolver.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            resolver.resolve::<GribSession>(None, false).unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for h in handles {
        let res = h.await.unwrap();
        assert!(res.is_new());
        ids.insert(res.session.id());
    }

    assert_eq!(ids.len(), K);
    assert_eq!(resolver.store().len().unwrap(), K);
    for id in &ids {
        let stored = resolver.store().get(id).unwrap();
        assert_eq!(stored.id(), *id);
        assert_eq!(stored.variant(), SessionVariant::Grib);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creation_under_one_token_converges() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let token = SessionToken::generate();
    let barrier = Arc::new(Barrier::new(K));

    let mut handles = Vec::with_capacity(K);
    for _ in 0..K {
        let store = store.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let candidate = StoredSession::create(SessionVariant::Grib, token);
            store.get_or_insert(candidate).unwrap()
        }));
    }

    let mut results = Vec::with_capacity(K);
    for h in handles {
        results.push(h.await.unwrap());
    }

    assert_eq!(results.iter().filter(|(_, inserted)| *inserted).count(), 1);
    assert_eq!(store.len().unwrap(), 1);

    let canonical = store.get(&token).unwrap();
    for (seen, _) in &results {
        assert!(seen.ptr_eq(&canonical));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_overwrites_leave_one_consistent_value() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let token = SessionToken::generate();
    let barrier = Arc::new(Barrier::new(K));

    let mut handles = Vec::with_capacity(K);
    for i in 0..K {
        let store = store.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let variant = if i % 2 == 0 {
                SessionVariant::Base
            } else {
                SessionVariant::Grib
            };
            store.set(StoredSession::create(variant, token)).unwrap();
            // Every read sees a whole entry for this token.
            let seen = store.get(&token).unwrap();
            assert_eq!(seen.id(), token);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.len().unwrap(), 1);
    let first = store.get(&token).unwrap();
    for _ in 0..K {
        assert!(store.get(&token).unwrap().ptr_eq(&first));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_resolves_of_known_token_share_instance() {
    let resolver = resolver();
    let created = resolver.resolve::<GribSession>(None, false).unwrap();
    let token = created.session.id().to_string();

    let mut handles = Vec::with_capacity(K);
    for _ in 0..K {
        let resolver = resolver.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            resolver.resolve::<GribSession>(Some(&token), false).unwrap()
        }));
    }
    for h in handles {
        let res = h.await.unwrap();
        assert!(Arc::ptr_eq(&res.session, &created.session));
        assert!(res.set_cookie.is_none());
    }
    assert_eq!(resolver.store().len().unwrap(), 1);
}
