//! Session entities.
//!
//! [`SessionModel`] is the base capability set every session exposes.
//! [`BaseSession`] is the plain variant; [`GribSession`] layers the GRIB
//! viewer state over the same identity.  The store keeps either behind the
//! tagged [`StoredSession`] enum, and [`SessionKind`] lets the resolver
//! create and bind a specific variant without unchecked casts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use wi_domain::SessionVariant;

use crate::token::SessionToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capabilities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Base capability set shared by every session variant.
pub trait SessionModel: Send + Sync + 'static {
    fn id(&self) -> SessionToken;
    fn variant(&self) -> SessionVariant;
    fn created_at(&self) -> DateTime<Utc>;
}

/// A concrete variant the resolver can create and bind.
pub trait SessionKind: SessionModel + Sized {
    const VARIANT: SessionVariant;

    /// A fresh, empty session under `id`.
    fn create(id: SessionToken) -> Self;

    /// Bind a stored session to this variant.  `None` when the stored
    /// session is a different variant.
    fn from_stored(stored: &StoredSession) -> Option<Arc<Self>>;

    fn into_stored(this: Arc<Self>) -> StoredSession;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Base session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plain session: identity plus free-form attributes.
#[derive(Debug)]
pub struct BaseSession {
    id: SessionToken,
    created_at: DateTime<Utc>,
    attributes: RwLock<HashMap<String, serde_json::Value>>,
}

impl BaseSession {
    pub fn new(id: SessionToken) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.read().get(key).cloned()
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.attributes.write().insert(key.into(), value)
    }

    pub fn remove_attribute(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.write().remove(key)
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> HashMap<String, serde_json::Value> {
        self.attributes.read().clone()
    }
}

impl SessionModel for BaseSession {
    fn id(&self) -> SessionToken {
        self.id
    }

    fn variant(&self) -> SessionVariant {
        SessionVariant::Base
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl SessionKind for BaseSession {
    const VARIANT: SessionVariant = SessionVariant::Base;

    fn create(id: SessionToken) -> Self {
        Self::new(id)
    }

    fn from_stored(stored: &StoredSession) -> Option<Arc<Self>> {
        match stored {
            StoredSession::Base(s) => Some(s.clone()),
            StoredSession::Grib(_) => None,
        }
    }

    fn into_stored(this: Arc<Self>) -> StoredSession {
        StoredSession::Base(this)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GRIB session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a GRIB viewer currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GribView {
    /// Selected weather layers, in draw order.
    pub layers: Vec<String>,
    pub legend_visible: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for GribView {
    fn default() -> Self {
        Self {
            layers: vec!["wind".into()],
            legend_visible: true,
            updated_at: Utc::now(),
        }
    }
}

/// GRIB viewer session: the base capabilities plus viewer state.
#[derive(Debug)]
pub struct GribSession {
    base: BaseSession,
    view: RwLock<GribView>,
}

impl GribSession {
    pub fn new(id: SessionToken) -> Self {
        Self {
            base: BaseSession::new(id),
            view: RwLock::new(GribView::default()),
        }
    }

    /// The base capabilities (attributes) of this session.
    pub fn base(&self) -> &BaseSession {
        &self.base
    }

    pub fn view(&self) -> GribView {
        self.view.read().clone()
    }

    /// Replace the selected layers, dropping duplicates while keeping order.
    pub fn select_layers(&self, layers: Vec<String>) -> GribView {
        let mut deduped: Vec<String> = Vec::with_capacity(layers.len());
        for layer in layers {
            if !deduped.contains(&layer) {
                deduped.push(layer);
            }
        }
        let mut view = self.view.write();
        view.layers = deduped;
        view.updated_at = Utc::now();
        view.clone()
    }

    pub fn set_legend_visible(&self, visible: bool) -> GribView {
        let mut view = self.view.write();
        view.legend_visible = visible;
        view.updated_at = Utc::now();
        view.clone()
    }
}

impl SessionModel for GribSession {
    fn id(&self) -> SessionToken {
        self.base.id
    }

    fn variant(&self) -> SessionVariant {
        SessionVariant::Grib
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at
    }
}

impl SessionKind for GribSession {
    const VARIANT: SessionVariant = SessionVariant::Grib;

    fn create(id: SessionToken) -> Self {
        Self::new(id)
    }

    fn from_stored(stored: &StoredSession) -> Option<Arc<Self>> {
        match stored {
            StoredSession::Grib(s) => Some(s.clone()),
            StoredSession::Base(_) => None,
        }
    }

    fn into_stored(this: Arc<Self>) -> StoredSession {
        StoredSession::Grib(this)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stored form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A session as held by the store: a shared handle tagged with its variant.
#[derive(Debug, Clone)]
pub enum StoredSession {
    Base(Arc<BaseSession>),
    Grib(Arc<GribSession>),
}

impl StoredSession {
    /// Create a fresh session of the given variant.
    pub fn create(variant: SessionVariant, id: SessionToken) -> Self {
        match variant {
            SessionVariant::Base => Self::Base(Arc::new(BaseSession::new(id))),
            SessionVariant::Grib => Self::Grib(Arc::new(GribSession::new(id))),
        }
    }

    /// Variant-agnostic view of the base capabilities.
    pub fn model(&self) -> &dyn SessionModel {
        match self {
            Self::Base(s) => s.as_ref() as &dyn SessionModel,
            Self::Grib(s) => s.as_ref() as &dyn SessionModel,
        }
    }

    /// Base attributes, whichever the variant.
    pub fn base(&self) -> &BaseSession {
        match self {
            Self::Base(s) => s.as_ref(),
            Self::Grib(s) => s.base(),
        }
    }

    pub fn id(&self) -> SessionToken {
        self.model().id()
    }

    pub fn variant(&self) -> SessionVariant {
        self.model().variant()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.model().created_at()
    }

    /// True if both handles point at the same session instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Base(a), Self::Base(b)) => Arc::ptr_eq(a, b),
            (Self::Grib(a), Self::Grib(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
