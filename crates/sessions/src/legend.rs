//! Map legend service.
//!
//! A process-wide service that reads the store directly (existence and
//! variant inspection, no variant binding) to describe what a client's map
//! legend should show.  Safe to call from any number of concurrent scopes.

use std::sync::Arc;

use serde::Serialize;

use wi_domain::error::{Error, Result};

use crate::model::{GribView, StoredSession};
use crate::store::SessionStore;
use crate::token::SessionToken;

/// A weather layer the viewer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f32,
    pub max: f32,
    /// Colour ramp stops, low to high.
    pub palette: &'static [&'static str],
}

const LAYERS: &[LayerSpec] = &[
    LayerSpec {
        name: "wind",
        unit: "kn",
        min: 0.0,
        max: 60.0,
        palette: &["#f7fbff", "#6baed6", "#08306b"],
    },
    LayerSpec {
        name: "gust",
        unit: "kn",
        min: 0.0,
        max: 80.0,
        palette: &["#fff5eb", "#fd8d3c", "#7f2704"],
    },
    LayerSpec {
        name: "pressure",
        unit: "hPa",
        min: 950.0,
        max: 1050.0,
        palette: &["#542788", "#f7f7f7", "#b35806"],
    },
    LayerSpec {
        name: "temperature",
        unit: "°C",
        min: -40.0,
        max: 45.0,
        palette: &["#313695", "#ffffbf", "#a50026"],
    },
    LayerSpec {
        name: "precipitation",
        unit: "mm/h",
        min: 0.0,
        max: 30.0,
        palette: &["#ffffff", "#41b6c4", "#253494"],
    },
    LayerSpec {
        name: "waves",
        unit: "m",
        min: 0.0,
        max: 12.0,
        palette: &["#edf8fb", "#8c96c6", "#6e016b"],
    },
    LayerSpec {
        name: "cloud",
        unit: "%",
        min: 0.0,
        max: 100.0,
        palette: &["#ffffff", "#969696", "#252525"],
    },
];

/// Look up a layer by name.
pub fn layer(name: &str) -> Option<&'static LayerSpec> {
    LAYERS.iter().find(|l| l.name == name)
}

pub fn layers() -> &'static [LayerSpec] {
    LAYERS
}

/// Names in `selection` missing from the catalogue, in order.
pub fn unknown_layers(selection: &[String]) -> Vec<&str> {
    selection
        .iter()
        .map(String::as_str)
        .filter(|name| layer(name).is_none())
        .collect()
}

/// What a client's legend panel should render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    /// `None` when the token names no live session.
    pub session_id: Option<SessionToken>,
    pub visible: bool,
    pub entries: Vec<LayerSpec>,
    /// Selected layer names the catalogue does not know.
    pub unknown: Vec<String>,
}

impl Legend {
    fn from_view(session_id: Option<SessionToken>, view: &GribView) -> Self {
        let mut entries = Vec::new();
        let mut unknown = Vec::new();
        for name in &view.layers {
            match layer(name) {
                Some(spec) => entries.push(*spec),
                None => unknown.push(name.clone()),
            }
        }
        Self {
            session_id,
            visible: view.legend_visible,
            entries,
            unknown,
        }
    }
}

/// Singleton legend service over the shared store.
pub struct LegendService {
    store: Arc<dyn SessionStore>,
}

impl LegendService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Legend for the session named by `token`.  Base sessions and unknown
    /// tokens get the default view.
    pub fn legend_for(&self, token: &SessionToken) -> Result<Legend> {
        if !self.store.contains(token)? {
            return Ok(Legend::from_view(None, &GribView::default()));
        }
        match self.store.get(token) {
            Ok(stored) => Ok(Self::legend_for_session(&stored)),
            Err(Error::NotFound(_)) => Ok(Legend::from_view(None, &GribView::default())),
            Err(e) => Err(e),
        }
    }

    /// Legend for an already-resolved session.
    pub fn legend_for_session(session: &StoredSession) -> Legend {
        match session {
            StoredSession::Grib(grib) => Legend::from_view(Some(session.id()), &grib.view()),
            StoredSession::Base(_) => Legend::from_view(Some(session.id()), &GribView::default()),
        }
    }
}
