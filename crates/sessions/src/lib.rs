//! Session resolution for webioc.
//!
//! One process-wide [`SessionStore`] maps cookie-carried [`SessionToken`]s
//! to sessions.  The [`SessionResolver`] turns an inbound cookie value into
//! an existing session or creates one (returning the cookie to set), so the
//! web pages, the JSON API and the real-time hub all share one session per
//! client.

pub mod cookie;
pub mod legend;
pub mod model;
pub mod resolver;
pub mod store;
pub mod token;

pub use cookie::{find_cookie, CookieSettings, SameSite, SessionCookie};
pub use legend::{Legend, LegendService};
pub use model::{BaseSession, GribSession, GribView, SessionKind, SessionModel, StoredSession};
pub use resolver::{Resolution, SessionResolver};
pub use store::{MemorySessionStore, SessionStore, SessionSummary};
pub use token::SessionToken;
