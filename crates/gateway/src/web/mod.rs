//! Web tier: server-rendered pages.
//!
//! Pages carry no business logic; they show which session the request was
//! bound to so the shared identity across tiers can be observed.

use axum::response::{Html, IntoResponse};

use wi_sessions::{GribSession, SessionModel};

use crate::binder::{AnySession, Session};

const STYLE: &str = r#"
  body { font-family: system-ui, sans-serif; max-width: 900px; margin: 2rem auto; padding: 0 1rem; background: #0d1117; color: #c9d1d9; }
  h1 { color: #58a6ff; }
  h2 { color: #79c0ff; border-bottom: 1px solid #21262d; padding-bottom: 0.3em; margin-top: 2em; }
  a { color: #58a6ff; text-decoration: none; }
  .card { background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }
  code { background: #21262d; padding: 0.2em 0.4em; border-radius: 3px; font-size: 0.9em; }
"#;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>"#
    ))
}

/// GET /: home page; needs only the base session capabilities.
pub async fn home(AnySession(session): AnySession) -> impl IntoResponse {
    let body = format!(
        r#"<h1>webioc</h1>
<div class="card">
  <p>Session <code>{id}</code> ({variant})</p>
  <p>Created {created}</p>
</div>
<p><a href="/grib">GRIB viewer</a></p>"#,
        id = session.id(),
        variant = session.variant(),
        created = session.created_at().to_rfc3339(),
    );
    page("webioc", &body)
}

/// GET /grib: GRIB viewer page; needs the GRIB session variant.
pub async fn grib(Session(session): Session<GribSession>) -> impl IntoResponse {
    let view = session.view();
    let layers_html: String = if view.layers.is_empty() {
        "<em>none</em>".into()
    } else {
        view.layers
            .iter()
            .map(|l| format!("<li>{}</li>", html_escape(l)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let body = format!(
        r#"<h1>GRIB viewer</h1>
<div class="card">
  <p>Session <code>{id}</code></p>
  <p>Legend {legend}</p>
</div>
<h2>Layers</h2>
<ul>
{layers_html}
</ul>"#,
        id = session.id(),
        legend = if view.legend_visible { "shown" } else { "hidden" },
    );
    page("GRIB viewer", &body)
}

/// Minimal escaping for user-controlled text in pages.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
