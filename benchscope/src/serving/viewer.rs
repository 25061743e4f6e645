//! Profile visualization engine.
//!
//! Given one decoded profile, [`ProfileViewer::handlers`] returns the set of
//! unprefixed routes and handlers for browsing it. The serving subsystem mounts
//! them under a session prefix; handlers never know which prefix they live
//! under, so the index page links relatively.

use std::fmt::Write as _;
use std::sync::Arc;

use inferno::flamegraph::{self, Options};

use super::ProfileData;
use crate::analysis::{analyze_hotspots, render_top_table};
use crate::domain::ServeError;

/// A rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewResponse {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ViewResponse {
    fn text(body: String) -> Self {
        Self {
            content_type: "text/plain; charset=utf-8",
            body: body.into_bytes(),
        }
    }
}

/// Renders one view of one profile.
pub type ViewHandler = Arc<dyn Fn() -> Result<ViewResponse, ServeError> + Send + Sync>;

/// Unprefixed routes every session exposes.
pub const VIEW_ROUTES: &[&str] = &["/", "/top", "/flamegraph", "/folded", "/profile"];

/// Builds per-profile route handlers.
#[derive(Debug, Clone, Default)]
pub struct ProfileViewer;

impl ProfileViewer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Handlers for every route in [`VIEW_ROUTES`], in that order.
    #[must_use]
    pub fn handlers(&self, title: &str, data: Arc<ProfileData>) -> Vec<(String, ViewHandler)> {
        VIEW_ROUTES
            .iter()
            .map(|route| {
                let data = Arc::clone(&data);
                let title = title.to_string();
                let handler: ViewHandler = match *route {
                    "/" => Arc::new(move || Ok(render_index(&title, &data))),
                    "/top" => Arc::new(move || {
                        Ok(ViewResponse::text(render_top_table(&data, &analyze_hotspots(&data))))
                    }),
                    "/flamegraph" => Arc::new(move || render_flamegraph(&title, &data)),
                    "/folded" => Arc::new(move || {
                        let mut folded = data.folded_lines().join("\n");
                        folded.push('\n');
                        Ok(ViewResponse::text(folded))
                    }),
                    _ => Arc::new(move || {
                        Ok(ViewResponse {
                            content_type: "application/octet-stream",
                            body: data.raw.as_ref().clone(),
                        })
                    }),
                };
                ((*route).to_string(), handler)
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn render_index(title: &str, data: &ProfileData) -> ViewResponse {
    let title = escape_html(title);
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>"
    );
    let _ = write!(html, "<h1>{title}</h1><ul>");
    let _ = write!(html, "<li>samples: {}</li>", data.samples.len());
    let _ = write!(html, "<li>total: {}</li>", data.total());
    let _ = write!(html, "<li>duration: {:.2}s</li>", data.duration_nanos as f64 / 1e9);
    let _ = write!(html, "<li>sample types: {}</li>", escape_html(&data.sample_types.join(", ")));
    html.push_str("</ul><nav>");
    for link in ["top", "flamegraph", "folded", "profile"] {
        let _ = write!(html, "<a href=\"{link}\">{link}</a> ");
    }
    html.push_str("</nav></body></html>");
    ViewResponse {
        content_type: "text/html; charset=utf-8",
        body: html.into_bytes(),
    }
}

fn render_flamegraph(title: &str, data: &ProfileData) -> Result<ViewResponse, ServeError> {
    let lines = data.folded_lines();
    if lines.is_empty() {
        return Ok(ViewResponse::text("no samples were captured in this session\n".to_string()));
    }

    let mut options = Options::default();
    options.title = title.to_string();
    options.count_name = "samples".to_string();

    let mut svg = Vec::new();
    flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|e| ServeError::Render(e.to_string()))?;
    Ok(ViewResponse {
        content_type: "image/svg+xml",
        body: svg,
    })
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}
