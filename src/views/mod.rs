//! Page rendering
//!
//! The three HTML pages are Tera templates compiled into the binary.
//! Every template name ends in `.html`, so Tera autoescapes all values
//! that come from the session or the request.

use chrono::Local;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::models::{SessionRecord, FIELD_EMAIL, FIELD_FAVORITE_COLOR, FIELD_USERNAME};

mod error;

pub use error::ViewError;

/// Path both pages post their forms to
pub const ACTION_PATH: &str = "/state";

/// Flash shown after a successful save
pub const MESSAGE_SAVED: &str = "Data saved!";

/// Flash shown after the stored data was cleared but the id kept
pub const MESSAGE_CLEARED: &str = "Session data cleared!";

/// Body served with any 500 response. Never includes error details.
pub const GENERIC_ERROR_PAGE: &str = include_str!("../../templates/error.html");

const TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("footer.html", include_str!("../../templates/footer.html")),
    ("page1.html", include_str!("../../templates/page1.html")),
    ("page2.html", include_str!("../../templates/page2.html")),
    ("destroyed.html", include_str!("../../templates/destroyed.html")),
];

/// Which of the two data pages to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    One,
    Two,
}

impl Page {
    /// `"2"` selects page 2; anything else, including absence, selects page 1
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("2") => Page::Two,
            _ => Page::One,
        }
    }

    fn template(self) -> &'static str {
        match self {
            Page::One => "page1.html",
            Page::Two => "page2.html",
        }
    }
}

/// Values a data page is rendered from
#[derive(Debug, Serialize)]
struct PageView<'a> {
    username: &'a str,
    email: &'a str,
    favorite_color: &'a str,
    has_data: bool,
    message: Option<&'a str>,
    now: String,
    remote_addr: &'a str,
    action_path: &'static str,
}

/// Renders the session pages
pub struct PageRenderer {
    tera: Tera,
}

impl std::fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRenderer").finish_non_exhaustive()
    }
}

impl PageRenderer {
    /// Compile the bundled templates
    pub fn new() -> Result<Self, ViewError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())
            .map_err(|e| ViewError::Load(flatten_error("bundled templates", &e)))?;
        tracing::debug!("Loaded {} page templates", TEMPLATES.len());
        Ok(Self { tera })
    }

    /// Render a data page for `record`.
    ///
    /// `remote_addr` is shown as given; the caller decides the fallback.
    pub fn render_page(
        &self,
        page: Page,
        record: &SessionRecord,
        message: Option<&str>,
        remote_addr: &str,
    ) -> Result<String, ViewError> {
        let username = record.get(FIELD_USERNAME).unwrap_or_default();
        let email = record.get(FIELD_EMAIL).unwrap_or_default();
        let favorite_color = record.get(FIELD_FAVORITE_COLOR).unwrap_or_default();
        // Only the displayed fields count; other keys have no row to show
        let has_data = [username, email, favorite_color]
            .iter()
            .any(|value| !value.is_empty());

        let view = PageView {
            username,
            email,
            favorite_color,
            has_data,
            message,
            now: Local::now().format("%a %b %d %H:%M:%S %Y").to_string(),
            remote_addr,
            action_path: ACTION_PATH,
        };
        let context = TeraContext::from_serialize(&view)
            .map_err(|e| ViewError::Template(flatten_error(page.template(), &e)))?;
        self.render(page.template(), &context)
    }

    /// Render the confirmation shown after a session is destroyed
    pub fn render_destroyed(&self) -> Result<String, ViewError> {
        let mut context = TeraContext::new();
        context.insert("action_path", ACTION_PATH);
        self.render("destroyed.html", &context)
    }

    fn render(&self, template: &str, context: &TeraContext) -> Result<String, ViewError> {
        self.tera
            .render(template, context)
            .map_err(|e| ViewError::Template(flatten_error(template, &e)))
    }
}

/// Tera hides the useful part of an error in its source chain
fn flatten_error(what: &str, e: &tera::Error) -> String {
    let mut msg = format!("Failed to render '{}': {}", what, e);
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    msg
}
