//! Remote browser-control capability traits
//!
//! The browser and its command protocol are external collaborators consumed
//! through these interfaces. Any remote-automation client (WebDriver, CDP,
//! a test double) satisfies them; nothing in this crate knows which one is
//! behind the trait object.

use crate::error::Result;
use crate::locator::{Locator, Scope};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Browser identity, used only to resolve the quirk table once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Edge,
    Safari,
    Unknown,
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Edge => "edge",
            BrowserKind::Safari => "safari",
            BrowserKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// On-page coordinates of an element's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    /// Off the top or left of the page is never clickable, whatever the
    /// driver's own clickability judgment says
    pub fn on_page(&self) -> bool {
        self.x >= 0 && self.y >= 0
    }
}

/// An opaque reference to one DOM element.
///
/// References go stale when the node is removed or its document unloads;
/// after that every operation reports `StaleElementReference`.
#[async_trait]
pub trait ElementHandle: Send + Sync + fmt::Debug {
    /// Driver-assigned reference identity
    fn id(&self) -> &str;

    async fn click(&self) -> Result<()>;

    async fn send_keys(&self, text: &str) -> Result<()>;

    /// Visible text
    async fn text(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn tag_name(&self) -> Result<String>;

    async fn location(&self) -> Result<Point>;

    async fn is_displayed(&self) -> Result<bool>;

    async fn is_enabled(&self) -> Result<bool>;
}

/// One remote browser session.
///
/// Exclusively owned by one page-handle lineage at a time; never driven
/// concurrently.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Browser identity for quirk resolution
    fn browser(&self) -> BrowserKind;

    /// First element matching the locator within the scope
    async fn find(&self, locator: &Locator, scope: &Scope) -> Result<Arc<dyn ElementHandle>>;

    /// All elements matching the locator within the scope; empty is not an error
    async fn find_all(&self, locator: &Locator, scope: &Scope)
        -> Result<Vec<Arc<dyn ElementHandle>>>;

    /// Execute a script in the page, returning its JSON value
    async fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value>;

    /// All window handles, in insertion order. The ordering is a guarantee
    /// the implementor must keep: "newest window" is determined by it.
    async fn window_handles(&self) -> Result<Vec<String>>;

    async fn current_window(&self) -> Result<String>;

    async fn switch_to_window(&self, handle: &str) -> Result<()>;

    /// Switch into a frame; `NoSuchFrame` until the frame is available
    async fn switch_to_frame(&self, frame: &Locator) -> Result<()>;

    async fn switch_to_default_content(&self) -> Result<()>;

    /// Text of the open native alert, or None when no alert is up
    async fn alert_text(&self) -> Result<Option<String>>;

    async fn accept_alert(&self) -> Result<()>;

    async fn dismiss_alert(&self) -> Result<()>;

    async fn refresh(&self) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn page_source(&self) -> Result<String>;

    /// Scroll the viewport by the given deltas
    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<()>;

    /// Synthesize pointer-move-then-click through the low-level input
    /// channel, bypassing the element click command
    async fn pointer_click(&self, element: &Arc<dyn ElementHandle>) -> Result<()>;
}

/// Diagnostic one-liner for an element: `tag#id "text" class="..."`.
/// Degrades to `<stale element>` when the reference can no longer be probed.
pub async fn describe_element(element: &dyn ElementHandle) -> String {
    let described = async {
        let tag = element.tag_name().await?;
        let id = element.attribute("id").await?.unwrap_or_default();
        let text = element.text().await?;
        let class = element.attribute("class").await?.unwrap_or_default();
        Ok::<_, crate::Error>(format!(
            "{}{} \"{}\" class=\"{}\"",
            tag,
            if id.is_empty() {
                String::new()
            } else {
                format!("#{}", id)
            },
            text.replace('\n', "¶"),
            class
        ))
    }
    .await;

    described.unwrap_or_else(|_| "<stale element>".to_string())
}
