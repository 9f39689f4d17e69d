//! Scriptable in-memory driver for tests
//!
//! Elements carry programmable outcome queues for their operations and
//! optional effects that fire on a successful click (marking another element
//! stale, opening a window), so a test can stage an entire interaction or
//! navigation sequence without a browser. The driver counts recovery actions
//! (scrolls, pointer clicks) so tests can assert on them.

use super::traits::{BrowserKind, Driver, ElementHandle, Point};
use crate::error::{DriverErrorKind, Error, Result};
use crate::locator::{Locator, Scope};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Scripted result of one operation attempt
pub type Outcome = std::result::Result<(), (DriverErrorKind, String)>;

const PRESENCE_LIVE: u8 = 0;
const PRESENCE_STALE: u8 = 1;
const PRESENCE_FRAME_REF_LOST: u8 = 2;

type ClickEffect = Box<dyn Fn() + Send + Sync>;

/// Mock element with programmable behavior
pub struct MockElement {
    id: String,
    tag: String,
    text: Mutex<String>,
    attrs: Mutex<HashMap<String, String>>,
    location: Mutex<Point>,
    displayed: Mutex<bool>,
    enabled: Mutex<bool>,
    presence: AtomicU8,
    click_outcomes: Mutex<VecDeque<Outcome>>,
    on_click: Mutex<Vec<ClickEffect>>,
    clicks: AtomicUsize,
}

impl fmt::Debug for MockElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockElement")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .finish()
    }
}

impl MockElement {
    pub fn new<S: Into<String>>(tag: S) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            tag: tag.into(),
            text: Mutex::new(String::new()),
            attrs: Mutex::new(HashMap::new()),
            location: Mutex::new(Point { x: 10, y: 20 }),
            displayed: Mutex::new(true),
            enabled: Mutex::new(true),
            presence: AtomicU8::new(PRESENCE_LIVE),
            click_outcomes: Mutex::new(VecDeque::new()),
            on_click: Mutex::new(Vec::new()),
            clicks: AtomicUsize::new(0),
        })
    }

    pub fn set_text<S: Into<String>>(&self, text: S) {
        *self.text.lock().unwrap() = text.into();
    }

    pub fn set_attr<K: Into<String>, V: Into<String>>(&self, name: K, value: V) {
        self.attrs.lock().unwrap().insert(name.into(), value.into());
    }

    pub fn set_location(&self, x: i64, y: i64) {
        *self.location.lock().unwrap() = Point { x, y };
    }

    pub fn set_displayed(&self, displayed: bool) {
        *self.displayed.lock().unwrap() = displayed;
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock().unwrap() = enabled;
    }

    /// Mark the reference stale: every further operation reports
    /// `StaleElementReference`
    pub fn set_stale(&self) {
        self.presence.store(PRESENCE_STALE, Ordering::SeqCst);
    }

    /// Mark the reference lost to a deactivated frame: staleness probes get
    /// the `NoSuchElement` "reference not seen before" flavor
    pub fn set_frame_reference_lost(&self) {
        self.presence
            .store(PRESENCE_FRAME_REF_LOST, Ordering::SeqCst);
    }

    /// Queue the outcome of the next physical click. When the queue is
    /// empty, clicks succeed.
    pub fn push_click_outcome(&self, outcome: Outcome) {
        self.click_outcomes.lock().unwrap().push_back(outcome);
    }

    /// Run `effect` after each successful click (direct or pointer-driven)
    pub fn on_click<F: Fn() + Send + Sync + 'static>(&self, effect: F) {
        self.on_click.lock().unwrap().push(Box::new(effect));
    }

    /// Physical click attempts so far, successful or not
    pub fn click_attempts(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    fn check_presence(&self) -> Result<()> {
        match self.presence.load(Ordering::SeqCst) {
            PRESENCE_STALE => Err(Error::driver(
                DriverErrorKind::StaleElementReference,
                "stale element reference: element is not attached to the page document",
            )),
            PRESENCE_FRAME_REF_LOST => Err(Error::driver(
                DriverErrorKind::NoSuchElement,
                format!("Web element reference not seen before: {}", self.id),
            )),
            _ => Ok(()),
        }
    }

    fn run_click_effects(&self) {
        for effect in self.on_click.lock().unwrap().iter() {
            effect();
        }
    }

    fn perform_click(&self) -> Result<()> {
        self.check_presence()?;
        self.clicks.fetch_add(1, Ordering::SeqCst);
        let outcome = self.click_outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Err((kind, message))) => Err(Error::driver(kind, message)),
            _ => {
                self.run_click_effects();
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ElementHandle for MockElement {
    fn id(&self) -> &str {
        &self.id
    }

    async fn click(&self) -> Result<()> {
        self.perform_click()
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.check_presence()?;
        self.text.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        self.check_presence()?;
        Ok(self.text.lock().unwrap().clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.check_presence()?;
        Ok(self.attrs.lock().unwrap().get(name).cloned())
    }

    async fn tag_name(&self) -> Result<String> {
        self.check_presence()?;
        Ok(self.tag.clone())
    }

    async fn location(&self) -> Result<Point> {
        self.check_presence()?;
        Ok(*self.location.lock().unwrap())
    }

    async fn is_displayed(&self) -> Result<bool> {
        self.check_presence()?;
        Ok(*self.displayed.lock().unwrap())
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.check_presence()?;
        Ok(*self.enabled.lock().unwrap())
    }
}

struct Placed {
    elements: Vec<Arc<MockElement>>,
    misses_remaining: AtomicUsize,
    lookups: AtomicUsize,
}

/// Mock driver session
pub struct MockDriver {
    browser: BrowserKind,
    placed: Mutex<HashMap<String, Arc<Placed>>>,
    by_id: Mutex<HashMap<String, Arc<MockElement>>>,
    windows: Mutex<Vec<String>>,
    current_window: Mutex<String>,
    available_frames: Mutex<HashMap<String, bool>>,
    current_frame: Mutex<Option<String>>,
    alert: Mutex<Option<String>>,
    script_responses: Mutex<HashMap<String, VecDeque<serde_json::Value>>>,
    ready_state: Mutex<String>,
    page_source: Mutex<String>,
    current_url: Mutex<String>,
    scrolls: Mutex<Vec<(i64, i64)>>,
    pointer_clicks: AtomicUsize,
    refreshes: AtomicUsize,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("browser", &self.browser)
            .finish()
    }
}

impl MockDriver {
    pub fn new(browser: BrowserKind) -> Arc<Self> {
        Arc::new(Self {
            browser,
            placed: Mutex::new(HashMap::new()),
            by_id: Mutex::new(HashMap::new()),
            windows: Mutex::new(vec!["window-0".to_string()]),
            current_window: Mutex::new("window-0".to_string()),
            available_frames: Mutex::new(HashMap::new()),
            current_frame: Mutex::new(None),
            alert: Mutex::new(None),
            script_responses: Mutex::new(HashMap::new()),
            ready_state: Mutex::new("complete".to_string()),
            page_source: Mutex::new(String::new()),
            current_url: Mutex::new("about:blank".to_string()),
            scrolls: Mutex::new(Vec::new()),
            pointer_clicks: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        })
    }

    /// Make `element` findable by `locator`
    pub fn place(&self, locator: &Locator, element: Arc<MockElement>) {
        self.place_after_misses(locator, element, 0);
    }

    /// Make `element` findable by `locator`, but only after the first
    /// `misses` lookups have reported `NoSuchElement`
    pub fn place_after_misses(&self, locator: &Locator, element: Arc<MockElement>, misses: usize) {
        self.by_id
            .lock()
            .unwrap()
            .insert(element.id().to_string(), element.clone());
        self.placed.lock().unwrap().insert(
            locator.to_string(),
            Arc::new(Placed {
                elements: vec![element],
                misses_remaining: AtomicUsize::new(misses),
                lookups: AtomicUsize::new(0),
            }),
        );
    }

    /// Lookups performed against `locator` so far
    pub fn lookup_count(&self, locator: &Locator) -> usize {
        self.placed
            .lock()
            .unwrap()
            .get(&locator.to_string())
            .map(|p| p.lookups.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Queue an `execute_script` response for an exact script string
    pub fn push_script_response(&self, script: &str, value: serde_json::Value) {
        self.script_responses
            .lock()
            .unwrap()
            .entry(script.to_string())
            .or_default()
            .push_back(value);
    }

    pub fn set_ready_state<S: Into<String>>(&self, state: S) {
        *self.ready_state.lock().unwrap() = state.into();
    }

    pub fn set_page_source<S: Into<String>>(&self, source: S) {
        *self.page_source.lock().unwrap() = source.into();
    }

    pub fn set_current_url<S: Into<String>>(&self, url: S) {
        *self.current_url.lock().unwrap() = url.into();
    }

    pub fn open_alert<S: Into<String>>(&self, text: S) {
        *self.alert.lock().unwrap() = Some(text.into());
    }

    pub fn add_window<S: Into<String>>(&self, handle: S) {
        self.windows.lock().unwrap().push(handle.into());
    }

    pub fn close_window(&self, handle: &str) {
        self.windows.lock().unwrap().retain(|w| w != handle);
    }

    pub fn make_frame_available(&self, frame: &Locator) {
        self.available_frames
            .lock()
            .unwrap()
            .insert(frame.to_string(), true);
    }

    pub fn selected_window(&self) -> String {
        self.current_window.lock().unwrap().clone()
    }

    pub fn selected_frame(&self) -> Option<String> {
        self.current_frame.lock().unwrap().clone()
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.lock().unwrap().len()
    }

    pub fn scrolls(&self) -> Vec<(i64, i64)> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn pointer_click_count(&self) -> usize {
        self.pointer_clicks.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn browser(&self) -> BrowserKind {
        self.browser
    }

    async fn find(&self, locator: &Locator, scope: &Scope) -> Result<Arc<dyn ElementHandle>> {
        let all = self.find_all(locator, scope).await?;
        all.into_iter().next().ok_or_else(|| {
            Error::driver(
                DriverErrorKind::NoSuchElement,
                format!("no such element: Unable to locate element: {}", locator),
            )
        })
    }

    async fn find_all(
        &self,
        locator: &Locator,
        _scope: &Scope,
    ) -> Result<Vec<Arc<dyn ElementHandle>>> {
        let placed = self.placed.lock().unwrap().get(&locator.to_string()).cloned();
        match placed {
            Some(placed) => {
                placed.lookups.fetch_add(1, Ordering::SeqCst);
                let misses = placed.misses_remaining.load(Ordering::SeqCst);
                if misses > 0 {
                    placed.misses_remaining.store(misses - 1, Ordering::SeqCst);
                    return Ok(Vec::new());
                }
                Ok(placed
                    .elements
                    .iter()
                    .map(|e| e.clone() as Arc<dyn ElementHandle>)
                    .collect())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn execute_script(
        &self,
        script: &str,
        _args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if let Some(queue) = self.script_responses.lock().unwrap().get_mut(script) {
            if let Some(value) = queue.pop_front() {
                return Ok(value);
            }
        }
        if script.contains("readyState") {
            return Ok(serde_json::Value::String(
                self.ready_state.lock().unwrap().clone(),
            ));
        }
        Ok(serde_json::Value::Null)
    }

    async fn window_handles(&self) -> Result<Vec<String>> {
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn current_window(&self) -> Result<String> {
        Ok(self.selected_window())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<()> {
        if !self.windows.lock().unwrap().iter().any(|w| w == handle) {
            return Err(Error::driver(
                DriverErrorKind::NoSuchWindow,
                format!("no such window: {}", handle),
            ));
        }
        *self.current_window.lock().unwrap() = handle.to_string();
        // chromedriver resets to top-level content on window switch; geckodriver keeps the frame
        let keeps_frame = super::quirks::Quirks::for_browser(self.browser).keeps_frame_on_window_switch;
        if !keeps_frame {
            *self.current_frame.lock().unwrap() = None;
        }
        Ok(())
    }

    async fn switch_to_frame(&self, frame: &Locator) -> Result<()> {
        let key = frame.to_string();
        let available = self
            .available_frames
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(false);
        if !available {
            return Err(Error::driver(
                DriverErrorKind::NoSuchFrame,
                format!("no such frame: {}", frame),
            ));
        }
        *self.current_frame.lock().unwrap() = Some(key);
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<()> {
        *self.current_frame.lock().unwrap() = None;
        Ok(())
    }

    async fn alert_text(&self) -> Result<Option<String>> {
        Ok(self.alert.lock().unwrap().clone())
    }

    async fn accept_alert(&self) -> Result<()> {
        self.alert
            .lock()
            .unwrap()
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::driver(DriverErrorKind::Unknown, "no such alert"))
    }

    async fn dismiss_alert(&self) -> Result<()> {
        self.alert
            .lock()
            .unwrap()
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::driver(DriverErrorKind::Unknown, "no such alert"))
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_url.lock().unwrap().clone())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page_source.lock().unwrap().clone())
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<()> {
        self.scrolls.lock().unwrap().push((dx, dy));
        Ok(())
    }

    async fn pointer_click(&self, element: &Arc<dyn ElementHandle>) -> Result<()> {
        self.pointer_clicks.fetch_add(1, Ordering::SeqCst);
        let target = self.by_id.lock().unwrap().get(element.id()).cloned();
        if let Some(target) = target {
            target.check_presence()?;
            target.run_click_effects();
        }
        Ok(())
    }
}
