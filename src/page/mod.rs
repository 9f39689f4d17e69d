//! Page modeling and the single-use handle discipline
//!
//! A [`PageHandle`] certifies "this page is loaded and current". The
//! certificate is revoked the instant a navigation action fires; every
//! transition retires the old handle and mints a fresh one for the new page.

pub mod asserts;
pub mod transition;
pub mod window;

use crate::click::ResilientClicker;
use crate::config::Config;
use crate::diag::DiagnosticLog;
use crate::driver::{BrowserKind, Driver, ElementHandle, Quirks};
use crate::error::{Error, Result};
use crate::locator::{Locator, LocatorResolver, Scope};
use crate::wait::{PollingWaiter, WaitSpec};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const READY_STATE_SCRIPT: &str = "return document.readyState";

/// Crash-screen marker injected by the browser when a page fails to render
const MAIN_FRAME_ERROR_ID: &str = "main-frame-error";

/// Everything a page interaction needs: the driver, the diagnostic log,
/// the wait configuration, and the quirk table resolved once at construction.
#[derive(Debug, Clone)]
pub struct Session {
    driver: Arc<dyn Driver>,
    log: DiagnosticLog,
    config: Arc<Config>,
    quirks: Quirks,
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>, log: DiagnosticLog, config: Config) -> Self {
        let quirks = Quirks::for_browser(driver.browser());
        Self {
            driver,
            log,
            config: Arc::new(config),
            quirks,
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn browser(&self) -> BrowserKind {
        self.driver.browser()
    }

    /// Base wait parameters from this session's configuration
    pub fn wait_spec(&self) -> WaitSpec {
        WaitSpec::from_config(&self.config)
    }

    pub fn waiter(&self) -> PollingWaiter {
        PollingWaiter::new(self.log.clone())
    }

    pub fn resolver(&self) -> LocatorResolver {
        LocatorResolver::new(self.driver.clone(), self.log.clone(), self.wait_spec())
    }

    pub fn clicker(&self) -> ResilientClicker {
        ResilientClicker::new(
            self.driver.clone(),
            self.log.clone(),
            self.quirks,
            self.wait_spec(),
        )
    }
}

/// `true` once the document has finished loading
pub async fn document_ready(session: &Session) -> Result<bool> {
    let state = session
        .driver()
        .execute_script(READY_STATE_SCRIPT, vec![])
        .await?;
    Ok(state.as_str() == Some("complete"))
}

/// Poll until the document reports itself loaded
pub async fn wait_document_ready(session: &Session) -> Result<()> {
    let spec = session.wait_spec().describe("for the document to finish loading");
    session
        .waiter()
        .poll(&spec, || async move {
            Ok(document_ready(session).await?.then_some(()))
        })
        .await
}

/// Definition of one page family: its identity, its liveness marker, and its
/// readiness checks. Implementations are stateless descriptions; per-visit
/// state lives in the [`PageHandle`].
#[async_trait]
pub trait PageSpec: Send + Sync + 'static {
    /// Name used in navigation logs
    fn name(&self) -> &str;

    /// The element whose disappearance proves the old page is gone during a
    /// transition away from this page. Must always be present before
    /// navigation and always removed by it. The document root is the safe
    /// default; override with a deeper element for single-page apps that
    /// keep the root alive across route changes.
    fn transition_root(&self) -> Locator {
        Locator::css("html")
    }

    /// Wait until this page is usable. The default waits for the document
    /// load to complete; override to also wait for late-arriving content.
    async fn wait_ready(&self, session: &Session) -> Result<()> {
        wait_document_ready(session).await
    }

    /// One-shot check that the page rendered rather than crashed. The
    /// default requires the document to be loaded and no browser error
    /// screen to be present.
    async fn assert_loaded(&self, session: &Session) -> Result<()> {
        if !document_ready(session).await? {
            return Err(Error::assertion_failed(format!(
                "page {} did not finish loading",
                self.name()
            )));
        }
        let crash_markers = session
            .driver()
            .find_all(&Locator::id(MAIN_FRAME_ERROR_ID), &Scope::Page)
            .await?;
        if let Some(marker) = crash_markers.first() {
            let detail = marker.text().await.unwrap_or_default();
            return Err(Error::assertion_failed(format!(
                "page {} shows a browser error screen: {}",
                self.name(),
                detail
            )));
        }
        Ok(())
    }
}

/// A live, single-use certificate for one loaded page.
///
/// Handles start valid; any navigation action retires them. Using a retired
/// handle fails with [`Error::UseAfterInvalidation`] rather than silently
/// operating on whatever page happens to be current.
pub struct PageHandle<S: PageSpec> {
    session: Session,
    spec: S,
    valid: AtomicBool,
}

impl<S: PageSpec> PageHandle<S> {
    /// Wrap an already-loaded page. Construction performs no waiting; use a
    /// transition to arrive at a page with its readiness verified.
    pub fn new(session: Session, spec: S) -> Self {
        Self {
            session,
            spec,
            valid: AtomicBool::new(true),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Retire this handle. Idempotent; there is no way back to validity.
    pub fn retire(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::UseAfterInvalidation)
        }
    }

    /// Resolve a locator on this page
    pub async fn find(&self, locator: &Locator) -> Result<Arc<dyn ElementHandle>> {
        self.ensure_valid()?;
        self.session.resolver().resolve(locator, &Scope::Page).await
    }

    /// Resolve a locator inside a previously resolved element
    pub async fn find_within(
        &self,
        locator: &Locator,
        parent: Arc<dyn ElementHandle>,
    ) -> Result<Arc<dyn ElementHandle>> {
        self.ensure_valid()?;
        self.session
            .resolver()
            .resolve(locator, &Scope::Within(parent))
            .await
    }

    /// Resolve and click, with the full retry protocol
    pub async fn click(&self, locator: &Locator) -> Result<()> {
        self.ensure_valid()?;
        let element = self.find(locator).await?;
        self.session.clicker().click(Some(element)).await
    }

    /// Resolve a field and type into it
    pub async fn type_into(&self, locator: &Locator, text: &str) -> Result<()> {
        self.ensure_valid()?;
        let element = self.find(locator).await?;
        element.send_keys(text).await
    }

    /// Visible text of the first element matching the locator
    pub async fn text_of(&self, locator: &Locator) -> Result<String> {
        self.ensure_valid()?;
        let element = self.find(locator).await?;
        element.text().await
    }

    /// Re-run the page's loaded check
    pub async fn assert_loaded(&self) -> Result<()> {
        self.ensure_valid()?;
        self.spec.assert_loaded(&self.session).await
    }
}

impl<S: PageSpec> std::fmt::Debug for PageHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page", &self.spec.name())
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockElement};

    struct Dashboard;

    #[async_trait]
    impl PageSpec for Dashboard {
        fn name(&self) -> &str {
            "Dashboard"
        }
    }

    fn session(driver: &Arc<MockDriver>) -> Session {
        Session::new(driver.clone(), DiagnosticLog::new(), Config::default())
    }

    #[tokio::test]
    async fn test_retired_handle_refuses_actions() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let handle = PageHandle::new(session(&driver), Dashboard);
        assert!(handle.is_valid());

        handle.retire();
        handle.retire();
        assert!(!handle.is_valid());

        let result = handle.find(&Locator::id("anything")).await;
        assert!(matches!(result, Err(Error::UseAfterInvalidation)));
    }

    #[tokio::test]
    async fn test_default_assert_loaded_passes_on_healthy_page() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let handle = PageHandle::new(session(&driver), Dashboard);
        handle.assert_loaded().await.unwrap();
    }

    #[tokio::test]
    async fn test_assert_loaded_detects_crash_screen() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let marker = MockElement::new("div");
        marker.set_text("ERR_CONNECTION_REFUSED");
        driver.place(&Locator::id(MAIN_FRAME_ERROR_ID), marker);

        let handle = PageHandle::new(session(&driver), Dashboard);
        let err = handle.assert_loaded().await.unwrap_err();
        assert!(err.to_string().contains("ERR_CONNECTION_REFUSED"));
    }

    #[tokio::test]
    async fn test_assert_loaded_requires_document_complete() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        driver.set_ready_state("interactive");

        let handle = PageHandle::new(session(&driver), Dashboard);
        let err = handle.assert_loaded().await.unwrap_err();
        assert!(matches!(err, Error::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn test_type_into_sends_keys() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let field = MockElement::new("input");
        driver.place(&Locator::name("q"), field.clone());

        let handle = PageHandle::new(session(&driver), Dashboard);
        handle.type_into(&Locator::name("q"), "hello").await.unwrap();
        assert_eq!(field.text().await.unwrap(), "hello");
    }
}
