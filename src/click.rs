//! Robust click state machine
//!
//! A click on a dynamic page fails for reasons that resolve themselves:
//! the element is still animating into place, a toast is sliding across it,
//! the driver misjudges scrollability. [`ResilientClicker`] distinguishes
//! those self-resolving failures from real defects and retries only the
//! former, always within the session's bounded wait.

use crate::diag::DiagnosticLog;
use crate::driver::{describe_element, Driver, ElementHandle, Quirks};
use crate::error::{DriverErrorKind, Error, Result};
use crate::wait::{PollingWaiter, WaitSpec};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

const SCROLL_TO_TOP_DELTA: i64 = -1_000_000;

/// Matches the driver's interception detail and captures the markup of the
/// element that would receive the click instead
fn obscured_by(first_line: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            "Other element would receive the click: (<[^>]*>)\
             |because another element (<[^>]*>) obscures it",
        )
        .expect("obscuring pattern is valid")
    });
    re.captures(first_line)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
}

fn is_scroll_into_view_defect(err: &Error) -> bool {
    err.driver_kind() == Some(DriverErrorKind::ElementNotInteractable)
        && err
            .driver_message_first_line()
            .is_some_and(|l| l.contains("could not be scrolled into view"))
}

fn interception(err: &Error) -> Option<String> {
    let intercepted = err.driver_kind() == Some(DriverErrorKind::ElementClickIntercepted)
        || err
            .driver_message_first_line()
            .is_some_and(|l| l.contains("is not clickable"));
    if !intercepted {
        return None;
    }
    err.driver_message_first_line()
        .and_then(obscured_by)
        .map(str::to_string)
}

/// Clicks elements through a three-phase protocol: wait until the element
/// looks clickable, retry the click through known recoverable failures, and
/// on exhaustion perform one final unguarded click so the browser's own
/// error reaches the caller unfiltered.
#[derive(Clone)]
pub struct ResilientClicker {
    driver: Arc<dyn Driver>,
    log: DiagnosticLog,
    quirks: Quirks,
    waiter: PollingWaiter,
    base: WaitSpec,
}

impl ResilientClicker {
    pub fn new(
        driver: Arc<dyn Driver>,
        log: DiagnosticLog,
        quirks: Quirks,
        base: WaitSpec,
    ) -> Self {
        Self {
            driver,
            waiter: PollingWaiter::new(log.clone()),
            log,
            quirks,
            base,
        }
    }

    /// Click `element`, riding out obscuring overlays and driver defects.
    ///
    /// `None` is rejected up front; a missing element is the resolver's
    /// failure to report, never something to click around.
    pub async fn click(&self, element: Option<Arc<dyn ElementHandle>>) -> Result<()> {
        let element = element
            .ok_or_else(|| Error::invalid_argument("click target resolved to no element"))?;
        let desc = describe_element(element.as_ref()).await;
        self.log.debug(format!("Clicking element {}", desc));

        self.await_clickable(&element, &desc).await?;

        // one scroll and one pointer fallback per click call, however many
        // attempts the retry loop makes
        let scrolled = Arc::new(AtomicBool::new(false));
        let pointer_logged = Arc::new(AtomicBool::new(false));

        let spec = self.base.clone().describe(format!("to click element {}", desc));
        let attempted = self
            .waiter
            .poll(&spec, || {
                let element = element.clone();
                let scrolled = scrolled.clone();
                let pointer_logged = pointer_logged.clone();
                async move { self.try_click(&element, &scrolled, &pointer_logged).await }
            })
            .await;

        match attempted {
            Ok(()) => Ok(()),
            // last resort: the unguarded click either works or surfaces the
            // browser's own error instead of a generic timeout
            Err(Error::WaitTimeout { .. }) => {
                self.log.warn(format!(
                    "Timed out clicking element {}, attempting an unguarded click",
                    desc
                ));
                element.click().await
            }
            Err(e) => Err(e),
        }
    }

    /// Phase 1: poll until displayed, enabled, and positioned on the page.
    /// A timeout here downgrades to a debug entry; the click loop gets its
    /// chance regardless, and produces the better error if the element truly
    /// is unusable. A stale reference aborts at once: no amount of waiting
    /// revives it, and burning the deadline first would only delay the error.
    async fn await_clickable(&self, element: &Arc<dyn ElementHandle>, desc: &str) -> Result<()> {
        let spec = self
            .base
            .clone()
            .describe(format!("for element {} to become clickable", desc));

        let ready = self
            .waiter
            .poll(&spec, || {
                let element = element.clone();
                async move {
                    let clickable = element.is_displayed().await?
                        && element.is_enabled().await?
                        && element.location().await?.on_page();
                    Ok(clickable.then_some(()))
                }
            })
            .await;

        match ready {
            Ok(()) => Ok(()),
            Err(Error::WaitTimeout { .. }) => {
                self.log.debug(format!(
                    "Element {} never reported clickable, clicking anyway",
                    desc
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Phase 2 body: one click attempt. `Ok(None)` asks the waiter to retry.
    async fn try_click(
        &self,
        element: &Arc<dyn ElementHandle>,
        scrolled: &AtomicBool,
        pointer_logged: &AtomicBool,
    ) -> Result<Option<()>> {
        let err = match element.click().await {
            Ok(()) => return Ok(Some(())),
            Err(e) => e,
        };

        if self.quirks.scroll_into_view_click_defect && is_scroll_into_view_defect(&err) {
            if !pointer_logged.swap(true, Ordering::SeqCst) {
                self.log
                    .info("Caught \"could not be scrolled into view\" from the driver");
                self.log
                    .info("> Falling back to a pointer-synthesized click...");
            }
            self.driver.pointer_click(element).await?;
            return Ok(Some(()));
        }

        if let Some(obscurer) = interception(&err) {
            if !scrolled.swap(true, Ordering::SeqCst) {
                self.log.info(format!(
                    "Waiting for other element to get out of the way of clicking: {}",
                    obscurer
                ));
                self.log.info("> Scrolling to top of page...");
                self.driver.scroll_by(0, SCROLL_TO_TOP_DELTA).await?;
            }
            return Ok(None);
        }

        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockElement};
    use crate::driver::BrowserKind;
    use std::time::Duration;

    fn fast_spec() -> WaitSpec {
        WaitSpec::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_hard_timeout(Duration::from_millis(200))
    }

    fn clicker(driver: &Arc<MockDriver>, log: DiagnosticLog) -> ResilientClicker {
        ResilientClicker::new(
            driver.clone(),
            log,
            Quirks::for_browser(driver.browser()),
            fast_spec(),
        )
    }

    fn intercepted_outcome() -> crate::driver::mock::Outcome {
        Err((
            DriverErrorKind::ElementClickIntercepted,
            "element click intercepted: Element <a> is not clickable at point (10, 20). \
             Other element would receive the click: <div class=\"toast\">\n(Session info)"
                .to_string(),
        ))
    }

    #[tokio::test]
    async fn test_none_element_is_invalid_argument() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let result = clicker(&driver, DiagnosticLog::new()).click(None).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_plain_click_succeeds() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("button");
        clicker(&driver, DiagnosticLog::new())
            .click(Some(element.clone()))
            .await
            .unwrap();
        assert_eq!(element.click_attempts(), 1);
        assert_eq!(driver.scroll_count(), 0);
    }

    #[tokio::test]
    async fn test_obscured_click_scrolls_once_then_succeeds() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let log = DiagnosticLog::with_capacity(50);
        let element = MockElement::new("a");
        element.push_click_outcome(intercepted_outcome());
        element.push_click_outcome(intercepted_outcome());

        clicker(&driver, log.clone())
            .click(Some(element.clone()))
            .await
            .unwrap();

        assert_eq!(element.click_attempts(), 3);
        // two interceptions, still exactly one scroll and one announcement
        assert_eq!(driver.scrolls(), vec![(0, SCROLL_TO_TOP_DELTA)]);
        let announcements = log
            .recent()
            .iter()
            .filter(|e| e.message.contains("out of the way"))
            .count();
        assert_eq!(announcements, 1);
        let obscurer_logged = log
            .recent()
            .iter()
            .any(|e| e.message.contains("<div class=\"toast\">"));
        assert!(obscurer_logged);
    }

    #[tokio::test]
    async fn test_unknown_error_propagates_without_retry() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("button");
        element.push_click_outcome(Err((
            DriverErrorKind::Unknown,
            "invalid session id".to_string(),
        )));

        let result = clicker(&driver, DiagnosticLog::new())
            .click(Some(element.clone()))
            .await;

        assert!(matches!(
            result,
            Err(Error::Driver {
                kind: DriverErrorKind::Unknown,
                ..
            })
        ));
        assert_eq!(element.click_attempts(), 1);
        assert_eq!(driver.scroll_count(), 0);
    }

    #[tokio::test]
    async fn test_firefox_scroll_defect_falls_back_to_pointer() {
        let driver = MockDriver::new(BrowserKind::Firefox);
        let log = DiagnosticLog::with_capacity(50);
        let element = MockElement::new("a");
        element.push_click_outcome(Err((
            DriverErrorKind::ElementNotInteractable,
            "Element <a> could not be scrolled into view\nStacktrace:".to_string(),
        )));

        clicker(&driver, log.clone())
            .click(Some(element.clone()))
            .await
            .unwrap();

        assert_eq!(driver.pointer_click_count(), 1);
        let fallback_logged = log
            .recent()
            .iter()
            .filter(|e| e.message.contains("could not be scrolled into view"))
            .count();
        assert_eq!(fallback_logged, 1);
    }

    #[tokio::test]
    async fn test_chrome_does_not_mask_scroll_into_view_error() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("a");
        element.push_click_outcome(Err((
            DriverErrorKind::ElementNotInteractable,
            "Element <a> could not be scrolled into view".to_string(),
        )));

        let result = clicker(&driver, DiagnosticLog::new())
            .click(Some(element))
            .await;

        assert!(matches!(
            result,
            Err(Error::Driver {
                kind: DriverErrorKind::ElementNotInteractable,
                ..
            })
        ));
        assert_eq!(driver.pointer_click_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_end_in_unguarded_click() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("a");
        // always intercepted; the final unguarded click surfaces the raw error
        for _ in 0..500 {
            element.push_click_outcome(intercepted_outcome());
        }

        let short = ResilientClicker::new(
            driver.clone(),
            DiagnosticLog::new(),
            Quirks::for_browser(BrowserKind::Chrome),
            fast_spec().with_hard_timeout(Duration::from_millis(20)),
        );
        let result = short.click(Some(element.clone())).await;

        assert!(matches!(
            result,
            Err(Error::Driver {
                kind: DriverErrorKind::ElementClickIntercepted,
                ..
            })
        ));
        assert!(element.click_attempts() >= 2);
    }

    #[tokio::test]
    async fn test_stale_target_fails_without_waiting() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("button");
        element.set_stale();

        let long = ResilientClicker::new(
            driver.clone(),
            DiagnosticLog::new(),
            Quirks::for_browser(BrowserKind::Chrome),
            fast_spec().with_hard_timeout(Duration::from_secs(30)),
        );
        let started = std::time::Instant::now();
        let result = long.click(Some(element.clone())).await;

        assert!(matches!(
            result,
            Err(Error::Driver {
                kind: DriverErrorKind::StaleElementReference,
                ..
            })
        ));
        assert_eq!(element.click_attempts(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_waits_for_element_to_come_on_page() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        let element = MockElement::new("button");
        element.set_location(-10, -10);
        {
            let element = element.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                element.set_location(10, 20);
            });
        }

        clicker(&driver, DiagnosticLog::new())
            .click(Some(element.clone()))
            .await
            .unwrap();
        assert_eq!(element.click_attempts(), 1);
    }

    #[test]
    fn test_obscured_by_extracts_both_flavors() {
        assert_eq!(
            obscured_by(
                "Element is not clickable at point. \
                 Other element would receive the click: <div id=\"overlay\">"
            ),
            Some("<div id=\"overlay\">")
        );
        assert_eq!(
            obscured_by("could not be clicked because another element <span> obscures it"),
            Some("<span>")
        );
        assert_eq!(obscured_by("element not interactable"), None);
    }
}
