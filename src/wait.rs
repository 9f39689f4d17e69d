//! Bounded polling primitive
//!
//! There is no push notification for "page ready" or "element clickable";
//! the remote protocol only answers questions. Everything that waits in this
//! crate does so by polling through [`PollingWaiter`], parameterized by a
//! [`WaitSpec`].

use crate::config::Config;
use crate::diag::DiagnosticLog;
use crate::error::{DriverErrorKind, Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Parameters for one wait operation. Immutable once handed to a poll.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    /// Delay between evaluations
    pub poll_interval: Duration,
    /// Deadline after which the wait fails
    pub hard_timeout: Duration,
    /// A still-pending wait logs one warning after this long
    pub soft_warning: Duration,
    /// Human-readable phrase completing "Waiting ..."
    pub description: String,
    /// Browser error kinds treated as "not ready yet" during evaluation
    pub ignorable: Vec<DriverErrorKind>,
}

impl WaitSpec {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            hard_timeout: config.hard_timeout(),
            soft_warning: config.soft_warning(),
            description: "for condition".to_string(),
            ignorable: Vec::new(),
        }
    }

    pub fn describe<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn ignoring(mut self, kind: DriverErrorKind) -> Self {
        self.ignorable.push(kind);
        self
    }

    pub fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_soft_warning(mut self, threshold: Duration) -> Self {
        self.soft_warning = threshold;
        self
    }
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Repeatedly evaluates a probe until it yields a value or the deadline
/// elapses.
///
/// The soft warning separates "slow but working" from "actually stuck": a
/// wait that eventually succeeds after crossing the threshold still logs a
/// warning, surfacing performance regressions without failing the test.
#[derive(Debug, Clone)]
pub struct PollingWaiter {
    log: DiagnosticLog,
}

impl PollingWaiter {
    pub fn new(log: DiagnosticLog) -> Self {
        Self { log }
    }

    /// Poll `probe` until it returns `Ok(Some(value))`.
    ///
    /// `Ok(None)` means not ready yet. An `Err` whose driver kind is listed
    /// in `spec.ignorable` also means not ready; any other error propagates
    /// immediately and aborts the wait. The probe is evaluated once before
    /// any sleeping, so a `hard_timeout` of zero allows exactly one attempt.
    pub async fn poll<T, F, Fut>(&self, spec: &WaitSpec, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        self.log.debug(format!("Waiting {}", spec.description));
        let start = Instant::now();
        let mut warned = false;

        loop {
            match probe().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => match e.driver_kind() {
                    Some(kind) if spec.ignorable.contains(&kind) => {}
                    _ => return Err(e),
                },
            }

            if !warned && start.elapsed() > spec.soft_warning {
                warned = true;
                self.log.warn(format!(
                    "Still waiting {} after {:?} (soft threshold {:?})",
                    spec.description,
                    start.elapsed(),
                    spec.soft_warning
                ));
            }

            if start.elapsed() >= spec.hard_timeout {
                return Err(Error::wait_timeout(spec.description.clone()));
            }

            tokio::time::sleep(spec.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_spec() -> WaitSpec {
        WaitSpec::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_hard_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let result = waiter
            .poll(&fast_spec(), || async { Ok(Some(42)) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_zero_timeout_allows_exactly_one_attempt() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let spec = fast_spec().with_hard_timeout(Duration::ZERO);

        let result: Result<()> = waiter
            .poll(&spec, || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            })
            .await;

        assert!(matches!(result, Err(Error::WaitTimeout { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_nth_attempt() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let attempts = Arc::new(AtomicUsize::new(0));

        let value = waiter
            .poll(&fast_spec(), || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok((n == 4).then_some(n))
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 4);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_ignorable_error_keeps_polling() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let spec = fast_spec().ignoring(DriverErrorKind::NoSuchElement);

        let value = waiter
            .poll(&spec, || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Error::driver(
                            DriverErrorKind::NoSuchElement,
                            "no such element",
                        ))
                    } else {
                        Ok(Some("found"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "found");
    }

    #[tokio::test]
    async fn test_unlisted_error_aborts_immediately() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let spec = fast_spec().ignoring(DriverErrorKind::NoSuchElement);

        let result: Result<()> = waiter
            .poll(&spec, || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::driver(
                        DriverErrorKind::StaleElementReference,
                        "stale element reference",
                    ))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Driver {
                kind: DriverErrorKind::StaleElementReference,
                ..
            })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_carries_description() {
        let waiter = PollingWaiter::new(DiagnosticLog::new());
        let spec = fast_spec()
            .with_hard_timeout(Duration::from_millis(5))
            .describe("for the dialog to open");

        let result: Result<()> = waiter.poll(&spec, || async { Ok(None) }).await;

        match result {
            Err(Error::WaitTimeout { description }) => {
                assert_eq!(description, "for the dialog to open");
            }
            other => panic!("expected WaitTimeout, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_soft_warning_fires_once() {
        let log = DiagnosticLog::new();
        let waiter = PollingWaiter::new(log.clone());
        let spec = WaitSpec::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_hard_timeout(Duration::from_millis(60))
            .with_soft_warning(Duration::from_millis(5))
            .describe("for a slow condition");

        let result: Result<()> = waiter.poll(&spec, || async { Ok(None) }).await;
        assert!(result.is_err());

        // exactly one warning despite many polls past the threshold
        assert_eq!(log.warnings(), 1);
        let recent = log.recent();
        let warning = recent
            .iter()
            .find(|e| e.severity == crate::diag::Severity::Warn)
            .unwrap();
        assert!(warning.message.contains("for a slow condition"));
    }

    #[tokio::test]
    async fn test_no_soft_warning_on_fast_success() {
        let log = DiagnosticLog::new();
        let waiter = PollingWaiter::new(log.clone());

        waiter
            .poll(&fast_spec(), || async { Ok(Some(())) })
            .await
            .unwrap();

        assert_eq!(log.warnings(), 0);
    }
}
