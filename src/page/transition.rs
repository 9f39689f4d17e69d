//! Page transition protocol
//!
//! "The next page is loaded" means nothing until "the previous page is gone"
//! is established, or a fast assertion can pass against the outgoing page.
//! Every transition therefore captures the old page's transition root before
//! navigating, retires the old handle the moment the navigation action
//! fires, and only then waits for the root to go stale, the new page to be
//! ready, and its loaded check to pass.

use crate::error::{DriverErrorKind, Error, Result};
use crate::locator::{Locator, Scope};
use crate::page::window::{alert_confirm, alert_present, focus_newest, window_count};
use crate::page::{PageHandle, PageSpec, Session};
use crate::driver::{Driver, ElementHandle, Quirks};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Has this element reference gone stale?
///
/// Drivers with the frame-reference quirk report staleness of elements in a
/// deactivated frame as `NoSuchElement` with a distinctive first line; that
/// one flavor also counts as gone. Every other error propagates.
async fn element_gone(element: &Arc<dyn ElementHandle>, quirks: Quirks) -> Result<bool> {
    match element.tag_name().await {
        Ok(_) => Ok(false),
        Err(e) => match e.driver_kind() {
            Some(DriverErrorKind::StaleElementReference) => Ok(true),
            Some(DriverErrorKind::NoSuchElement)
                if quirks.frame_reference_staleness_report
                    && e
                        .driver_message_first_line()
                        .is_some_and(|l| l.starts_with("Web element reference not seen before:")) =>
            {
                Ok(true)
            }
            _ => Err(e),
        },
    }
}

/// Wait for the captured root to go stale. A timeout here is a page-modeling
/// error, reported as such rather than as a generic timeout.
async fn wait_root_gone(
    session: &Session,
    root: Arc<dyn ElementHandle>,
    marker: &Locator,
) -> Result<()> {
    let spec = session
        .wait_spec()
        .describe(format!("for the previous page's root to disappear ({})", marker));
    let quirks = session.quirks();
    // the sporadic inspector error is forgiven exactly once per wait
    let inspector_forgiven = Arc::new(AtomicBool::new(false));
    let log = session.log().clone();

    let result = session
        .waiter()
        .poll(&spec, || {
            let root = root.clone();
            let inspector_forgiven = inspector_forgiven.clone();
            let log = log.clone();
            async move {
                match element_gone(&root, quirks).await {
                    Ok(gone) => Ok(gone.then_some(())),
                    Err(e)
                        if quirks.inspector_error_transient
                            && e
                                .driver_message_first_line()
                                .is_some_and(|l| l.contains("unhandled inspector error"))
                            && !inspector_forgiven.swap(true, Ordering::SeqCst) =>
                    {
                        log.warn(format!("Retrying staleness probe once after: {}", e));
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await;

    match result {
        Ok(()) => Ok(()),
        Err(Error::WaitTimeout { .. }) => Err(Error::NavigationRootDidNotDisappear {
            marker: marker.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// Reset to top-level content, then wait for the frame to become available
/// and switch into it
async fn switch_into_frame(session: &Session, frame: &Locator) -> Result<()> {
    session.driver().switch_to_default_content().await?;
    let spec = session
        .wait_spec()
        .describe(format!("for frame {} to become available", frame))
        .ignoring(DriverErrorKind::NoSuchFrame);
    session
        .waiter()
        .poll(&spec, || {
            let driver = session.driver().clone();
            async move {
                driver.switch_to_frame(frame).await?;
                Ok(Some(()))
            }
        })
        .await
}

/// Mint a handle for the destination page after its readiness and loaded
/// checks pass
async fn arrive<N: PageSpec>(session: Session, next: N) -> Result<PageHandle<N>> {
    next.wait_ready(&session).await?;
    let handle = PageHandle::new(session, next);
    handle.assert_loaded().await?;
    Ok(handle)
}

impl<S: PageSpec> PageHandle<S> {
    async fn capture_root(&self) -> Result<(Arc<dyn ElementHandle>, Locator)> {
        let marker = self.spec().transition_root();
        let root = self
            .session()
            .driver()
            .find(&marker, &Scope::Page)
            .await?;
        Ok((root, marker))
    }

    /// Transition to `next` by running an arbitrary navigation action.
    ///
    /// This handle is retired as soon as `navigate` runs, whether or not it
    /// succeeds; once the action fires, nothing can vouch for the old page.
    pub async fn transition<N, F, Fut>(&self, navigate: F, next: N) -> Result<PageHandle<N>>
    where
        N: PageSpec,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.ensure_valid()?;
        let session = self.session().clone();
        let (root, marker) = self.capture_root().await?;
        session
            .log()
            .info(format!(">>> Navigating to {}", next.name()));

        let navigated = navigate().await;
        self.retire();
        navigated?;

        wait_root_gone(&session, root, &marker).await?;
        arrive(session, next).await
    }

    /// Transition by clicking an element on this page
    pub async fn transition_via_click<N: PageSpec>(
        &self,
        locator: &Locator,
        next: N,
    ) -> Result<PageHandle<N>> {
        self.ensure_valid()?;
        let element = self
            .session()
            .resolver()
            .resolve(locator, &Scope::Page)
            .await?;
        let clicker = self.session().clicker();
        self.transition(|| async move { clicker.click(Some(element)).await }, next)
            .await
    }

    /// Transition by a click that opens the destination in a new window.
    ///
    /// The old page stays alive in its own window, so there is no root to
    /// watch; arrival is proven by the window count growing. Focus moves to
    /// the newest window.
    pub async fn transition_via_click_new_window<N: PageSpec>(
        &self,
        locator: &Locator,
        next: N,
    ) -> Result<PageHandle<N>> {
        self.ensure_valid()?;
        let session = self.session().clone();
        let element = session.resolver().resolve(locator, &Scope::Page).await?;
        let windows_before = window_count(&session).await?;
        session
            .log()
            .info(format!(">>> Navigating to {} in a new window", next.name()));

        let clicked = session.clicker().click(Some(element)).await;
        self.retire();
        clicked?;

        let spec = session.wait_spec().describe("for a new window to open");
        session
            .waiter()
            .poll(&spec, || {
                let session = session.clone();
                async move { Ok((window_count(&session).await? > windows_before).then_some(())) }
            })
            .await?;

        focus_newest(&session).await?;
        if session.quirks().keeps_frame_on_window_switch {
            session.driver().switch_to_default_content().await?;
        }
        arrive(session, next).await
    }

    /// Transition by a click whose destination renders inside an iframe.
    ///
    /// The old content's root is captured in the current context before any
    /// switching, and its disappearance is still required: the frame
    /// becoming available does not prove the old content was torn down.
    /// When `link_outside_frame` is set, the link lives in the top-level
    /// document and frame context is reset before resolving it; otherwise
    /// the link is resolved in the current frame context.
    pub async fn transition_via_click_into_frame<N: PageSpec>(
        &self,
        link: &Locator,
        frame: &Locator,
        next: N,
        link_outside_frame: bool,
    ) -> Result<PageHandle<N>> {
        self.ensure_valid()?;
        let session = self.session().clone();
        let (root, marker) = self.capture_root().await?;
        if link_outside_frame {
            session.driver().switch_to_default_content().await?;
        }
        let element = session.resolver().resolve(link, &Scope::Page).await?;
        session.log().info(format!(
            ">>> Navigating to {} inside frame {}",
            next.name(),
            frame
        ));

        let clicked = session.clicker().click(Some(element)).await;
        self.retire();
        clicked?;

        wait_root_gone(&session, root, &marker).await?;
        switch_into_frame(&session, frame).await?;
        arrive(session, next).await
    }

    /// Transition by a click that raises a confirmation alert and, once
    /// accepted, closes this page's window. Focus falls back to the
    /// remaining window, where the destination renders inside `frame`.
    pub async fn transition_via_click_through_alert<N: PageSpec>(
        &self,
        locator: &Locator,
        frame: &Locator,
        next: N,
    ) -> Result<PageHandle<N>> {
        self.ensure_valid()?;
        let session = self.session().clone();
        let element = session.resolver().resolve(locator, &Scope::Page).await?;
        let windows_before = window_count(&session).await?;
        session.log().info(format!(
            ">>> Navigating to {} through a confirmation alert",
            next.name()
        ));

        let clicked = session.clicker().click(Some(element)).await;
        self.retire();
        clicked?;

        let spec = session
            .wait_spec()
            .describe("for the confirmation alert to open");
        session
            .waiter()
            .poll(&spec, || {
                let session = session.clone();
                async move { Ok(alert_present(&session).await?.then_some(())) }
            })
            .await?;
        alert_confirm(&session).await?;

        let spec = session
            .wait_spec()
            .describe("for the closing window to go away");
        session
            .waiter()
            .poll(&spec, || {
                let session = session.clone();
                async move { Ok((window_count(&session).await? < windows_before).then_some(())) }
            })
            .await?;

        focus_newest(&session).await?;
        switch_into_frame(&session, frame).await?;
        arrive(session, next).await
    }

    /// Reload this page in place. The handle stays valid: refresh lands on
    /// the same page family, re-verified by the same readiness and loaded
    /// checks as a transition.
    pub async fn refresh(&self, accept_unsaved_changes: bool) -> Result<()> {
        self.ensure_valid()?;
        let session = self.session().clone();
        let (root, marker) = self.capture_root().await?;
        session
            .log()
            .info(format!(">>> Refreshing {}", self.spec().name()));

        session.driver().refresh().await?;

        if accept_unsaved_changes && alert_present(&session).await? {
            alert_confirm(&session).await?;
        }
        if alert_present(&session).await? {
            return Err(Error::assertion_failed(
                "refresh raised an unsaved-changes alert that was not expected",
            ));
        }

        wait_root_gone(&session, root, &marker).await?;
        self.spec().wait_ready(&session).await?;
        self.spec().assert_loaded(&session).await
    }
}
