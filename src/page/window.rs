//! Window focus, native alerts, and whole-page scrolling

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::page::Session;
use std::time::Duration;

/// Large enough to reach either end of any real page in one scroll
const FULL_PAGE_DELTA: i64 = 1_000_000;

/// Settle delay after accepting an alert on drivers with the
/// post-alert navigation race
const POST_ALERT_SETTLE: Duration = Duration::from_millis(500);

/// Number of open windows
pub async fn window_count(session: &Session) -> Result<usize> {
    Ok(session.driver().window_handles().await?.len())
}

/// Focus the most recently opened window. Relies on the driver's
/// insertion-ordered handle list.
pub async fn focus_newest(session: &Session) -> Result<()> {
    let handles = session.driver().window_handles().await?;
    let newest = handles
        .last()
        .ok_or_else(|| Error::internal("driver reported zero windows"))?;
    session.log().debug(format!("Focusing window {}", newest));
    session.driver().switch_to_window(newest).await
}

pub async fn alert_present(session: &Session) -> Result<bool> {
    Ok(session.driver().alert_text().await?.is_some())
}

/// Accept the open alert. On affected drivers, navigating immediately after
/// can race the alert teardown, so a settle delay follows.
pub async fn alert_confirm(session: &Session) -> Result<()> {
    alert_respond(session, true).await
}

pub async fn alert_dismiss(session: &Session) -> Result<()> {
    alert_respond(session, false).await
}

async fn alert_respond(session: &Session, accept: bool) -> Result<()> {
    let text = session.driver().alert_text().await?.unwrap_or_default();
    session.log().info(format!(
        "{} alert: {}",
        if accept { "Accepting" } else { "Dismissing" },
        text
    ));
    if accept {
        session.driver().accept_alert().await?;
    } else {
        session.driver().dismiss_alert().await?;
    }
    if session.quirks().post_alert_navigation_race {
        session
            .log()
            .info("> Waiting out the post-alert navigation race...");
        tokio::time::sleep(POST_ALERT_SETTLE).await;
    }
    Ok(())
}

pub async fn scroll_to_top(session: &Session) -> Result<()> {
    session.driver().scroll_by(0, -FULL_PAGE_DELTA).await
}

pub async fn scroll_to_bottom(session: &Session) -> Result<()> {
    session.driver().scroll_by(0, FULL_PAGE_DELTA).await
}
