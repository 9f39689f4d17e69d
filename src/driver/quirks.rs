//! Browser-specific workaround table
//!
//! Known driver defects are expressed as data keyed by browser identity,
//! resolved once per session. A new quirk is a new field and a new `true`
//! here, not a new control-flow branch at a call site.

use super::traits::BrowserKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// Direct element clicks sometimes fail with "could not be scrolled into
    /// view" even for perfectly reachable elements; recover by clicking the
    /// element's location through the input channel instead.
    pub scroll_into_view_click_defect: bool,

    /// Navigating immediately after accepting a native alert can race the
    /// driver and throw an unhandled-alert error; a short settle delay is the
    /// only known mitigation (no good state is detectable without navigating).
    pub post_alert_navigation_race: bool,

    /// Staleness probes for elements inside a deactivated frame raise
    /// `NoSuchElement` with a "Web element reference not seen before:" first
    /// line instead of `StaleElementReference`. Treat that one flavor as
    /// "element gone". String-matched driver detail; replace with a
    /// structural check if the protocol ever exposes one.
    pub frame_reference_staleness_report: bool,

    /// Switching back to a window keeps the previously selected frame
    /// context instead of resetting to top-level content, so the reset must
    /// be issued explicitly.
    pub keeps_frame_on_window_switch: bool,

    /// The driver sporadically throws "unhandled inspector error" around
    /// iframe operations; the operation succeeds when retried once.
    pub inspector_error_transient: bool,
}

impl Quirks {
    /// Resolve the table for a browser. Unknown browsers get no workarounds:
    /// unrecognized failures should surface, not be masked.
    pub fn for_browser(kind: BrowserKind) -> Self {
        match kind {
            BrowserKind::Firefox => Self {
                scroll_into_view_click_defect: true,
                post_alert_navigation_race: true,
                frame_reference_staleness_report: true,
                keeps_frame_on_window_switch: true,
                inspector_error_transient: false,
            },
            BrowserKind::Chrome | BrowserKind::Edge => Self {
                scroll_into_view_click_defect: false,
                post_alert_navigation_race: false,
                frame_reference_staleness_report: false,
                keeps_frame_on_window_switch: false,
                inspector_error_transient: true,
            },
            BrowserKind::Safari | BrowserKind::Unknown => Self::none(),
        }
    }

    /// No workarounds at all
    pub fn none() -> Self {
        Self {
            scroll_into_view_click_defect: false,
            post_alert_navigation_race: false,
            frame_reference_staleness_report: false,
            keeps_frame_on_window_switch: false,
            inspector_error_transient: false,
        }
    }
}
