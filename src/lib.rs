//! Ironclick is a resilience layer for driving real browsers in automated
//! tests. Remote-controlled pages fail in ways that have nothing to do with
//! the application under test: elements animate, overlays intercept clicks,
//! drivers misreport, navigations race. This crate wraps every interaction
//! in a bounded, observable retry discipline so that a test failure means
//! the application misbehaved, not the plumbing.
//!
//! The pieces:
//!
//! - [`wait`]: the bounded polling primitive everything else is built on
//! - [`click`]: a click state machine that rides out self-resolving failures
//! - [`page`]: single-use page handles and the transition protocol that
//!   proves the old page is gone before trusting the new one
//! - [`diag`]: a ring buffer of recent log entries, dumped on failure
//! - [`driver`]: the traits a browser-automation client implements, the
//!   per-browser quirk table, and a scriptable mock

pub mod click;
pub mod config;
pub mod diag;
pub mod driver;
pub mod error;
pub mod locator;
pub mod page;
pub mod wait;

pub use click::ResilientClicker;
pub use config::Config;
pub use diag::{init_tracing, DiagnosticLog, LogEntry, Severity};
pub use driver::{describe_element, BrowserKind, Driver, ElementHandle, Point, Quirks};
pub use error::{DriverErrorKind, Error, Result};
pub use locator::{Locator, LocatorResolver, Scope};
pub use page::window::{
    alert_confirm, alert_dismiss, alert_present, focus_newest, scroll_to_bottom, scroll_to_top,
    window_count,
};
pub use page::{document_ready, wait_document_ready, PageHandle, PageSpec, Session};
pub use wait::{PollingWaiter, WaitSpec};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
