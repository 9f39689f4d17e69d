//! Unified error types for Ironclick

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Structured classification of browser-reported errors.
///
/// Retry decisions key off this, never off the Rust error type's text.
/// The only message inspection in the crate is the two documented quirk
/// detections, which look at the driver-provided message carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// No element matched the locator
    NoSuchElement,
    /// A previously obtained element reference no longer points at a live node
    StaleElementReference,
    /// Another element would receive the click
    ElementClickIntercepted,
    /// Element is present but cannot be interacted with
    ElementNotInteractable,
    /// No window with the requested handle
    NoSuchWindow,
    /// No frame matched the requested reference
    NoSuchFrame,
    /// An unexpected native alert blocked the command
    UnexpectedAlertOpen,
    /// Anything the driver reported that we do not classify
    Unknown,
}

/// Unified error type for Ironclick
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bounded poll exhausted its deadline without success
    #[error("Timed out waiting {description}")]
    WaitTimeout { description: String },

    /// Resolver-specific specialization of timeout
    #[error("Element not found: {locator} in {scope}")]
    ElementNotFound { locator: String, scope: String },

    /// The liveness marker chosen for this page family was never removed by
    /// navigation. This is a modeling error in the page definition, not a
    /// flaky browser; fix it by choosing a deeper transition root.
    #[error(
        "Page root did not disappear: {marker}. Override the page's transition \
         root to select a more specific element (deeper in the page). The \
         transition root must always be present before navigation and always \
         removed by it; pick the outermost element that actually vanishes \
         during the page load."
    )]
    NavigationRootDidNotDisappear { marker: String },

    /// A page handle was used after a transition retired it
    #[error("Page handle used after it was retired by a navigation")]
    UseAfterInvalidation,

    /// Programming error in the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A page-level assertion failed
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Browser-reported error, classified
    #[error("Browser error ({kind:?}): {message}")]
    Driver {
        kind: DriverErrorKind,
        message: String,
    },

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new wait-timeout error
    pub fn wait_timeout<S: Into<String>>(description: S) -> Self {
        Error::WaitTimeout {
            description: description.into(),
        }
    }

    /// Create a new element-not-found error
    pub fn element_not_found<L: Into<String>, S: Into<String>>(locator: L, scope: S) -> Self {
        Error::ElementNotFound {
            locator: locator.into(),
            scope: scope.into(),
        }
    }

    /// Create a new classified browser error
    pub fn driver<S: Into<String>>(kind: DriverErrorKind, message: S) -> Self {
        Error::Driver {
            kind,
            message: message.into(),
        }
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a new assertion-failed error
    pub fn assertion_failed<S: Into<String>>(msg: S) -> Self {
        Error::AssertionFailed(msg.into())
    }

    /// Create a new script execution error
    pub fn script<S: Into<String>>(msg: S) -> Self {
        Error::Script(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// The driver-level classification, if this is a browser-reported error
    pub fn driver_kind(&self) -> Option<DriverErrorKind> {
        match self {
            Error::Driver { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The driver-provided message, if this is a browser-reported error
    pub fn driver_message(&self) -> Option<&str> {
        match self {
            Error::Driver { message, .. } => Some(message),
            _ => None,
        }
    }

    /// First line of the driver-provided message. Drivers append remote stack
    /// traces after the first newline; classification only ever looks before it.
    pub fn driver_message_first_line(&self) -> Option<&str> {
        self.driver_message().map(|m| m.lines().next().unwrap_or(""))
    }
}
