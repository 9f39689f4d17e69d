//! Element locator strategies and the polling resolver

use crate::diag::DiagnosticLog;
use crate::driver::{describe_element, Driver, ElementHandle};
use crate::error::{DriverErrorKind, Error, Result};
use crate::wait::{PollingWaiter, WaitSpec};
use std::fmt;
use std::sync::Arc;

/// A selector strategy plus its value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
    ClassName(String),
    LinkText(String),
    PartialLinkText(String),
}

impl Locator {
    pub fn css<S: Into<String>>(selector: S) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath<S: Into<String>>(expression: S) -> Self {
        Locator::XPath(expression.into())
    }

    pub fn id<S: Into<String>>(id: S) -> Self {
        Locator::Id(id.into())
    }

    pub fn name<S: Into<String>>(name: S) -> Self {
        Locator::Name(name.into())
    }

    pub fn class_name<S: Into<String>>(class: S) -> Self {
        Locator::ClassName(class.into())
    }

    pub fn link_text<S: Into<String>>(text: S) -> Self {
        Locator::LinkText(text.into())
    }

    pub fn partial_link_text<S: Into<String>>(text: S) -> Self {
        Locator::PartialLinkText(text.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css \"{}\"", s),
            Locator::XPath(s) => write!(f, "xpath \"{}\"", s),
            Locator::Id(s) => write!(f, "id \"{}\"", s),
            Locator::Name(s) => write!(f, "name \"{}\"", s),
            Locator::ClassName(s) => write!(f, "class \"{}\"", s),
            Locator::LinkText(s) => write!(f, "link text \"{}\"", s),
            Locator::PartialLinkText(s) => write!(f, "partial link text \"{}\"", s),
        }
    }
}

/// Search context for a lookup
#[derive(Debug, Clone)]
pub enum Scope {
    /// The whole page, in the currently selected frame
    Page,
    /// Descendants of a previously resolved element
    Within(Arc<dyn ElementHandle>),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Page => write!(f, "page"),
            Scope::Within(el) => write!(f, "element {}", el.id()),
        }
    }
}

/// Resolves a locator to an element, tolerating "not yet present".
///
/// Returns the first match as soon as the browser reports one; callers
/// disambiguate multiple matches through locator specificity, not here.
#[derive(Clone)]
pub struct LocatorResolver {
    driver: Arc<dyn Driver>,
    waiter: PollingWaiter,
    log: DiagnosticLog,
    base: WaitSpec,
}

impl LocatorResolver {
    pub fn new(driver: Arc<dyn Driver>, log: DiagnosticLog, base: WaitSpec) -> Self {
        Self {
            driver,
            waiter: PollingWaiter::new(log.clone()),
            log,
            base,
        }
    }

    /// Resolve with the resolver's default wait parameters
    pub async fn resolve(&self, locator: &Locator, scope: &Scope) -> Result<Arc<dyn ElementHandle>> {
        self.resolve_with(locator, scope, self.base.clone()).await
    }

    /// Resolve with explicit wait parameters
    pub async fn resolve_with(
        &self,
        locator: &Locator,
        scope: &Scope,
        spec: WaitSpec,
    ) -> Result<Arc<dyn ElementHandle>> {
        let spec = spec
            .describe(format!("to find element {}", locator))
            .ignoring(DriverErrorKind::NoSuchElement);

        let found = self
            .waiter
            .poll(&spec, || {
                let driver = self.driver.clone();
                async move { driver.find(locator, scope).await.map(Some) }
            })
            .await;

        match found {
            Ok(element) => {
                self.log.trace(format!(
                    "Found element {}",
                    describe_element(element.as_ref()).await
                ));
                Ok(element)
            }
            Err(Error::WaitTimeout { .. }) => Err(Error::element_not_found(
                locator.to_string(),
                scope.to_string(),
            )),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(
            Locator::css("button.submit").to_string(),
            "css \"button.submit\""
        );
        assert_eq!(Locator::id("main").to_string(), "id \"main\"");
        assert_eq!(
            Locator::partial_link_text("Sign").to_string(),
            "partial link text \"Sign\""
        );
    }
}
