//! Content assertions against the live page

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::page::{PageHandle, PageSpec};

/// Decode URL escapes so assertions can be written in plain text. In query
/// strings `+` also means space, and `%2B` a literal plus, so the plus
/// substitution happens before percent-decoding. Malformed escapes and
/// non-UTF-8 input pass through untouched.
fn url_decoded(input: &str) -> String {
    let spaced = input.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

impl<S: PageSpec> PageHandle<S> {
    /// Fail unless the page source contains `needle` right now
    pub async fn assert_page_contains(&self, needle: &str) -> Result<()> {
        self.ensure_valid()?;
        self.session()
            .log()
            .info(format!(">>> Assert page contains: {}", needle));
        let source = self.session().driver().page_source().await?;
        if source.contains(needle) {
            Ok(())
        } else {
            Err(Error::assertion_failed(format!(
                "page {} does not contain \"{}\"",
                self.spec().name(),
                needle
            )))
        }
    }

    /// Fail if the page source contains `needle` right now
    pub async fn assert_page_lacks(&self, needle: &str) -> Result<()> {
        self.ensure_valid()?;
        self.session()
            .log()
            .info(format!(">>> Assert page lacks: {}", needle));
        let source = self.session().driver().page_source().await?;
        if source.contains(needle) {
            Err(Error::assertion_failed(format!(
                "page {} unexpectedly contains \"{}\"",
                self.spec().name(),
                needle
            )))
        } else {
            Ok(())
        }
    }

    /// Wait for `needle` to appear in the page source, for content that
    /// arrives after load
    pub async fn wait_until_page_contains(&self, needle: &str) -> Result<()> {
        self.ensure_valid()?;
        let session = self.session();
        session
            .log()
            .info(format!(">>> Assert page eventually contains: {}", needle));
        let spec = session
            .wait_spec()
            .describe(format!("for the page to contain \"{}\"", needle));
        session
            .waiter()
            .poll(&spec, || {
                let driver = session.driver().clone();
                async move {
                    let source = driver.page_source().await?;
                    Ok(source.contains(needle).then_some(()))
                }
            })
            .await
    }

    /// Fail unless the current URL contains `fragment`. Comparison is
    /// case-insensitive and percent-decoded on both sides, so the assertion
    /// reads the way the address bar does.
    pub async fn assert_url_contains(&self, fragment: &str) -> Result<()> {
        self.ensure_valid()?;
        self.session()
            .log()
            .info(format!(">>> Assert URL contains: {}", fragment));
        let url = self.session().driver().current_url().await?;
        let haystack = url_decoded(&url).to_lowercase();
        let needle = url_decoded(fragment).to_lowercase();
        if haystack.contains(&needle) {
            Ok(())
        } else {
            Err(Error::assertion_failed(format!(
                "URL \"{}\" does not contain \"{}\"",
                url, fragment
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::diag::DiagnosticLog;
    use crate::driver::mock::MockDriver;
    use crate::driver::BrowserKind;
    use crate::page::Session;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Results;

    #[async_trait]
    impl PageSpec for Results {
        fn name(&self) -> &str {
            "Results"
        }
    }

    fn handle(driver: &Arc<MockDriver>) -> PageHandle<Results> {
        let config = Config {
            poll_interval_ms: 1,
            hard_timeout_ms: 100,
            ..Config::default()
        };
        PageHandle::new(
            Session::new(driver.clone(), DiagnosticLog::new(), config),
            Results,
        )
    }

    #[test]
    fn test_url_decoded() {
        assert_eq!(url_decoded("a%20b"), "a b");
        assert_eq!(url_decoded("deep+dish"), "deep dish");
        assert_eq!(url_decoded("1%2B1"), "1+1");
        assert_eq!(url_decoded("caf%C3%A9"), "café");
        assert_eq!(url_decoded("100%"), "100%");
        assert_eq!(url_decoded("%zz"), "%zz");
    }

    #[tokio::test]
    async fn test_page_contains() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        driver.set_page_source("<html><body>42 results</body></html>");
        let page = handle(&driver);

        page.assert_page_contains("42 results").await.unwrap();
        let err = page.assert_page_contains("no results").await.unwrap_err();
        assert!(matches!(err, Error::AssertionFailed(_)));

        page.assert_page_lacks("no results").await.unwrap();
        assert!(page.assert_page_lacks("42 results").await.is_err());
    }

    #[tokio::test]
    async fn test_wait_until_page_contains_late_content() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        driver.set_page_source("<html>loading...</html>");
        {
            let driver = driver.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                driver.set_page_source("<html>42 results</html>");
            });
        }

        handle(&driver)
            .wait_until_page_contains("42 results")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_url_assertion_ignores_case_and_escapes() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        driver.set_current_url("https://example.test/Search?q=deep%20dish");
        let page = handle(&driver);

        page.assert_url_contains("q=deep dish").await.unwrap();
        page.assert_url_contains("SEARCH").await.unwrap();
        assert!(page.assert_url_contains("q=thin crust").await.is_err());
    }

    #[tokio::test]
    async fn test_url_assertion_decodes_plus_as_space() {
        let driver = MockDriver::new(BrowserKind::Chrome);
        driver.set_current_url("https://example.test/search?q=deep+dish");
        let page = handle(&driver);

        page.assert_url_contains("deep dish").await.unwrap();
    }
}
