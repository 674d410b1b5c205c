//! Page Objects
//!
//! A [`Page`] pairs a frozen [`PageType`] with the driver it runs against.
//! It holds no other state: every call reads the driver's current url
//! afresh, because the url can change between polls.
//!
//! ```ignore
//! let user_page = PageType::builder("UserPage")
//!     .set_url("/users{/username}{?query*}")
//!     .build();
//! let page = Page::new(user_page, driver);
//!
//! page.load_with(Variables::new().with("username", "foobar"))?;
//! assert!(page.displayed_with(&mappings([("username", "foobar")]), None)?);
//! ```

use crate::driver::{ElementHandle, PageDriver};
use crate::element::ElementDeclaration;
use crate::result::{PrismError, PrismResult};
use crate::uri_template::{Mappings, Variables};
use crate::url_matcher::{MatchResult, UrlMatcher};
use crate::wait::{WaitOptions, Waiter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::page_type::PageType;

/// What `load_with` should put in the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    /// Expand the page url with these variables and navigate to it
    Variables(Variables),
    /// Load raw html instead of navigating
    Html(String),
}

impl Default for LoadTarget {
    fn default() -> Self {
        Self::Variables(Variables::new())
    }
}

impl From<Variables> for LoadTarget {
    fn from(vars: Variables) -> Self {
        Self::Variables(vars)
    }
}

impl From<&str> for LoadTarget {
    fn from(html: &str) -> Self {
        Self::Html(html.to_string())
    }
}

impl From<String> for LoadTarget {
    fn from(html: String) -> Self {
        Self::Html(html)
    }
}

/// A page instance bound to a driver
#[derive(Clone)]
pub struct Page {
    page_type: Arc<PageType>,
    driver: Arc<dyn PageDriver>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("page_type", &self.page_type.name())
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Bind a page type to a driver
    #[must_use]
    pub fn new(page_type: Arc<PageType>, driver: Arc<dyn PageDriver>) -> Self {
        Self { page_type, driver }
    }

    /// The page's type
    #[must_use]
    pub fn page_type(&self) -> &PageType {
        &self.page_type
    }

    /// Driver backing this page
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    // =========================================================================
    // URL AND LOADING
    // =========================================================================

    /// Url with no variables bound
    ///
    /// # Errors
    /// [`PrismError::NoUrlForPage`] when no url is declared.
    pub fn url(&self) -> PrismResult<String> {
        self.url_with(&Variables::new())
    }

    /// Expand the declared url template
    ///
    /// # Errors
    /// [`PrismError::NoUrlForPage`] when no url is declared.
    pub fn url_with(&self, vars: &Variables) -> PrismResult<String> {
        Ok(self.page_type.url_template()?.expand(vars))
    }

    /// Navigate to the url with no variables bound
    ///
    /// # Errors
    /// [`PrismError::NoUrlForPage`] when no url is declared; driver errors.
    pub fn load(&self) -> PrismResult<()> {
        self.load_with(LoadTarget::default())
    }

    /// Navigate to the expanded url, or load raw html
    ///
    /// # Errors
    /// [`PrismError::NoUrlForPage`] when navigating without a declared url;
    /// driver errors.
    pub fn load_with(&self, target: impl Into<LoadTarget>) -> PrismResult<()> {
        match target.into() {
            LoadTarget::Html(html) => {
                tracing::debug!(page = self.page_type.name(), bytes = html.len(), "loading html");
                self.driver.load_html(&html)
            }
            LoadTarget::Variables(vars) => {
                let url = self.url_with(&vars)?;
                tracing::debug!(page = self.page_type.name(), %url, "visiting");
                self.driver.visit(&url)
            }
        }
    }

    // =========================================================================
    // MATCHING
    // =========================================================================

    /// Resolved matcher, explicit or mirrored from the url
    #[must_use]
    pub fn url_matcher(&self) -> Option<&UrlMatcher> {
        self.page_type.url_matcher()
    }

    fn usable_matcher(&self) -> PrismResult<&UrlMatcher> {
        match self.url_matcher() {
            None => Err(PrismError::NoUrlMatcherForPage {
                page: self.page_type.name().to_string(),
            }),
            Some(UrlMatcher::Invalid { reason, .. }) => {
                Err(PrismError::invalid_matcher(reason.clone()))
            }
            Some(matcher) => Ok(matcher),
        }
    }

    /// Timeout a displayed check uses: `seconds` if given, else the page
    /// type's wait time
    #[must_use]
    pub fn wait_time(&self, seconds: Option<Duration>) -> Duration {
        seconds.unwrap_or_else(|| self.page_type.page_wait_time())
    }

    /// Whether the current url matches, polling for the page wait time
    ///
    /// # Errors
    /// [`PrismError::NoUrlMatcherForPage`] or [`PrismError::InvalidUrlMatcher`]
    /// for misconfigured pages; driver errors.
    pub fn displayed(&self) -> PrismResult<bool> {
        self.displayed_with(&Mappings::new(), None)
    }

    /// Whether the current url matches with the expected bindings, polling
    /// for `seconds` (or the page wait time). Never matching before the
    /// timeout is `Ok(false)`.
    ///
    /// # Errors
    /// [`PrismError::NoUrlMatcherForPage`] or [`PrismError::InvalidUrlMatcher`]
    /// for misconfigured pages; driver errors.
    pub fn displayed_with(&self, expected: &Mappings, seconds: Option<Duration>) -> PrismResult<bool> {
        let matcher = self.usable_matcher()?;
        let timeout = self.wait_time(seconds);
        let waiter = Waiter::with_options(
            WaitOptions::new().with_timeout(timeout.as_millis() as u64),
        );

        let outcome = waiter.wait_until_true(|| {
            let current = self.driver.current_url()?;
            matcher.matches_with_mappings(&current, expected)
        })?;

        tracing::debug!(
            page = self.page_type.name(),
            displayed = outcome.success,
            attempts = outcome.attempts,
            "displayed check"
        );
        Ok(outcome.success)
    }

    /// Match data for the current url, without waiting
    ///
    /// # Errors
    /// [`PrismError::NoUrlMatcherForPage`] or [`PrismError::InvalidUrlMatcher`]
    /// for misconfigured pages; driver errors.
    pub fn url_matches(&self) -> PrismResult<Option<MatchResult>> {
        let matcher = self.usable_matcher()?;
        let current = self.driver.current_url()?;
        matcher.url_matches(&current)
    }

    /// Wait for the page to be displayed, then match the current url.
    /// `None` if it never displays.
    ///
    /// # Errors
    /// Same as [`Page::displayed_with`].
    pub fn url_matches_within(&self, seconds: Option<Duration>) -> PrismResult<Option<MatchResult>> {
        if !self.displayed_with(&Mappings::new(), seconds)? {
            return Ok(None);
        }
        self.url_matches()
    }

    /// Fail unless the page is displayed with the expected bindings
    ///
    /// # Errors
    /// [`PrismError::AssertionFailed`] naming the current url when the page
    /// is not displayed, plus the errors of [`Page::displayed_with`].
    pub fn assert_displayed(&self, expected: &Mappings) -> PrismResult<()> {
        if self.displayed_with(expected, None)? {
            return Ok(());
        }
        let current = self.driver.current_url()?;
        Err(PrismError::AssertionFailed {
            message: format!(
                "expected {} to be displayed with {:?}, current url is {}",
                self.page_type.name(),
                expected,
                current
            ),
        })
    }

    // =========================================================================
    // DOCUMENT
    // =========================================================================

    /// Document title
    ///
    /// # Errors
    /// Driver errors.
    pub fn title(&self) -> PrismResult<String> {
        self.driver.title()
    }

    /// Whether the current url is served over https. Relative or
    /// unparseable urls are not secure.
    ///
    /// # Errors
    /// Driver errors.
    pub fn is_secure(&self) -> PrismResult<bool> {
        let current = self.driver.current_url()?;
        Ok(Url::parse(&current).is_ok_and(|url| url.scheme() == "https"))
    }

    fn declaration(&self, name: &str) -> PrismResult<&ElementDeclaration> {
        self.page_type
            .element(name)
            .ok_or_else(|| PrismError::UnknownElement {
                page: self.page_type.name().to_string(),
                name: name.to_string(),
            })
    }

    /// First element for a declared name
    ///
    /// # Errors
    /// [`PrismError::UnknownElement`] for undeclared names,
    /// [`PrismError::ElementNotFound`] when nothing matches.
    pub fn element(&self, name: &str) -> PrismResult<ElementHandle> {
        let decl = self.declaration(name)?;
        self.driver
            .find_all(&decl.selector)?
            .into_iter()
            .next()
            .ok_or_else(|| PrismError::ElementNotFound {
                page: self.page_type.name().to_string(),
                name: name.to_string(),
                selector: decl.selector.clone(),
            })
    }

    /// Every element for a declared name
    ///
    /// # Errors
    /// [`PrismError::UnknownElement`] for undeclared names.
    pub fn elements(&self, name: &str) -> PrismResult<Vec<ElementHandle>> {
        let decl = self.declaration(name)?;
        self.driver.find_all(&decl.selector)
    }

    /// Whether a declared element is present
    ///
    /// # Errors
    /// [`PrismError::UnknownElement`] for undeclared names.
    pub fn has_element(&self, name: &str) -> PrismResult<bool> {
        Ok(!self.elements(name)?.is_empty())
    }

    /// Element accessors do not take blocks; scope work on the returned
    /// handles instead.
    ///
    /// # Errors
    /// Always: [`PrismError::UnsupportedBlock`] for declared names,
    /// [`PrismError::UnknownElement`] otherwise.
    pub fn element_with_block<F>(&self, name: &str, _block: F) -> PrismResult<ElementHandle>
    where
        F: FnOnce(&ElementHandle),
    {
        let decl = self.declaration(name)?;
        Err(PrismError::UnsupportedBlock {
            name: decl.name.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use crate::uri_template::{mappings, TemplateValue};
    use regex::Regex;

    fn page(ty: Arc<PageType>, url: &str) -> (Page, Arc<MockDriver>) {
        let driver = Arc::new(MockDriver::at(url));
        (Page::new(ty, driver.clone()), driver)
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_load_without_url_fails() {
            let (page, _) = page(PageType::builder("MyPageWithNoUrl").build(), "");
            assert!(matches!(page.load(), Err(PrismError::NoUrlForPage { .. })));
            assert!(matches!(page.url(), Err(PrismError::NoUrlForPage { .. })));
        }

        #[test]
        fn test_load_visits_url() {
            let (page, driver) = page(PageType::builder("Bob").set_url("/bob").build(), "");
            page.load().unwrap();
            assert!(driver.was_called("visit:/bob"));
        }

        #[test]
        fn test_load_expands_template() {
            let ty = PageType::builder("Users")
                .set_url("/users{/username}{?query*}")
                .build();
            let (page, driver) = page(ty, "");
            page.load_with(Variables::new().with("username", "foobar"))
                .unwrap();
            assert!(driver.was_called("visit:/users/foobar"));

            let vars = Variables::new()
                .with("username", "foobar")
                .with("query", TemplateValue::map([("recent_posts", "true")]));
            assert_eq!(page.url_with(&vars).unwrap(), "/users/foobar?recent_posts=true");
            assert_eq!(page.url().unwrap(), "/users");
        }

        #[test]
        fn test_load_html_needs_no_url() {
            let (page, driver) = page(PageType::builder("Page").build(), "");
            page.load_with("<html/>").unwrap();
            assert_eq!(driver.html().as_deref(), Some("<html/>"));
            assert!(!driver.was_called("visit"));
        }
    }

    mod displayed_tests {
        use super::*;

        #[test]
        fn test_no_matcher() {
            let (page, _) = page(PageType::builder("PageWithNoMatcher").build(), "/");
            assert!(matches!(
                page.displayed(),
                Err(PrismError::NoUrlMatcherForPage { .. })
            ));
            assert!(matches!(
                page.url_matches(),
                Err(PrismError::NoUrlMatcherForPage { .. })
            ));
        }

        #[test]
        fn test_regex_matcher() {
            let ty = PageType::builder("PageWithUrlMatcher")
                .set_url_matcher(Regex::new("bob").unwrap())
                .build();
            let (page, driver) = page(ty, "http://localhost/alice");
            assert!(!page.displayed().unwrap());
            driver.set_current_url("http://localhost/bob");
            assert!(page.displayed().unwrap());
        }

        #[test]
        fn test_bogus_matcher() {
            let ty = PageType::builder("Bogus")
                .set_url_matcher(serde_json::json!({"this": "isn't a URL matcher"}))
                .build();
            let (page, _) = page(ty, "http://localhost/");
            assert!(matches!(
                page.displayed(),
                Err(PrismError::InvalidUrlMatcher { .. })
            ));
            assert!(matches!(
                page.url_matches(),
                Err(PrismError::InvalidUrlMatcher { .. })
            ));
        }

        #[test]
        fn test_parameterized_matcher() {
            let ty = PageType::builder("Foos")
                .set_url_matcher("{scheme}:///foos{/id}")
                .build();
            let (page, _) = page(ty, "http://localhost:3000/foos/28");
            assert!(page.displayed().unwrap());
            assert!(page.displayed_with(&mappings([("id", 28)]), None).unwrap());
            assert!(!page.displayed_with(&mappings([("id", 17)]), None).unwrap());
        }

        #[test]
        fn test_polls_until_url_changes() {
            let ty = PageType::builder("Later").set_url("/later").build();
            let (page, driver) = page(ty, "/");
            driver.script_urls(["/now", "/soon", "/later"]);
            let shown = page
                .displayed_with(&Mappings::new(), Some(Duration::from_secs(5)))
                .unwrap();
            assert!(shown);
        }

        #[test]
        fn test_wait_time_prefers_argument() {
            let ty = PageType::builder("Slow")
                .set_url("/")
                .set_page_wait_time(Duration::from_secs(42))
                .build();
            let (page, _) = page(ty, "/");
            assert_eq!(page.wait_time(None), Duration::from_secs(42));
            assert_eq!(
                page.wait_time(Some(Duration::from_secs(60))),
                Duration::from_secs(60)
            );
        }

        #[test]
        fn test_assert_displayed_describes_failure() {
            let ty = PageType::builder("Foos").set_url("/foos{/id}").build();
            let (page, _) = page(ty, "http://localhost/foos/28");
            page.assert_displayed(&mappings([("id", 28)])).unwrap();
            let err = page.assert_displayed(&mappings([("id", 17)])).unwrap_err();
            assert!(err.to_string().contains("http://localhost/foos/28"));
        }
    }

    mod url_matches_tests {
        use super::*;

        #[test]
        fn test_mappings_from_current_url() {
            let ty = PageType::builder("Foos")
                .set_url_matcher("{scheme}:///foos{/id}")
                .build();
            let (page, driver) = page(ty, "http://localhost:3000/foos/15");
            let result = page.url_matches().unwrap().unwrap();
            assert_eq!(
                result.as_mapping(),
                Some(&mappings([("scheme", "http"), ("id", "15")]))
            );

            driver.set_current_url("http://localhost:3000/bars/15");
            assert!(page.url_matches().unwrap().is_none());
        }

        #[test]
        fn test_within_returns_none_when_never_displayed() {
            let ty = PageType::builder("Foos").set_url("/foos").build();
            let (page, _) = page(ty, "/bars");
            let result = page.url_matches_within(Some(Duration::ZERO)).unwrap();
            assert!(result.is_none());
        }
    }

    mod element_tests {
        use super::*;

        fn home() -> (Page, Arc<MockDriver>) {
            let ty = PageType::builder("TestHomePage")
                .set_url("/home")
                .element("welcome_header", "h1")
                .element("invisible_element", "input.invisible")
                .elements("lots_of_links", "a")
                .section("people", ".people")
                .sections("nonexistent_section", ".nothing")
                .build();
            page(ty, "/home")
        }

        #[test]
        fn test_element_lookup() {
            let (page, driver) = home();
            driver.add_elements("h1", vec![ElementHandle::new("h", "h1").with_text("Welcome")]);
            driver.add_elements("a", vec![ElementHandle::new("1", "a"), ElementHandle::new("2", "a")]);

            let header = page.element("welcome_header").unwrap();
            assert_eq!(header.text_content.as_deref(), Some("Welcome"));
            assert_eq!(page.elements("lots_of_links").unwrap().len(), 2);
            assert!(!page.has_element("people").unwrap());
            assert!(matches!(
                page.element("people"),
                Err(PrismError::ElementNotFound { .. })
            ));
            assert!(matches!(
                page.element("nope"),
                Err(PrismError::UnknownElement { .. })
            ));
        }

        #[test]
        fn test_blocks_are_unsupported() {
            let (page, _) = home();
            for name in [
                "invisible_element",
                "lots_of_links",
                "people",
                "nonexistent_section",
            ] {
                let result = page.element_with_block(name, |_| {});
                assert!(
                    matches!(result, Err(PrismError::UnsupportedBlock { .. })),
                    "{name} accepted a block"
                );
            }
        }
    }

    #[test]
    fn test_title_and_secure() {
        let (page, driver) = page(PageType::builder("Page").build(), "https://bla.org/");
        driver.set_title("Home");
        assert_eq!(page.title().unwrap(), "Home");
        assert!(page.is_secure().unwrap());
        driver.set_current_url("http://bla.org/");
        assert!(!page.is_secure().unwrap());
        driver.set_current_url("https-mirror://bla.org/");
        assert!(!page.is_secure().unwrap());
        driver.set_current_url("/https/login");
        assert!(!page.is_secure().unwrap());
    }
}
