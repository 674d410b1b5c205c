//! PageDriver - the browser capabilities a page object consumes
//!
//! Pages never talk to a browser directly. They read the current url,
//! ask for navigation or raw html loads, and query elements through this
//! trait, so any automation backend (CDP, WebDriver, an in-process fake)
//! can sit underneath.

use crate::result::PrismResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Unique identifier for the element
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Element text content
    pub text_content: Option<String>,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text_content: None,
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }
}

/// Browser capabilities used by pages.
///
/// Methods take `&self`; implementations that track state use interior
/// mutability so one driver can back many page instances.
pub trait PageDriver: Send + Sync {
    /// Url the browser is currently showing
    fn current_url(&self) -> PrismResult<String>;

    /// Navigate to `url`
    fn visit(&self, url: &str) -> PrismResult<()>;

    /// Replace the document with raw html
    fn load_html(&self, html: &str) -> PrismResult<()>;

    /// Document title
    fn title(&self) -> PrismResult<String>;

    /// Elements matching a CSS selector, in document order
    fn find_all(&self, selector: &str) -> PrismResult<Vec<ElementHandle>>;
}

#[derive(Debug, Default)]
struct MockState {
    current_url: String,
    scripted_urls: VecDeque<String>,
    title: String,
    html: Option<String>,
    elements: HashMap<String, Vec<ElementHandle>>,
    call_history: Vec<String>,
}

/// Mock driver for unit testing
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock driver already showing `url`
    #[must_use]
    pub fn at(url: impl Into<String>) -> Self {
        let driver = Self::new();
        driver.set_current_url(url);
        driver
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the current url
    pub fn set_current_url(&self, url: impl Into<String>) {
        self.state().current_url = url.into();
    }

    /// Queue urls reported by successive `current_url` calls; the last one
    /// sticks once the queue drains
    pub fn script_urls<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .scripted_urls
            .extend(urls.into_iter().map(Into::into));
    }

    /// Set the document title
    pub fn set_title(&self, title: impl Into<String>) {
        self.state().title = title.into();
    }

    /// Register elements returned for `selector`
    pub fn add_elements(&self, selector: impl Into<String>, elements: Vec<ElementHandle>) {
        self.state()
            .elements
            .entry(selector.into())
            .or_default()
            .extend(elements);
    }

    /// Last html passed to `load_html`
    #[must_use]
    pub fn html(&self) -> Option<String> {
        self.state().html.clone()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }
}

impl PageDriver for MockDriver {
    fn current_url(&self) -> PrismResult<String> {
        let mut state = self.state();
        state.call_history.push("current_url".to_string());
        if let Some(next) = state.scripted_urls.pop_front() {
            state.current_url = next;
        }
        Ok(state.current_url.clone())
    }

    fn visit(&self, url: &str) -> PrismResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("visit:{url}"));
        state.current_url = url.to_string();
        Ok(())
    }

    fn load_html(&self, html: &str) -> PrismResult<()> {
        let mut state = self.state();
        state.call_history.push("load_html".to_string());
        state.html = Some(html.to_string());
        Ok(())
    }

    fn title(&self) -> PrismResult<String> {
        Ok(self.state().title.clone())
    }

    fn find_all(&self, selector: &str) -> PrismResult<Vec<ElementHandle>> {
        let mut state = self.state();
        state.call_history.push(format!("find_all:{selector}"));
        Ok(state.elements.get(selector).cloned().unwrap_or_default())
    }
}
