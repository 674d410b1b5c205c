//! Page Types
//!
//! Declaration-time configuration for a kind of page: its url template,
//! url matcher, displayed wait time and element declarations.
//!
//! Page types form an explicit parent chain. Every lookup walks from the
//! most derived type to the root and takes the first declared value, so a
//! subtype inherits whatever it does not override. Types are frozen behind
//! an `Arc` once built and are safe to share between page instances and
//! threads.

use crate::element::{ElementDeclaration, ElementKind};
use crate::result::{PrismError, PrismResult};
use crate::uri_template::UriTemplate;
use crate::url_matcher::UrlMatcher;
use crate::wait::Waiter;
use std::sync::Arc;
use std::time::Duration;

/// Values declared directly on one page type
#[derive(Debug, Clone, Default)]
pub struct PageConfig {
    url: Option<String>,
    url_matcher: Option<UrlMatcher>,
    implicit_matcher: Option<UrlMatcher>,
    page_wait_time: Option<Duration>,
    elements: Vec<ElementDeclaration>,
}

impl PageConfig {
    /// Declared url template
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Explicitly declared matcher
    #[must_use]
    pub const fn url_matcher(&self) -> Option<&UrlMatcher> {
        self.url_matcher.as_ref()
    }

    /// Explicit matcher, else one mirroring the declared url
    #[must_use]
    pub fn effective_matcher(&self) -> Option<&UrlMatcher> {
        self.url_matcher.as_ref().or(self.implicit_matcher.as_ref())
    }

    /// Declared wait time
    #[must_use]
    pub const fn page_wait_time(&self) -> Option<Duration> {
        self.page_wait_time
    }

    /// Declared elements
    #[must_use]
    pub fn elements(&self) -> &[ElementDeclaration] {
        &self.elements
    }
}

/// A declared page type
#[derive(Debug)]
pub struct PageType {
    name: String,
    config: PageConfig,
    parent: Option<Arc<PageType>>,
}

impl PageType {
    /// Start declaring a page type
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PageTypeBuilder {
        PageTypeBuilder::new(name)
    }

    /// Type name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values declared on this type alone
    #[must_use]
    pub const fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Parent type
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<PageType>> {
        self.parent.as_ref()
    }

    /// This type followed by its ancestors, most derived first
    pub fn ancestors(&self) -> impl Iterator<Item = &PageType> {
        std::iter::successors(Some(self), |t| t.parent.as_deref())
    }

    /// First value `lookup` finds walking from this type to the root
    pub fn resolve<'a, T, F>(&'a self, lookup: F) -> Option<T>
    where
        F: Fn(&'a PageConfig) -> Option<T>,
    {
        self.ancestors().find_map(|t| lookup(&t.config))
    }

    /// Resolved url template source
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.resolve(PageConfig::url)
    }

    /// Resolved url template
    ///
    /// # Errors
    /// Returns [`PrismError::NoUrlForPage`] when no type in the chain
    /// declares a url, or [`PrismError::InvalidTemplate`] if it is malformed.
    pub fn url_template(&self) -> PrismResult<UriTemplate> {
        let source = self.url().ok_or_else(|| PrismError::NoUrlForPage {
            page: self.name.clone(),
        })?;
        UriTemplate::new(source)
    }

    /// Resolved matcher: the nearest type declaring a matcher or a url.
    /// At the same level an explicit matcher beats the url.
    #[must_use]
    pub fn url_matcher(&self) -> Option<&UrlMatcher> {
        self.resolve(PageConfig::effective_matcher)
    }

    /// Resolved wait time, falling back to [`Waiter::default_wait_time`]
    #[must_use]
    pub fn page_wait_time(&self) -> Duration {
        self.resolve(PageConfig::page_wait_time)
            .unwrap_or_else(Waiter::default_wait_time)
    }

    /// Nearest declaration of element `name`
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementDeclaration> {
        self.resolve(|config| config.elements.iter().find(|e| e.name == name))
    }

    /// Names of all declared elements, subtype declarations first
    #[must_use]
    pub fn element_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for ty in self.ancestors() {
            for decl in &ty.config.elements {
                if !names.contains(&decl.name.as_str()) {
                    names.push(&decl.name);
                }
            }
        }
        names
    }
}

/// Builder for page types
#[derive(Debug, Clone)]
pub struct PageTypeBuilder {
    name: String,
    parent: Option<Arc<PageType>>,
    config: PageConfig,
}

impl PageTypeBuilder {
    /// Create a builder with nothing declared
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            config: PageConfig::default(),
        }
    }

    /// Inherit undeclared values from `parent`
    #[must_use]
    pub fn extends(mut self, parent: &Arc<PageType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare the url template
    #[must_use]
    pub fn set_url(mut self, template: impl Into<String>) -> Self {
        self.config.url = Some(template.into());
        self
    }

    /// Declare an explicit url matcher
    #[must_use]
    pub fn set_url_matcher(mut self, matcher: impl Into<UrlMatcher>) -> Self {
        self.config.url_matcher = Some(matcher.into());
        self
    }

    /// Declare the displayed wait time
    #[must_use]
    pub const fn set_page_wait_time(mut self, wait_time: Duration) -> Self {
        self.config.page_wait_time = Some(wait_time);
        self
    }

    /// Declare an element
    #[must_use]
    pub fn declare(mut self, declaration: ElementDeclaration) -> Self {
        self.config.elements.retain(|e| e.name != declaration.name);
        self.config.elements.push(declaration);
        self
    }

    /// Declare a single element
    #[must_use]
    pub fn element(self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.declare(ElementDeclaration::new(name, selector, ElementKind::Element))
    }

    /// Declare an element collection
    #[must_use]
    pub fn elements(self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.declare(ElementDeclaration::new(name, selector, ElementKind::Elements))
    }

    /// Declare a section root
    #[must_use]
    pub fn section(self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.declare(ElementDeclaration::new(name, selector, ElementKind::Section))
    }

    /// Declare repeated section roots
    #[must_use]
    pub fn sections(self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.declare(ElementDeclaration::new(name, selector, ElementKind::Sections))
    }

    /// Freeze the declaration
    #[must_use]
    pub fn build(mut self) -> Arc<PageType> {
        self.config.implicit_matcher = self.config.url.as_deref().map(UrlMatcher::pattern);
        Arc::new(PageType {
            name: self.name,
            config: self.config,
            parent: self.parent,
        })
    }
}
