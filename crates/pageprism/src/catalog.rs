//! Page Catalog
//!
//! Page types declared in YAML instead of code:
//!
//! ```yaml
//! default_wait_time_ms: 2000
//! pages:
//!   - name: UserPage
//!     url: "/users{/username}{?query*}"
//!   - name: AdminPage
//!     extends: UserPage
//!     url_matcher:
//!       regex: "/admin/\\d+"
//!     page_wait_time_ms: 5000
//!     elements:
//!       - name: header
//!         selector: h1
//! ```
//!
//! `url_matcher` is a string pattern, a `{ regex: ... }` mapping, or any
//! other value, which yields the invalid matcher (reported when the page is
//! checked, not at load).

use crate::driver::PageDriver;
use crate::element::ElementDeclaration;
use crate::page::Page;
use crate::page_type::{PageType, PageTypeBuilder};
use crate::result::{PrismError, PrismResult};
use crate::url_matcher::UrlMatcher;
use crate::wait::Waiter;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One page type as written in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Type name, unique within the catalog
    pub name: String,
    /// Parent type name
    #[serde(default)]
    pub extends: Option<String>,
    /// Url template
    #[serde(default)]
    pub url: Option<String>,
    /// Raw matcher value
    #[serde(default)]
    pub url_matcher: Option<serde_json::Value>,
    /// Displayed wait time in milliseconds
    #[serde(default)]
    pub page_wait_time_ms: Option<u64>,
    /// Element declarations
    #[serde(default)]
    pub elements: Vec<ElementDeclaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    default_wait_time_ms: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    pages: Vec<PageDefinition>,
}

/// Interpret a raw matcher value
///
/// # Errors
/// Returns [`PrismError::InvalidRegex`] when a `{ regex: ... }` mapping does
/// not compile.
pub fn matcher_from_value(value: serde_json::Value) -> PrismResult<UrlMatcher> {
    if let serde_json::Value::Object(map) = &value {
        if let (1, Some(serde_json::Value::String(pattern))) = (map.len(), map.get("regex")) {
            return Ok(UrlMatcher::regex(Regex::new(pattern)?));
        }
    }
    Ok(UrlMatcher::from_value(value))
}

/// Page types loaded from a YAML catalog, parents resolved
#[derive(Debug, Clone, Default)]
pub struct PageCatalog {
    pages: BTreeMap<String, Arc<PageType>>,
    default_wait_time: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl PageCatalog {
    /// Parse a catalog from YAML.
    ///
    /// # Errors
    /// [`PrismError::Yaml`] for malformed YAML, [`PrismError::Config`] for
    /// duplicate names, unknown parents or inheritance cycles.
    pub fn from_yaml(yaml: &str) -> PrismResult<Self> {
        let file: CatalogFile = serde_yaml_ng::from_str(yaml)?;
        let catalog = Self::from_definitions(file.pages)?;
        Ok(Self {
            default_wait_time: file.default_wait_time_ms.map(Duration::from_millis),
            poll_interval: file.poll_interval_ms.map(Duration::from_millis),
            ..catalog
        })
    }

    /// Load a catalog file.
    ///
    /// # Errors
    /// [`PrismError::Io`] if the file cannot be read, otherwise as
    /// [`PageCatalog::from_yaml`].
    pub fn from_file(path: impl AsRef<Path>) -> PrismResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml(&yaml)?;
        tracing::debug!(path = %path.display(), pages = catalog.len(), "loaded page catalog");
        Ok(catalog)
    }

    /// Build page types from definitions, parents before children.
    ///
    /// # Errors
    /// [`PrismError::Config`] for duplicate names, unknown parents or
    /// inheritance cycles; [`PrismError::InvalidRegex`] for bad regex matchers.
    pub fn from_definitions(definitions: Vec<PageDefinition>) -> PrismResult<Self> {
        let mut by_name: BTreeMap<String, PageDefinition> = BTreeMap::new();
        for def in definitions {
            if by_name.contains_key(&def.name) {
                return Err(PrismError::config(format!(
                    "page {} is declared twice",
                    def.name
                )));
            }
            by_name.insert(def.name.clone(), def);
        }

        let mut pages = BTreeMap::new();
        let names: Vec<String> = by_name.keys().cloned().collect();
        for name in &names {
            let mut visiting = HashSet::new();
            build_type(name, &by_name, &mut pages, &mut visiting)?;
        }

        Ok(Self {
            pages,
            ..Self::default()
        })
    }

    /// Page type by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<PageType>> {
        self.pages.get(name)
    }

    /// Bind a catalog page type to a driver.
    ///
    /// # Errors
    /// [`PrismError::Config`] if the catalog has no such page.
    pub fn page(&self, name: &str, driver: Arc<dyn PageDriver>) -> PrismResult<Page> {
        let page_type = self
            .get(name)
            .ok_or_else(|| PrismError::config(format!("no page named {name} in catalog")))?;
        Ok(Page::new(Arc::clone(page_type), driver))
    }

    /// Declared page names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// Number of page types
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the catalog declares no pages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Catalog-level default wait time
    #[must_use]
    pub const fn default_wait_time(&self) -> Option<Duration> {
        self.default_wait_time
    }

    /// Catalog-level poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Install the catalog's wait settings as the process-wide defaults.
    /// Settings the catalog leaves out are untouched.
    pub fn apply_wait_defaults(&self) {
        if let Some(wait_time) = self.default_wait_time {
            Waiter::set_default_wait_time(wait_time);
        }
        if let Some(interval) = self.poll_interval {
            Waiter::set_default_poll_interval(interval);
        }
    }
}

fn build_type(
    name: &str,
    definitions: &BTreeMap<String, PageDefinition>,
    built: &mut BTreeMap<String, Arc<PageType>>,
    visiting: &mut HashSet<String>,
) -> PrismResult<Arc<PageType>> {
    if let Some(existing) = built.get(name) {
        return Ok(Arc::clone(existing));
    }
    if !visiting.insert(name.to_string()) {
        return Err(PrismError::config(format!(
            "inheritance cycle through page {name}"
        )));
    }
    let def = definitions
        .get(name)
        .ok_or_else(|| PrismError::config(format!("unknown page {name}")))?;

    let mut builder = PageTypeBuilder::new(&def.name);
    if let Some(parent_name) = &def.extends {
        if !definitions.contains_key(parent_name) {
            return Err(PrismError::config(format!(
                "page {} extends unknown page {parent_name}",
                def.name
            )));
        }
        let parent = build_type(parent_name, definitions, built, visiting)?;
        builder = builder.extends(&parent);
    }
    if let Some(url) = &def.url {
        builder = builder.set_url(url.clone());
    }
    if let Some(value) = &def.url_matcher {
        builder = builder.set_url_matcher(matcher_from_value(value.clone())?);
    }
    if let Some(ms) = def.page_wait_time_ms {
        builder = builder.set_page_wait_time(Duration::from_millis(ms));
    }
    for decl in &def.elements {
        builder = builder.declare(decl.clone());
    }

    let page_type = builder.build();
    tracing::trace!(page = name, parent = ?def.extends, "built page type");
    built.insert(name.to_string(), Arc::clone(&page_type));
    Ok(page_type)
}
