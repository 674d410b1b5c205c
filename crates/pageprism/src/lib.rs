//! Pageprism: Page Objects for Browser Tests
//!
//! A page type declares where a page lives (a URI template), how to
//! recognise it (a url matcher) and how long to wait for it. Page
//! instances bind a type to a [`PageDriver`] and answer "is this page
//! displayed?" by polling the driver's current url.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   expand    ┌─────────────┐   visit    ┌────────────┐
//! │  PageType    │────────────►│    Page     │───────────►│ PageDriver │
//! │ url, matcher │             │ load        │            │ (browser)  │
//! │ wait, elems  │◄── extends  │ displayed   │◄───────────│            │
//! └──────────────┘             └─────────────┘ current_url└────────────┘
//!        │                            │
//!        ▼                            ▼
//! ┌──────────────┐            ┌─────────────┐
//! │ UriTemplate  │            │   Waiter    │
//! │ UrlMatcher   │            │ poll until  │
//! └──────────────┘            └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use pageprism::{mappings, MockDriver, Page, PageType, Variables};
//! use std::sync::Arc;
//!
//! let user_page = PageType::builder("UserPage")
//!     .set_url("/users{/username}{?query*}")
//!     .build();
//! let driver = Arc::new(MockDriver::new());
//! let page = Page::new(user_page, driver);
//!
//! page.load_with(Variables::new().with("username", "foobar")).unwrap();
//! assert!(page.displayed_with(&mappings([("username", "foobar")]), None).unwrap());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod catalog;
mod driver;
mod element;
mod page;
mod page_type;
mod result;
mod uri_template;
mod url_matcher;
mod wait;

pub use catalog::{matcher_from_value, PageCatalog, PageDefinition};
pub use driver::{ElementHandle, MockDriver, PageDriver};
pub use element::{ElementDeclaration, ElementKind};
pub use page::{LoadTarget, Page};
pub use page_type::{PageConfig, PageType, PageTypeBuilder};
pub use result::{PrismError, PrismResult};
pub use uri_template::{mappings, Mappings, TemplateValue, UriTemplate, Variables};
pub use url_matcher::{MatchResult, RegexCaptures, StringPattern, UrlMatcher};
pub use wait::{
    wait_until_true, WaitOptions, WaitResult, Waiter, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_WAIT_TIME_MS,
};
