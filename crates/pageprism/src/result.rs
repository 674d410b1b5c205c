//! Result and error types for pageprism.

use thiserror::Error;

/// Result type for pageprism operations
pub type PrismResult<T> = Result<T, PrismError>;

/// Errors that can occur while declaring, loading or matching pages
#[derive(Debug, Error)]
pub enum PrismError {
    /// A url was requested but no page type in the chain declares one
    #[error("No url declared for page {page}")]
    NoUrlForPage {
        /// Page type name
        page: String,
    },

    /// A matcher-dependent operation ran without an explicit or implicit matcher
    #[error("No url matcher declared for page {page}")]
    NoUrlMatcherForPage {
        /// Page type name
        page: String,
    },

    /// The declared matcher is neither a usable string nor a regular expression
    #[error("Invalid url matcher: {reason}")]
    InvalidUrlMatcher {
        /// Why the matcher is unusable
        reason: String,
    },

    /// A block was passed to an element accessor that does not take one
    #[error("Accessor {name} does not accept a block")]
    UnsupportedBlock {
        /// Accessor name
        name: String,
    },

    /// URI template could not be parsed
    #[error("Invalid URI template {template:?}: {reason}")]
    InvalidTemplate {
        /// Template source
        template: String,
        /// Parse failure
        reason: String,
    },

    /// Regular expression failed to compile
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Element name not declared on the page type
    #[error("Page {page} declares no element named {name}")]
    UnknownElement {
        /// Page type name
        page: String,
        /// Element name
        name: String,
    },

    /// Declared element not present in the document
    #[error("Element {name} ({selector}) not found on page {page}")]
    ElementNotFound {
        /// Page type name
        page: String,
        /// Element name
        name: String,
        /// CSS selector used for the lookup
        selector: String,
    },

    /// Browser driver failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Page catalog configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl PrismError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid matcher error
    #[must_use]
    pub fn invalid_matcher(reason: impl Into<String>) -> Self {
        Self::InvalidUrlMatcher {
            reason: reason.into(),
        }
    }

    /// Create an invalid template error
    #[must_use]
    pub fn invalid_template(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}
