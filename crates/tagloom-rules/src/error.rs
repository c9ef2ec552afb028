//! Errors raised while building a rule table or filtering attribute values.

/// A rule table could not be built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The same tag name was declared twice.
    #[error("tag {0:?} is declared more than once")]
    DuplicateTag(String),

    /// A tag declaration has an empty name.
    #[error("tag declarations need a non-empty name")]
    EmptyName,

    /// A limit was declared as zero.
    #[error("{limit} of tag {tag:?} must be at least 1")]
    InvalidLimit {
        /// Tag the limit belongs to.
        tag: String,
        /// Which limit (`nestingLimit` or `tagLimit`).
        limit: &'static str,
    },

    /// A regular expression in a filter or preprocessor does not compile.
    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        #[source]
        source: regex::Error,
    },

    /// A range filter whose minimum is above its maximum.
    #[error("range filter has min {min} above max {max}")]
    InvalidRange {
        /// Declared minimum.
        min: i64,
        /// Declared maximum.
        max: i64,
    },

    /// A declaration names a custom filter that was never registered.
    #[error("unknown custom filter {0:?}")]
    UnknownFilter(String),

    /// The JSON form of the rules could not be read.
    #[error("invalid rules document: {0}")]
    Json(#[from] serde_json::Error),
}

/// An attribute value was rejected by a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The value does not have the shape the filter expects.
    #[error("{filter} filter rejected {value:?}")]
    Rejected {
        /// Name of the filter.
        filter: String,
        /// The rejected value.
        value: String,
    },

    /// The value is not a URL.
    #[error("invalid URL {value:?}: {reason}")]
    InvalidUrl {
        /// The rejected value.
        value: String,
        /// What the URL parser reported.
        reason: String,
    },

    /// The URL uses a scheme that is not allowed.
    #[error("URL scheme {0:?} is not allowed")]
    DisallowedScheme(String),

    /// The URL points at a host that is not allowed.
    #[error("URL host {0:?} is not allowed")]
    DisallowedHost(String),
}

impl FilterError {
    /// Shorthand for [`FilterError::Rejected`].
    #[must_use]
    pub fn rejected(filter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Rejected {
            filter: filter.into(),
            value: value.into(),
        }
    }
}
