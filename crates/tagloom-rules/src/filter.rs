//! Attribute value filters.
//!
//! A filter either accepts a value, possibly normalizing it, or rejects it
//! with a [`FilterError`]. Filters are resolved when the rule table is built
//! so that the resolver never looks anything up by name.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::FilterError;

/// Signature of a user-supplied filter.
pub type FilterFn = dyn Fn(&str) -> Result<String, FilterError> + Send + Sync;

/// A named, user-supplied filter registered on the
/// [`RuleTableBuilder`](crate::RuleTableBuilder).
#[derive(Clone)]
pub struct CustomFilter {
    name: String,
    func: Arc<FilterFn>,
}

impl CustomFilter {
    /// Wrap a function as a filter.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<String, FilterError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name the filter was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Restrictions applied by the URL filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlConfig {
    /// Lowercase schemes that are accepted.
    pub allowed_schemes: Vec<String>,
    /// Hosts (and their subdomains) that are rejected.
    pub disallowed_hosts: Vec<String>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            disallowed_hosts: Vec::new(),
        }
    }
}

impl UrlConfig {
    fn check(&self, value: &str) -> Result<String, FilterError> {
        let value = value.trim();
        // Relative references are kept as is; protocol-relative ones are not.
        if (value.starts_with('/') && !value.starts_with("//"))
            || value.starts_with('#')
            || value.starts_with('?')
        {
            return Ok(value.to_string());
        }

        let parsed = if value.starts_with("//") {
            Url::parse(&format!("https:{value}"))
        } else {
            Url::parse(value)
        }
        .map_err(|e| FilterError::InvalidUrl {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

        if !value.starts_with("//")
            && !self
                .allowed_schemes
                .iter()
                .any(|scheme| scheme.eq_ignore_ascii_case(parsed.scheme()))
        {
            return Err(FilterError::DisallowedScheme(parsed.scheme().to_string()));
        }

        if let Some(host) = parsed.host_str() {
            let host = host.to_ascii_lowercase();
            let blocked = self.disallowed_hosts.iter().any(|banned| {
                let banned = banned.to_ascii_lowercase();
                host == banned || host.ends_with(&format!(".{banned}"))
            });
            if blocked {
                return Err(FilterError::DisallowedHost(host));
            }
        }

        Ok(value.to_string())
    }
}

/// A resolved attribute filter.
#[derive(Debug, Clone)]
pub enum AttributeFilter {
    /// Absolute http(s) URLs and relative references.
    Url(UrlConfig),
    /// Any value.
    Text,
    /// ASCII digits only.
    Number,
    /// A signed 64-bit integer.
    Int,
    /// An unsigned 64-bit integer.
    Uint,
    /// A finite floating point number.
    Float,
    /// An email address.
    Email,
    /// A hex color, an `rgb()` triple or a color name.
    Color,
    /// Values matching the regex.
    Regexp(Regex),
    /// Filters applied in sequence, each to the previous output.
    Compound(Vec<AttributeFilter>),
    /// An integer, clamped into `min..=max`.
    Range {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Letters, digits, spaces and `-+,._` only.
    SimpleText,
    /// Letters, digits, `-` and `_` only.
    Identifier,
    /// A user-supplied filter.
    Custom(CustomFilter),
}

impl AttributeFilter {
    /// Short name, as used in declarations and diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Url(_) => "url",
            Self::Text => "text",
            Self::Number => "number",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Email => "email",
            Self::Color => "color",
            Self::Regexp(_) => "regexp",
            Self::Compound(_) => "compound",
            Self::Range { .. } => "range",
            Self::SimpleText => "simpletext",
            Self::Identifier => "identifier",
            Self::Custom(custom) => custom.name(),
        }
    }

    /// Filter a value, returning the value to keep.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] describing why the value was rejected.
    pub fn apply(&self, value: &str) -> Result<String, FilterError> {
        let reject = || FilterError::rejected(self.name(), value);
        match self {
            Self::Url(config) => config.check(value),
            Self::Text => Ok(value.to_string()),
            Self::Number => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(value.to_string())
                } else {
                    Err(reject())
                }
            }
            Self::Int => value
                .parse::<i64>()
                .as_ref()
                .map(ToString::to_string)
                .map_err(|_| reject()),
            Self::Uint => value
                .parse::<u64>()
                .as_ref()
                .map(ToString::to_string)
                .map_err(|_| reject()),
            Self::Float => match value.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n.to_string()),
                _ => Err(reject()),
            },
            Self::Email => matches_builtin(
                regex!(r"^[^@\s]+@[^@\s.]+(?:\.[^@\s.]+)+$"),
                value,
            )
            .ok_or_else(reject),
            Self::Color => matches_builtin(
                regex!(
                    r"(?i)^(?:#[0-9a-f]{3}|#[0-9a-f]{6}|rgb\(\s*\d{1,3}\s*,\s*\d{1,3}\s*,\s*\d{1,3}\s*\)|[a-z]+)$"
                ),
                value,
            )
            .ok_or_else(reject),
            Self::Regexp(re) => {
                if re.is_match(value) {
                    Ok(value.to_string())
                } else {
                    Err(reject())
                }
            }
            Self::Compound(filters) => filters
                .iter()
                .try_fold(value.to_string(), |current, filter| filter.apply(&current)),
            Self::Range { min, max } => value
                .trim()
                .parse::<i64>()
                .map(|n| n.clamp(*min, *max).to_string())
                .map_err(|_| reject()),
            Self::SimpleText => matches_builtin(regex!(r"^[- +,.0-9A-Za-z_]+$"), value)
                .ok_or_else(reject),
            Self::Identifier => {
                matches_builtin(regex!(r"^[-0-9A-Za-z_]+$"), value).ok_or_else(reject)
            }
            Self::Custom(custom) => (custom.func)(value),
        }
    }
}

fn matches_builtin(re: Option<&Regex>, value: &str) -> Option<String> {
    re.filter(|re| re.is_match(value))
        .map(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_accepts_http_and_relative() {
        let filter = AttributeFilter::Url(UrlConfig::default());
        assert_eq!(filter.apply(" http://example.org/a ").unwrap(), "http://example.org/a");
        assert_eq!(filter.apply("/path?q=1").unwrap(), "/path?q=1");
        assert_eq!(filter.apply("#top").unwrap(), "#top");
        assert_eq!(filter.apply("//cdn.example.org/x").unwrap(), "//cdn.example.org/x");
    }

    #[test]
    fn url_rejects_scheme_and_host() {
        let filter = AttributeFilter::Url(UrlConfig {
            disallowed_hosts: vec!["evil.com".to_string()],
            ..UrlConfig::default()
        });
        assert_eq!(
            filter.apply("javascript:alert(1)"),
            Err(FilterError::DisallowedScheme("javascript".to_string()))
        );
        assert!(matches!(
            filter.apply("https://www.EVIL.com/"),
            Err(FilterError::DisallowedHost(_))
        ));
        assert!(matches!(filter.apply("not a url"), Err(FilterError::InvalidUrl { .. })));
    }

    #[test]
    fn numeric_filters() {
        assert_eq!(AttributeFilter::Number.apply("0042").unwrap(), "0042");
        assert!(AttributeFilter::Number.apply("-1").is_err());
        assert_eq!(AttributeFilter::Int.apply("-17").unwrap(), "-17");
        assert!(AttributeFilter::Uint.apply("-17").is_err());
        assert_eq!(AttributeFilter::Float.apply("1.50").unwrap(), "1.5");
        assert!(AttributeFilter::Float.apply("inf").is_err());
    }

    #[test]
    fn range_clamps() {
        let filter = AttributeFilter::Range { min: 1, max: 7 };
        assert_eq!(filter.apply("12").unwrap(), "7");
        assert_eq!(filter.apply("0").unwrap(), "1");
        assert_eq!(filter.apply("3").unwrap(), "3");
        assert!(filter.apply("big").is_err());
    }

    #[test]
    fn text_shape_filters() {
        assert!(AttributeFilter::Email.apply("joe@example.org").is_ok());
        assert!(AttributeFilter::Email.apply("joe@localhost").is_err());
        assert!(AttributeFilter::Color.apply("#FFaa00").is_ok());
        assert!(AttributeFilter::Color.apply("rgb(1, 2, 3)").is_ok());
        assert!(AttributeFilter::Color.apply("red").is_ok());
        assert!(AttributeFilter::Color.apply("#12345").is_err());
        assert!(AttributeFilter::Identifier.apply("my-id_2").is_ok());
        assert!(AttributeFilter::Identifier.apply("my id").is_err());
        assert!(AttributeFilter::SimpleText.apply("Hello, world.").is_ok());
        assert!(AttributeFilter::SimpleText.apply("<b>").is_err());
    }

    #[test]
    fn compound_chains_outputs() {
        let filter = AttributeFilter::Compound(vec![
            AttributeFilter::Int,
            AttributeFilter::Range { min: 0, max: 10 },
        ]);
        assert_eq!(filter.apply("+99").unwrap(), "10");
        assert!(filter.apply("x").is_err());
    }

    #[test]
    fn custom_filter_is_called() {
        let filter = AttributeFilter::Custom(CustomFilter::new("upper", |v| Ok(v.to_uppercase())));
        assert_eq!(filter.name(), "upper");
        assert_eq!(filter.apply("abc").unwrap(), "ABC");
    }
}
