//! The diagnostic trail of a resolution.
//!
//! Every decision the resolver makes about a candidate that does not end up in
//! the tree (a skipped tag, a rejected attribute, an exceeded limit) is
//! recorded here, in order. Entries keep their message template and
//! positional parameters apart so that callers can group, translate or
//! filter them without parsing rendered strings.
//!
//! Each recorded entry is also forwarded to the [`log`] facade under the
//! `tagloom` target.

use std::fmt;

use serde::Serialize;
use strum_macros::{Display, EnumString};

/// Target used when forwarding entries to the `log` facade.
pub const LOG_TARGET: &str = "tagloom";

/// How serious a diagnostic is.
///
/// - `Debug`: an expected, benign skip (overlap, unmatched end tag)
/// - `Warning`: suspicious but tolerated input (limits, bad offsets)
/// - `Error`: attribute validation failures
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Benign, expected skip.
    Debug,
    /// Suspicious but tolerated.
    Warning,
    /// Validation failure.
    Error,
}

impl Severity {
    const fn level(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Severity of the entry.
    pub severity: Severity,
    /// Message template with positional placeholders (`{0}`, `{1}`, ...).
    pub template: &'static str,
    /// Values for the placeholders, in order.
    pub params: Vec<String>,
    /// Byte offset in the input the entry refers to, if any.
    pub pos: Option<usize>,
}

impl LogEntry {
    /// Render the template with its parameters.
    ///
    /// Placeholders without a matching parameter are kept verbatim.
    #[must_use]
    pub fn message(&self) -> String {
        render_template(self.template, &self.params)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "[{}] {} (at byte {pos})", self.severity, self.message()),
            None => write!(f, "[{}] {}", self.severity, self.message()),
        }
    }
}

fn render_template(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        if digits > 0
            && after.as_bytes().get(digits) == Some(&b'}')
            && let Some(value) = after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|index| params.get(index))
        {
            out.push_str(value);
            rest = &after[digits + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Append-only, ordered collection of [`LogEntry`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Logger {
    entries: Vec<LogEntry>,
}

impl Logger {
    /// Create an empty logger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record an entry and forward it to the `log` facade.
    pub fn record(
        &mut self,
        severity: Severity,
        pos: Option<usize>,
        template: &'static str,
        params: &[&dyn fmt::Display],
    ) {
        let entry = LogEntry {
            severity,
            template,
            params: params.iter().map(ToString::to_string).collect(),
            pos,
        };
        log::log!(target: LOG_TARGET, severity.level(), "{entry}");
        self.entries.push(entry);
    }

    /// Record a `debug` entry.
    pub fn debug(
        &mut self,
        pos: impl Into<Option<usize>>,
        template: &'static str,
        params: &[&dyn fmt::Display],
    ) {
        self.record(Severity::Debug, pos.into(), template, params);
    }

    /// Record a `warning` entry.
    pub fn warn(
        &mut self,
        pos: impl Into<Option<usize>>,
        template: &'static str,
        params: &[&dyn fmt::Display],
    ) {
        self.record(Severity::Warning, pos.into(), template, params);
    }

    /// Record an `error` entry.
    pub fn error(
        &mut self,
        pos: impl Into<Option<usize>>,
        template: &'static str,
        params: &[&dyn fmt::Display],
    ) {
        self.record(Severity::Error, pos.into(), template, params);
    }

    /// All entries, in recording order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Iterate over the entries in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with exactly this severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }

    /// Entries at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.severity >= severity)
    }

    /// First entry whose rendered message contains `needle`.
    #[must_use]
    pub fn find(&self, needle: &str) -> Option<&LogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.message().contains(needle))
    }

    /// Consume the logger, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Logger {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_positional_parameters() {
        let mut logger = Logger::new();
        logger.warn(4, "Tag {0} exceeds limit {1}", &[&"B", &3]);

        let entry = &logger.entries()[0];
        assert_eq!(entry.message(), "Tag B exceeds limit 3");
        assert_eq!(entry.params, vec!["B".to_string(), "3".to_string()]);
        assert_eq!(entry.pos, Some(4));
    }

    #[test]
    fn keeps_unknown_placeholders() {
        let rendered = render_template("{0} and {7} and {x} and {", &["a".to_string()]);
        assert_eq!(rendered, "a and {7} and {x} and {");
    }

    #[test]
    fn counts_by_severity() {
        let mut logger = Logger::new();
        logger.debug(0, "a", &[]);
        logger.debug(None::<usize>, "b", &[]);
        logger.error(2, "c", &[]);

        assert_eq!(logger.len(), 3);
        assert_eq!(logger.count(Severity::Debug), 2);
        assert_eq!(logger.at_least(Severity::Warning).count(), 1);
        assert!(logger.find("c").is_some());
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("Warning".parse::<Severity>().ok(), Some(Severity::Warning));
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn display_includes_position() {
        let mut logger = Logger::new();
        logger.debug(12, "Tag {0} skipped", &[&"I"]);
        assert_eq!(logger.entries()[0].to_string(), "[debug] Tag I skipped (at byte 12)");
    }
}
