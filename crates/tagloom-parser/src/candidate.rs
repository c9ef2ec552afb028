//! What passes report: candidate tags, grouped by pass.
//!
//! Candidates are plain data so passes can be written in any form, including
//! as JSON consumed by the command-line front end:
//!
//! ```json
//! { "name": "bbcode", "limit": { "maxMatches": 100, "action": "warn" },
//!   "candidates": [
//!     { "type": "start", "name": "B", "pos": 0, "len": 3,
//!       "end": { "pos": 5, "len": 4 } } ] }
//! ```

use serde::{Deserialize, Serialize};
use tagloom_rules::RuleFlags;
use tagloom_tree::AttributesMap;

use crate::{TagKind, TagType};

/// One tag reported by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    /// Direction. Ignored for system kinds, which are always self-closing.
    #[serde(rename = "type")]
    pub tag_type: TagType,
    /// Kind.
    pub kind: TagKind,
    /// Tag name. System kinds get a default name when left empty.
    pub name: String,
    /// Byte offset of the markup.
    pub pos: usize,
    /// Length of the markup in bytes.
    pub len: usize,
    /// Disambiguator between same-named tags.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    /// Raw attribute values, validated during resolution.
    #[serde(skip_serializing_if = "AttributesMap::is_empty")]
    pub attributes: AttributesMap,
    /// Lower values are processed first among tags at the same position.
    pub sort_priority: i32,
    /// Flags of a verbatim span. Element tags take their flags from the rules.
    #[serde(skip_serializing_if = "RuleFlags::is_empty")]
    pub flags: RuleFlags,
    /// End tag paired with this start tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<CandidateEnd>,
}

/// Matching end tag reported together with a start tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateEnd {
    /// Byte offset of the end markup.
    pub pos: usize,
    /// Length of the end markup in bytes.
    pub len: usize,
    /// Sort priority of the end tag.
    pub sort_priority: i32,
}

impl Candidate {
    fn element(tag_type: TagType, name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self {
            tag_type,
            name: name.into(),
            pos,
            len,
            ..Self::default()
        }
    }

    fn system(kind: TagKind, pos: usize, len: usize) -> Self {
        Self {
            kind,
            name: kind.default_name().to_string(),
            pos,
            len,
            ..Self::default()
        }
    }

    /// A start tag.
    #[must_use]
    pub fn start(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::element(TagType::Start, name, pos, len)
    }

    /// An end tag.
    #[must_use]
    pub fn end(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::element(TagType::End, name, pos, len)
    }

    /// A self-closing tag.
    #[must_use]
    pub fn self_closing(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::element(TagType::SelfClosing, name, pos, len)
    }

    /// An explicit line break.
    #[must_use]
    pub fn line_break(pos: usize, len: usize) -> Self {
        Self::system(TagKind::LineBreak, pos, len)
    }

    /// A span to keep as ignored text.
    #[must_use]
    pub fn ignore(pos: usize, len: usize) -> Self {
        Self::system(TagKind::Ignore, pos, len)
    }

    /// A forced paragraph break.
    #[must_use]
    pub fn paragraph_break(pos: usize) -> Self {
        Self::system(TagKind::ParagraphBreak, pos, 0)
    }

    /// A span output as text under `flags`.
    #[must_use]
    pub fn verbatim(pos: usize, len: usize, flags: RuleFlags) -> Self {
        Self {
            flags,
            ..Self::system(TagKind::Verbatim, pos, len)
        }
    }

    /// Report the matching end tag along with this start tag.
    #[must_use]
    pub const fn with_end(mut self, pos: usize, len: usize) -> Self {
        self.end = Some(CandidateEnd {
            pos,
            len,
            sort_priority: 0,
        });
        self
    }

    /// Set one attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the sort priority.
    #[must_use]
    pub const fn with_sort_priority(mut self, priority: i32) -> Self {
        self.sort_priority = priority;
        self
    }
}

/// Identifier of a registered pass, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub u32);

/// What happens when a pass reports more candidates than its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitAction {
    /// Keep the first candidates, log at debug level.
    Ignore,
    /// Keep the first candidates, log a warning.
    #[default]
    Warn,
    /// Fail the resolution.
    Abort,
}

/// Cap on the number of candidates a pass may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassLimit {
    /// Maximum number of candidates kept.
    pub max_matches: usize,
    /// Action taken above the maximum.
    #[serde(default)]
    pub action: LimitAction,
}

/// The candidates of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    /// Name used in diagnostics.
    pub name: String,
    /// Reported candidates, in any order.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Optional cap on `candidates`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<PassLimit>,
}

impl Pass {
    /// A pass without limit.
    #[must_use]
    pub fn new(name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            name: name.into(),
            candidates,
            limit: None,
        }
    }

    /// Cap the number of candidates.
    #[must_use]
    pub const fn with_limit(mut self, max_matches: usize, action: LimitAction) -> Self {
        self.limit = Some(PassLimit {
            max_matches,
            action,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_candidates_get_default_names() {
        assert_eq!(Candidate::line_break(4, 0).name, "br");
        assert_eq!(Candidate::ignore(0, 2).kind, TagKind::Ignore);
        let verbatim = Candidate::verbatim(1, 3, RuleFlags::IGNORE_TEXT);
        assert_eq!(verbatim.name, "v");
        assert_eq!(verbatim.flags, RuleFlags::IGNORE_TEXT);
    }

    #[test]
    fn builder_helpers() {
        let candidate = Candidate::start("URL", 0, 5)
            .with_attribute("url", "http://example.org")
            .with_suffix(":0")
            .with_sort_priority(-2)
            .with_end(10, 6);
        assert_eq!(candidate.tag_type, TagType::Start);
        assert_eq!(candidate.attributes["url"], "http://example.org");
        assert_eq!(candidate.suffix, ":0");
        assert_eq!(candidate.sort_priority, -2);
        assert_eq!(candidate.end.map(|end| end.pos), Some(10));
    }

    #[test]
    fn pass_limit_defaults_to_warn() {
        let limit = PassLimit {
            max_matches: 3,
            action: LimitAction::default(),
        };
        assert_eq!(Pass::new("p", vec![]).with_limit(3, LimitAction::Warn).limit, Some(limit));
    }
}
