//! Per-tag behavior switches.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Boolean options of a tag rule, also used as the flags of the current
    /// context while resolving.
    ///
    /// In JSON declarations the flags are written as a `|`-separated list of
    /// names, e.g. `"AUTO_REOPEN | TRIM_AFTER"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RuleFlags: u32 {
        /// A start tag not followed by its end tag becomes self-closing.
        const AUTO_CLOSE        = 1 << 0;
        /// Reopen the element after it was closed by a foreign end tag.
        const AUTO_REOPEN       = 1 << 1;
        /// The start tag closes the current paragraph.
        const BREAK_PARAGRAPH   = 1 << 2;
        /// Text in this context is wrapped in paragraphs.
        const CREATE_PARAGRAPHS = 1 << 3;
        /// Tags inside are ignored, except the ones closing this element.
        const IGNORE_TAGS       = 1 << 4;
        /// Text inside is kept as ignored spans.
        const IGNORE_TEXT       = 1 << 5;
        /// Children are checked against the parent's child permissions.
        const IS_TRANSPARENT    = 1 << 6;
        /// Ignore the first newline after the start tag.
        const TRIM_FIRST_LINE   = 1 << 7;
        /// Ignore whitespace before the start tag.
        const TRIM_BEFORE       = 1 << 8;
        /// Ignore whitespace after the end tag.
        const TRIM_AFTER        = 1 << 9;
        /// Ignore whitespace right after the start tag.
        const LTRIM_CONTENT     = 1 << 10;
        /// Ignore whitespace right before the end tag.
        const RTRIM_CONTENT     = 1 << 11;
        /// Newlines become line breaks, in this element and its descendants.
        const ENABLE_AUTO_BR    = 1 << 12;
        /// Cancels an inherited `ENABLE_AUTO_BR`.
        const DISABLE_AUTO_BR   = 1 << 13;
        /// No automatic line breaks in this element's own text.
        const SUSPEND_AUTO_BR   = 1 << 14;
        /// No line breaks at all, explicit ones included.
        const PREVENT_BR        = 1 << 15;

        /// All four trim options.
        const IGNORE_SURROUNDING_WHITESPACE = Self::TRIM_BEFORE.bits()
            | Self::TRIM_AFTER.bits()
            | Self::LTRIM_CONTENT.bits()
            | Self::RTRIM_CONTENT.bits();
    }
}

impl Default for RuleFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl RuleFlags {
    /// Flags of a new context entered with `tag` flags from a context with
    /// `parent` flags.
    ///
    /// Only `ENABLE_AUTO_BR` is inherited; `DISABLE_AUTO_BR` cancels it.
    #[must_use]
    pub fn inherit(parent: Self, tag: Self) -> Self {
        let mut flags = tag | (parent & Self::ENABLE_AUTO_BR);
        if flags.contains(Self::DISABLE_AUTO_BR) {
            flags.remove(Self::ENABLE_AUTO_BR);
        }
        flags
    }

    /// Whether newlines in text directly inside this context become breaks.
    #[must_use]
    pub const fn auto_br(self) -> bool {
        self.contains(Self::ENABLE_AUTO_BR) && !self.contains(Self::SUSPEND_AUTO_BR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherits_only_auto_br() {
        let parent = RuleFlags::ENABLE_AUTO_BR | RuleFlags::IGNORE_TEXT;
        let flags = RuleFlags::inherit(parent, RuleFlags::TRIM_AFTER);
        assert_eq!(flags, RuleFlags::ENABLE_AUTO_BR | RuleFlags::TRIM_AFTER);
    }

    #[test]
    fn disable_cancels_inherited_auto_br() {
        let flags = RuleFlags::inherit(RuleFlags::ENABLE_AUTO_BR, RuleFlags::DISABLE_AUTO_BR);
        assert!(!flags.contains(RuleFlags::ENABLE_AUTO_BR));
    }

    #[test]
    fn suspend_only_affects_own_text() {
        let flags = RuleFlags::ENABLE_AUTO_BR | RuleFlags::SUSPEND_AUTO_BR;
        assert!(!flags.auto_br());
        // SUSPEND_AUTO_BR is not inherited, so a child gets auto breaks back
        assert!(RuleFlags::inherit(flags, RuleFlags::empty()).auto_br());
    }

    #[test]
    fn parses_flag_lists() {
        let flags: RuleFlags = serde_json::from_str("\"AUTO_REOPEN | TRIM_AFTER\"").unwrap();
        assert_eq!(flags, RuleFlags::AUTO_REOPEN | RuleFlags::TRIM_AFTER);

        let all: RuleFlags = serde_json::from_str("\"IGNORE_SURROUNDING_WHITESPACE\"").unwrap();
        assert!(all.contains(RuleFlags::TRIM_BEFORE | RuleFlags::RTRIM_CONTENT));
    }
}
