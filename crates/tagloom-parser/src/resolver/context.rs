//! Element frames, counters and committing tags to the tree.

use tagloom_rules::{AllowedSet, RuleFlags, RuleTable, TagIndex};
use tagloom_tree::TextSpan;

use super::Resolver;
use crate::{TagId, TagType};

/// What governs the content at the current position.
#[derive(Debug, Clone)]
pub(super) struct Context {
    /// Tags allowed as children, and deeper.
    pub allowed: AllowedSet,
    /// Flags in effect for text and tags.
    pub flags: RuleFlags,
}

impl Context {
    pub(super) fn root(rules: &RuleTable) -> Self {
        let root = rules.root();
        Self {
            allowed: root.allowed.clone(),
            flags: root.flags,
        }
    }
}

/// An open element.
#[derive(Debug, Clone)]
pub(super) struct OpenElement {
    /// The start tag that opened it.
    pub start: TagId,
    pub index: TagIndex,
    /// Context to restore when the element closes.
    pub parent: Context,
}

/// Occurrences of one tag name in this resolution.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Counter {
    pub total: usize,
    pub open: usize,
}

impl Resolver<'_> {
    pub(super) fn counter(&self, index: TagIndex) -> Counter {
        self.counters.get(index.0).copied().unwrap_or_default()
    }

    /// The innermost open element.
    pub(super) fn current_element(&self) -> Option<&OpenElement> {
        self.open_elements.last()
    }

    /// Commit a start or self-closing tag to the tree.
    ///
    /// Flushes the text before it, opens a paragraph if needed and moves the
    /// cursor past the tag's markup.
    pub(super) fn output_start_tag(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, end, flags) = (tag.pos(), tag.end(), tag.flags());

        self.output_text(
            pos,
            flags.contains(RuleFlags::TRIM_BEFORE),
            flags.contains(RuleFlags::BREAK_PARAGRAPH),
        );
        if !flags.contains(RuleFlags::BREAK_PARAGRAPH) {
            self.output_paragraph_start(pos);
        }

        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let markup = (end > pos).then(|| TextSpan::new(pos, &self.text[pos..end]));
        if tag.tag_type() == TagType::SelfClosing {
            let _ = self
                .writer
                .self_closing_element(tag.name(), tag.attributes().clone(), markup);
        } else {
            let _ = self
                .writer
                .open_element(tag.name(), tag.attributes().clone(), markup);
        }

        self.pos = end;
        self.is_rich = true;
    }

    /// Commit the end of the innermost element, with the markup of `id` if
    /// given. Flushes the text before it under `rtrim`.
    pub(super) fn output_end_tag(&mut self, pos: usize, end_markup: Option<TagId>, rtrim: bool) {
        self.output_text(pos, rtrim, true);

        let markup = end_markup
            .and_then(|id| self.tags.get(id))
            .filter(|tag| !tag.is_empty())
            .map(|tag| TextSpan::new(tag.pos(), &self.text[tag.pos()..tag.end()]));
        let end = markup.as_ref().map_or(pos, TextSpan::end);

        let _ = self.writer.close_element(markup);
        self.pop_context();
        self.pos = self.pos.max(end);
        self.is_rich = true;
    }

    /// Update counters and context for a committed opening tag.
    pub(super) fn push_context(&mut self, id: TagId) {
        let rules = self.rules;
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let Some(rule) = tag.rule().and_then(|index| rules.get(index)) else {
            return;
        };
        let is_start = tag.tag_type() == TagType::Start;

        if let Some(counter) = self.counters.get_mut(rule.index.0) {
            counter.total += 1;
            if is_start {
                counter.open += 1;
            }
        }
        if !is_start {
            return;
        }

        let transparent = rule.flags.contains(RuleFlags::IS_TRANSPARENT);
        let context = Context {
            allowed: self.context.allowed.narrow(&rule.allowed, transparent),
            flags: RuleFlags::inherit(self.context.flags, rule.flags),
        };
        let parent = std::mem::replace(&mut self.context, context);
        self.open_elements.push(OpenElement {
            start: id,
            index: rule.index,
            parent,
        });
    }

    /// Leave the innermost element, restoring its parent's context.
    pub(super) fn pop_context(&mut self) {
        let Some(frame) = self.open_elements.pop() else {
            return;
        };
        if let Some(counter) = self.counters.get_mut(frame.index.0) {
            counter.open = counter.open.saturating_sub(1);
        }
        self.context = frame.parent;
    }
}
