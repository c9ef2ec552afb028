//! Start and end tag processing.
//!
//! Besides validating tags against their rules, this is where markup gets
//! repaired: parents are closed before tags that cannot live inside them,
//! elements closed by a foreign end tag are reopened, and end tags made
//! redundant by a repair are absorbed. Every repair is charged to the fixing
//! budget of the rule table.

use tagloom_rules::{RuleFlags, TagRule};

use super::Resolver;
use crate::{Tag, TagId, TagKind, TagType};

impl Resolver<'_> {
    pub(super) fn process_start_tag(&mut self, id: TagId) {
        let rules = self.rules;
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, len, end) = (tag.pos(), tag.len(), tag.end());
        let Some(rule) = tag.rule().and_then(|index| rules.get(index)) else {
            self.log.debug(pos, "Tag {0} is not declared", &[&tag.name()]);
            self.tags.invalidate(id);
            return;
        };

        // STEP 1: repairs. The tag is rescheduled behind a synthetic end tag.
        if self.foster_parent(id, rule)
            || self.close_parent(id, rule)
            || self.close_ancestor(id, rule)
        {
            return;
        }

        // STEP 2: occurrence limits.
        let counter = self.counter(rule.index);
        if counter.open >= rule.nesting_limit {
            self.log.warn(
                pos,
                "Tag {0} exceeds its nesting limit of {1}",
                &[&rule.name, &rule.nesting_limit],
            );
            self.tags.invalidate(id);
            return;
        }
        if counter.total >= rule.tag_limit {
            self.log.warn(
                pos,
                "Tag {0} exceeds its limit of {1} occurrences",
                &[&rule.name, &rule.tag_limit],
            );
            self.tags.invalidate(id);
            return;
        }

        // STEP 3: permissions of the current context.
        if !self.context.allowed.allows(rule.index) {
            let template = "Tag {0} is not allowed in this context";
            if len > 0 {
                self.log.warn(pos, template, &[&rule.name]);
            } else {
                self.log.debug(pos, template, &[&rule.name]);
            }
            self.tags.invalidate(id);
            return;
        }

        // STEP 4: required parent, then required ancestors.
        if let Some(parent) = rule.require_parent
            && self.current_element().map(|frame| frame.index) != Some(parent)
        {
            self.log.debug(
                pos,
                "Tag {0} requires {1} as its parent",
                &[&rule.name, &rules.name(parent).unwrap_or_default()],
            );
            self.tags.invalidate(id);
            return;
        }
        let missing: Vec<&str> = rule
            .require_ancestor
            .iter()
            .filter(|&&ancestor| self.counter(ancestor).open == 0)
            .filter_map(|&ancestor| rules.name(ancestor))
            .collect();
        if !missing.is_empty() {
            self.log.debug(
                pos,
                "Tag {0} requires {1} as an ancestor",
                &[&rule.name, &missing.join(", ")],
            );
            self.tags.invalidate(id);
            return;
        }

        // STEP 5: attributes.
        if !self.filter_attributes(id, rule) {
            self.tags.invalidate(id);
            return;
        }

        // STEP 6: a start tag that will not be closed right away stays empty.
        let is_start = self.tags.get(id).is_some_and(|tag| tag.tag_type() == TagType::Start);
        if is_start
            && rule.flags.contains(RuleFlags::AUTO_CLOSE)
            && self.tags.get(id).is_some_and(|tag| tag.paired().is_none())
            && !self.is_followed_by_closing_tag(id)
            && let Some(tag) = self.tags.get_mut(id)
        {
            tag.set_tag_type(TagType::SelfClosing);
        }
        let is_start = self.tags.get(id).is_some_and(|tag| tag.tag_type() == TagType::Start);

        if rule.flags.contains(RuleFlags::TRIM_FIRST_LINE)
            && !rule.flags.contains(RuleFlags::LTRIM_CONTENT)
            && self.text.as_bytes().get(end) == Some(&b'\n')
        {
            let _ = self.add_synthetic(Tag::system(TagKind::Ignore, end, 1));
        }

        // STEP 7: commit.
        self.output_start_tag(id);
        self.push_context(id);

        if is_start {
            if rule.flags.contains(RuleFlags::LTRIM_CONTENT) {
                self.ignore_whitespace_after();
            }
            self.create_children(rule);
        } else if rule.flags.contains(RuleFlags::TRIM_AFTER) {
            self.ignore_whitespace_after();
        }
    }

    fn is_followed_by_closing_tag(&mut self, id: TagId) -> bool {
        self.next_tag_id()
            .is_some_and(|next| self.tags.can_close(next, id))
    }

    /// Close the parent if this tag fosters it, reopening a copy of the
    /// parent right after this tag.
    fn foster_parent(&mut self, id: TagId, rule: &TagRule) -> bool {
        let Some(parent) = self.current_element() else {
            return false;
        };
        if !rule.foster_parent.contains(parent.index) {
            return false;
        }
        let (parent_start, parent_index) = (parent.start, parent.index);
        if !self.try_fix(4) {
            return false;
        }

        let Some(tag) = self.tags.get(id) else {
            return false;
        };
        let (pos, end, priority) = (tag.pos(), tag.end(), tag.sort_priority());

        if parent_index != rule.index {
            let (child_pos, child_priority) = self.magic_start_coords(end);
            if let Some(copy) = self.tags.copy(parent_start, child_pos, 0, child_priority) {
                self.reschedule(copy);
                self.tags.cascade_invalidation(id, copy);
            }
        }

        self.reschedule(id);
        let end_pos = self.magic_end_pos(id, parent_start, pos);
        let _ = self.add_magic_end(parent_start, end_pos, priority - 1);
        true
    }

    /// Close the parent if its name is in this tag's `closeParent` set.
    fn close_parent(&mut self, id: TagId, rule: &TagRule) -> bool {
        let Some(parent) = self.current_element() else {
            return false;
        };
        if !rule.close_parent.contains(parent.index) {
            return false;
        }
        let parent_start = parent.start;
        self.close_before(id, parent_start, 0)
    }

    /// Close the innermost ancestor whose name is in this tag's
    /// `closeAncestor` set.
    fn close_ancestor(&mut self, id: TagId, rule: &TagRule) -> bool {
        if rule.close_ancestor.is_empty() {
            return false;
        }
        let Some(ancestor) = self
            .open_elements
            .iter()
            .rev()
            .find(|frame| rule.close_ancestor.contains(frame.index))
            .map(|frame| frame.start)
        else {
            return false;
        };
        let priority = self.tags.get(id).map_or(0, Tag::sort_priority) - 1;
        self.close_before(id, ancestor, priority)
    }

    fn close_before(&mut self, id: TagId, start: TagId, priority: i32) -> bool {
        if !self.try_fix(1) {
            return false;
        }
        let Some(pos) = self.tags.get(id).map(Tag::pos) else {
            return false;
        };
        self.reschedule(id);
        let end_pos = self.magic_end_pos(id, start, pos);
        let _ = self.add_magic_end(start, end_pos, priority);
        true
    }

    /// Where a zero-width tag inserted after `pos` goes: past whitespace, but
    /// never past the next pending tag, and before it if they meet.
    fn magic_start_coords(&mut self, pos: usize) -> (usize, i32) {
        let (next_pos, next_priority) = self
            .next_tag()
            .map_or((usize::MAX, 0), |tag| (tag.pos(), tag.sort_priority()));
        let pos = pos + self.whitespace_len(pos, next_pos);
        let priority = if pos == next_pos { next_priority - 1 } else { 0 };
        (pos, priority)
    }

    /// Where a synthetic end tag for `start` goes when `current` needs it
    /// closed at `pos`: before any whitespace if either tag trims it.
    fn magic_end_pos(&self, current: TagId, start: TagId, pos: usize) -> usize {
        let flags = self.tags.get(current).map_or(RuleFlags::empty(), Tag::flags)
            | self.tags.get(start).map_or(RuleFlags::empty(), Tag::flags);
        if flags.intersects(RuleFlags::IGNORE_SURROUNDING_WHITESPACE) {
            self.trailing_whitespace_start(pos)
        } else {
            pos
        }
    }

    fn create_children(&mut self, rule: &TagRule) {
        if rule.create_child.is_empty() {
            return;
        }
        let rules = self.rules;
        let pos = self.pos + self.whitespace_len(self.pos, self.text.len());
        let mut priority = -1000;
        for &index in &rule.create_child {
            let Some(child) = rules.get(index) else {
                continue;
            };
            priority += 1;
            let tag = Tag::new(TagType::Start, child.name.as_str(), pos, 0)
                .with_rule(Some(index), child.flags)
                .with_sort_priority(priority);
            let _ = self.add_synthetic(tag);
        }
    }

    pub(super) fn process_end_tag(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, flags) = (tag.pos(), tag.flags());

        // STEP 1: find the element this tag closes.
        let is_open = tag.rule().is_some_and(|index| self.counter(index).open > 0);
        let depth = if is_open {
            self.open_elements
                .iter()
                .rposition(|frame| self.tags.can_close(id, frame.start))
        } else {
            None
        };
        let Some(depth) = depth else {
            self.log.debug(
                pos,
                "Tag {0} skipped: could not find a matching start tag",
                &[&tag.name()],
            );
            return;
        };

        // STEP 2: elements opened after it are closed implicitly, innermost
        // first. Those that reopen form a prefix of that list.
        let mut closed: Vec<TagId> = self.open_elements[depth + 1..]
            .iter()
            .rev()
            .map(|frame| frame.start)
            .collect();
        self.fixing_cost = self
            .fixing_cost
            .saturating_add(u32::try_from(closed.len()).unwrap_or(u32::MAX));

        let mut reopen = Vec::new();
        for &start in &closed {
            let reopens = self
                .tags
                .get(start)
                .is_some_and(|tag| tag.flags().contains(RuleFlags::AUTO_REOPEN));
            if !reopens {
                break;
            }
            if !self.can_fix() {
                self.report_exhaustion();
                break;
            }
            reopen.push(start);
        }

        for _ in &closed {
            let rtrim = self.context.flags.contains(RuleFlags::RTRIM_CONTENT);
            self.output_end_tag(pos, None, rtrim);
        }

        // STEP 3: the element itself.
        let rtrim = self.context.flags.contains(RuleFlags::RTRIM_CONTENT);
        self.output_end_tag(pos, Some(id), rtrim);
        if flags.contains(RuleFlags::TRIM_AFTER) {
            self.ignore_whitespace_after();
        }

        // STEP 4: upcoming end tags right here that would close an element we
        // just closed are absorbed, and that element is not reopened.
        if !closed.is_empty() && self.can_fix() {
            self.absorb_redundant_end_tags(&mut closed, &mut reopen);
        }

        // STEP 5: reopen, outermost first.
        for start in reopen {
            let Some(copy) = self.tags.copy(start, self.pos, 0, 0) else {
                continue;
            };
            self.reschedule(copy);
            if let Some(end) = self.tags.get(start).and_then(Tag::paired) {
                let _ = self.tags.pair(copy, end);
            }
        }
    }

    fn absorb_redundant_end_tags(&mut self, closed: &mut Vec<TagId>, reopen: &mut Vec<TagId>) {
        let mut ignore_end = self.pos;

        'upcoming: for next in self.upcoming() {
            self.fixing_cost = self.fixing_cost.saturating_add(1);
            if !self.can_fix() {
                break;
            }
            let Some(tag) = self.tags.get(next) else {
                break;
            };
            if tag.pos() > ignore_end || tag.opens() {
                break;
            }
            let tag_end = tag.end();

            for j in (0..closed.len()).rev() {
                self.fixing_cost = self.fixing_cost.saturating_add(1);
                if !self.can_fix() {
                    break 'upcoming;
                }
                if self.tags.can_close(next, closed[j]) {
                    let _ = closed.remove(j);
                    if j < reopen.len() {
                        let _ = reopen.remove(j);
                    }
                    ignore_end = ignore_end.max(tag_end);
                    break;
                }
            }
        }

        if ignore_end > self.pos {
            self.writer.ignored(self.pos, &self.text[self.pos..ignore_end]);
            self.pos = ignore_end;
        }
    }
}
