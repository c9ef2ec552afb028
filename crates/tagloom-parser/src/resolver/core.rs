//! Pending tag stack, main loop and dispatch.

use tagloom_rules::RuleFlags;
use tagloom_tree::{Document, OutputMode};

use super::{Resolution, Resolver};
use crate::{SYNTHETIC_PASS, Tag, TagId, TagKind, TagType};

impl Resolver<'_> {
    /// Store a tag and schedule it for processing.
    pub(super) fn push_tag(&mut self, tag: Tag) -> TagId {
        let id = self.tags.push(tag);
        self.stack.push(id);
        self.stack_is_sorted = false;
        id
    }

    /// Schedule an already stored tag again.
    pub(super) fn reschedule(&mut self, id: TagId) {
        self.stack.push(id);
        self.stack_is_sorted = false;
    }

    /// Store and schedule a tag created by the resolver.
    pub(super) fn add_synthetic(&mut self, tag: Tag) -> TagId {
        self.push_tag(tag.with_pass(SYNTHETIC_PASS))
    }

    fn sort_stack(&mut self) {
        if !self.stack_is_sorted {
            let tags = &self.tags;
            // Descending, so the next tag to process is at the end.
            self.stack.sort_by(|&a, &b| tags.processing_order(b, a));
            self.stack_is_sorted = true;
        }
    }

    fn pop_tag(&mut self) -> Option<TagId> {
        self.sort_stack();
        self.stack.pop()
    }

    /// Pending tags, next one first.
    pub(super) fn upcoming(&mut self) -> Vec<TagId> {
        self.sort_stack();
        self.stack.iter().rev().copied().collect()
    }

    /// The next pending tag that is still valid.
    pub(super) fn next_tag_id(&mut self) -> Option<TagId> {
        self.sort_stack();
        let tags = &self.tags;
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&id| tags.get(id).is_some_and(|tag| !tag.is_invalid()))
    }

    pub(super) fn next_tag(&mut self) -> Option<&Tag> {
        let id = self.next_tag_id()?;
        self.tags.get(id)
    }

    /// Run the resolution to completion.
    #[must_use]
    pub fn run(mut self) -> Resolution {
        self.drain();

        // STEP 1: close whatever is still open at the end of the text, one
        // zero-width end tag per element, innermost processed first.
        while !self.open_elements.is_empty() {
            let open = self.open_elements.len();
            self.close_open_elements();
            self.drain();

            // STEP 2: end tags that could not close anything (a corrupted
            // pairing) must not keep us looping.
            if self.open_elements.len() >= open {
                self.force_close();
            }
        }

        // STEP 3: remaining text, or the plain fallback.
        self.finish()
    }

    fn drain(&mut self) {
        while let Some(id) = self.pop_tag() {
            self.process_tag(id);
        }
    }

    fn close_open_elements(&mut self) {
        let end = self.text.len();
        let starts: Vec<TagId> = self.open_elements.iter().map(|frame| frame.start).collect();
        for start in starts {
            let _ = self.add_magic_end(start, end, 0);
        }
    }

    fn force_close(&mut self) {
        while !self.open_elements.is_empty() {
            self.output_text(self.text.len(), false, true);
            let _ = self.writer.close_element(None);
            self.pop_context();
        }
    }

    fn finish(mut self) -> Resolution {
        if !self.is_rich {
            return Resolution {
                document: Document::plain(self.text),
                log: self.log,
            };
        }
        self.output_text(self.text.len(), false, true);
        Resolution {
            document: self.writer.finish(OutputMode::Rich),
            log: self.log,
        }
    }

    /// Whether `id` could close the innermost open element.
    fn closes_current(&self, id: TagId) -> bool {
        self.open_elements
            .last()
            .is_some_and(|frame| self.tags.can_close(id, frame.start))
    }

    fn process_tag(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        if tag.is_invalid() {
            return;
        }

        if self.context.flags.contains(RuleFlags::IGNORE_TAGS)
            && !tag.is_system()
            && !self.closes_current(id)
        {
            self.log.debug(
                tag.pos(),
                "Tag {0} skipped: tags are ignored in this context",
                &[&tag.name()],
            );
            self.tags.invalidate(id);
            return;
        }

        if tag.pos() < self.pos {
            self.handle_collision(id);
            return;
        }

        match tag.kind() {
            TagKind::Ignore => self.output_ignore_tag(id),
            TagKind::LineBreak => self.output_line_break(id),
            TagKind::ParagraphBreak => {
                let pos = tag.pos();
                self.output_text(pos, false, true);
                self.is_rich = true;
            }
            TagKind::Verbatim => self.output_verbatim(id),
            TagKind::Element => match tag.tag_type() {
                TagType::End => self.process_end_tag(id),
                TagType::Start | TagType::SelfClosing => self.process_start_tag(id),
            },
        }
    }

    /// A tag starting inside text already committed.
    fn handle_collision(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, end) = (tag.pos(), tag.end());

        // An end tag whose element is still open is replaced by one that
        // consumes what is left of its markup.
        if tag.tag_type() == TagType::End
            && let Some(start) = tag.paired()
            && self
                .open_elements
                .iter()
                .any(|frame| self.tags.lineage(frame.start).any(|id| id == start))
        {
            let len = end.saturating_sub(self.pos);
            let replacement = Tag::new(TagType::End, tag.name(), self.pos, len)
                .with_rule(tag.rule(), tag.flags())
                .with_suffix(tag.suffix());
            let replacement = self.add_synthetic(replacement);
            let _ = self.tags.pair(start, replacement);
            return;
        }

        if tag.kind() == TagKind::Ignore && end > self.pos {
            let len = end - self.pos;
            let _ = self.add_synthetic(Tag::system(TagKind::Ignore, self.pos, len));
            return;
        }

        self.log.debug(
            pos,
            "Tag {0} skipped: overlaps previously consumed text",
            &[&tag.name()],
        );
        self.tags.invalidate(id);
    }

    /// Charge `cost` to the fixing budget if it has room.
    ///
    /// Exhaustion is reported once per resolution.
    pub(super) fn try_fix(&mut self, cost: u32) -> bool {
        if self.fixing_cost < self.rules.max_fixing_cost() {
            self.fixing_cost = self.fixing_cost.saturating_add(cost);
            return true;
        }
        self.report_exhaustion();
        false
    }

    /// Whether the fixing budget still has room.
    pub(super) fn can_fix(&self) -> bool {
        self.fixing_cost < self.rules.max_fixing_cost()
    }

    pub(super) fn report_exhaustion(&mut self) {
        if !self.fixing_exhaustion_reported {
            self.fixing_exhaustion_reported = true;
            self.log.warn(
                self.pos,
                "Fixing budget of {0} exhausted, markup is no longer repaired",
                &[&self.rules.max_fixing_cost()],
            );
        }
    }

    /// Add a zero-width end tag closing `start` at `pos`.
    pub(super) fn add_magic_end(
        &mut self,
        start: TagId,
        pos: usize,
        sort_priority: i32,
    ) -> Option<TagId> {
        let start_tag = self.tags.get(start)?;
        let end = Tag::new(TagType::End, start_tag.name(), pos, 0)
            .with_rule(start_tag.rule(), start_tag.flags())
            .with_suffix(start_tag.suffix())
            .with_sort_priority(sort_priority);
        let end = self.add_synthetic(end);
        let _ = self.tags.pair(start, end);
        Some(end)
    }
}
