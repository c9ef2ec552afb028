//! Tags and the arena holding them.
//!
//! Tags refer to each other (pairing, copies, invalidation cascades) by
//! [`TagId`], never by reference, so the whole graph lives in one
//! [`TagArena`] owned by a resolution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tagloom_rules::{RuleFlags, TagIndex};
use tagloom_tree::AttributesMap;

/// Pass number given to tags created by the resolver itself.
///
/// Passes are processed in descending order on full ties, so synthetic tags
/// come before any tag reported by a pass.
pub const SYNTHETIC_PASS: u32 = u32::MAX;

/// Index of a tag in its [`TagArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub usize);

/// Direction of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum TagType {
    /// Opens an element.
    Start,
    /// Closes an element.
    End,
    /// Opens and closes an element in one step.
    #[default]
    SelfClosing,
}

impl TagType {
    /// Rank at equal positions: closing tags first, then self-closing,
    /// then opening tags.
    const fn rank(self) -> u8 {
        match self {
            Self::End => 0,
            Self::SelfClosing => 1,
            Self::Start => 2,
        }
    }
}

/// What a tag stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    /// An element governed by the rule table.
    #[default]
    Element,
    /// An explicit line break.
    LineBreak,
    /// A span kept in the tree as ignored text.
    Ignore,
    /// Ends the current automatic paragraph.
    ParagraphBreak,
    /// A span output as literal text under its own flags.
    Verbatim,
}

impl TagKind {
    /// Name given to tags of this kind when they need none.
    #[must_use]
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::Element => "",
            Self::LineBreak => "br",
            Self::Ignore => "i",
            Self::ParagraphBreak => "pb",
            Self::Verbatim => "v",
        }
    }
}

/// A candidate or resolved tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    tag_type: TagType,
    kind: TagKind,
    name: String,
    pos: usize,
    len: usize,
    suffix: String,
    attributes: AttributesMap,
    sort_priority: i32,
    pass: u32,
    flags: RuleFlags,
    rule: Option<TagIndex>,
    paired: Option<TagId>,
    copy_of: Option<TagId>,
    cascade: Vec<TagId>,
    invalid: bool,
}

impl Tag {
    /// An element tag with sort priority 0.
    #[must_use]
    pub fn new(tag_type: TagType, name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self {
            tag_type,
            kind: TagKind::Element,
            name: name.into(),
            pos,
            len,
            suffix: String::new(),
            attributes: AttributesMap::new(),
            sort_priority: 0,
            pass: 0,
            flags: RuleFlags::empty(),
            rule: None,
            paired: None,
            copy_of: None,
            cascade: Vec::new(),
            invalid: false,
        }
    }

    /// A system tag of the given kind. System tags are always self-closing.
    #[must_use]
    pub fn system(kind: TagKind, pos: usize, len: usize) -> Self {
        Self {
            kind,
            ..Self::new(TagType::SelfClosing, kind.default_name(), pos, len)
        }
    }

    #[must_use]
    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub(crate) fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    #[must_use]
    pub(crate) const fn with_sort_priority(mut self, priority: i32) -> Self {
        self.sort_priority = priority;
        self
    }

    #[must_use]
    pub(crate) const fn with_pass(mut self, pass: u32) -> Self {
        self.pass = pass;
        self
    }

    #[must_use]
    pub(crate) fn with_rule(mut self, rule: Option<TagIndex>, flags: RuleFlags) -> Self {
        self.rule = rule;
        self.flags = flags;
        self
    }

    /// Direction of the tag.
    #[must_use]
    pub const fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub(crate) const fn set_tag_type(&mut self, tag_type: TagType) {
        self.tag_type = tag_type;
    }

    /// Kind of the tag.
    #[must_use]
    pub const fn kind(&self) -> TagKind {
        self.kind
    }

    /// Tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset of the tag's markup.
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Length of the tag's markup in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tag consumes no text.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte offset one past the tag's markup.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.pos + self.len
    }

    /// Disambiguator between tags of the same name.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Sort priority; lower values are processed first at equal positions.
    #[must_use]
    pub const fn sort_priority(&self) -> i32 {
        self.sort_priority
    }

    /// Pass the tag came from ([`SYNTHETIC_PASS`] for tags made by the resolver).
    #[must_use]
    pub const fn pass(&self) -> u32 {
        self.pass
    }

    /// Rule flags of the tag's name (the tag's own flags for verbatim tags).
    #[must_use]
    pub const fn flags(&self) -> RuleFlags {
        self.flags
    }

    /// Rule table index of the tag's name, if declared.
    #[must_use]
    pub const fn rule(&self) -> Option<TagIndex> {
        self.rule
    }

    /// The tag this one is paired with.
    #[must_use]
    pub const fn paired(&self) -> Option<TagId> {
        self.paired
    }

    /// The tag this one was copied from.
    #[must_use]
    pub const fn copy_of(&self) -> Option<TagId> {
        self.copy_of
    }

    /// Whether the tag was invalidated.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Whether the tag needs no rule to be processed.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !matches!(self.kind, TagKind::Element)
    }

    /// Whether the tag opens an element (start or self-closing).
    #[must_use]
    pub const fn opens(&self) -> bool {
        !matches!(self.tag_type, TagType::End)
    }

    /// Attributes, in lexical order.
    #[must_use]
    pub const fn attributes(&self) -> &AttributesMap {
        &self.attributes
    }

    /// Value of one attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether an attribute is set.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let _ = self.attributes.insert(name.into(), value.into());
    }

    /// Replace all attributes.
    pub fn set_attributes(&mut self, attributes: AttributesMap) {
        self.attributes = attributes;
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}

/// Owner of every tag of a resolution.
#[derive(Debug, Clone, Default)]
pub struct TagArena {
    tags: Vec<Tag>,
}

impl TagArena {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the arena holds no tag.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Store a tag.
    pub fn push(&mut self, tag: Tag) -> TagId {
        let id = TagId(self.tags.len());
        self.tags.push(tag);
        id
    }

    /// Get a tag.
    #[must_use]
    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id.0)
    }

    /// Get a tag for modification.
    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(id.0)
    }

    /// All tags with their ids, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (TagId, &Tag)> {
        self.tags.iter().enumerate().map(|(i, tag)| (TagId(i), tag))
    }

    /// Store a copy of `id` at a new position, remembering where it came from.
    ///
    /// The copy keeps the name, kind, suffix, attributes and flags of the
    /// original but none of its pairing or cascade links.
    pub fn copy(&mut self, id: TagId, pos: usize, len: usize, sort_priority: i32) -> Option<TagId> {
        let original = self.get(id)?;
        let copy = Tag {
            tag_type: original.tag_type,
            kind: original.kind,
            name: original.name.clone(),
            pos,
            len,
            suffix: original.suffix.clone(),
            attributes: original.attributes.clone(),
            sort_priority,
            pass: SYNTHETIC_PASS,
            flags: original.flags,
            rule: original.rule,
            paired: None,
            copy_of: Some(id),
            cascade: Vec::new(),
            invalid: false,
        };
        Some(self.push(copy))
    }

    /// Pair a start tag with an end tag, in either argument order.
    ///
    /// Only effective if the names match, one tag is a start tag and the other
    /// an end tag, and the start does not come after the end. Earlier pairings
    /// of either tag are replaced. Returns whether the tags were paired.
    pub fn pair(&mut self, a: TagId, b: TagId) -> bool {
        let (Some(tag_a), Some(tag_b)) = (self.get(a), self.get(b)) else {
            return false;
        };
        let (start, end) = match (tag_a.tag_type, tag_b.tag_type) {
            (TagType::Start, TagType::End) => (a, b),
            (TagType::End, TagType::Start) => (b, a),
            _ => return false,
        };
        let (start_tag, end_tag) = (&self.tags[start.0], &self.tags[end.0]);
        if start_tag.name != end_tag.name || start_tag.pos > end_tag.pos {
            return false;
        }
        self.tags[start.0].paired = Some(end);
        self.tags[end.0].paired = Some(start);
        true
    }

    /// Invalidate `to` whenever `from` is invalidated.
    pub fn cascade_invalidation(&mut self, from: TagId, to: TagId) {
        if let Some(tag) = self.get_mut(from)
            && !tag.cascade.contains(&to)
        {
            tag.cascade.push(to);
        }
    }

    /// Invalidate a tag, its paired tag and its cascade, transitively.
    ///
    /// Idempotent; already invalid tags stop the propagation.
    pub fn invalidate(&mut self, id: TagId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(tag) = self.get_mut(id) else {
                continue;
            };
            if tag.invalid {
                continue;
            }
            tag.invalid = true;
            pending.extend(tag.paired);
            pending.extend(tag.cascade.iter().copied());
        }
    }

    /// `id` followed by the tags it was copied from, nearest first.
    pub fn lineage(&self, id: TagId) -> impl Iterator<Item = TagId> + '_ {
        std::iter::successors(Some(id), |&id| self.get(id).and_then(|tag| tag.copy_of))
    }

    /// Whether the end tag `end` may close the element opened by `start`.
    ///
    /// Names and suffixes must match. A paired end tag only closes its own
    /// start tag or a copy of it; an unpaired end tag cannot close a start tag
    /// that is paired with something else.
    #[must_use]
    pub fn can_close(&self, end: TagId, start: TagId) -> bool {
        let (Some(end_tag), Some(start_tag)) = (self.get(end), self.get(start)) else {
            return false;
        };
        if end_tag.invalid
            || end_tag.tag_type != TagType::End
            || start_tag.tag_type != TagType::Start
            || end_tag.name != start_tag.name
            || end_tag.suffix != start_tag.suffix
            || end_tag.pos < start_tag.pos
        {
            return false;
        }
        match end_tag.paired {
            Some(paired) => self.lineage(start).any(|id| id == paired),
            None => start_tag.paired.is_none_or(|paired| paired == end),
        }
    }

    /// Processing order of two tags: `Less` if `a` is processed first.
    ///
    /// Position ascending, then closing before self-closing before opening,
    /// then later passes first, then sort priority ascending, then the most
    /// recently created tag first.
    #[must_use]
    pub fn processing_order(&self, a: TagId, b: TagId) -> Ordering {
        let (Some(x), Some(y)) = (self.get(a), self.get(b)) else {
            return a.cmp(&b);
        };
        x.pos
            .cmp(&y.pos)
            .then(x.tag_type.rank().cmp(&y.tag_type.rank()))
            .then(y.pass.cmp(&x.pass))
            .then(x.sort_priority.cmp(&y.sort_priority))
            .then(b.cmp(&a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with(tags: Vec<Tag>) -> (TagArena, Vec<TagId>) {
        let mut arena = TagArena::new();
        let ids = tags.into_iter().map(|tag| arena.push(tag)).collect();
        (arena, ids)
    }

    #[test]
    fn pairing_requires_matching_names_and_order() {
        let (mut arena, ids) = arena_with(vec![
            Tag::new(TagType::Start, "B", 0, 3),
            Tag::new(TagType::End, "B", 5, 4),
            Tag::new(TagType::End, "I", 6, 4),
            Tag::new(TagType::Start, "B", 9, 3),
        ]);
        assert!(!arena.pair(ids[0], ids[2]), "names differ");
        assert!(!arena.pair(ids[3], ids[1]), "start after end");
        assert!(!arena.pair(ids[0], ids[3]), "same direction");
        assert!(arena.pair(ids[1], ids[0]), "argument order does not matter");
        assert_eq!(arena.get(ids[0]).unwrap().paired(), Some(ids[1]));
        assert_eq!(arena.get(ids[1]).unwrap().paired(), Some(ids[0]));
    }

    #[test]
    fn invalidation_follows_pairs_and_cascades() {
        let (mut arena, ids) = arena_with(vec![
            Tag::new(TagType::Start, "B", 0, 3),
            Tag::new(TagType::End, "B", 5, 4),
            Tag::new(TagType::Start, "I", 3, 3),
            Tag::new(TagType::Start, "U", 4, 0),
        ]);
        assert!(arena.pair(ids[0], ids[1]));
        arena.cascade_invalidation(ids[1], ids[2]);
        arena.cascade_invalidation(ids[2], ids[0]);

        arena.invalidate(ids[0]);
        assert!(arena.get(ids[0]).unwrap().is_invalid());
        assert!(arena.get(ids[1]).unwrap().is_invalid());
        assert!(arena.get(ids[2]).unwrap().is_invalid());
        assert!(!arena.get(ids[3]).unwrap().is_invalid());

        // idempotent
        arena.invalidate(ids[0]);
        assert!(arena.get(ids[0]).unwrap().is_invalid());
    }

    #[test]
    fn paired_end_closes_copies_of_its_start() {
        let (mut arena, ids) = arena_with(vec![
            Tag::new(TagType::Start, "B", 0, 3),
            Tag::new(TagType::End, "B", 20, 4),
        ]);
        assert!(arena.pair(ids[0], ids[1]));
        let copy = arena.copy(ids[0], 10, 0, 0).unwrap();
        let copy_of_copy = arena.copy(copy, 18, 0, 0).unwrap();
        let stranger = arena.push(Tag::new(TagType::Start, "B", 12, 0));

        assert!(arena.can_close(ids[1], copy_of_copy));
        assert_eq!(arena.lineage(copy_of_copy).collect::<Vec<_>>(), vec![copy_of_copy, copy, ids[0]]);
        assert!(!arena.can_close(ids[1], stranger));
        assert_eq!(arena.get(copy).unwrap().pass(), SYNTHETIC_PASS);
    }

    #[test]
    fn unpaired_end_cannot_close_paired_start() {
        let (mut arena, ids) = arena_with(vec![
            Tag::new(TagType::Start, "B", 0, 3),
            Tag::new(TagType::End, "B", 20, 4),
            Tag::new(TagType::End, "B", 10, 4),
            Tag::new(TagType::End, "B", 12, 4).with_suffix(":1"),
        ]);
        assert!(arena.pair(ids[0], ids[1]));
        assert!(!arena.can_close(ids[2], ids[0]));

        let open = arena.push(Tag::new(TagType::Start, "B", 5, 3));
        assert!(arena.can_close(ids[2], open));
        assert!(!arena.can_close(ids[3], open), "suffix differs");
    }

    #[test]
    fn processing_order_keys() {
        let (arena, ids) = arena_with(vec![
            Tag::new(TagType::Start, "A", 0, 0),
            Tag::new(TagType::End, "A", 0, 0),
            Tag::new(TagType::SelfClosing, "A", 0, 0),
            Tag::new(TagType::Start, "A", 0, 0).with_pass(1),
            Tag::new(TagType::Start, "A", 0, 0).with_pass(1).with_sort_priority(-1),
            Tag::new(TagType::Start, "A", 1, 0).with_pass(SYNTHETIC_PASS),
        ]);
        let mut order = ids.clone();
        order.sort_by(|&a, &b| arena.processing_order(a, b));
        assert_eq!(order, vec![ids[1], ids[2], ids[4], ids[3], ids[0], ids[5]]);
    }

    #[test]
    fn attribute_accessors() {
        let mut tag = Tag::new(TagType::Start, "URL", 0, 5);
        tag.set_attribute("url", "http://a");
        tag.set_attribute("url", "http://b");
        assert_eq!(tag.attribute("url"), Some("http://b"));
        assert_eq!(tag.remove_attribute("url").as_deref(), Some("http://b"));
        assert!(!tag.has_attribute("url"));
        assert_eq!(Tag::system(TagKind::LineBreak, 3, 0).name(), "br");
    }
}
