//! The resolution engine.
//!
//! A [`Resolver`] owns the working state of one resolution: the tag arena,
//! the pending tag stack, the open element frames, the per-name counters, the
//! [`TreeWriter`] building the output and the [`Logger`] collecting
//! diagnostics. The work is split by concern:
//!
//! - `core`: intake bookkeeping, the main loop and tag dispatch
//! - `context`: element frames, counters and committing tags to the tree
//! - `fixing`: start and end tag processing, including corrective actions
//! - `attributes`: attribute preprocessing and validation
//! - `text`: text between tags, paragraphs and whitespace trimming

mod attributes;
mod context;
mod core;
mod fixing;
mod text;

use tagloom_common::Logger;
use tagloom_rules::{RuleFlags, RuleTable};
use tagloom_tree::{AttributesMap, Document, TreeWriter};

use crate::{
    Candidate, LimitAction, Pass, PassId, ResolveError, Tag, TagArena, TagId, TagKind, TagType,
};

use self::context::{Context, Counter, OpenElement};

/// Output of a resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolved document.
    pub document: Document,
    /// Everything that was discarded or corrected along the way.
    pub log: Logger,
}

/// Merges candidate tags into one well-formed [`Document`].
///
/// ```
/// use tagloom_parser::{Candidate, PassId, Resolver};
/// use tagloom_rules::{RuleTableBuilder, TagDeclaration};
///
/// let rules = RuleTableBuilder::new()
///     .tag(TagDeclaration::new("B"))
///     .build()
///     .unwrap();
/// let mut resolver = Resolver::new("[b]x", &rules);
/// let _ = resolver.add_candidate(PassId(0), Candidate::start("B", 0, 3));
///
/// // Elements left open are closed at the end of the text.
/// assert_eq!(resolver.run().document.to_xml(), "<r><B><s>[b]</s>x</B></r>");
/// ```
#[derive(Debug)]
pub struct Resolver<'a> {
    text: &'a str,
    rules: &'a RuleTable,

    tags: TagArena,
    /// Pending tags. When sorted, the next tag to process is last.
    stack: Vec<TagId>,
    stack_is_sorted: bool,
    passes: Vec<String>,

    log: Logger,
    writer: TreeWriter,

    context: Context,
    open_elements: Vec<OpenElement>,
    counters: Vec<Counter>,

    /// End of the text already committed to the tree.
    pos: usize,
    fixing_cost: u32,
    fixing_exhaustion_reported: bool,
    is_rich: bool,
}

impl<'a> Resolver<'a> {
    /// A resolver for `text` governed by `rules`.
    #[must_use]
    pub fn new(text: &'a str, rules: &'a RuleTable) -> Self {
        Self {
            text,
            rules,
            tags: TagArena::new(),
            stack: Vec::new(),
            stack_is_sorted: true,
            passes: Vec::new(),
            log: Logger::new(),
            writer: TreeWriter::new(),
            context: Context::root(rules),
            open_elements: Vec::new(),
            counters: vec![Counter::default(); rules.len()],
            pos: 0,
            fixing_cost: 0,
            fixing_exhaustion_reported: false,
            is_rich: false,
        }
    }

    /// Register a pass and take in its candidates.
    ///
    /// Candidates above the pass limit are dropped, with a `debug` entry for
    /// [`LimitAction::Ignore`] and a `warning` for [`LimitAction::Warn`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::PassLimitExceeded`] if the pass exceeds a limit
    /// declared with [`LimitAction::Abort`].
    pub fn add_pass(&mut self, pass: Pass) -> Result<PassId, ResolveError> {
        let Pass {
            name,
            mut candidates,
            limit,
        } = pass;

        if let Some(limit) = limit
            && candidates.len() > limit.max_matches
        {
            let found = candidates.len();
            match limit.action {
                LimitAction::Abort => {
                    return Err(ResolveError::PassLimitExceeded {
                        pass: name,
                        limit: limit.max_matches,
                        found,
                    });
                }
                LimitAction::Warn => self.log.warn(
                    None::<usize>,
                    "Pass {0} exceeded its limit of {1} matches ({2} found)",
                    &[&name, &limit.max_matches, &found],
                ),
                LimitAction::Ignore => self.log.debug(
                    None::<usize>,
                    "Pass {0} exceeded its limit of {1} matches ({2} found)",
                    &[&name, &limit.max_matches, &found],
                ),
            }
            candidates.truncate(limit.max_matches);
        }

        let id = PassId(u32::try_from(self.passes.len()).unwrap_or(u32::MAX - 1));
        self.passes.push(name);
        for candidate in candidates {
            let _ = self.add_candidate(id, candidate);
        }
        Ok(id)
    }

    /// Take in one candidate reported by `pass`.
    ///
    /// Candidates whose markup lies outside the text or does not start and end
    /// on character boundaries are dropped with a `warning`. A start tag
    /// carrying its end tag yields two paired tags; the start tag's id is
    /// returned.
    pub fn add_candidate(&mut self, pass: PassId, candidate: Candidate) -> Option<TagId> {
        if !self.is_valid_span(candidate.pos, candidate.len) {
            self.log.warn(
                candidate.pos,
                "Tag {0} at {1} with length {2} is out of bounds",
                &[&candidate.name, &candidate.pos, &candidate.len],
            );
            return None;
        }

        let Candidate {
            tag_type,
            kind,
            name,
            pos,
            len,
            suffix,
            attributes,
            sort_priority,
            flags,
            end,
        } = candidate;

        let mut tag = if kind == TagKind::Element {
            let rule = self.rules.lookup(&name);
            let (index, flags) = rule.map_or((None, RuleFlags::empty()), |rule| {
                (Some(rule.index), rule.flags)
            });
            Tag::new(tag_type, name, pos, len).with_rule(index, flags)
        } else {
            let tag = Tag::system(kind, pos, len).with_rule(None, flags);
            if name.is_empty() {
                tag
            } else {
                tag.with_name(name)
            }
        };
        tag = tag
            .with_suffix(suffix)
            .with_sort_priority(sort_priority)
            .with_pass(pass.0);
        tag.set_attributes(attributes);

        let end_tag = match end {
            Some(end) if tag.tag_type() == TagType::Start && !tag.is_system() => {
                if end.pos < pos || !self.is_valid_span(end.pos, end.len) {
                    self.log.warn(
                        end.pos,
                        "End tag of {0} at {1} with length {2} is out of bounds",
                        &[&tag.name(), &end.pos, &end.len],
                    );
                    None
                } else {
                    Some(
                        Tag::new(TagType::End, tag.name(), end.pos, end.len)
                            .with_rule(tag.rule(), tag.flags())
                            .with_suffix(tag.suffix())
                            .with_sort_priority(end.sort_priority)
                            .with_pass(pass.0),
                    )
                }
            }
            _ => None,
        };

        let id = self.push_tag(tag);
        if let Some(end_tag) = end_tag {
            let end_id = self.push_tag(end_tag);
            let _ = self.tags.pair(id, end_id);
        }
        Some(id)
    }

    fn is_valid_span(&self, pos: usize, len: usize) -> bool {
        pos.checked_add(len).is_some_and(|end| {
            end <= self.text.len()
                && self.text.is_char_boundary(pos)
                && self.text.is_char_boundary(end)
        })
    }

    fn add_element(
        &mut self,
        tag_type: TagType,
        name: &str,
        pos: usize,
        len: usize,
    ) -> Option<TagId> {
        self.add_candidate(
            PassId(0),
            Candidate {
                tag_type,
                name: name.to_string(),
                pos,
                len,
                ..Candidate::default()
            },
        )
    }

    /// Add a start tag.
    pub fn add_start_tag(&mut self, name: &str, pos: usize, len: usize) -> Option<TagId> {
        self.add_element(TagType::Start, name, pos, len)
    }

    /// Add an end tag.
    pub fn add_end_tag(&mut self, name: &str, pos: usize, len: usize) -> Option<TagId> {
        self.add_element(TagType::End, name, pos, len)
    }

    /// Add a self-closing tag.
    pub fn add_self_closing_tag(&mut self, name: &str, pos: usize, len: usize) -> Option<TagId> {
        self.add_element(TagType::SelfClosing, name, pos, len)
    }

    /// Add a start tag and its end tag, paired.
    pub fn add_tag_pair(
        &mut self,
        name: &str,
        start_pos: usize,
        start_len: usize,
        end_pos: usize,
        end_len: usize,
    ) -> Option<(TagId, TagId)> {
        let start = self.add_start_tag(name, start_pos, start_len)?;
        let end = self.add_end_tag(name, end_pos, end_len)?;
        if !self.tags.pair(start, end) {
            self.tags.invalidate(start);
            self.tags.invalidate(end);
            return None;
        }
        Some((start, end))
    }

    /// Add an explicit line break.
    pub fn add_line_break(&mut self, pos: usize, len: usize) -> Option<TagId> {
        self.add_candidate(PassId(0), Candidate::line_break(pos, len))
    }

    /// Add a span to keep as ignored text.
    pub fn add_ignore_tag(&mut self, pos: usize, len: usize) -> Option<TagId> {
        self.add_candidate(PassId(0), Candidate::ignore(pos, len))
    }

    /// Add a forced paragraph break.
    pub fn add_paragraph_break(&mut self, pos: usize) -> Option<TagId> {
        self.add_candidate(PassId(0), Candidate::paragraph_break(pos))
    }

    /// Add a span output as text under `flags`.
    pub fn add_verbatim(&mut self, pos: usize, len: usize, flags: RuleFlags) -> Option<TagId> {
        self.add_candidate(PassId(0), Candidate::verbatim(pos, len, flags))
    }

    /// A tag taken in so far.
    #[must_use]
    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    /// A tag taken in so far, for modification before [`run`](Self::run).
    pub fn tag_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(id)
    }

    /// Replace the attributes of a tag.
    pub fn set_attributes(&mut self, id: TagId, attributes: AttributesMap) {
        if let Some(tag) = self.tags.get_mut(id) {
            tag.set_attributes(attributes);
        }
    }

    /// Pair two tags. See [`TagArena::pair`].
    pub fn pair_tags(&mut self, a: TagId, b: TagId) -> bool {
        self.tags.pair(a, b)
    }

    /// Invalidate `to` whenever `from` is invalidated.
    pub fn cascade_invalidation(&mut self, from: TagId, to: TagId) {
        self.tags.cascade_invalidation(from, to);
    }

    /// Invalidate a tag before resolution.
    pub fn invalidate(&mut self, id: TagId) {
        self.tags.invalidate(id);
    }

    /// Names of the registered passes, by [`PassId`].
    #[must_use]
    pub fn passes(&self) -> &[String] {
        &self.passes
    }
}

/// Resolve `text` against the candidates of `passes`.
///
/// # Errors
///
/// Returns [`ResolveError::PassLimitExceeded`] if a pass exceeds a limit
/// declared with [`LimitAction::Abort`].
pub fn resolve(
    text: &str,
    passes: impl IntoIterator<Item = Pass>,
    rules: &RuleTable,
) -> Result<Resolution, ResolveError> {
    let mut resolver = Resolver::new(text, rules);
    for pass in passes {
        let _ = resolver.add_pass(pass)?;
    }
    Ok(resolver.run())
}
