//! Document tree for the tagloom resolver.
//!
//! This crate provides an arena-based tree structure holding the output of a
//! resolution, plus the [`TreeWriter`] the resolver drives incrementally.
//!
//! # Design
//!
//! The tree uses arena allocation with [`NodeId`] indices for all relationships,
//! providing O(1) access and traversal without borrow checker issues.
//!
//! Every byte of the input ends up in exactly one place: a text node, an
//! ignored span, or the start/end marker of an element. [`Document::source_text`]
//! relies on that to give back the original input.

mod serialize;
mod writer;

use serde::Serialize;
use std::collections::BTreeMap;
use strum_macros::Display;

pub use serialize::{JsonNode, escape_attribute, escape_text};
pub use writer::TreeWriter;

/// Map of attribute names to values for an element, in lexical order.
pub type AttributesMap = BTreeMap<String, String>;

/// A type-safe index into the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// A slice of the input, kept together with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSpan {
    /// Byte offset of the slice in the input.
    pub pos: usize,
    /// The slice itself.
    pub text: String,
}

impl TextSpan {
    /// Create a span.
    #[must_use]
    pub fn new(pos: usize, text: impl Into<String>) -> Self {
        Self {
            pos,
            text: text.into(),
        }
    }

    /// Byte offset one past the end of the span.
    #[must_use]
    pub fn end(&self) -> usize {
        self.pos + self.text.len()
    }
}

/// Element-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementData {
    /// Tag name.
    pub name: String,
    /// Validated attributes.
    pub attrs: AttributesMap,
    /// Markup consumed by the start tag (`None` when zero-width).
    pub start: Option<TextSpan>,
    /// Markup consumed by the end tag (`None` when zero-width or self-closing).
    pub end: Option<TextSpan>,
    /// Whether the element came from a self-closing tag.
    pub self_closing: bool,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    /// The document root.
    Root,
    /// A resolved tag.
    Element(ElementData),
    /// Literal text.
    Text(TextSpan),
    /// Input kept for reconstruction but not part of the visible content.
    Ignored(TextSpan),
    /// A zero-width line break.
    LineBreak {
        /// Offset the break was inserted at.
        pos: usize,
    },
    /// An automatically created paragraph.
    Paragraph {
        /// Offset the paragraph starts at.
        pos: usize,
    },
}

/// A node with its structural links.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node payload.
    pub kind: NodeKind,
    /// Parent node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
}

/// Arena-based tree with O(1) node access and traversal.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    /// All nodes in the tree, indexed by `NodeId`.
    /// The root node is always at index 0 (`NodeId::ROOT`).
    nodes: Vec<Node>,
}

impl DocumentTree {
    /// Create a new tree with just the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Get the number of nodes in the tree, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree only holds its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Allocate a new node and append it as the last child of `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        let id = NodeId(self.nodes.len());
        self.get_mut(parent)?.children.push(id);
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        Some(id)
    }

    /// Get the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Get all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Get the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.last().copied())
    }

    /// Iterate over all ancestors of a node, from parent to root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> AncestorIterator<'_> {
        AncestorIterator {
            tree: self,
            current: self.parent(id),
        }
    }

    /// Get element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Iterate over every node below `id` in document (pre-)order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Append `text` to the node if it is a text or ignored span that ends
    /// exactly at `pos`. Returns whether it was merged.
    fn extend_span(&mut self, id: NodeId, pos: usize, text: &str, ignored: bool) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        match &mut node.kind {
            NodeKind::Text(span) if !ignored && span.end() == pos => {
                span.text.push_str(text);
                true
            }
            NodeKind::Ignored(span) if ignored && span.end() == pos => {
                span.text.push_str(text);
                true
            }
            _ => false,
        }
    }
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over ancestors of a node.
pub struct AncestorIterator<'a> {
    tree: &'a DocumentTree,
    current: Option<NodeId>,
}

impl Iterator for AncestorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

/// Pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    tree: &'a DocumentTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Whether a document carries markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// No markup was recognized; the whole input is one text leaf.
    Plain,
    /// At least one tag was committed.
    Rich,
}

/// The result of a resolution.
#[derive(Debug, Clone)]
pub struct Document {
    mode: OutputMode,
    tree: DocumentTree,
}

impl Document {
    /// Build the degenerate document: the whole input as one opaque leaf.
    #[must_use]
    pub fn plain(text: &str) -> Self {
        let mut tree = DocumentTree::new();
        if !text.is_empty() {
            let _ = tree.append(NodeId::ROOT, NodeKind::Text(TextSpan::new(0, text)));
        }
        Self {
            mode: OutputMode::Plain,
            tree,
        }
    }

    pub(crate) const fn from_parts(mode: OutputMode, tree: DocumentTree) -> Self {
        Self { mode, tree }
    }

    /// Output mode of the document.
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Whether this is the plain-text fallback.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.mode == OutputMode::Plain
    }

    /// The underlying tree.
    #[must_use]
    pub const fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Reconstruct the input: text, ignored spans and tag markup in document order.
    #[must_use]
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        collect_source(&self.tree, NodeId::ROOT, &mut out);
        out
    }

    /// Visible text only: text nodes, without markup or ignored spans.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.tree
            .descendants(NodeId::ROOT)
            .filter_map(|id| match &self.tree.get(id)?.kind {
                NodeKind::Text(span) => Some(span.text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Elements with the given name, in document order.
    #[must_use]
    pub fn find_elements(&self, name: &str) -> Vec<NodeId> {
        self.tree
            .descendants(NodeId::ROOT)
            .filter(|&id| self.tree.as_element(id).is_some_and(|e| e.name == name))
            .collect()
    }

    /// Serialize to the XML-like intermediate representation.
    #[must_use]
    pub fn to_xml(&self) -> String {
        serialize::to_xml(self)
    }

    /// Serialize the tree as nested JSON values.
    #[must_use]
    pub fn to_json_value(&self) -> JsonNode<'_> {
        JsonNode::new(&self.tree, NodeId::ROOT, self.mode)
    }
}

fn collect_source(tree: &DocumentTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(span) | NodeKind::Ignored(span) => out.push_str(&span.text),
        NodeKind::Element(data) => {
            if let Some(start) = &data.start {
                out.push_str(&start.text);
            }
            for &child in &node.children {
                collect_source(tree, child, out);
            }
            if let Some(end) = &data.end {
                out.push_str(&end.text);
            }
        }
        NodeKind::Root | NodeKind::Paragraph { .. } => {
            for &child in &node.children {
                collect_source(tree, child, out);
            }
        }
        NodeKind::LineBreak { .. } => {}
    }
}

/// Print a document tree for debugging.
pub fn print_tree(tree: &DocumentTree, id: NodeId, indent: usize) {
    let prefix = "  ".repeat(indent);
    if let Some(node) = tree.get(id) {
        match &node.kind {
            NodeKind::Root => {
                println!("{prefix}Document");
            }
            NodeKind::Element(data) => {
                let marker = data.start.as_ref().map_or("", |span| span.text.as_str());
                if data.attrs.is_empty() {
                    println!("{prefix}<{}> {marker:?}", data.name);
                } else {
                    let attrs: Vec<String> = data
                        .attrs
                        .iter()
                        .map(|(k, v)| format!("{k}=\"{v}\""))
                        .collect();
                    println!("{prefix}<{} {}> {marker:?}", data.name, attrs.join(" "));
                }
            }
            NodeKind::Text(span) => {
                let display = span.text.replace('\n', "\\n").replace(' ', "\u{00B7}");
                println!("{prefix}\"{display}\"");
            }
            NodeKind::Ignored(span) => {
                let display = span.text.replace('\n', "\\n").replace(' ', "\u{00B7}");
                println!("{prefix}(ignored \"{display}\")");
            }
            NodeKind::LineBreak { .. } => {
                println!("{prefix}<br>");
            }
            NodeKind::Paragraph { .. } => {
                println!("{prefix}<p>");
            }
        }
        for &child_id in tree.children(id) {
            print_tree(tree, child_id, indent + 1);
        }
    }
}
