//! Incremental tree construction.
//!
//! The resolver never builds nodes directly. It tells a [`TreeWriter`] to
//! open, close or emit things in document order and the writer keeps track of
//! where the next node goes.

use crate::{AttributesMap, Document, DocumentTree, ElementData, NodeId, NodeKind, OutputMode, TextSpan};

/// Emits nodes in document order while tracking the currently open elements
/// and paragraphs.
#[derive(Debug, Default)]
pub struct TreeWriter {
    tree: DocumentTree,
    /// Stack of open nodes (elements and paragraphs), innermost last.
    open: Vec<NodeId>,
}

impl TreeWriter {
    /// Create a writer with an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insertion_point(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.insertion_point();
        // The insertion point always exists: it is the root or a node we created.
        self.tree.append(parent, kind).unwrap_or(NodeId::ROOT)
    }

    /// Number of open elements and paragraphs.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Whether the innermost open node is a paragraph.
    #[must_use]
    pub fn in_paragraph(&self) -> bool {
        self.open
            .last()
            .and_then(|&id| self.tree.get(id))
            .is_some_and(|node| matches!(node.kind, NodeKind::Paragraph { .. }))
    }

    /// Open an element; subsequent nodes become its children.
    pub fn open_element(
        &mut self,
        name: &str,
        attrs: AttributesMap,
        start: Option<TextSpan>,
    ) -> NodeId {
        let id = self.append(NodeKind::Element(ElementData {
            name: name.to_string(),
            attrs,
            start,
            end: None,
            self_closing: false,
        }));
        self.open.push(id);
        id
    }

    /// Emit an element that is opened and closed in one step.
    pub fn self_closing_element(
        &mut self,
        name: &str,
        attrs: AttributesMap,
        markup: Option<TextSpan>,
    ) -> NodeId {
        self.append(NodeKind::Element(ElementData {
            name: name.to_string(),
            attrs,
            start: markup,
            end: None,
            self_closing: true,
        }))
    }

    /// Close the innermost open element, recording its end markup.
    ///
    /// A paragraph still open inside it is closed first. Returns the closed
    /// element, or `None` if no element was open.
    pub fn close_element(&mut self, end: Option<TextSpan>) -> Option<NodeId> {
        while let Some(id) = self.open.pop() {
            if let Some(node) = self.tree.get_mut(id)
                && let NodeKind::Element(data) = &mut node.kind
            {
                data.end = end;
                return Some(id);
            }
        }
        None
    }

    /// Open a paragraph at `pos`.
    pub fn open_paragraph(&mut self, pos: usize) -> NodeId {
        let id = self.append(NodeKind::Paragraph { pos });
        self.open.push(id);
        id
    }

    /// Close the innermost node if it is a paragraph.
    pub fn close_paragraph(&mut self) -> bool {
        if self.in_paragraph() {
            let _ = self.open.pop();
            true
        } else {
            false
        }
    }

    /// Emit literal text starting at `pos`.
    ///
    /// Text contiguous with a preceding text node is merged into it.
    pub fn text(&mut self, pos: usize, text: &str) {
        self.span(pos, text, false);
    }

    /// Emit an ignored span starting at `pos`.
    pub fn ignored(&mut self, pos: usize, text: &str) {
        self.span(pos, text, true);
    }

    fn span(&mut self, pos: usize, text: &str, ignored: bool) {
        if text.is_empty() {
            return;
        }
        let parent = self.insertion_point();
        if let Some(last) = self.tree.last_child(parent)
            && self.tree.extend_span(last, pos, text, ignored)
        {
            return;
        }
        let span = TextSpan::new(pos, text);
        let _ = self.append(if ignored {
            NodeKind::Ignored(span)
        } else {
            NodeKind::Text(span)
        });
    }

    /// Emit a line break at `pos`.
    pub fn line_break(&mut self, pos: usize) -> NodeId {
        self.append(NodeKind::LineBreak { pos })
    }

    /// Finish writing. Anything still open is closed without end markup.
    #[must_use]
    pub fn finish(mut self, mode: OutputMode) -> Document {
        self.open.clear();
        Document::from_parts(mode, self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements_and_text() {
        let mut writer = TreeWriter::new();
        let b = writer.open_element("B", AttributesMap::new(), Some(TextSpan::new(0, "[b]")));
        writer.text(3, "x");
        writer.text(4, "y");
        assert_eq!(writer.close_element(Some(TextSpan::new(5, "[/b]"))), Some(b));
        assert_eq!(writer.depth(), 0);

        let doc = writer.finish(OutputMode::Rich);
        let children = doc.tree().children(b);
        assert_eq!(children.len(), 1, "contiguous text is merged");
        assert_eq!(doc.source_text(), "[b]xy[/b]");
    }

    #[test]
    fn test_close_element_closes_paragraph_first() {
        let mut writer = TreeWriter::new();
        let _ = writer.open_element("QUOTE", AttributesMap::new(), None);
        let _ = writer.open_paragraph(0);
        writer.text(0, "hi");
        assert!(writer.in_paragraph());
        assert!(writer.close_element(None).is_some());
        assert_eq!(writer.depth(), 0);
    }

    #[test]
    fn test_text_and_ignored_are_not_merged() {
        let mut writer = TreeWriter::new();
        writer.text(0, "a");
        writer.ignored(1, " ");
        writer.text(2, "b");
        let doc = writer.finish(OutputMode::Rich);
        assert_eq!(doc.tree().children(NodeId::ROOT).len(), 3);
        assert_eq!(doc.plain_text(), "ab");
        assert_eq!(doc.source_text(), "a b");
    }
}
