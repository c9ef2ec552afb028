//! Serialization of a [`Document`] to its XML-like form and to JSON.

use serde::Serialize;

use crate::{Document, DocumentTree, NodeId, NodeKind, OutputMode};

/// Escape `&`, `<` and `>` for use in text content.
#[must_use]
pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

/// Escape a value for use inside a double-quoted attribute.
///
/// In addition to the text escapes, `"` and newlines are encoded.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    escape(value, true)
}

fn escape(input: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn to_xml(document: &Document) -> String {
    let tree = document.tree();
    let mut out = String::new();
    match document.mode() {
        OutputMode::Plain => {
            out.push_str("<t>");
            for &child in tree.children(NodeId::ROOT) {
                write_node(tree, child, &mut out);
            }
            out.push_str("</t>");
        }
        OutputMode::Rich => {
            out.push_str("<r>");
            for &child in tree.children(NodeId::ROOT) {
                write_node(tree, child, &mut out);
            }
            out.push_str("</r>");
        }
    }
    out
}

fn write_node(tree: &DocumentTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Root => {
            for &child in &node.children {
                write_node(tree, child, out);
            }
        }
        NodeKind::Text(span) => out.push_str(&escape_text(&span.text)),
        NodeKind::Ignored(span) => {
            out.push_str("<i>");
            out.push_str(&escape_text(&span.text));
            out.push_str("</i>");
        }
        NodeKind::LineBreak { .. } => out.push_str("<br/>"),
        NodeKind::Paragraph { .. } => {
            out.push_str("<p>");
            for &child in &node.children {
                write_node(tree, child, out);
            }
            out.push_str("</p>");
        }
        NodeKind::Element(data) => {
            out.push('<');
            out.push_str(&data.name);
            for (name, value) in &data.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }

            if data.self_closing {
                match &data.start {
                    Some(markup) => {
                        out.push('>');
                        out.push_str(&escape_text(&markup.text));
                        out.push_str("</");
                        out.push_str(&data.name);
                        out.push('>');
                    }
                    None => out.push_str("/>"),
                }
                return;
            }

            out.push('>');
            if let Some(start) = &data.start {
                out.push_str("<s>");
                out.push_str(&escape_text(&start.text));
                out.push_str("</s>");
            }
            for &child in &node.children {
                write_node(tree, child, out);
            }
            if let Some(end) = &data.end {
                out.push_str("<e>");
                out.push_str(&escape_text(&end.text));
                out.push_str("</e>");
            }
            out.push_str("</");
            out.push_str(&data.name);
            out.push('>');
        }
    }
}

/// A borrowed view of a subtree that serializes as nested JSON objects.
///
/// Each object carries the node's `type` and payload fields, plus a
/// `children` array when the node has children. The root object also
/// carries the document `mode`.
#[derive(Debug, Clone, Copy)]
pub struct JsonNode<'a> {
    tree: &'a DocumentTree,
    id: NodeId,
    mode: OutputMode,
}

impl<'a> JsonNode<'a> {
    /// View the subtree rooted at `id`.
    #[must_use]
    pub const fn new(tree: &'a DocumentTree, id: NodeId, mode: OutputMode) -> Self {
        Self { tree, id, mode }
    }
}

#[derive(Serialize)]
struct NodeView<'a> {
    #[serde(flatten)]
    kind: &'a NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<OutputMode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode<'a>>,
}

impl Serialize for JsonNode<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(node) = self.tree.get(self.id) else {
            return serializer.serialize_none();
        };
        let view = NodeView {
            kind: &node.kind,
            mode: matches!(node.kind, NodeKind::Root).then_some(self.mode),
            children: node
                .children
                .iter()
                .map(|&child| Self::new(self.tree, child, self.mode))
                .collect(),
        };
        view.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a<b>&c\"d"), "a&lt;b&gt;&amp;c\"d");
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape_attribute("say \"hi\"\nnow"), "say &quot;hi&quot;&#10;now");
    }

    #[test]
    fn test_plain_document() {
        let doc = Document::plain("a < b");
        assert_eq!(doc.to_xml(), "<t>a &lt; b</t>");
    }
}
