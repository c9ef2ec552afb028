//! Integration tests for building and serializing documents.

use tagloom_tree::{AttributesMap, Document, NodeId, NodeKind, OutputMode, TextSpan, TreeWriter};

fn attrs(pairs: &[(&str, &str)]) -> AttributesMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// `[url=x]link[/url] and text`
fn sample() -> Document {
    let mut writer = TreeWriter::new();
    let _ = writer.open_element(
        "URL",
        attrs(&[("url", "http://example.org/?a=1&b=\"2\"")]),
        Some(TextSpan::new(0, "[url=x]")),
    );
    writer.text(7, "link");
    let _ = writer.close_element(Some(TextSpan::new(11, "[/url]")));
    writer.text(17, " and ");
    writer.ignored(22, "\n");
    let _ = writer.line_break(23);
    let _ = writer.self_closing_element("HR", AttributesMap::new(), None);
    let _ = writer.self_closing_element("STAR", AttributesMap::new(), Some(TextSpan::new(23, "[*]")));
    writer.finish(OutputMode::Rich)
}

#[test]
fn test_rich_xml() {
    let doc = sample();
    assert_eq!(
        doc.to_xml(),
        "<r><URL url=\"http://example.org/?a=1&amp;b=&quot;2&quot;\"><s>[url=x]</s>link\
         <e>[/url]</e></URL> and <i>\n</i><br/><HR/><STAR>[*]</STAR></r>"
    );
}

#[test]
fn test_source_text_reconstructs_input() {
    let doc = sample();
    assert_eq!(doc.source_text(), "[url=x]link[/url] and \n[*]");
    assert_eq!(doc.plain_text(), "link and ");
}

#[test]
fn test_find_elements_in_document_order() {
    let mut writer = TreeWriter::new();
    let first = writer.open_element("B", AttributesMap::new(), None);
    let nested = writer.open_element("B", AttributesMap::new(), None);
    let _ = writer.close_element(None);
    let _ = writer.close_element(None);
    let doc = writer.finish(OutputMode::Rich);

    assert_eq!(doc.find_elements("B"), vec![first, nested]);
    assert_eq!(doc.tree().ancestors(nested).collect::<Vec<_>>(), vec![first, NodeId::ROOT]);
}

#[test]
fn test_paragraphs_serialize() {
    let mut writer = TreeWriter::new();
    let _ = writer.open_paragraph(0);
    writer.text(0, "one");
    assert!(writer.close_paragraph());
    assert!(!writer.close_paragraph());
    writer.ignored(3, "\n\n");
    let _ = writer.open_paragraph(5);
    writer.text(5, "two");
    let doc = writer.finish(OutputMode::Rich);

    assert_eq!(doc.to_xml(), "<r><p>one</p><i>\n\n</i><p>two</p></r>");
}

#[test]
fn test_plain_document_has_single_leaf() {
    let doc = Document::plain("just text");
    assert!(doc.is_plain());
    let children = doc.tree().children(NodeId::ROOT);
    assert_eq!(children.len(), 1);
    assert!(matches!(
        doc.tree().get(children[0]).map(|n| &n.kind),
        Some(NodeKind::Text(span)) if span.text == "just text"
    ));
    assert_eq!(doc.to_xml(), "<t>just text</t>");
}

#[test]
fn test_empty_plain_document() {
    let doc = Document::plain("");
    assert!(doc.tree().is_empty());
    assert_eq!(doc.to_xml(), "<t></t>");
}

#[test]
fn test_json_shape() {
    let mut writer = TreeWriter::new();
    let _ = writer.open_element("B", AttributesMap::new(), Some(TextSpan::new(0, "[b]")));
    writer.text(3, "x");
    let _ = writer.close_element(None);
    let doc = writer.finish(OutputMode::Rich);

    let value = serde_json::to_value(doc.to_json_value()).unwrap();
    assert_eq!(value["type"], "root");
    assert_eq!(value["mode"], "rich");
    let element = &value["children"][0];
    assert_eq!(element["type"], "element");
    assert_eq!(element["name"], "B");
    assert_eq!(element["start"]["text"], "[b]");
    assert!(element.get("mode").is_none());
    assert_eq!(element["children"][0]["type"], "text");
    assert_eq!(element["children"][0]["text"], "x");
}
