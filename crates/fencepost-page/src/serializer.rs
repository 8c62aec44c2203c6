//! XHTML serializer for the presentation tree.

use std::fmt::Write;

use crate::node::Node;
use crate::parser::VOID_ELEMENTS;

/// Serialize a node and its tail.
pub(crate) fn serialize_node(node: &Node, out: &mut String) {
    out.push('<');
    out.push_str(&node.tag);

    for (key, value) in &node.attrs {
        write!(out, r#" {}="{}""#, key, escape_attr(value)).unwrap();
    }

    if node.is_empty() && VOID_ELEMENTS.contains(&node.tag.as_str()) {
        out.push_str(" />");
    } else {
        out.push('>');
        serialize_content(node, out);
        write!(out, "</{}>", node.tag).unwrap();
    }

    if !node.tail.is_empty() {
        out.push_str(&escape_text(&node.tail));
    }
}

/// Serialize only the content (text, children or raw markup) of a node.
pub(crate) fn serialize_content(node: &Node, out: &mut String) {
    if let Some(raw) = &node.raw {
        out.push_str(raw);
        return;
    }

    if !node.text.is_empty() {
        out.push_str(&escape_text(&node.text));
    }
    for child in &node.children {
        serialize_node(child, out);
    }
}

/// Serialize a node to a string.
#[must_use]
pub fn to_html(node: &Node) -> String {
    let mut out = String::with_capacity(256);
    serialize_node(node, &mut out);
    out
}

/// Escape text for element content.
#[must_use]
pub fn escape_text(text: &str) -> String {
    escape_xml(text, false)
}

/// Escape text for attribute values.
#[must_use]
pub fn escape_attr(text: &str) -> String {
    escape_xml(text, true)
}

fn escape_xml(text: &str, escape_quotes: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if escape_quotes => result.push_str("&quot;"),
            '\'' if escape_quotes => result.push_str("&#x27;"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_with_children_and_tail() {
        let strong = Node::new("strong").with_text("Bold").with_tail(" text");
        let p = Node::new("p").with_children(vec![strong]);
        assert_eq!(to_html(&p), "<p><strong>Bold</strong> text</p>");
    }

    #[test]
    fn test_void_element_self_closes() {
        let p = Node::new("p")
            .with_text("Before")
            .with_children(vec![Node::new("br").with_tail("After")]);
        assert_eq!(to_html(&p), "<p>Before<br />After</p>");
    }

    #[test]
    fn test_empty_non_void_element_keeps_close_tag() {
        let slot = Node::new("div").with_attr("class", "mermaid-zoom-content");
        assert_eq!(to_html(&slot), r#"<div class="mermaid-zoom-content"></div>"#);
    }

    #[test]
    fn test_attributes_sorted_and_escaped() {
        let pre = Node::new("pre")
            .with_attr("data-diagram", "A --> B \"quoted\" & 'single'")
            .with_attr("class", "mermaid");
        assert_eq!(
            to_html(&pre),
            r#"<pre class="mermaid" data-diagram="A --&gt; B &quot;quoted&quot; &amp; &#x27;single&#x27;"></pre>"#
        );
    }

    #[test]
    fn test_escape_text_content() {
        let p = Node::new("p").with_text("a < b & c > d");
        assert_eq!(to_html(&p), "<p>a &lt; b &amp; c &gt; d</p>");
    }

    #[test]
    fn test_raw_markup_emitted_verbatim() {
        let mut pre = Node::new("pre").with_attr("class", "mermaid");
        pre.set_raw(r#"<svg id="m1"><g/></svg>"#);
        assert_eq!(
            to_html(&pre),
            r#"<pre class="mermaid"><svg id="m1"><g/></svg></pre>"#
        );
    }
}
