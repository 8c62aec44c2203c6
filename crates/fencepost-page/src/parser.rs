//! Lenient XHTML parser.
//!
//! Built on `quick-xml`: markdown renderers and templates emit well-formed
//! XHTML apart from a few HTML habits (void elements without a trailing
//! slash, named entities, stray end tags, bare `&` and `<` in text, unquoted
//! attribute values), which are tolerated here.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::PageError;
use crate::node::Node;

/// Synthetic wrapper element so fragments with several roots parse.
const WRAPPER: &str = "fencepost-root";

/// HTML void elements, which never have content or an end tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Result of parsing markup.
#[derive(Debug)]
pub(crate) struct Parsed {
    /// Document type declaration without `<!` and `>` (e.g. `DOCTYPE html`).
    pub doctype: Option<String>,
    /// Synthetic root holding the top-level nodes.
    pub root: Node,
}

/// Parse markup into a synthetic root node.
pub(crate) fn parse(html: &str) -> Result<Parsed, PageError> {
    let (doctype, body) = split_doctype(html);
    let wrapped = format!("<{WRAPPER}>{}</{WRAPPER}>", escape_stray_angles(body));

    let mut reader = Reader::from_str(&wrapped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_dangling_amp = true;

    let mut root = Node::new(WRAPPER);
    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                root = parse_children(&mut reader, WRAPPER)?;
                root.tag = WRAPPER.to_owned();
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Parsed {
        doctype: doctype.map(str::to_owned),
        root,
    })
}

/// Parse a markup fragment into a list of top-level nodes plus leading text.
///
/// # Errors
///
/// Returns an error if the markup cannot be parsed.
pub fn parse_fragment(html: &str) -> Result<(String, Vec<Node>), PageError> {
    let parsed = parse(html)?;
    Ok((parsed.root.text, parsed.root.children))
}

/// Split a leading `<!DOCTYPE ...>` off the input.
fn split_doctype(html: &str) -> (Option<&str>, &str) {
    let trimmed = html.trim_start();
    let is_doctype = trimmed
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return (None, html);
    }
    match trimmed.find('>') {
        Some(end) => (Some(&trimmed[2..end]), &trimmed[end + 1..]),
        None => (None, html),
    }
}

/// Escape every `<` that cannot open a tag, so it parses as text.
///
/// Like an HTML tokenizer, a `<` only starts markup when followed by a
/// letter, `/`, `!` or `?`.
fn escape_stray_angles(html: &str) -> Cow<'_, str> {
    let bytes = html.as_bytes();
    let is_stray = |i: usize| {
        bytes[i] == b'<'
            && bytes
                .get(i + 1)
                .is_none_or(|next| !(next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?')))
    };
    if !(0..bytes.len()).any(is_stray) {
        return Cow::Borrowed(html);
    }

    let mut escaped = String::with_capacity(html.len() + 8);
    for (i, c) in html.char_indices() {
        if is_stray(i) {
            escaped.push_str("&lt;");
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

fn parse_children(reader: &mut Reader<&[u8]>, parent_tag: &str) -> Result<Node, PageError> {
    let mut node = Node::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let child_tag = decode_tag(reader, e.name().as_ref());
                let child_attrs = decode_attrs(reader, &e);
                let mut child = if is_void(&child_tag) {
                    Node::default()
                } else {
                    parse_children(reader, &child_tag)?
                };
                child.tag = child_tag;
                child.attrs = child_attrs;
                node.children.push(child);
            }
            Event::Empty(e) => {
                let child = Node {
                    tag: decode_tag(reader, e.name().as_ref()),
                    attrs: decode_attrs(reader, &e),
                    ..Default::default()
                };
                node.children.push(child);
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?.into_owned();
                append_text(&mut node, &text);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?.into_owned();
                append_text(&mut node, &decode_entity(&entity));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&mut node, &text);
            }
            Event::End(e) => {
                let end_tag = decode_tag(reader, e.name().as_ref());
                if end_tag == parent_tag {
                    return Ok(node);
                }
                if is_void(&end_tag) {
                    continue;
                }
                tracing::trace!(expected = parent_tag, found = %end_tag, "Skipping stray end tag");
            }
            Event::Eof => return Ok(node),
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(tag))
}

fn decode_tag(reader: &Reader<&[u8]>, name: &[u8]) -> String {
    reader
        .decoder()
        .decode(name)
        .map_or_else(|_| String::from_utf8_lossy(name).into_owned(), Cow::into_owned)
}

fn decode_attrs(
    reader: &Reader<&[u8]>,
    e: &BytesStart,
) -> std::collections::BTreeMap<String, String> {
    let mut attrs = std::collections::BTreeMap::new();
    for attr in e.html_attributes().flatten() {
        let key = reader.decoder().decode(attr.key.as_ref()).map_or_else(
            |_| String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            Cow::into_owned,
        );
        let value = attr
            .unescape_value()
            .map_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned(), Cow::into_owned);
        attrs.insert(key, value);
    }
    attrs
}

/// Append text to node's text or last child's tail.
fn append_text(node: &mut Node, text: &str) {
    if let Some(last_child) = node.children.last_mut() {
        last_child.tail.push_str(text);
    } else {
        node.text.push_str(text);
    }
}

/// Decode an entity reference (without `&` and `;`) to its character value.
fn decode_entity(entity: &str) -> String {
    let named = match entity {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{00a0}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "times" => Some("\u{00d7}"),
        "copy" => Some("\u{00a9}"),
        "rarr" => Some("\u{2192}"),
        "larr" => Some("\u{2190}"),
        _ => None,
    };
    if let Some(text) = named {
        return text.to_owned();
    }

    if let Some(numeric) = entity.strip_prefix('#') {
        let code = if let Some(hex) = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'))
        {
            u32::from_str_radix(hex, 16).ok()
        } else {
            numeric.parse::<u32>().ok()
        };
        if let Some(c) = code.and_then(char::from_u32) {
            return c.to_string();
        }
    }

    // Unknown entity - preserve as text
    format!("&{entity};")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_element() {
        let parsed = parse("<p>Hello</p>").unwrap();
        assert_eq!(parsed.root.children.len(), 1);
        let p = &parsed.root.children[0];
        assert_eq!(p.tag, "p");
        assert_eq!(p.text, "Hello");
    }

    #[test]
    fn test_parse_nested_elements_with_tail() {
        let parsed = parse("<p><strong>Bold</strong> text</p>").unwrap();
        let p = &parsed.root.children[0];
        assert!(p.text.is_empty());
        assert_eq!(p.children[0].tag, "strong");
        assert_eq!(p.children[0].text, "Bold");
        assert_eq!(p.children[0].tail, " text");
    }

    #[test]
    fn test_parse_fenced_code_block() {
        let html = "<pre><code class=\"language-mermaid\">graph TD\nA --&gt; B\n</code></pre>\n";
        let parsed = parse(html).unwrap();
        let pre = &parsed.root.children[0];
        assert_eq!(pre.tag, "pre");
        assert_eq!(pre.children.len(), 1);
        let code = &pre.children[0];
        assert!(code.has_class("language-mermaid"));
        assert_eq!(code.text_content(), "graph TD\nA --> B\n");
        assert_eq!(pre.tail, "\n");
    }

    #[test]
    fn test_parse_attribute_entities() {
        let parsed = parse(r#"<pre data-diagram="a &lt;b&gt; &amp; &quot;c&quot;"></pre>"#).unwrap();
        assert_eq!(
            parsed.root.children[0].attr("data-diagram"),
            Some(r#"a <b> & "c""#)
        );
    }

    #[test]
    fn test_parse_html_entities() {
        let parsed = parse("<p>Hello&nbsp;World&mdash;Test&#x41;&#66;&unknown;</p>").unwrap();
        assert_eq!(
            parsed.root.children[0].text,
            "Hello\u{00a0}World\u{2014}TestAB&unknown;"
        );
    }

    #[test]
    fn test_parse_void_elements_without_slash() {
        let parsed = parse("<p>Before<br>After</p><p>Next</p>").unwrap();
        assert_eq!(parsed.root.children.len(), 2);
        let p = &parsed.root.children[0];
        assert_eq!(p.text, "Before");
        assert_eq!(p.children[0].tag, "br");
        assert_eq!(p.children[0].tail, "After");
    }

    #[test]
    fn test_parse_doctype_document() {
        let html = "<!DOCTYPE html>\n<html data-theme=\"dark\"><head><meta charset=\"utf-8\"></head><body><p>x</p></body></html>";
        let parsed = parse(html).unwrap();
        assert_eq!(parsed.doctype.as_deref(), Some("DOCTYPE html"));
        let html_node = parsed
            .root
            .children
            .iter()
            .find(|n| n.tag == "html")
            .unwrap();
        assert_eq!(html_node.attr("data-theme"), Some("dark"));
        assert_eq!(html_node.children[1].tag, "body");
    }

    #[test]
    fn test_parse_stray_end_tag_is_skipped() {
        let parsed = parse("<div><p>one</span></p></div>").unwrap();
        let div = &parsed.root.children[0];
        assert_eq!(div.children[0].text, "one");
    }

    #[test]
    fn test_parse_bare_ampersand_as_text() {
        let parsed = parse("<div>Tom & Jerry</div><p>R&D; Q&amp;A</p>").unwrap();
        assert_eq!(parsed.root.children[0].text, "Tom & Jerry");
        assert_eq!(parsed.root.children[1].text, "R&D; Q&A");
    }

    #[test]
    fn test_parse_bare_less_than_as_text() {
        let parsed = parse("<div>\n1 < 2 <= 3\n</div><p>after</p>").unwrap();
        assert_eq!(parsed.root.children.len(), 2);
        let div = &parsed.root.children[0];
        assert!(div.children.is_empty());
        assert_eq!(div.text, "\n1 < 2 <= 3\n");
        assert_eq!(parsed.root.children[1].text, "after");
    }

    #[test]
    fn test_parse_unquoted_attributes() {
        let parsed = parse("<div class=note data-x=1>ok</div>").unwrap();
        let div = &parsed.root.children[0];
        assert_eq!(div.attr("class"), Some("note"));
        assert_eq!(div.attr("data-x"), Some("1"));
        assert_eq!(div.text, "ok");
    }

    #[test]
    fn test_escape_stray_angles() {
        assert!(matches!(escape_stray_angles("<p>a</p>"), Cow::Borrowed(_)));
        assert_eq!(escape_stray_angles("a < b <c> </c> <"), "a &lt; b <c> </c> &lt;");
        assert_eq!(escape_stray_angles("<!-- x --><?pi?>"), "<!-- x --><?pi?>");
    }

    #[test]
    fn test_parse_fragment_leading_text() {
        let (text, nodes) = parse_fragment("intro <b>bold</b>").unwrap();
        assert_eq!(text, "intro ");
        assert_eq!(nodes[0].tag, "b");
    }
}
