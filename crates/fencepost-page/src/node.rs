//! Element node of the presentation tree.

use std::collections::BTreeMap;

/// Element in the presentation tree.
///
/// Text follows the ElementTree model: `text` precedes the first child and
/// `tail` follows the element's own closing tag inside its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Element tag name.
    pub tag: String,
    /// Element attributes (unescaped values, serialized in key order).
    pub attrs: BTreeMap<String, String>,
    /// Direct text content before the first child.
    pub text: String,
    /// Text after the element.
    pub tail: String,
    /// Child elements.
    pub children: Vec<Node>,
    /// Raw inner markup, emitted verbatim in place of `text` and `children`.
    pub raw: Option<String>,
}

impl Node {
    /// Create a new node with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Set text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set tail content.
    #[must_use]
    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = tail.into();
        self
    }

    /// Add or replace one attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whether the attribute is present (with any value).
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn class_list(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    /// Whether the `class` attribute contains `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().any(|c| c == class)
    }

    /// Concatenated text of this node and all descendants.
    ///
    /// The node's own tail is excluded, children's tails are included.
    /// Raw markup counts as text as-is.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(raw) = &self.raw {
            out.push_str(raw);
            return;
        }
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }

    /// Replace the content with plain text.
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.raw = None;
        self.text = text.into();
    }

    /// Replace the content with child nodes.
    pub fn set_children(&mut self, children: Vec<Node>) {
        self.raw = None;
        self.text.clear();
        self.children = children;
    }

    /// Replace the content with raw markup.
    pub fn set_raw(&mut self, markup: impl Into<String>) {
        self.children.clear();
        self.text.clear();
        self.raw = Some(markup.into());
    }

    /// Whether the node has no text, children, or raw markup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.children.is_empty() && self.raw.is_none()
    }

    /// First descendant (depth-first, document order) with the given tag.
    #[must_use]
    pub fn find_descendant(&self, tag: &str) -> Option<&Node> {
        self.children.iter().find_map(|child| {
            if child.tag == tag {
                Some(child)
            } else {
                child.find_descendant(tag)
            }
        })
    }

    /// Mutable variant of [`find_descendant`](Self::find_descendant).
    pub fn find_descendant_mut(&mut self, tag: &str) -> Option<&mut Node> {
        for child in &mut self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find_descendant_mut(tag) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_content_includes_children_tails() {
        let code = Node::new("span").with_text("A").with_tail(" --> ");
        let node = Node::new("code")
            .with_text("graph TD\n")
            .with_children(vec![code, Node::new("span").with_text("B")])
            .with_tail("ignored");
        assert_eq!(node.text_content(), "graph TD\nA --> B");
    }

    #[test]
    fn test_class_list() {
        let node = Node::new("code").with_attr("class", "  language-mermaid  highlight ");
        assert!(node.has_class("language-mermaid"));
        assert!(node.has_class("highlight"));
        assert!(!node.has_class("language"));
        assert_eq!(node.class_list().count(), 2);
    }

    #[test]
    fn test_has_class_without_attribute() {
        assert!(!Node::new("pre").has_class("mermaid"));
    }

    #[test]
    fn test_set_raw_replaces_content() {
        let mut node = Node::new("pre")
            .with_text("graph TD")
            .with_children(vec![Node::new("b")]);
        node.set_raw("<svg></svg>");
        assert!(node.children.is_empty());
        assert!(node.text.is_empty());
        assert_eq!(node.text_content(), "<svg></svg>");

        node.set_text_content("again");
        assert!(node.raw.is_none());
        assert_eq!(node.text_content(), "again");
    }

    #[test]
    fn test_find_descendant() {
        let svg = Node::new("svg").with_attr("viewBox", "0 0 10 10");
        let tree = Node::new("div").with_children(vec![
            Node::new("p"),
            Node::new("figure").with_children(vec![svg]),
        ]);
        assert_eq!(
            tree.find_descendant("svg").and_then(|n| n.attr("viewBox")),
            Some("0 0 10 10")
        );
        assert!(tree.find_descendant("img").is_none());
    }
}
