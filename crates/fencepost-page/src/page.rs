//! Page: an owned presentation tree with attribute-mutation observation.

use tokio::sync::mpsc;

use crate::error::PageError;
use crate::node::Node;
use crate::parser::{self, parse_fragment};
use crate::serializer::{serialize_content, serialize_node};

/// Address of a node: child indices from the document element.
///
/// Paths stay valid as long as no ancestor's child list is restructured.
/// Content swaps of a node invalidate only paths below that node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the document element.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the `index`-th child of this node.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Child indices from the document element.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// New content for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text (escaped on output).
    Text(String),
    /// Child elements.
    Nodes(Vec<Node>),
    /// Markup emitted verbatim.
    Raw(String),
}

impl Content {
    /// Parse markup into nodes, falling back to raw markup when it does not parse.
    #[must_use]
    pub fn markup(html: &str) -> Self {
        match parse_fragment(html) {
            Ok((text, nodes)) if text.trim().is_empty() && !nodes.is_empty() => {
                Self::Nodes(nodes)
            }
            Ok(_) => Self::Raw(html.to_owned()),
            Err(e) => {
                tracing::debug!(error = %e, "Markup did not parse, inserting as raw");
                Self::Raw(html.to_owned())
            }
        }
    }
}

/// A recorded change to an observed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMutation {
    /// Node whose attribute changed.
    pub target: NodePath,
    /// Attribute name.
    pub attribute: String,
    /// Value before the change (`None` if it was absent).
    pub old_value: Option<String>,
}

/// Receiver side of [`Page::observe`].
///
/// Mutations are queued in order, one entry per change, and delivered
/// asynchronously.
#[derive(Debug)]
pub struct AttributeObserver {
    rx: mpsc::UnboundedReceiver<AttributeMutation>,
}

impl AttributeObserver {
    /// Wait for the next mutation.
    ///
    /// Returns `None` once the page has been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<AttributeMutation> {
        self.rx.recv().await
    }

    /// Take the next queued mutation without waiting.
    pub fn try_recv(&mut self) -> Option<AttributeMutation> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct Observer {
    targets: Vec<NodePath>,
    attribute: String,
    tx: mpsc::UnboundedSender<AttributeMutation>,
}

/// Presentation tree of one rendered page.
#[derive(Debug)]
pub struct Page {
    document: Node,
    doctype: Option<String>,
    fragment: bool,
    observers: Vec<Observer>,
}

impl Page {
    /// Parse a full document or a fragment.
    ///
    /// Fragments (markup without an `<html>` element) are wrapped in a
    /// synthetic `<html><body>` document and serialize back without it.
    ///
    /// # Errors
    ///
    /// Returns an error if the markup cannot be parsed.
    pub fn parse(html: &str) -> Result<Self, PageError> {
        let parsed = parser::parse(html)?;
        let mut root = parsed.root;

        if let Some(index) = root.children.iter().position(|n| n.tag == "html") {
            let mut document = root.children.swap_remove(index);
            document.tail.clear();
            return Ok(Self {
                document,
                doctype: parsed.doctype,
                fragment: false,
                observers: Vec::new(),
            });
        }

        let body = Node::new("body")
            .with_text(root.text)
            .with_children(root.children);
        Ok(Self::from_body(body, true))
    }

    /// Build a fragment page around an existing body node.
    #[must_use]
    pub fn from_fragment(nodes: Vec<Node>) -> Self {
        Self::from_body(Node::new("body").with_children(nodes), true)
    }

    fn from_body(body: Node, fragment: bool) -> Self {
        Self {
            document: Node::new("html").with_children(vec![body]),
            doctype: None,
            fragment,
            observers: Vec::new(),
        }
    }

    /// Whether the page was parsed from a fragment.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// Serialize the page.
    ///
    /// Fragments serialize to the body content only.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(4096);
        if self.fragment {
            if let Some(body) = self.body_path().and_then(|p| self.node(&p)) {
                serialize_content(body, &mut out);
            }
            return out;
        }
        if let Some(doctype) = &self.doctype {
            out.push_str("<!");
            out.push_str(doctype);
            out.push_str(">\n");
        }
        serialize_node(&self.document, &mut out);
        out
    }

    /// The document element (`<html>`).
    #[must_use]
    pub fn document_element(&self) -> &Node {
        &self.document
    }

    /// Mutable document element, for structural rewrites.
    ///
    /// Edits made through this reference are not reported to observers and
    /// may invalidate existing [`NodePath`]s.
    pub fn document_element_mut(&mut self) -> &mut Node {
        &mut self.document
    }

    /// Path of the `<body>` element, if present.
    #[must_use]
    pub fn body_path(&self) -> Option<NodePath> {
        self.document
            .children
            .iter()
            .position(|n| n.tag == "body")
            .map(|i| NodePath::root().child(i))
    }

    /// Node at `path`.
    #[must_use]
    pub fn node(&self, path: &NodePath) -> Option<&Node> {
        path.0
            .iter()
            .try_fold(&self.document, |node, &i| node.children.get(i))
    }

    fn node_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        path.0
            .iter()
            .try_fold(&mut self.document, |node, &i| node.children.get_mut(i))
    }

    /// Paths of all nodes matching `predicate`, in document order.
    pub fn select(&self, predicate: impl Fn(&Node) -> bool) -> Vec<NodePath> {
        let mut found = Vec::new();
        collect_matches(&self.document, &NodePath::root(), &predicate, &mut found);
        found
    }

    /// Paths of all `tag` elements carrying `class`, in document order.
    #[must_use]
    pub fn select_class(&self, tag: &str, class: &str) -> Vec<NodePath> {
        self.select(|n| n.tag == tag && n.has_class(class))
    }

    /// First element whose `id` attribute equals `id`.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<NodePath> {
        self.select(|n| n.attr("id") == Some(id)).into_iter().next()
    }

    /// Replace the content of the node at `path`.
    ///
    /// Returns `false` if no node exists at `path`.
    pub fn replace_content(&mut self, path: &NodePath, content: Content) -> bool {
        let Some(node) = self.node_mut(path) else {
            return false;
        };
        match content {
            Content::Text(text) => node.set_text_content(text),
            Content::Nodes(nodes) => node.set_children(nodes),
            Content::Raw(raw) => node.set_raw(raw),
        }
        true
    }

    /// Set an attribute, notifying observers of that attribute on that node.
    ///
    /// Returns `false` if no node exists at `path`.
    pub fn set_attribute(&mut self, path: &NodePath, name: &str, value: impl Into<String>) -> bool {
        let Some(node) = self.node_mut(path) else {
            return false;
        };
        let old_value = node.attrs.insert(name.to_owned(), value.into());
        self.notify(path, name, old_value);
        true
    }

    /// Remove an attribute, notifying observers when it was present.
    ///
    /// Returns the previous value.
    pub fn remove_attribute(&mut self, path: &NodePath, name: &str) -> Option<String> {
        let old_value = self.node_mut(path)?.attrs.remove(name)?;
        self.notify(path, name, Some(old_value.clone()));
        Some(old_value)
    }

    /// Observe changes of `attribute` on the nodes at `targets`.
    ///
    /// Every subsequent [`set_attribute`](Self::set_attribute) or successful
    /// [`remove_attribute`](Self::remove_attribute) on a watched node queues
    /// one [`AttributeMutation`]. Dropping the returned observer unregisters it.
    pub fn observe(&mut self, targets: Vec<NodePath>, attribute: &str) -> AttributeObserver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(Observer {
            targets,
            attribute: attribute.to_owned(),
            tx,
        });
        AttributeObserver { rx }
    }

    fn notify(&mut self, path: &NodePath, name: &str, old_value: Option<String>) {
        self.observers.retain(|observer| {
            if observer.tx.is_closed() {
                return false;
            }
            if observer.attribute == name && observer.targets.contains(path) {
                let mutation = AttributeMutation {
                    target: path.clone(),
                    attribute: name.to_owned(),
                    old_value: old_value.clone(),
                };
                return observer.tx.send(mutation).is_ok();
            }
            true
        });
    }
}

fn collect_matches(
    node: &Node,
    path: &NodePath,
    predicate: &impl Fn(&Node) -> bool,
    found: &mut Vec<NodePath>,
) {
    if predicate(node) {
        found.push(path.clone());
    }
    for (i, child) in node.children.iter().enumerate() {
        collect_matches(child, &path.child(i), predicate, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fragment_round_trip() {
        let html = "<h1>Title</h1>\n<p>a &lt; b</p>\n";
        let page = Page::parse(html).unwrap();
        assert!(page.is_fragment());
        assert_eq!(page.to_html(), html);
    }

    #[test]
    fn test_document_round_trip_keeps_doctype() {
        let html = "<!DOCTYPE html>\n<html data-theme=\"light\"><body><p>x</p></body></html>";
        let page = Page::parse(html).unwrap();
        assert!(!page.is_fragment());
        assert_eq!(page.document_element().attr("data-theme"), Some("light"));
        assert_eq!(page.to_html(), html);
    }

    #[test]
    fn test_select_class_in_document_order() {
        let html = r#"<pre class="mermaid">a</pre><div><pre class="mermaid">b</pre></div><pre>c</pre>"#;
        let page = Page::parse(html).unwrap();
        let found = page.select_class("pre", "mermaid");
        assert_eq!(found.len(), 2);
        assert_eq!(page.node(&found[0]).unwrap().text, "a");
        assert_eq!(page.node(&found[1]).unwrap().text, "b");
    }

    #[test]
    fn test_replace_content_variants() {
        let mut page = Page::parse(r#"<pre class="mermaid">graph TD</pre>"#).unwrap();
        let path = page.select_class("pre", "mermaid").remove(0);

        assert!(page.replace_content(&path, Content::markup("<svg><g></g></svg>")));
        assert_eq!(page.node(&path).unwrap().children[0].tag, "svg");

        assert!(page.replace_content(&path, Content::Text("a < b".to_owned())));
        assert_eq!(page.to_html(), r#"<pre class="mermaid">a &lt; b</pre>"#);

        assert!(!page.replace_content(&NodePath::root().child(9), Content::Text(String::new())));
    }

    #[test]
    fn test_markup_that_does_not_parse_is_raw() {
        assert!(matches!(Content::markup("plain words"), Content::Raw(_)));
    }

    #[test]
    fn test_observe_attribute_changes() {
        let mut page = Page::parse("<p>x</p>").unwrap();
        let mut observer = page.observe(vec![NodePath::root()], "data-theme");

        page.set_attribute(&NodePath::root(), "data-theme", "dark");
        page.set_attribute(&NodePath::root(), "data-theme", "light");
        page.set_attribute(&NodePath::root(), "lang", "en");
        let body = page.body_path().unwrap();
        page.set_attribute(&body, "data-theme", "dark");

        let first = observer.try_recv().unwrap();
        assert_eq!(first.old_value, None);
        let second = observer.try_recv().unwrap();
        assert_eq!(second.old_value.as_deref(), Some("dark"));
        assert!(observer.try_recv().is_none());
    }

    #[test]
    fn test_remove_attribute_notifies_only_when_present() {
        let mut page = Page::parse("<p>x</p>").unwrap();
        let mut observer = page.observe(vec![NodePath::root()], "data-theme");

        assert_eq!(page.remove_attribute(&NodePath::root(), "data-theme"), None);
        assert!(observer.try_recv().is_none());

        page.set_attribute(&NodePath::root(), "data-theme", "dark");
        assert_eq!(
            page.remove_attribute(&NodePath::root(), "data-theme"),
            Some("dark".to_owned())
        );
        assert!(observer.try_recv().is_some());
        assert!(observer.try_recv().is_some());
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let mut page = Page::parse("<p>x</p>").unwrap();
        let observer = page.observe(vec![NodePath::root()], "data-theme");
        drop(observer);
        page.set_attribute(&NodePath::root(), "data-theme", "dark");
        assert!(page.observers.is_empty());
    }

    #[tokio::test]
    async fn test_observer_recv_is_async() {
        let mut page = Page::parse("<p>x</p>").unwrap();
        let mut observer = page.observe(vec![NodePath::root()], "data-theme");
        page.set_attribute(&NodePath::root(), "data-theme", "dark");
        let mutation = observer.recv().await.unwrap();
        assert_eq!(mutation.target, NodePath::root());
        assert_eq!(mutation.attribute, "data-theme");
    }
}
