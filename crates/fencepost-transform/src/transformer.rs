//! Diagram block transformer.
//!
//! Walks a presentation tree and rewrites every fenced diagram block
//! (`<pre><code class="language-mermaid">`) into a placeholder container the
//! runtime can discover, optionally followed by a zoom trigger and a hidden
//! overlay.

use std::collections::BTreeMap;

use fencepost_page::{Node, Page, to_html};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::error::TransformError;
use crate::markdown::{fence_language, parser_options, render_events};
use crate::markup::{
    CLOSE_CLASS, CONTAINER_CLASS, CONTENT_CLASS, ID_ATTR, OVERLAY_CLASS, SOURCE_ATTR,
    TARGET_ATTR, TRIGGER_CLASS, language_class, overlay_id,
};

/// Default fence language tag.
pub const DEFAULT_LANGUAGE: &str = "mermaid";

/// A diagram-tagged block left untouched because of its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// Why the block does not match.
    pub reason: String,
}

/// Outcome of one transform pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Number of blocks rewritten into placeholder containers.
    pub transformed: usize,
    /// Diagram-tagged blocks left untouched.
    pub skipped: Vec<SkippedBlock>,
}

enum Candidate {
    Match,
    Malformed(String),
    Other,
}

/// Rewrites fenced diagram blocks into placeholder containers.
///
/// # Example
///
/// ```
/// use fencepost_transform::DiagramTransformer;
///
/// let transformer = DiagramTransformer::new().with_overlays(false);
/// let (html, report) = transformer
///     .transform_markdown("```mermaid\ngraph TD\n```\n", "index.md")
///     .unwrap();
/// assert_eq!(report.transformed, 1);
/// assert!(html.contains(r#"class="mermaid""#));
/// ```
#[derive(Debug, Clone)]
pub struct DiagramTransformer {
    language: String,
    overlays: bool,
    gfm: bool,
}

impl Default for DiagramTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramTransformer {
    /// Create a transformer for `mermaid` fences with overlays enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_owned(),
            overlays: true,
            gfm: true,
        }
    }

    /// Set the fence language tag that marks diagram blocks.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Enable or disable trigger and overlay markup.
    #[must_use]
    pub fn with_overlays(mut self, enabled: bool) -> Self {
        self.overlays = enabled;
        self
    }

    /// Enable or disable GitHub Flavored Markdown for markdown input.
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    /// Rewrite all diagram blocks of a page.
    ///
    /// Numbering starts at 1 on every call. `label` names the document in
    /// diagnostics.
    pub fn transform(&self, page: &mut Page, label: &str) -> TransformReport {
        self.transform_node(page.document_element_mut(), label)
    }

    /// Rewrite all diagram blocks below `root`.
    pub fn transform_node(&self, root: &mut Node, label: &str) -> TransformReport {
        let class = language_class(&self.language);
        let mut report = TransformReport::default();
        self.visit(root, &class, label, &mut report);

        if !report.skipped.is_empty() {
            tracing::debug!(
                skipped = report.skipped.len(),
                document = %label,
                "Left malformed diagram blocks untouched"
            );
        }
        tracing::info!(
            count = report.transformed,
            document = %label,
            "Transformed diagram blocks"
        );
        report
    }

    /// Parse markup, rewrite its diagram blocks and serialize it back.
    pub fn transform_html(
        &self,
        html: &str,
        label: &str,
    ) -> Result<(String, TransformReport), TransformError> {
        let mut page = Page::parse(html)?;
        let report = self.transform(&mut page, label);
        Ok((page.to_html(), report))
    }

    /// Render markdown with its diagram fences rewritten.
    ///
    /// Fences are matched on the markdown event stream, so raw HTML in the
    /// document is passed through unchanged and never parsed.
    pub fn transform_markdown(
        &self,
        markdown: &str,
        label: &str,
    ) -> Result<(String, TransformReport), TransformError> {
        let mut report = TransformReport::default();
        let mut fence: Option<String> = None;
        let mut events = Vec::new();

        for event in Parser::new_ext(markdown, parser_options(self.gfm)) {
            if let Some(source) = fence.as_mut() {
                match event {
                    Event::Text(text) => source.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let source = std::mem::take(source);
                        fence = None;
                        report.transformed += 1;
                        let index = report.transformed;
                        tracing::info!(index, document = %label, "Transformed diagram block");

                        let mut markup: String = self
                            .placeholder(BTreeMap::new(), source, index)
                            .iter()
                            .map(to_html)
                            .collect();
                        markup.push('\n');
                        events.push(Event::Html(markup.into()));
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if fence_language(&info) == self.language =>
                {
                    fence = Some(String::new());
                }
                other => events.push(other),
            }
        }

        tracing::info!(
            count = report.transformed,
            document = %label,
            "Transformed diagram blocks"
        );
        Ok((render_events(events.into_iter(), markdown.len()), report))
    }

    fn visit(&self, node: &mut Node, class: &str, label: &str, report: &mut TransformReport) {
        let children = std::mem::take(&mut node.children);
        let mut rewritten = Vec::with_capacity(children.len());

        for mut child in children {
            match classify(&child, class) {
                Candidate::Match => {
                    report.transformed += 1;
                    let index = report.transformed;
                    tracing::info!(index, document = %label, "Transformed diagram block");
                    rewritten.extend(self.rewrite(child, index));
                }
                Candidate::Malformed(reason) => {
                    tracing::debug!(document = %label, %reason, "Skipping diagram block");
                    report.skipped.push(SkippedBlock { reason });
                    rewritten.push(child);
                }
                Candidate::Other => {
                    self.visit(&mut child, class, label, report);
                    rewritten.push(child);
                }
            }
        }

        node.children = rewritten;
    }

    fn rewrite(&self, pre: Node, index: usize) -> Vec<Node> {
        let source = pre
            .children
            .first()
            .map(Node::text_content)
            .unwrap_or_default();

        let mut nodes = self.placeholder(pre.attrs, source, index);
        if let Some(last) = nodes.last_mut() {
            last.tail = pre.tail;
        }
        nodes
    }

    /// Container for `source`, plus trigger and overlay when enabled.
    ///
    /// `attrs` are the original block's attributes; only `class` is replaced.
    fn placeholder(
        &self,
        mut attrs: BTreeMap<String, String>,
        source: String,
        index: usize,
    ) -> Vec<Node> {
        attrs.insert("class".to_owned(), CONTAINER_CLASS.to_owned());
        attrs.insert(SOURCE_ATTR.to_owned(), source.clone());
        attrs.insert(ID_ATTR.to_owned(), index.to_string());
        let mut container = Node::new("pre").with_text(source);
        container.attrs = attrs;

        if !self.overlays {
            return vec![container];
        }

        let key = overlay_id(index);
        let trigger = Node::new("button")
            .with_attr("type", "button")
            .with_attr("class", TRIGGER_CLASS)
            .with_attr("aria-label", "Click to zoom diagram")
            .with_attr(TARGET_ATTR, key.clone())
            .with_text("Zoom");
        let close = Node::new("button")
            .with_attr("type", "button")
            .with_attr("class", CLOSE_CLASS)
            .with_attr("aria-label", "Close zoom view")
            .with_text("\u{00d7}");
        let content = Node::new("div").with_attr("class", CONTENT_CLASS);
        let overlay = Node::new("div")
            .with_attr("class", OVERLAY_CLASS)
            .with_attr("id", key)
            .with_attr("hidden", "hidden")
            .with_attr("role", "dialog")
            .with_attr("aria-modal", "true")
            .with_children(vec![close, content]);

        vec![container, trigger, overlay]
    }
}

fn classify(node: &Node, class: &str) -> Candidate {
    if node.tag != "pre" {
        return Candidate::Other;
    }
    let tagged = node
        .children
        .iter()
        .filter(|c| c.tag == "code" && c.has_class(class))
        .count();
    if tagged == 0 {
        return Candidate::Other;
    }
    if node.children.len() != 1 {
        return Candidate::Malformed(format!(
            "expected a single code child, found {} children",
            node.children.len()
        ));
    }
    if !node.text.is_empty() || !node.children[0].tail.is_empty() {
        return Candidate::Malformed("text beside the code element".to_owned());
    }
    Candidate::Match
}

#[cfg(test)]
mod tests {
    use super::*;
    use fencepost_page::parse_fragment;
    use pretty_assertions::assert_eq;

    fn containers(html: &str) -> Vec<Node> {
        let page = Page::parse(html).unwrap();
        page.select_class("pre", CONTAINER_CLASS)
            .iter()
            .filter_map(|p| page.node(p).cloned())
            .collect()
    }

    #[test]
    fn test_n_blocks_give_n_containers() {
        let markdown = "# Title\n\n```mermaid\ngraph TD\n```\n\ntext\n\n```rust\nfn main() {}\n```\n\n- item\n\n  ```mermaid\n  pie\n  ```\n\n```mermaid\nsequenceDiagram\n```\n";
        let (html, report) = DiagramTransformer::new()
            .transform_markdown(markdown, "doc.md")
            .unwrap();

        assert_eq!(report.transformed, 3);
        let found = containers(&html);
        assert_eq!(found.len(), 3);
        let ids: Vec<_> = found.iter().filter_map(|n| n.attr(ID_ATTR)).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_source_round_trips_through_escaping() {
        let source = "graph TD\n  A[\"<b>bold</b>\"] --> B{'x' & y}\n";
        let markdown = format!("```mermaid\n{source}```\n");
        let (html, _) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_markdown(&markdown, "doc.md")
            .unwrap();

        assert!(!html.contains("<b>"));
        let found = containers(&html);
        assert_eq!(found[0].attr(SOURCE_ATTR), Some(source));
        assert_eq!(found[0].text_content(), source);
    }

    #[test]
    fn test_container_markup_without_overlays() {
        let (html, _) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_html(
                "<pre><code class=\"language-mermaid\">a --&gt; b</code></pre>\n",
                "doc",
            )
            .unwrap();
        assert_eq!(
            html,
            "<pre class=\"mermaid\" data-diagram=\"a --&gt; b\" data-diagram-id=\"1\">a --&gt; b</pre>\n"
        );
    }

    #[test]
    fn test_overlay_markup_pairs_trigger_and_overlay() {
        let (html, _) = DiagramTransformer::new()
            .transform_html("<pre><code class=\"language-mermaid\">pie</code></pre>", "doc")
            .unwrap();
        let (_, nodes) = parse_fragment(&html).unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].attr("class"), Some(TRIGGER_CLASS));
        assert_eq!(nodes[1].attr(TARGET_ATTR), Some("mermaid-zoom-1"));
        let overlay = &nodes[2];
        assert_eq!(overlay.attr("id"), Some("mermaid-zoom-1"));
        assert!(overlay.has_attr("hidden"));
        assert!(overlay.children[0].has_class(CLOSE_CLASS));
        assert!(overlay.children[1].has_class(CONTENT_CLASS));
        assert!(overlay.children[1].is_empty());
        assert!(html.contains("<div class=\"mermaid-zoom-content\"></div>"));
    }

    #[test]
    fn test_tail_moves_after_last_emitted_element() {
        let (html, _) = DiagramTransformer::new()
            .transform_html(
                "<div><pre><code class=\"language-mermaid\">pie</code></pre>after</div>",
                "doc",
            )
            .unwrap();
        assert!(html.ends_with("</div>after</div>"));
    }

    #[test]
    fn test_transform_is_idempotent_on_output() {
        let transformer = DiagramTransformer::new();
        let (once, first) = transformer
            .transform_markdown("```mermaid\ngraph TD\n```\n\n```mermaid\npie\n```\n", "doc")
            .unwrap();
        let (twice, second) = transformer.transform_html(&once, "doc").unwrap();

        assert_eq!(first.transformed, 2);
        assert_eq!(second.transformed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_malformed_block_left_untouched() {
        let html = "<pre><code class=\"language-mermaid\">a</code><code>b</code></pre><pre>x<code class=\"language-mermaid\">c</code></pre>";
        let (out, report) = DiagramTransformer::new().transform_html(html, "doc").unwrap();

        assert_eq!(report.transformed, 0);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(out, html);
    }

    #[test]
    fn test_existing_pre_attributes_are_kept() {
        let (html, report) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_html(
                "<pre id=\"fig\" class=\"highlight\" data-x=\"1\"><code class=\"language-mermaid\">pie</code></pre>",
                "doc",
            )
            .unwrap();
        assert_eq!(report.transformed, 1);
        assert_eq!(
            html,
            "<pre class=\"mermaid\" data-diagram=\"pie\" data-diagram-id=\"1\" data-x=\"1\" id=\"fig\">pie</pre>"
        );
    }

    #[test]
    fn test_markdown_raw_html_passes_through() {
        let markdown = "<div>Tom & Jerry</div>\n\n```mermaid\ngraph TD\n```\n\n<div>\n1 < 2\n</div>\n\n<div class=note data-x=1>Q&A</div>\n\nInline <span title=a&b>x</span> & more.\n";
        let (html, report) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_markdown(markdown, "doc.md")
            .unwrap();

        assert_eq!(report.transformed, 1);
        assert!(html.starts_with("<div>Tom & Jerry</div>\n"));
        assert!(html.contains(
            "<pre class=\"mermaid\" data-diagram=\"graph TD\n\" data-diagram-id=\"1\">graph TD\n</pre>\n"
        ));
        assert!(html.contains("<div>\n1 < 2\n</div>\n"));
        assert!(html.contains("<div class=note data-x=1>Q&A</div>\n"));
        assert!(html.contains("<span title=a&b>x</span> &amp; more."));
    }

    #[test]
    fn test_markdown_fence_with_info_attributes() {
        let markdown = "```mermaid title=\"Flow\"\npie\n```\n\n```mermaidx\nA\n```\n\n    indented\n";
        let (html, report) = DiagramTransformer::new()
            .transform_markdown(markdown, "doc.md")
            .unwrap();

        assert_eq!(report.transformed, 1);
        assert_eq!(containers(&html)[0].attr(SOURCE_ATTR), Some("pie\n"));
        assert!(html.contains("<code class=\"language-mermaidx\">"));
        assert!(html.contains("<pre><code>indented\n</code></pre>"));
    }

    #[test]
    fn test_html_with_bare_ampersand_and_angle() {
        let html = "<div>Tom & Jerry</div>\n<div>\n1 < 2\n</div>\n<pre><code class=\"language-mermaid\">pie</code></pre>\n";
        let (out, report) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_html(html, "doc")
            .unwrap();

        assert_eq!(report.transformed, 1);
        assert_eq!(
            out,
            "<div>Tom &amp; Jerry</div>\n<div>\n1 &lt; 2\n</div>\n<pre class=\"mermaid\" data-diagram=\"pie\" data-diagram-id=\"1\">pie</pre>\n"
        );
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let (out, report) = DiagramTransformer::new()
            .transform_markdown("Just *text*.\n", "doc")
            .unwrap();
        assert_eq!(report, TransformReport::default());
        assert_eq!(out, "<p>Just <em>text</em>.</p>\n");
    }

    #[test]
    fn test_custom_language() {
        let (_, report) = DiagramTransformer::new()
            .with_language("graph")
            .transform_markdown("```graph\nA\n```\n\n```mermaid\nB\n```\n", "doc")
            .unwrap();
        assert_eq!(report.transformed, 1);
    }

    #[test]
    fn test_full_document_keeps_head() {
        let html = "<!DOCTYPE html>\n<html><head><title>T</title></head><body><pre><code class=\"language-mermaid\">pie</code></pre></body></html>";
        let (out, report) = DiagramTransformer::new()
            .with_overlays(false)
            .transform_html(html, "doc")
            .unwrap();
        assert_eq!(report.transformed, 1);
        assert!(out.starts_with("<!DOCTYPE html>\n<html><head><title>T</title></head>"));
    }
}
