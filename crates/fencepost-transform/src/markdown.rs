//! Markdown front end.

use pulldown_cmark::{Event, Options, Parser, html};

/// Parser options for markdown input.
///
/// GFM tables, strikethrough and task lists are enabled when `gfm` is set.
#[must_use]
pub fn parser_options(gfm: bool) -> Options {
    if gfm {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_GFM
    } else {
        Options::empty()
    }
}

/// Render markdown to XHTML.
///
/// Fenced blocks become `<pre><code class="language-<tag>">`.
#[must_use]
pub fn markdown_to_html(markdown: &str, gfm: bool) -> String {
    render_events(Parser::new_ext(markdown, parser_options(gfm)), markdown.len())
}

/// Render a markdown event stream. Raw HTML events are emitted unchanged.
pub(crate) fn render_events<'a>(
    events: impl Iterator<Item = Event<'a>>,
    source_len: usize,
) -> String {
    let mut out = String::with_capacity(source_len * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Language tag of a fence info string (`mermaid title="x"` gives `mermaid`).
pub(crate) fn fence_language(info: &str) -> &str {
    info.split_whitespace().next().unwrap_or_default()
}
