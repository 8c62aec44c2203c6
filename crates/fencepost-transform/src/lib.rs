//! Build-time transform of fenced diagram blocks.
//!
//! [`DiagramTransformer`] visits a parsed page once and replaces every
//! `<pre><code class="language-mermaid">` block with a placeholder container:
//!
//! ```html
//! <pre class="mermaid" data-diagram="graph TD" data-diagram-id="1">graph TD</pre>
//! ```
//!
//! The container keeps the literal source as text and as an attribute, so the
//! runtime can always re-render from the original. With overlays enabled, a
//! zoom trigger and a hidden overlay follow each container.
//!
//! The transform never executes or validates diagram text. Blocks whose shape
//! deviates from a single `code` child are left as they are.

mod error;
mod markdown;
pub mod markup;
mod transformer;

pub use error::TransformError;
pub use markdown::{markdown_to_html, parser_options};
pub use transformer::{DEFAULT_LANGUAGE, DiagramTransformer, SkippedBlock, TransformReport};
