//! Presentation tree for fencepost.
//!
//! A [`Page`] owns the element tree of one rendered page. It is produced by
//! parsing the XHTML emitted by the markdown renderer (or a full document),
//! rewritten in place by the transformer and the runtime, and serialized back.
//!
//! Attribute changes made through [`Page::set_attribute`] and
//! [`Page::remove_attribute`] are delivered to [`AttributeObserver`]s, which is
//! how theme switches reach the diagram runtime.
//!
//! # Example
//!
//! ```
//! use fencepost_page::{NodePath, Page};
//!
//! let mut page = Page::parse("<p>Hello</p>").unwrap();
//! let mut observer = page.observe(vec![NodePath::root()], "data-theme");
//! page.set_attribute(&NodePath::root(), "data-theme", "dark");
//! assert!(observer.try_recv().is_some());
//! assert_eq!(page.to_html(), "<p>Hello</p>");
//! ```

mod error;
mod node;
mod page;
mod parser;
mod serializer;

pub use error::PageError;
pub use node::Node;
pub use page::{AttributeMutation, AttributeObserver, Content, NodePath, Page};
pub use parser::parse_fragment;
pub use serializer::{escape_attr, escape_text, to_html};
