//! Placeholder markup shared by the transformer and the runtime.

/// Marker class of placeholder containers.
pub const CONTAINER_CLASS: &str = "mermaid";

/// Attribute holding the original diagram source.
pub const SOURCE_ATTR: &str = "data-diagram";

/// Attribute holding the per-document sequence number.
pub const ID_ATTR: &str = "data-diagram-id";

/// Attribute set once a container was rendered or errored.
pub const PROCESSED_ATTR: &str = "data-processed";

/// Class of the element replacing the visual when rendering fails.
pub const ERROR_CLASS: &str = "mermaid-error";

/// Class of the button opening the viewer.
pub const TRIGGER_CLASS: &str = "mermaid-zoom-trigger";

/// Attribute on the trigger naming the overlay it opens.
pub const TARGET_ATTR: &str = "data-zoom-target";

/// Class of the overlay surface.
pub const OVERLAY_CLASS: &str = "mermaid-zoom-overlay";

/// Class of the overlay's close control.
pub const CLOSE_CLASS: &str = "mermaid-zoom-close";

/// Class of the overlay's content slot.
pub const CONTENT_CLASS: &str = "mermaid-zoom-content";

/// Identity key pairing a trigger with its overlay.
#[must_use]
pub fn overlay_id(index: usize) -> String {
    format!("mermaid-zoom-{index}")
}

/// Class carried by `code` elements of fenced blocks in `language`.
#[must_use]
pub fn language_class(language: &str) -> String {
    format!("language-{language}")
}
