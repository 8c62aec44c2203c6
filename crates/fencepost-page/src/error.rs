//! Presentation tree errors.

/// Error while parsing markup into a presentation tree.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Encoding error during XML parsing.
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}
