/// Error returned by the document-level transform entry points.
///
/// Malformed diagram blocks are not errors; they are reported as
/// [`SkippedBlock`](crate::SkippedBlock)s.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The rendered markup could not be parsed into a tree.
    #[error("failed to parse document: {0}")]
    Page(#[from] fencepost_page::PageError),
}
