//! CLI command implementations.

pub(crate) mod render;
pub(crate) mod transform;

pub(crate) use render::RenderArgs;
pub(crate) use transform::TransformArgs;
