//! Deferred shading resources

pub mod render_targets;

pub use render_targets::{GBufferAttachment, GBufferWriter, RenderTargetDescriptor, RenderTargetSet};
