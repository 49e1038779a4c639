//! # Render Scheduling
//!
//! Turns the renderables submitted during a frame into an ordered sequence of
//! backend draws.
//!
//! ## Architecture
//!
//! - **RenderSystem**: owns all per-frame state and drives `render_frame`
//! - **Submitter**: cloneable, thread-safe submission handle
//! - **GeometryBufferPool**: shared vertex/index arenas per geometry group
//! - **classifier**: guard clauses, geometry groups and destination queues
//! - **BatchAccumulator**: merges draws sharing a batchable material
//! - **FramePassScheduler**: drains the queues in pass order
//! - **GraphicsBackend**: executes draws; [`HeadlessBackend`] records them
//!
//! ## Frame Flow
//!
//! Scene code calls [`Submitter::submit`] for every active renderable, from
//! any number of threads. The render thread then calls
//! [`RenderSystem::render_frame`], which finalizes batches, uploads new
//! geometry, drains every queue and clears the frame for the next one.

pub mod backend;
pub mod batch_renderer;
pub mod buffer_pool;
pub mod camera;
pub mod canvas;
pub mod classifier;
pub mod frame_pass;
pub mod geometry;
pub mod headless;
pub mod lighting;
pub mod material;
pub mod preload;
pub mod render_queue;
pub mod render_system;
pub mod renderable;

#[cfg(test)]
mod tests;

pub use backend::{BackendResult, BufferUpload, DrawRequest, GraphicsBackend, ShadowCasterDraw, ShadowPassSetup};
pub use batch_renderer::{BatchAccumulator, BatchMark, BatchStats};
pub use buffer_pool::{BufferMark, GeometryBufferPool, GpuBufferPair};
pub use camera::{CameraState, SceneSettings};
pub use canvas::{CanvasSettings, CanvasSortFn, UiCanvasEntry};
pub use geometry::{GeometryData, GeometryGroup, GeometryKind, GeometryRenderInfo, IndexFormat};
pub use headless::{BackendCall, HeadlessBackend};
pub use lighting::{Light, LightList, LightType};
pub use material::{
    BlendingMode, CullingMode, DepthBufferMode, Material, MaterialFlags, MaterialId, MaterialPass, MaterialPassId,
    MaterialState, ParameterDescriptor, ParameterValue, ShaderProgramId, TextureId,
};
pub use preload::{DecodedTexture, TexturePreloadList};
pub use render_queue::{QueueDestination, RenderOperation, RenderOperationFlags, RenderQueue, SortKey};
pub use render_system::{FrameStats, RenderSystem, Submitter};
pub use renderable::{
    DynamicShadows, MeshSettings, RenderableDescriptor, RenderableId, RenderableKind, RenderingMode, SpriteLayer,
    UiElement,
};

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while scheduling or drawing a frame
///
/// Malformed submissions are not errors; they are dropped silently.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A fixed-capacity buffer cannot hold the requested data
    ///
    /// Raised by geometry buffer appends and batch accumulation. Nothing is
    /// written when this is returned.
    #[error("{resource} exhausted: requested {requested}, {available} available")]
    ResourceExhausted {
        /// Buffer that ran out of room
        resource: String,
        /// Elements requested
        requested: usize,
        /// Elements still free
        available: usize,
    },

    /// A rebased index does not fit the group's index width
    #[error("index {index} does not fit the index buffer of {group:?}")]
    IndexOverflow {
        /// Group being written
        group: GeometryGroup,
        /// Offending index value
        index: u32,
    },

    /// Material pass parameters copied between different layouts
    #[error("material pass {target_pass} cannot copy parameters from pass {source_pass}: layouts differ")]
    MaterialLayoutMismatch {
        /// Pass being copied from
        source_pass: u32,
        /// Pass being copied into
        target_pass: u32,
    },

    /// Texture bytes could not be decoded
    #[error("Texture decode failed: {0}")]
    TextureDecode(#[from] image::ImageError),

    /// Backend-specific error occurred
    ///
    /// Wraps failures reported by a [`GraphicsBackend`] implementation.
    #[error("Backend error: {0}")]
    Backend(String),
}
