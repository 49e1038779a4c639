//! Backend abstraction traits for the scheduler
//!
//! The scheduler decides what to draw and in which order; a
//! [`GraphicsBackend`] executes it. Backends receive fully resolved requests:
//! buffer ranges, matrices, colors and bound parameters. They never see queues.

use crate::foundation::math::{Color, Mat4};
use crate::render::geometry::{GeometryGroup, IndexFormat};
use crate::render::lighting::Light;
use crate::render::material::{
    MaterialId, MaterialParameter, MaterialPassId, MaterialState, ParameterDescriptor, ShaderProgramId, TextureId,
};
use crate::render::render_queue::RenderOperationFlags;
use crate::render::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Newly written range of one group's buffers
#[derive(Debug, Clone, Copy)]
pub struct BufferUpload<'a> {
    /// Group whose buffers are written
    pub group: GeometryGroup,
    /// Destination offset in the vertex buffer, in bytes
    pub vertex_byte_offset: usize,
    /// Vertex bytes to write
    pub vertex_bytes: &'a [u8],
    /// Destination offset in the index buffer, in bytes
    pub index_byte_offset: usize,
    /// Index bytes to write
    pub index_bytes: &'a [u8],
}

/// One resolved draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRequest {
    /// Material pass being drawn
    pub pass: MaterialPassId,
    /// Material of the pass
    pub material: MaterialId,
    /// Group whose buffers hold the geometry
    pub group: GeometryGroup,
    /// Width of the indices in the group's index buffer
    pub index_format: IndexFormat,
    /// First vertex of the geometry; indices are already rebased onto it
    pub vertex_offset: u32,
    /// First index to draw
    pub index_offset: u32,
    /// Number of indices to draw
    pub index_count: u32,
    /// World transform
    pub world: Mat4,
    /// World-view-projection transform
    pub world_view_projection: Mat4,
    /// Material diffuse color multiplied by the renderable tint
    pub color: Color,
    /// Texture bound as diffuse
    pub diffuse_texture: Option<TextureId>,
    /// Draw flags
    pub flags: RenderOperationFlags,
    /// Ambient light color
    pub ambient_color: Color,
    /// Light this draw is lit by, for lit draws
    pub light: Option<Light>,
    /// World-to-shadow-map transform, when the shadow map is bound
    pub world_light_view_projection: Option<Mat4>,
    /// Bound material parameters
    pub parameters: Vec<MaterialParameter>,
}

/// Shadow pass setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPassSetup {
    /// View-projection of the shadow camera
    pub light_view_projection: Mat4,
    /// Shadow map resolution
    pub map_size: u32,
}

/// One caster drawn into the shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCasterDraw {
    /// Group whose buffers hold the geometry
    pub group: GeometryGroup,
    /// Width of the indices in the group's index buffer
    pub index_format: IndexFormat,
    /// First index to draw
    pub index_offset: u32,
    /// Number of indices to draw
    pub index_count: u32,
    /// World-to-shadow-map transform
    pub world_light_view_projection: Mat4,
}

/// Graphics backend trait
///
/// Implemented by whatever executes draws. All calls happen on the render
/// thread during [`RenderSystem::render_frame`](crate::render::RenderSystem::render_frame)
/// or texture loading.
pub trait GraphicsBackend {
    /// Write a range of a group's vertex and index buffers
    fn upload_geometry(&mut self, upload: &BufferUpload<'_>) -> BackendResult<()>;

    /// Bind shader program, blending, depth and culling state
    fn bind_material_state(&mut self, state: &MaterialState) -> BackendResult<()>;

    /// Issue one indexed draw
    fn draw(&mut self, request: &DrawRequest) -> BackendResult<()>;

    /// Start rendering into the shadow map
    fn begin_shadow_pass(&mut self, setup: &ShadowPassSetup) -> BackendResult<()>;

    /// Draw one caster into the shadow map
    fn draw_shadow_caster(&mut self, draw: &ShadowCasterDraw) -> BackendResult<()>;

    /// Finish rendering into the shadow map
    fn end_shadow_pass(&mut self) -> BackendResult<()>;

    /// Create or replace a texture from RGBA8 pixels
    fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, rgba: &[u8]) -> BackendResult<()>;

    /// Recompile every shader program
    fn reload_shaders(&mut self) -> BackendResult<()>;

    /// Current parameter layout of a shader program
    fn parameter_layout(&self, program: ShaderProgramId) -> Vec<ParameterDescriptor>;
}
