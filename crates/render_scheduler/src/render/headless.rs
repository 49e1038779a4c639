//! Headless backend
//!
//! Executes nothing and records every call in order. Used to run the
//! scheduler without a graphics context and to inspect what it emitted.

use std::collections::HashMap;

use crate::render::backend::{
    BackendResult, BufferUpload, DrawRequest, GraphicsBackend, ShadowCasterDraw, ShadowPassSetup,
};
use crate::render::geometry::GeometryGroup;
use crate::render::material::{MaterialState, ParameterDescriptor, ShaderProgramId, TextureId};
use crate::render::RenderError;

/// Summary of one geometry upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRecord {
    /// Group whose buffers were written
    pub group: GeometryGroup,
    /// Destination offset in the vertex buffer, in bytes
    pub vertex_byte_offset: usize,
    /// Number of vertex bytes written
    pub vertex_bytes: usize,
    /// Destination offset in the index buffer, in bytes
    pub index_byte_offset: usize,
    /// Number of index bytes written
    pub index_bytes: usize,
}

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `upload_geometry`
    UploadGeometry(UploadRecord),
    /// `bind_material_state`
    BindMaterialState(MaterialState),
    /// `draw`
    Draw(DrawRequest),
    /// `begin_shadow_pass`
    BeginShadowPass(ShadowPassSetup),
    /// `draw_shadow_caster`
    DrawShadowCaster(ShadowCasterDraw),
    /// `end_shadow_pass`
    EndShadowPass,
    /// `upload_texture`
    UploadTexture {
        /// Texture written
        texture: TextureId,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// `reload_shaders`
    ReloadShaders,
}

/// Backend that records calls instead of executing them
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    calls: Vec<BackendCall>,
    layouts: HashMap<ShaderProgramId, Vec<ParameterDescriptor>>,
    fail_draws: bool,
}

impl HeadlessBackend {
    /// Create a backend with no recorded calls
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parameter layout reported for a shader program
    pub fn set_parameter_layout(&mut self, program: ShaderProgramId, layout: Vec<ParameterDescriptor>) {
        self.layouts.insert(program, layout);
    }

    /// Make every subsequent `draw` fail
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Recorded draws, in order
    pub fn draws(&self) -> Vec<&DrawRequest> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Recorded geometry uploads, in order
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::UploadGeometry(record) => Some(*record),
                _ => None,
            })
            .collect()
    }

    /// Recorded shadow caster draws, in order
    pub fn shadow_draws(&self) -> Vec<&ShadowCasterDraw> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::DrawShadowCaster(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Forget every recorded call
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn upload_geometry(&mut self, upload: &BufferUpload<'_>) -> BackendResult<()> {
        self.calls.push(BackendCall::UploadGeometry(UploadRecord {
            group: upload.group,
            vertex_byte_offset: upload.vertex_byte_offset,
            vertex_bytes: upload.vertex_bytes.len(),
            index_byte_offset: upload.index_byte_offset,
            index_bytes: upload.index_bytes.len(),
        }));
        Ok(())
    }

    fn bind_material_state(&mut self, state: &MaterialState) -> BackendResult<()> {
        self.calls.push(BackendCall::BindMaterialState(*state));
        Ok(())
    }

    fn draw(&mut self, request: &DrawRequest) -> BackendResult<()> {
        if self.fail_draws {
            return Err(RenderError::Backend("draw rejected by headless backend".to_string()));
        }
        self.calls.push(BackendCall::Draw(request.clone()));
        Ok(())
    }

    fn begin_shadow_pass(&mut self, setup: &ShadowPassSetup) -> BackendResult<()> {
        self.calls.push(BackendCall::BeginShadowPass(*setup));
        Ok(())
    }

    fn draw_shadow_caster(&mut self, draw: &ShadowCasterDraw) -> BackendResult<()> {
        self.calls.push(BackendCall::DrawShadowCaster(*draw));
        Ok(())
    }

    fn end_shadow_pass(&mut self) -> BackendResult<()> {
        self.calls.push(BackendCall::EndShadowPass);
        Ok(())
    }

    fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, _rgba: &[u8]) -> BackendResult<()> {
        self.calls.push(BackendCall::UploadTexture { texture, width, height });
        Ok(())
    }

    fn reload_shaders(&mut self) -> BackendResult<()> {
        self.calls.push(BackendCall::ReloadShaders);
        Ok(())
    }

    fn parameter_layout(&self, program: ShaderProgramId) -> Vec<ParameterDescriptor> {
        self.layouts.get(&program).cloned().unwrap_or_default()
    }
}
