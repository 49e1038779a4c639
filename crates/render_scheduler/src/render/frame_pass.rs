//! # Frame Pass Scheduler
//!
//! Drains the frame's queues into the backend in a fixed order:
//!
//! 1. pre-3D sprites and labels
//! 2. shadow pass, opaque meshes, 3D labels, then canvases and the
//!    transparent list (only when there is 3D content)
//! 3. 2D UI, post-UI overlay and, in editor builds, debug geometry
//!
//! Every operation binds its material state right before its draw.

use crate::foundation::logging::{trace, warn};
use crate::foundation::math::{Color, Mat4, Mat4Ext};
use crate::render::backend::{DrawRequest, GraphicsBackend, ShadowCasterDraw, ShadowPassSetup};
use crate::render::camera::{CameraState, SceneSettings};
use crate::render::canvas::{CanvasEntries, CanvasSortFn};
use crate::render::lighting::{Light, LightList};
use crate::render::material::MaterialFlags;
use crate::render::render_queue::{sort_back_to_front, FrameQueues, RenderOperation, RenderOperationFlags, RenderQueue};
use crate::render::RenderResult;

/// Draw-call counters of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Draws issued to the backend
    pub draw_calls: usize,
    /// Shadow caster draws issued to the backend
    pub shadow_draw_calls: usize,
    /// Whether the shadow pass ran
    pub shadow_pass: bool,
}

/// Everything the drain reads besides the queues
pub struct FrameContext<'a> {
    /// Camera 3D content is rendered through
    pub camera: Option<&'a CameraState>,
    /// Settings of the active scene
    pub scene: Option<&'a SceneSettings>,
    /// Lights queued this frame
    pub lights: &'a LightList,
    /// Canvas slot state
    pub canvases: &'a CanvasEntries,
    /// Caller-supplied canvas ordering
    pub canvas_sort: Option<&'a CanvasSortFn>,
    /// Ambient light color
    pub ambient_color: Color,
    /// Aspect ratio of the 2D projection
    pub aspect_ratio: f32,
    /// Shadow map resolution
    pub shadow_map_size: u32,
}

/// Drains one frame's queues into a backend
pub struct FramePassScheduler<'a> {
    backend: &'a mut dyn GraphicsBackend,
    context: FrameContext<'a>,
    screen_projection: Mat4,
    light_view_projection: Option<Mat4>,
    missing_camera_reported: bool,
    stats: PassStats,
}

impl<'a> FramePassScheduler<'a> {
    /// Create a scheduler for one frame
    pub fn new(backend: &'a mut dyn GraphicsBackend, context: FrameContext<'a>) -> Self {
        let screen_projection = Mat4::screen_space(context.aspect_ratio);
        Self {
            backend,
            context,
            screen_projection,
            light_view_projection: None,
            missing_camera_reported: false,
            stats: PassStats::default(),
        }
    }

    /// Drain every queue in pass order
    ///
    /// Queues are left empty except the transparent list and canvas queues
    /// when there is no camera; those are dropped by the per-frame clear.
    pub fn run(mut self, queues: &mut FrameQueues) -> RenderResult<PassStats> {
        self.drain_queue(&mut queues.pre_3d)?;

        if queues.has_3d_content() {
            self.shadow_pass(queues)?;
            self.drain_queue(&mut queues.opaque)?;
            self.drain_queue(&mut queues.labels_3d)?;

            if let Some(camera) = self.context.camera {
                let sorted = self.context.canvases.sorted(&camera.position, self.context.canvas_sort);

                for entry in sorted.iter().filter(|entry| entry.renders_before_transparent()) {
                    self.drain_queue(&mut queues.canvases[entry.index])?;
                }

                sort_back_to_front(&mut queues.transparent, &camera.position);
                for operation in queues.transparent.drain(..) {
                    self.draw_operation(&operation)?;
                }

                for entry in sorted.iter().filter(|entry| !entry.renders_before_transparent()) {
                    self.drain_queue(&mut queues.canvases[entry.index])?;
                }
            }
        }

        self.drain_queue(&mut queues.ui_2d)?;
        self.drain_queue(&mut queues.post_ui)?;

        #[cfg(feature = "editor")]
        self.drain_queue(&mut queues.debug)?;

        Ok(self.stats)
    }

    fn shadow_pass(&mut self, queues: &FrameQueues) -> RenderResult<()> {
        if !queues.has_shadow_casters() {
            return Ok(());
        }
        let (Some(light), Some(scene)) = (self.context.lights.shadow_light(), self.context.scene) else {
            trace!("Shadow casters queued without a directional light or scene settings");
            return Ok(());
        };

        let light_view_projection = light.shadow_view_projection(scene.max_shadow_distance);
        self.backend.begin_shadow_pass(&ShadowPassSetup {
            light_view_projection,
            map_size: self.context.shadow_map_size,
        })?;

        for caster in queues.shadow_casters.iter().chain(&queues.shadowed_particles) {
            self.backend.draw_shadow_caster(&ShadowCasterDraw {
                group: caster.group,
                index_format: caster.group.index_format(),
                index_offset: caster.render_info.index_offset,
                index_count: caster.index_count,
                world_light_view_projection: light_view_projection * caster.world_transform,
            })?;
            self.stats.shadow_draw_calls += 1;
        }

        self.backend.end_shadow_pass()?;
        self.light_view_projection = Some(light_view_projection);
        self.stats.shadow_pass = true;
        Ok(())
    }

    fn drain_queue(&mut self, queue: &mut RenderQueue) -> RenderResult<()> {
        while let Some(operation) = queue.pop() {
            self.draw_operation(&operation)?;
        }
        Ok(())
    }

    fn view_projection(&mut self, operation: &RenderOperation) -> Mat4 {
        if !operation.flags.contains(RenderOperationFlags::RENDER_THROUGH_ACTIVE_CAMERA) {
            return self.screen_projection;
        }
        match self.context.camera {
            Some(camera) => camera.view_projection(),
            None => {
                if !self.missing_camera_reported {
                    warn!("3D geometry drawn without an active camera; using identity view-projection");
                    self.missing_camera_reported = true;
                }
                Mat4::identity()
            }
        }
    }

    fn draw_operation(&mut self, operation: &RenderOperation) -> RenderResult<()> {
        let material = operation.pass.material();
        self.backend.bind_material_state(&material.state())?;

        let view_projection = self.view_projection(operation);
        let world_light_view_projection = if operation.flags.contains(RenderOperationFlags::BIND_SHADOW_MAP) {
            self.light_view_projection.map(|light_vp| light_vp * operation.world_transform)
        } else {
            None
        };

        let mut request = DrawRequest {
            pass: operation.pass.id(),
            material: material.id,
            group: operation.group,
            index_format: operation.group.index_format(),
            vertex_offset: operation.render_info.vertex_offset,
            index_offset: operation.render_info.index_offset,
            index_count: operation.index_count,
            world: operation.world_transform,
            world_view_projection: view_projection * operation.world_transform,
            color: material.diffuse_color.modulate(&operation.color),
            diffuse_texture: operation.diffuse_texture,
            flags: operation.flags,
            ambient_color: self.context.ambient_color,
            light: None,
            world_light_view_projection,
            parameters: operation.pass.parameters(),
        };

        let light_list = self.context.lights;
        let lights = lights_for_draw(operation.flags, material.flags, light_list.as_slice());
        if lights.is_empty() {
            return self.issue(&request);
        }
        for light in lights {
            request.light = Some(light.clone());
            self.issue(&request)?;
        }
        Ok(())
    }

    fn issue(&mut self, request: &DrawRequest) -> RenderResult<()> {
        self.backend.draw(request)?;
        self.stats.draw_calls += 1;
        Ok(())
    }
}

// lit draws use the first light, or every light when the material asks for it
fn lights_for_draw(flags: RenderOperationFlags, material_flags: MaterialFlags, lights: &[Light]) -> &[Light] {
    if !flags.contains(RenderOperationFlags::LIGHTING_SUPPORT) || lights.is_empty() {
        &[]
    } else if material_flags.contains(MaterialFlags::RENDER_ONCE_PER_LIGHT) {
        lights
    } else {
        &lights[..1]
    }
}
