//! # Render System
//!
//! The explicit context handle owning every piece of per-frame state.
//!
//! ## Threading
//!
//! - Submission goes through [`Submitter`] handles, which are `Clone + Send +
//!   Sync`. Every mutation of queues, batches and geometry caches happens
//!   under one coarse mutex.
//! - [`RenderSystem::render_frame`] runs on the thread owning the backend and
//!   needs `&mut RenderSystem`, so it can never overlap itself.
//! - The active camera and ambient color are read-mostly and sit behind
//!   reader-writer locks.
//! - Texture preloading has its own lock, independent of submission.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::{ConfigError, RenderSystemConfig};
use crate::foundation::logging::{debug, info, trace, warn};
use crate::foundation::math::{Color, Vec3};
use crate::foundation::time::{FrameTimer, Stopwatch};
use crate::render::backend::GraphicsBackend;
use crate::render::batch_renderer::{BatchAccumulator, BatchMark};
use crate::render::buffer_pool::{BufferMark, GeometryBufferPool};
use crate::render::camera::{CameraState, SceneSettings};
use crate::render::canvas::{CanvasEntries, CanvasSettings, CanvasSortFn};
use crate::render::classifier::{self, Classification, Rejection};
use crate::render::frame_pass::{FrameContext, FramePassScheduler};
use crate::render::geometry::{GeometryGroup, GeometryKind, GeometryRenderInfo};
use crate::render::lighting::{Light, LightList};
use crate::render::material::{MaterialId, MaterialPass, MaterialPassId, TextureId};
use crate::render::preload::TexturePreloadList;
use crate::render::render_queue::{FrameQueues, GeometryKey, RenderOperation, SortKey};
use crate::render::renderable::{RenderableDescriptor, RenderableId, RenderableKind};
use crate::render::RenderResult;

/// What the last rendered frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draws issued to the backend
    pub draw_calls: usize,
    /// Shadow caster draws issued to the backend
    pub shadow_draw_calls: usize,
    /// Whether the shadow pass ran
    pub shadow_pass: bool,
    /// Batches drawn
    pub batches: usize,
    /// Renderables merged into those batches
    pub batched_renderables: usize,
    /// Geometry groups uploaded to the backend
    pub geometry_uploads: usize,
    /// Time spent in `render_frame`
    pub frame_time: Duration,
}

/// What a submission changed before it finished
#[derive(Default)]
struct SubmitUndo {
    batches: Vec<BatchMark>,
    appended: Vec<(GeometryGroup, BufferMark)>,
    forced_dynamic: bool,
}

struct FrameState {
    queues: FrameQueues,
    lights: LightList,
    canvases: CanvasEntries,
    canvas_sort: Option<CanvasSortFn>,
    batches: BatchAccumulator,
    buffers: GeometryBufferPool,
    static_geometry: HashMap<RenderableId, GeometryRenderInfo>,
    dynamic_geometry: HashMap<RenderableId, GeometryRenderInfo>,
    forced_dynamic: HashSet<RenderableId>,
    material_passes: HashMap<MaterialPassId, Weak<MaterialPass>>,
}

impl FrameState {
    fn new(config: &RenderSystemConfig) -> Self {
        Self {
            queues: FrameQueues::new(config.ui_canvas_count),
            lights: LightList::new(),
            canvases: CanvasEntries::new(config.ui_canvas_count),
            canvas_sort: None,
            batches: BatchAccumulator::new(config),
            buffers: GeometryBufferPool::new(config),
            static_geometry: HashMap::new(),
            dynamic_geometry: HashMap::new(),
            forced_dynamic: HashSet::new(),
            material_passes: HashMap::new(),
        }
    }

    fn track_pass(&mut self, pass: &Arc<MaterialPass>) {
        self.material_passes
            .entry(pass.id())
            .or_insert_with(|| Arc::downgrade(pass));
    }

    fn submit(&mut self, renderable: &RenderableDescriptor, submission_index: u32) -> RenderResult<()> {
        let mut undo = SubmitUndo::default();
        let mut staged = Vec::new();
        if let Err(err) = self.stage(renderable, submission_index, &mut undo, &mut staged) {
            self.undo(renderable.id, undo);
            return Err(err);
        }

        for (classification, operation) in staged {
            if classification.casts_shadow {
                self.queues.push_shadow_caster(operation.clone());
            }
            if classification.shadowed_particles {
                self.queues.shadowed_particles.push(operation.clone());
            }
            trace!(
                "Queued {} {:?} pass {} into {:?}",
                renderable.kind.name(),
                renderable.id,
                operation.key.pass_index(),
                classification.destination
            );
            self.queues.push(classification.destination, operation);
        }
        Ok(())
    }

    // standalone operations are only collected here; nothing reaches the
    // queues until every pass of the renderable fits
    fn stage(
        &mut self,
        renderable: &RenderableDescriptor,
        submission_index: u32,
        undo: &mut SubmitUndo,
        staged: &mut Vec<(Classification, RenderOperation)>,
    ) -> RenderResult<()> {
        for (pass_index, pass) in renderable.material_passes.iter().enumerate() {
            if !pass.is_active() {
                continue;
            }
            self.track_pass(pass);
            let key = SortKey::new(renderable.render_priority, submission_index, pass_index);

            match classifier::batch_group(&renderable.kind) {
                Some(group) if pass.material().is_batchable() => {
                    undo.batches.push(self.batches.mark(pass.material().id, group));
                    self.batches.accumulate(renderable, pass, group, key)?;
                    if self.forced_dynamic.insert(renderable.id) {
                        undo.forced_dynamic = true;
                    }
                }
                _ => staged.push(self.standalone_operation(renderable, pass, key, undo)?),
            }
        }
        Ok(())
    }

    fn undo(&mut self, id: RenderableId, undo: SubmitUndo) {
        for mark in undo.batches.into_iter().rev() {
            self.batches.rollback(mark);
        }
        for (group, mark) in undo.appended.into_iter().rev() {
            self.buffers.rollback(mark);
            if group.is_static() {
                self.static_geometry.remove(&id);
            } else {
                self.dynamic_geometry.remove(&id);
            }
        }
        if undo.forced_dynamic {
            self.forced_dynamic.remove(&id);
        }
        debug!("Submission of {:?} rolled back", id);
    }

    fn standalone_operation(
        &mut self,
        renderable: &RenderableDescriptor,
        pass: &Arc<MaterialPass>,
        key: SortKey,
        undo: &mut SubmitUndo,
    ) -> RenderResult<(Classification, RenderOperation)> {
        let geometry_kind = if self.forced_dynamic.contains(&renderable.id) {
            GeometryKind::Dynamic
        } else {
            renderable.geometry_kind
        };
        let classification = classifier::classify(renderable, geometry_kind);
        let render_info = self.register_geometry(renderable, classification.group, undo)?;

        let color = match renderable.ui_element {
            Some(element) => renderable.color.with_alpha_scaled(element.alpha_in_hierarchy()),
            None => renderable.color,
        };
        let diffuse_texture = match renderable.kind {
            RenderableKind::Label { font_texture: Some(font), .. } => Some(font),
            _ => pass.material().diffuse_texture,
        };

        let operation = RenderOperation {
            key,
            geometry_key: GeometryKey::Renderable(renderable.id),
            pass: Arc::clone(pass),
            group: classification.group,
            render_info,
            index_count: u32::try_from(renderable.geometry.index_count()).unwrap_or(u32::MAX),
            world_transform: renderable.world_transform,
            color,
            diffuse_texture,
            flags: classification.flags,
            batch_geometry: None,
        };
        Ok((classification, operation))
    }

    // static geometry is appended once per scene lifetime, dynamic once per frame
    fn register_geometry(
        &mut self,
        renderable: &RenderableDescriptor,
        group: GeometryGroup,
        undo: &mut SubmitUndo,
    ) -> RenderResult<GeometryRenderInfo> {
        let cache = if group.is_static() {
            &mut self.static_geometry
        } else {
            &mut self.dynamic_geometry
        };
        if let Some(info) = cache.get(&renderable.id) {
            return Ok(*info);
        }
        let mark = self.buffers.mark(group);
        let info = self.buffers.append(group, &renderable.geometry)?;
        cache.insert(renderable.id, info);
        undo.appended.push((group, mark));
        Ok(info)
    }

    fn invalidate_geometry(&mut self) {
        self.static_geometry.clear();
        self.dynamic_geometry.clear();
        self.forced_dynamic.clear();
        self.buffers.reset_all();
        info!("Geometry render info invalidated");
    }

    fn rebuild_material_passes(&mut self, backend: &dyn GraphicsBackend) -> usize {
        self.material_passes.retain(|_, pass| pass.strong_count() > 0);
        let mut rebuilt = 0;
        for pass in self.material_passes.values().filter_map(Weak::upgrade) {
            pass.rebuild_bindings(&backend.parameter_layout(pass.material().program));
            rebuilt += 1;
        }
        rebuilt
    }

    fn clear(&mut self) {
        self.queues.clear();
        self.lights.clear();
        self.canvases.reset();
        self.batches.clear();
        self.dynamic_geometry.clear();
        self.buffers.reset_dynamic();
        self.material_passes.retain(|_, pass| pass.strong_count() > 0);
    }
}

struct Shared {
    config: RenderSystemConfig,
    frame: Mutex<FrameState>,
    camera: RwLock<Option<CameraState>>,
    ambient_color: RwLock<Color>,
    clear_geometry_pending: AtomicBool,
    shader_reload_pending: AtomicBool,
    textures: TexturePreloadList,
}

/// Thread-safe submission handle
///
/// Cheap to clone; every clone talks to the same [`RenderSystem`].
#[derive(Clone)]
pub struct Submitter {
    shared: Arc<Shared>,
}

impl Submitter {
    /// Queue a renderable for this frame
    ///
    /// `submission_index` is the renderable's position in the scene's
    /// iteration order; it breaks ties between equal priorities. Invisible,
    /// inactive, empty or fully transparent renderables are dropped without
    /// error, as is 3D content while no camera is active.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ResourceExhausted`](crate::render::RenderError::ResourceExhausted)
    /// when a geometry buffer or batch is full. A failed submit is all or
    /// nothing: geometry appended and batch contributions merged by the
    /// renderable's earlier passes are rolled back, and none of its
    /// operations are queued.
    ///
    /// # Panics
    ///
    /// Panics when the renderable sits on a canvas slot past the configured
    /// canvas count.
    pub fn submit(&self, renderable: &RenderableDescriptor, submission_index: u32) -> RenderResult<()> {
        let has_camera = self.shared.camera.read().is_some();
        match classifier::rejection(renderable, has_camera) {
            None => {}
            Some(Rejection::NoActiveCamera) => {
                warn!(
                    "There is no active camera; {} {:?} is not rendered",
                    renderable.kind.name(),
                    renderable.id
                );
                return Ok(());
            }
            Some(reason) => {
                trace!("Skipped {:?}: {:?}", renderable.id, reason);
                return Ok(());
            }
        }
        self.shared.frame.lock().submit(renderable, submission_index)
    }

    /// Queue a light for this frame; inactive lights are ignored
    pub fn submit_light(&self, light: Light) {
        self.shared.frame.lock().lights.push(light);
    }

    /// Set up a world-space canvas slot for this frame
    ///
    /// # Panics
    ///
    /// Panics when `index` is not below the configured canvas count.
    pub fn setup_ui_canvas(&self, index: usize, world_position: Vec3, settings: CanvasSettings) {
        self.shared.frame.lock().canvases.setup(index, world_position, settings);
    }

    /// Drop everything queued for this frame
    ///
    /// Queues, lights, canvas setups, batches and dynamic geometry are
    /// discarded. Static geometry stays cached.
    pub fn clear_rendering_queues(&self) {
        self.shared.frame.lock().clear();
    }

    /// Invalidate every cached geometry offset at the end of the next frame
    pub fn clear_geometry_render_info_entries(&self) {
        self.shared.clear_geometry_pending.store(true, Ordering::Release);
    }

    /// Reload shaders at the end of the next frame
    pub fn request_shaders_reload(&self) {
        self.shared.shader_reload_pending.store(true, Ordering::Release);
    }

    /// Track a material pass so shader reloads rebuild it
    ///
    /// Submitted passes are tracked automatically.
    pub fn register_material_pass(&self, pass: &Arc<MaterialPass>) {
        self.shared.frame.lock().track_pass(pass);
    }

    /// Drop the batch scratch storage of an unloaded material
    pub fn release_batch(&self, material: MaterialId) -> bool {
        self.shared.frame.lock().batches.release_batch(material)
    }

    /// Decode a texture and queue it for upload
    pub fn preload_texture(&self, texture: TextureId, encoded: &[u8]) -> RenderResult<()> {
        self.shared.textures.preload(texture, encoded)
    }

    /// Camera 3D content is currently rendered through
    pub fn active_camera(&self) -> Option<CameraState> {
        self.shared.camera.read().clone()
    }

    /// Current ambient light color
    pub fn ambient_light_color(&self) -> Color {
        *self.shared.ambient_color.read()
    }

    /// Static geometry offset cached for a renderable
    pub fn static_geometry_info(&self, id: RenderableId) -> Option<GeometryRenderInfo> {
        self.shared.frame.lock().static_geometry.get(&id).copied()
    }

    /// Dynamic geometry offset registered for a renderable this frame
    pub fn dynamic_geometry_info(&self, id: RenderableId) -> Option<GeometryRenderInfo> {
        self.shared.frame.lock().dynamic_geometry.get(&id).copied()
    }

    /// Number of operations queued for this frame, shadow lists excluded
    pub fn queued_operations(&self) -> usize {
        self.shared.frame.lock().queues.len()
    }

    /// Number of material passes tracked for shader reloads
    ///
    /// Passes dropped by their owners are forgotten when the frame is cleared.
    pub fn tracked_material_passes(&self) -> usize {
        self.shared.frame.lock().material_passes.len()
    }

    /// Vertex write cursor of a geometry group
    pub fn vertex_cursor(&self, group: GeometryGroup) -> usize {
        self.shared.frame.lock().buffers.pair(group).vertex_cursor()
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter").finish_non_exhaustive()
    }
}

/// Render-queue and geometry-batching scheduler
pub struct RenderSystem {
    submitter: Submitter,
    timer: FrameTimer,
    last_frame: FrameStats,
}

impl RenderSystem {
    /// Create a render system
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the configuration does not validate.
    pub fn new(config: RenderSystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Render system created: {} canvas slots, {} KiB vertex buffers per group",
            config.ui_canvas_count,
            config.vertex_buffer_size / 1024
        );
        Ok(Self::build(config))
    }

    /// Create a render system with the default configuration
    pub fn with_defaults() -> Self {
        Self::build(RenderSystemConfig::default())
    }

    fn build(config: RenderSystemConfig) -> Self {
        let frame = FrameState::new(&config);
        let shared = Arc::new(Shared {
            config,
            frame: Mutex::new(frame),
            camera: RwLock::new(None),
            ambient_color: RwLock::new(Color::BLACK),
            clear_geometry_pending: AtomicBool::new(false),
            shader_reload_pending: AtomicBool::new(false),
            textures: TexturePreloadList::new(),
        });
        Self {
            submitter: Submitter { shared },
            timer: FrameTimer::new(),
            last_frame: FrameStats::default(),
        }
    }

    /// Configuration the system was built with
    pub fn config(&self) -> &RenderSystemConfig {
        &self.submitter.shared.config
    }

    /// A new submission handle
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// See [`Submitter::submit`]
    pub fn submit(&self, renderable: &RenderableDescriptor, submission_index: u32) -> RenderResult<()> {
        self.submitter.submit(renderable, submission_index)
    }

    /// See [`Submitter::submit_light`]
    pub fn submit_light(&self, light: Light) {
        self.submitter.submit_light(light);
    }

    /// See [`Submitter::setup_ui_canvas`]
    pub fn setup_ui_canvas(&self, index: usize, world_position: Vec3, settings: CanvasSettings) {
        self.submitter.setup_ui_canvas(index, world_position, settings);
    }

    /// See [`Submitter::clear_rendering_queues`]
    pub fn clear_rendering_queues(&self) {
        self.submitter.clear_rendering_queues();
    }

    /// See [`Submitter::clear_geometry_render_info_entries`]
    pub fn clear_geometry_render_info_entries(&self) {
        self.submitter.clear_geometry_render_info_entries();
    }

    /// See [`Submitter::request_shaders_reload`]
    pub fn request_shaders_reload(&self) {
        self.submitter.request_shaders_reload();
    }

    /// Set the camera 3D content is rendered through
    pub fn set_active_camera(&self, camera: Option<CameraState>) {
        *self.submitter.shared.camera.write() = camera;
    }

    /// Set the ambient light color handed to lit draws
    pub fn set_ambient_light_color(&self, color: Color) {
        *self.submitter.shared.ambient_color.write() = color;
    }

    /// Set the canvas ordering; `None` sorts farthest from the camera first
    pub fn set_canvas_sort(&self, sort: Option<CanvasSortFn>) {
        self.submitter.shared.frame.lock().canvas_sort = sort;
    }

    /// Frames per second measured over the last frame
    pub fn fps(&self) -> f32 {
        self.timer.fps()
    }

    /// Draw calls issued by the last frame
    pub fn draw_calls(&self) -> usize {
        self.last_frame.draw_calls
    }

    /// Statistics of the last frame
    pub fn frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// Number of frames rendered
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    /// See [`Submitter::preload_texture`]
    pub fn preload_texture(&self, texture: TextureId, encoded: &[u8]) -> RenderResult<()> {
        self.submitter.preload_texture(texture, encoded)
    }

    /// Textures waiting for upload
    pub fn preload_textures(&self) -> &TexturePreloadList {
        &self.submitter.shared.textures
    }

    /// Upload the oldest preloaded texture, returning whether one was pending
    pub fn load_next_preloaded_texture(&self, backend: &mut dyn GraphicsBackend) -> RenderResult<bool> {
        self.submitter.shared.textures.load_next(backend)
    }

    /// Draw everything submitted since the last frame
    ///
    /// Finalizes batches, uploads new geometry, drains every queue in pass
    /// order, applies pending geometry invalidation and shader reloads, then
    /// clears the per-frame state. The per-frame state is cleared even when
    /// drawing fails.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        scene: Option<&SceneSettings>,
    ) -> RenderResult<FrameStats> {
        let stopwatch = Stopwatch::start_new();
        let shared = Arc::clone(&self.submitter.shared);
        let camera = shared.camera.read().clone();
        let ambient_color = *shared.ambient_color.read();

        let mut guard = shared.frame.lock();
        let frame = &mut *guard;

        let drawn = Self::draw_frame(frame, backend, &shared.config, camera.as_ref(), scene, ambient_color);
        let housekeeping = self.end_of_frame(frame, backend);
        frame.clear();
        drop(guard);

        let mut stats = drawn?;
        housekeeping?;

        self.timer.tick();
        stats.frame_time = stopwatch.elapsed();
        self.last_frame = stats;
        trace!(
            "Frame {}: {} draws, {} shadow draws, {} batches",
            self.timer.frame_count(),
            stats.draw_calls,
            stats.shadow_draw_calls,
            stats.batches
        );
        Ok(stats)
    }

    fn draw_frame(
        frame: &mut FrameState,
        backend: &mut dyn GraphicsBackend,
        config: &RenderSystemConfig,
        camera: Option<&CameraState>,
        scene: Option<&SceneSettings>,
        ambient_color: Color,
    ) -> RenderResult<FrameStats> {
        let batch_stats = frame.batches.finalize(&mut frame.buffers, &mut frame.queues)?;
        let geometry_uploads = frame.buffers.flush(backend)?;

        let context = FrameContext {
            camera,
            scene,
            lights: &frame.lights,
            canvases: &frame.canvases,
            canvas_sort: frame.canvas_sort.as_ref(),
            ambient_color,
            aspect_ratio: config.aspect_ratio,
            shadow_map_size: config.shadow_map_size,
        };
        let pass_stats = FramePassScheduler::new(backend, context).run(&mut frame.queues)?;

        Ok(FrameStats {
            draw_calls: pass_stats.draw_calls,
            shadow_draw_calls: pass_stats.shadow_draw_calls,
            shadow_pass: pass_stats.shadow_pass,
            batches: batch_stats.batches,
            batched_renderables: batch_stats.merged_renderables,
            geometry_uploads,
            frame_time: Duration::ZERO,
        })
    }

    fn end_of_frame(&self, frame: &mut FrameState, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        let shared = &self.submitter.shared;
        if shared.clear_geometry_pending.swap(false, Ordering::AcqRel) {
            frame.invalidate_geometry();
        }
        if shared.shader_reload_pending.swap(false, Ordering::AcqRel) {
            backend.reload_shaders()?;
            let rebuilt = frame.rebuild_material_passes(backend);
            debug!("Shaders reloaded; rebuilt {rebuilt} material passes");
        }
        Ok(())
    }
}

impl Default for RenderSystem {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("frame_count", &self.timer.frame_count())
            .field("last_frame", &self.last_frame)
            .finish_non_exhaustive()
    }
}
