//! # Render Queue System
//!
//! Collects the render operations of one frame and hands them back in draw
//! order. Every queue is a max-heap over a composite [`SortKey`]; the
//! transparent list is instead sorted back-to-front by camera distance right
//! before it is drained.
//!
//! ## Architecture
//!
//! - **SortKey**: priority, then submission index, then pass index
//! - **RenderOperation**: one queued draw, standalone or a finalized batch
//! - **RenderQueue**: max-heap of operations, popped highest key first
//! - **FrameQueues**: every queue and list filled during one frame

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::math::{translation_of, Color, Mat4, Vec3};
use crate::render::geometry::{GeometryData, GeometryGroup, GeometryRenderInfo};
use crate::render::material::{MaterialId, MaterialPass, TextureId};
use crate::render::renderable::RenderableId;

const PRIORITY_SHIFT: u32 = 48;
const SUBMISSION_SHIFT: u32 = 8;

/// Composite ordering key of a render operation
///
/// Bits 48..56 hold the render priority, bits 8..40 the submission index and
/// bits 0..8 the material pass index. Higher keys are drawn first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SortKey(pub u64);

impl SortKey {
    /// Build a key; pass indices past 255 saturate
    pub fn new(priority: u8, submission_index: u32, pass_index: usize) -> Self {
        let pass = u8::try_from(pass_index).unwrap_or(u8::MAX);
        Self(
            (u64::from(priority) << PRIORITY_SHIFT)
                | (u64::from(submission_index) << SUBMISSION_SHIFT)
                | u64::from(pass),
        )
    }

    /// Render priority term
    pub const fn priority(self) -> u8 {
        ((self.0 >> PRIORITY_SHIFT) & 0xff) as u8
    }

    /// Submission index term
    pub const fn submission_index(self) -> u32 {
        ((self.0 >> SUBMISSION_SHIFT) & 0xffff_ffff) as u32
    }

    /// Material pass index term
    pub const fn pass_index(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

bitflags! {
    /// Per-operation draw flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderOperationFlags: u8 {
        /// Transformed by the active camera instead of the 2D projection
        const RENDER_THROUGH_ACTIVE_CAMERA = 1 << 0;
        /// Lit by the queued lights
        const LIGHTING_SUPPORT = 1 << 1;
        /// Samples the shadow map
        const BIND_SHADOW_MAP = 1 << 2;
    }
}

/// Identity of the geometry an operation draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKey {
    /// Geometry owned by a renderable
    Renderable(RenderableId),
    /// Merged geometry of a material's batch
    Batch(MaterialId),
}

/// One queued draw request
#[derive(Debug, Clone)]
pub struct RenderOperation {
    /// Ordering key
    pub key: SortKey,
    /// Geometry identity
    pub geometry_key: GeometryKey,
    /// Material pass to bind
    pub pass: Arc<MaterialPass>,
    /// Group whose buffers hold the geometry
    pub group: GeometryGroup,
    /// Where the geometry lives in the group's buffers
    pub render_info: GeometryRenderInfo,
    /// Number of indices to draw
    pub index_count: u32,
    /// World transform; identity for batches
    pub world_transform: Mat4,
    /// Renderable tint, UI alpha already applied
    pub color: Color,
    /// Texture bound as diffuse
    pub diffuse_texture: Option<TextureId>,
    /// Draw flags
    pub flags: RenderOperationFlags,
    /// Merged block owned by a finalized batch
    pub batch_geometry: Option<Arc<GeometryData>>,
}

impl RenderOperation {
    /// World-space position used for distance sorting
    pub fn world_position(&self) -> Vec3 {
        translation_of(&self.world_transform)
    }

    /// Squared distance from `point` to the operation's world position
    pub fn distance_squared_to(&self, point: &Vec3) -> f32 {
        (self.world_position() - point).norm_squared()
    }

    /// Whether the operation is a finalized batch
    pub fn is_batch(&self) -> bool {
        matches!(self.geometry_key, GeometryKey::Batch(_))
    }
}

struct QueueEntry {
    sequence: u64,
    operation: RenderOperation,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // equal keys pop in insertion order
    fn cmp(&self, other: &Self) -> Ordering {
        self.operation
            .key
            .cmp(&other.operation.key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Max-heap of render operations
#[derive(Default)]
pub struct RenderQueue {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl RenderQueue {
    /// Create a new empty render queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation
    pub fn push(&mut self, operation: RenderOperation) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueEntry { sequence, operation });
    }

    /// Remove and return the operation with the highest key
    pub fn pop(&mut self) -> Option<RenderOperation> {
        self.heap.pop().map(|entry| entry.operation)
    }

    /// Key of the next operation to pop
    pub fn peek_key(&self) -> Option<SortKey> {
        self.heap.peek().map(|entry| entry.operation.key)
    }

    /// Pop every operation, highest key first
    pub fn drain_sorted(&mut self) -> impl Iterator<Item = RenderOperation> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every queued operation
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_sequence = 0;
    }
}

impl std::fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderQueue").field("len", &self.heap.len()).finish()
    }
}

/// Sort operations back-to-front: farthest from `camera_position` first
///
/// The sort is stable, so equidistant operations keep submission order.
/// A NaN distance lands at one end without disturbing the others.
pub fn sort_back_to_front(operations: &mut [RenderOperation], camera_position: &Vec3) {
    operations.sort_by(|a, b| {
        b.distance_squared_to(camera_position)
            .total_cmp(&a.distance_squared_to(camera_position))
    });
}

/// Queue an operation is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueDestination {
    /// Sprites and labels drawn before any 3D content
    Pre3D,
    /// Opaque 3D meshes
    Opaque,
    /// World-space labels
    Labels3D,
    /// Back-to-front sorted list
    Transparent,
    /// World-space UI canvas slot
    Canvas(usize),
    /// Screen-space UI
    Ui2D,
    /// Overlay drawn after the 2D UI
    PostUi,
    /// Editor helper geometry
    Debug,
}

/// Every queue filled during one frame
#[derive(Debug, Default)]
pub struct FrameQueues {
    /// Drawn before any 3D content
    pub pre_3d: RenderQueue,
    /// Opaque meshes and mesh batches
    pub opaque: RenderQueue,
    /// World-space labels
    pub labels_3d: RenderQueue,
    /// Transparent meshes and 3D particles
    pub transparent: Vec<RenderOperation>,
    /// One queue per world-space canvas slot
    pub canvases: Vec<RenderQueue>,
    /// Screen-space UI and sprite/label batches
    pub ui_2d: RenderQueue,
    /// Overlay drawn after the 2D UI
    pub post_ui: RenderQueue,
    /// Editor helper geometry
    pub debug: RenderQueue,
    /// Meshes rendered into the shadow map, one entry per renderable
    pub shadow_casters: Vec<RenderOperation>,
    /// Particle systems rendered into the shadow map
    pub shadowed_particles: Vec<RenderOperation>,
}

impl FrameQueues {
    /// Create empty queues with `canvas_count` canvas slots
    pub fn new(canvas_count: usize) -> Self {
        Self {
            canvases: (0..canvas_count).map(|_| RenderQueue::new()).collect(),
            ..Self::default()
        }
    }

    /// Route an operation
    ///
    /// # Panics
    ///
    /// Panics when a canvas destination is out of range.
    pub fn push(&mut self, destination: QueueDestination, operation: RenderOperation) {
        match destination {
            QueueDestination::Pre3D => self.pre_3d.push(operation),
            QueueDestination::Opaque => self.opaque.push(operation),
            QueueDestination::Labels3D => self.labels_3d.push(operation),
            QueueDestination::Transparent => self.transparent.push(operation),
            QueueDestination::Canvas(index) => {
                assert!(
                    index < self.canvases.len(),
                    "canvas index {index} out of range ({} slots)",
                    self.canvases.len()
                );
                self.canvases[index].push(operation);
            }
            QueueDestination::Ui2D => self.ui_2d.push(operation),
            QueueDestination::PostUi => self.post_ui.push(operation),
            QueueDestination::Debug => self.debug.push(operation),
        }
    }

    /// Add a shadow caster unless the renderable already casts this frame
    pub fn push_shadow_caster(&mut self, operation: RenderOperation) -> bool {
        if self.shadow_casters.iter().any(|caster| caster.geometry_key == operation.geometry_key) {
            return false;
        }
        self.shadow_casters.push(operation);
        true
    }

    /// Whether any canvas holds operations
    pub fn any_canvas(&self) -> bool {
        self.canvases.iter().any(|canvas| !canvas.is_empty())
    }

    /// Whether the 3D block of the frame has anything to draw
    pub fn has_3d_content(&self) -> bool {
        !self.opaque.is_empty()
            || !self.labels_3d.is_empty()
            || !self.transparent.is_empty()
            || self.any_canvas()
    }

    /// Whether anything would be drawn into the shadow map
    pub fn has_shadow_casters(&self) -> bool {
        !self.shadow_casters.is_empty() || !self.shadowed_particles.is_empty()
    }

    /// Number of queued operations, shadow lists excluded
    pub fn len(&self) -> usize {
        self.pre_3d.len()
            + self.opaque.len()
            + self.labels_3d.len()
            + self.transparent.len()
            + self.canvases.iter().map(RenderQueue::len).sum::<usize>()
            + self.ui_2d.len()
            + self.post_ui.len()
            + self.debug.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && !self.has_shadow_casters()
    }

    /// Drop every queued operation
    pub fn clear(&mut self) {
        self.pre_3d.clear();
        self.opaque.clear();
        self.labels_3d.clear();
        self.transparent.clear();
        self.canvases.iter_mut().for_each(RenderQueue::clear);
        self.ui_2d.clear();
        self.post_ui.clear();
        self.debug.clear();
        self.shadow_casters.clear();
        self.shadowed_particles.clear();
    }
}
