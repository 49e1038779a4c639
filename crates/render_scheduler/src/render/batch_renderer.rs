//! # Batch Renderer
//!
//! Merges every renderable drawn with the same batchable material into one
//! geometry block per frame, so the whole group costs a single draw call.
//!
//! ## Architecture
//!
//! - **BatchEntry**: scratch block of one (material, group) pair
//! - **BatchAccumulator**: owns the entries; accumulates during submission and
//!   turns them into render operations when the frame is drawn
//! - **BatchStats**: what the last finalization produced
//!
//! Vertex positions are baked into world space while merging, so batches are
//! drawn with an identity world transform.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RenderSystemConfig;
use crate::foundation::logging::debug;
use crate::foundation::math::{transform_position, Color, Mat4};
use crate::render::buffer_pool::GeometryBufferPool;
use crate::render::classifier::batch_destination;
use crate::render::geometry::{GeometryData, GeometryGroup};
use crate::render::material::{MaterialId, MaterialPass};
use crate::render::render_queue::{FrameQueues, GeometryKey, RenderOperation, RenderOperationFlags, SortKey};
use crate::render::renderable::{RenderableDescriptor, RenderingMode};
use crate::render::{RenderError, RenderResult};

/// Scratch block of one batch
#[derive(Debug)]
pub struct BatchEntry {
    group: GeometryGroup,
    pass: Arc<MaterialPass>,
    geometry: GeometryData,
    key: SortKey,
    contributors: usize,
    through_camera: bool,
}

impl BatchEntry {
    fn new(group: GeometryGroup, pass: Arc<MaterialPass>) -> Self {
        Self {
            group,
            geometry: GeometryData::new(Vec::new(), group.vertex_stride(), Vec::new()),
            pass,
            key: SortKey::default(),
            contributors: 0,
            through_camera: false,
        }
    }

    /// Geometry group the batch is stored in
    pub fn group(&self) -> GeometryGroup {
        self.group
    }

    /// Merged geometry accumulated so far
    pub fn geometry(&self) -> &GeometryData {
        &self.geometry
    }

    /// Highest sort key of the merged renderables
    pub fn key(&self) -> SortKey {
        self.key
    }

    /// Number of renderables merged this frame
    pub fn contributors(&self) -> usize {
        self.contributors
    }

    fn reset(&mut self) {
        self.geometry.vertex_data.clear();
        self.geometry.indices.clear();
        self.key = SortKey::default();
        self.contributors = 0;
        self.through_camera = false;
    }
}

/// Fill level of one batch, restored by [`BatchAccumulator::rollback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMark {
    material: MaterialId,
    group: GeometryGroup,
    vertex_floats: usize,
    indices: usize,
    key: SortKey,
    contributors: usize,
    through_camera: bool,
}

/// Statistics of the last batch finalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Number of batches turned into render operations
    pub batches: usize,
    /// Number of renderables merged into them
    pub merged_renderables: usize,
    /// Total merged vertices
    pub vertices: usize,
    /// Total merged indices
    pub indices: usize,
}

/// Per-frame batch scratch storage
#[derive(Debug)]
pub struct BatchAccumulator {
    entries: BTreeMap<(MaterialId, GeometryGroup), BatchEntry>,
    vertex_capacity_floats: usize,
    index_capacity: usize,
}

impl BatchAccumulator {
    /// Create an accumulator with the configured scratch capacity
    pub fn new(config: &RenderSystemConfig) -> Self {
        Self::with_capacity(config.batch_vertex_floats, config.batch_index_count)
    }

    /// Create an accumulator holding at most the given floats and indices per batch
    pub fn with_capacity(vertex_capacity_floats: usize, index_capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            vertex_capacity_floats,
            index_capacity,
        }
    }

    /// Batch of a material in a group
    pub fn entry(&self, material: MaterialId, group: GeometryGroup) -> Option<&BatchEntry> {
        self.entries.get(&(material, group))
    }

    /// Current fill level of a batch; batches not created yet read as empty
    pub fn mark(&self, material: MaterialId, group: GeometryGroup) -> BatchMark {
        let mut mark = BatchMark {
            material,
            group,
            vertex_floats: 0,
            indices: 0,
            key: SortKey::default(),
            contributors: 0,
            through_camera: false,
        };
        if let Some(entry) = self.entry(material, group) {
            mark.vertex_floats = entry.geometry.vertex_data.len();
            mark.indices = entry.geometry.indices.len();
            mark.key = entry.key;
            mark.contributors = entry.contributors;
            mark.through_camera = entry.through_camera;
        }
        mark
    }

    /// Drop everything merged into a batch after `mark` was taken
    pub fn rollback(&mut self, mark: BatchMark) {
        if let Some(entry) = self.entries.get_mut(&(mark.material, mark.group)) {
            entry.geometry.vertex_data.truncate(mark.vertex_floats);
            entry.geometry.indices.truncate(mark.indices);
            entry.key = mark.key;
            entry.contributors = mark.contributors;
            entry.through_camera = mark.through_camera;
        }
    }

    /// Number of batches holding geometry this frame
    pub fn active_batches(&self) -> usize {
        self.entries.values().filter(|entry| entry.contributors > 0).count()
    }

    /// Merge a renderable into its material's batch
    ///
    /// Positions are transformed by the renderable's world matrix, the other
    /// attributes are copied into the group's layout and indices are offset
    /// by the vertices already in the batch. Nothing is merged when the
    /// batch would exceed its capacity or the geometry is not drawable.
    pub fn accumulate(
        &mut self,
        renderable: &RenderableDescriptor,
        pass: &Arc<MaterialPass>,
        group: GeometryGroup,
        key: SortKey,
    ) -> RenderResult<()> {
        if !renderable.geometry.is_drawable() {
            return Ok(());
        }
        let material = pass.material().id;
        let vertex_capacity_floats = self.vertex_capacity_floats;
        let index_capacity = self.index_capacity;
        let entry = self
            .entries
            .entry((material, group))
            .or_insert_with(|| BatchEntry::new(group, Arc::clone(pass)));

        let source = renderable.geometry.as_ref();
        let stride = group.vertex_stride();
        let base_vertex = entry.geometry.vertex_count();
        let needed_floats = source.vertex_count() * stride;

        let floats_left = vertex_capacity_floats.saturating_sub(entry.geometry.vertex_data.len());
        if needed_floats > floats_left {
            return Err(RenderError::ResourceExhausted {
                resource: format!("batch {material:?} vertex scratch"),
                requested: needed_floats,
                available: floats_left,
            });
        }
        let indices_left = index_capacity.saturating_sub(entry.geometry.indices.len());
        if source.index_count() > indices_left {
            return Err(RenderError::ResourceExhausted {
                resource: format!("batch {material:?} index scratch"),
                requested: source.index_count(),
                available: indices_left,
            });
        }
        let highest = source.indices.iter().max().map_or(0, |&i| usize::from(i)) + base_vertex;
        let base = u16::try_from(base_vertex)
            .ok()
            .filter(|_| highest <= usize::from(u16::MAX))
            .ok_or(RenderError::IndexOverflow {
                group,
                index: u32::try_from(highest).unwrap_or(u32::MAX),
            })?;

        if entry.contributors == 0 {
            entry.pass = Arc::clone(pass);
            entry.through_camera = renderable.rendering_mode == RenderingMode::ThreeD;
        }

        let copied = stride.min(source.vertex_stride).max(3);
        for vertex in 0..source.vertex_count() {
            let attributes = source.vertex(vertex);
            let position = transform_position(
                &renderable.world_transform,
                [attributes[0], attributes[1], attributes[2]],
            );
            entry.geometry.vertex_data.extend_from_slice(&position);
            entry.geometry.vertex_data.extend_from_slice(&attributes[3..copied]);
            entry.geometry.vertex_data.extend(std::iter::repeat(0.0).take(stride - copied));
        }
        entry.geometry.indices.extend(source.indices.iter().map(|&i| i + base));

        entry.key = entry.key.max(key);
        entry.contributors += 1;
        Ok(())
    }

    /// Register every non-empty batch and queue its render operation
    ///
    /// Mesh batches go to the opaque queue, sprite and label batches to the
    /// 2D UI queue.
    pub fn finalize(&self, buffers: &mut GeometryBufferPool, queues: &mut FrameQueues) -> RenderResult<BatchStats> {
        let mut stats = BatchStats::default();

        for (&(material, group), entry) in &self.entries {
            if entry.geometry.vertex_count() == 0 {
                continue;
            }
            let render_info = buffers.append(group, &entry.geometry)?;

            let mut flags = RenderOperationFlags::empty();
            flags.set(RenderOperationFlags::RENDER_THROUGH_ACTIVE_CAMERA, entry.through_camera);
            flags.set(RenderOperationFlags::LIGHTING_SUPPORT, group == GeometryGroup::MeshBatch);

            let operation = RenderOperation {
                key: entry.key,
                geometry_key: GeometryKey::Batch(material),
                pass: Arc::clone(&entry.pass),
                group,
                render_info,
                index_count: u32::try_from(entry.geometry.index_count()).unwrap_or(u32::MAX),
                world_transform: Mat4::identity(),
                color: Color::WHITE,
                diffuse_texture: entry.pass.material().diffuse_texture,
                flags,
                batch_geometry: Some(Arc::new(entry.geometry.clone())),
            };
            queues.push(batch_destination(group), operation);

            stats.batches += 1;
            stats.merged_renderables += entry.contributors;
            stats.vertices += entry.geometry.vertex_count();
            stats.indices += entry.geometry.index_count();
        }

        if stats.batches > 0 {
            debug!(
                "Finalized {} batches merging {} renderables ({} vertices)",
                stats.batches, stats.merged_renderables, stats.vertices
            );
        }
        Ok(stats)
    }

    /// Empty every batch, keeping scratch allocations
    pub fn clear(&mut self) {
        self.entries.values_mut().for_each(BatchEntry::reset);
    }

    /// Drop the scratch storage of a material's batches
    ///
    /// Returns whether any existed.
    pub fn release_batch(&mut self, material: MaterialId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|&(id, _), _| id != material);
        self.entries.len() != before
    }
}
