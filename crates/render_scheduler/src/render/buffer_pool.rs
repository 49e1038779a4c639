//! # Geometry Buffer Pool
//!
//! One fixed-capacity vertex/index arena per [`GeometryGroup`]. Geometry is
//! appended at the arena's write cursor; the returned [`GeometryRenderInfo`]
//! stays valid until the group is reset. Dynamic groups are reset every frame,
//! static groups only when geometry is invalidated.
//!
//! Arenas are CPU staging copies of the GPU buffers. Everything written since
//! the last [`GeometryBufferPool::flush`] is uploaded to the backend in one
//! range per group.

use crate::config::RenderSystemConfig;
use crate::foundation::logging::trace;
use crate::render::backend::{BufferUpload, GraphicsBackend};
use crate::render::geometry::{GeometryData, GeometryGroup, GeometryRenderInfo, IndexFormat};
use crate::render::{RenderError, RenderResult};

const FLOAT_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Debug)]
enum IndexStorage {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexStorage {
    fn new(format: IndexFormat) -> Self {
        match format {
            IndexFormat::U16 => Self::U16(Vec::new()),
            IndexFormat::U32 => Self::U32(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    fn get(&self, position: usize) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.get(position).map(|&i| u32::from(i)),
            Self::U32(indices) => indices.get(position).copied(),
        }
    }

    // values are checked against the format's range before this is called
    fn extend_rebased(&mut self, indices: &[u16], base: u32) {
        match self {
            Self::U16(storage) => storage.extend(
                indices
                    .iter()
                    .map(|&i| u16::try_from(u32::from(i) + base).unwrap_or(u16::MAX)),
            ),
            Self::U32(storage) => storage.extend(indices.iter().map(|&i| u32::from(i) + base)),
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            Self::U16(indices) => indices.truncate(len),
            Self::U32(indices) => indices.truncate(len),
        }
    }

    fn bytes_from(&self, start: usize) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(&indices[start..]),
            Self::U32(indices) => bytemuck::cast_slice(&indices[start..]),
        }
    }
}

/// Write position of one arena, restored by [`GeometryBufferPool::rollback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMark {
    group: GeometryGroup,
    vertex_floats: usize,
    indices: usize,
}

/// Vertex/index arena of one geometry group
#[derive(Debug)]
pub struct GpuBufferPair {
    group: GeometryGroup,
    vertices: Vec<f32>,
    indices: IndexStorage,
    vertex_capacity: usize,
    index_capacity: usize,
    flushed_vertices: usize,
    flushed_indices: usize,
}

impl GpuBufferPair {
    /// Create an arena holding at most `vertex_bytes` / `index_bytes`
    pub fn new(group: GeometryGroup, vertex_bytes: usize, index_bytes: usize) -> Self {
        Self {
            group,
            vertices: Vec::new(),
            indices: IndexStorage::new(group.index_format()),
            vertex_capacity: vertex_bytes / (group.vertex_stride() * FLOAT_SIZE),
            index_capacity: index_bytes / group.index_format().size_in_bytes(),
            flushed_vertices: 0,
            flushed_indices: 0,
        }
    }

    /// Group this arena belongs to
    pub fn group(&self) -> GeometryGroup {
        self.group
    }

    /// Vertex write cursor, in vertices
    pub fn vertex_cursor(&self) -> usize {
        self.vertices.len() / self.group.vertex_stride()
    }

    /// Index write cursor, in indices
    pub fn index_cursor(&self) -> usize {
        self.indices.len()
    }

    /// Maximum number of vertices
    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    /// Maximum number of indices
    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Stored vertex floats
    pub fn vertex_data(&self) -> &[f32] {
        &self.vertices
    }

    /// Stored (rebased) index at `position`
    pub fn index_at(&self, position: usize) -> Option<u32> {
        self.indices.get(position)
    }

    /// Whether anything was written since the last flush
    pub fn is_dirty(&self) -> bool {
        self.vertices.len() > self.flushed_vertices || self.indices.len() > self.flushed_indices
    }

    /// Append a geometry block at the write cursor
    ///
    /// Vertices are converted to the group's stride: extra attributes are
    /// dropped, missing ones zero-filled. Indices are rebased onto the cursor.
    /// Nothing is written when the block does not fit.
    pub fn append(&mut self, geometry: &GeometryData) -> RenderResult<GeometryRenderInfo> {
        let vertex_count = geometry.vertex_count();
        let index_count = geometry.index_count();
        let vertex_cursor = self.vertex_cursor();
        let index_cursor = self.index_cursor();

        let vertices_left = self.vertex_capacity - vertex_cursor;
        if vertex_count > vertices_left {
            return Err(RenderError::ResourceExhausted {
                resource: format!("{:?} vertex buffer", self.group),
                requested: vertex_count,
                available: vertices_left,
            });
        }
        let indices_left = self.index_capacity - index_cursor;
        if index_count > indices_left {
            return Err(RenderError::ResourceExhausted {
                resource: format!("{:?} index buffer", self.group),
                requested: index_count,
                available: indices_left,
            });
        }

        let base = u32::try_from(vertex_cursor).map_err(|_| RenderError::IndexOverflow {
            group: self.group,
            index: u32::MAX,
        })?;
        if let Some(&highest) = geometry.indices.iter().max() {
            let rebased = u32::from(highest) + base;
            if rebased > self.group.index_format().max_index() {
                return Err(RenderError::IndexOverflow {
                    group: self.group,
                    index: rebased,
                });
            }
        }

        let stride = self.group.vertex_stride();
        let copied = stride.min(geometry.vertex_stride);
        self.vertices.reserve(vertex_count * stride);
        for vertex in 0..vertex_count {
            let source = geometry.vertex(vertex);
            self.vertices.extend_from_slice(&source[..copied]);
            self.vertices.extend(std::iter::repeat(0.0).take(stride - copied));
        }
        self.indices.extend_rebased(&geometry.indices, base);

        let index_offset = u32::try_from(index_cursor).unwrap_or(u32::MAX);
        trace!(
            "Appended {} vertices / {} indices to {:?} at ({}, {})",
            vertex_count, index_count, self.group, base, index_offset
        );
        Ok(GeometryRenderInfo::new(base, index_offset))
    }

    /// Current write position
    pub fn mark(&self) -> BufferMark {
        BufferMark {
            group: self.group,
            vertex_floats: self.vertices.len(),
            indices: self.indices.len(),
        }
    }

    fn truncate_to(&mut self, mark: BufferMark) {
        self.vertices.truncate(mark.vertex_floats);
        self.indices.truncate(mark.indices);
        self.flushed_vertices = self.flushed_vertices.min(mark.vertex_floats);
        self.flushed_indices = self.flushed_indices.min(mark.indices);
    }

    /// Zero both cursors
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.truncate(0);
        self.flushed_vertices = 0;
        self.flushed_indices = 0;
    }

    fn pending_upload(&self) -> Option<BufferUpload<'_>> {
        if !self.is_dirty() {
            return None;
        }
        let index_size = self.group.index_format().size_in_bytes();
        Some(BufferUpload {
            group: self.group,
            vertex_byte_offset: self.flushed_vertices * FLOAT_SIZE,
            vertex_bytes: bytemuck::cast_slice(&self.vertices[self.flushed_vertices..]),
            index_byte_offset: self.flushed_indices * index_size,
            index_bytes: self.indices.bytes_from(self.flushed_indices),
        })
    }

    fn mark_flushed(&mut self) {
        self.flushed_vertices = self.vertices.len();
        self.flushed_indices = self.indices.len();
    }
}

/// One [`GpuBufferPair`] per geometry group
#[derive(Debug)]
pub struct GeometryBufferPool {
    pairs: Vec<GpuBufferPair>,
}

impl GeometryBufferPool {
    /// Create arenas sized from the configured byte capacities
    pub fn new(config: &RenderSystemConfig) -> Self {
        Self::with_sizes(config.vertex_buffer_size, config.index_buffer_size)
    }

    /// Create arenas of the given byte sizes
    pub fn with_sizes(vertex_bytes: usize, index_bytes: usize) -> Self {
        Self {
            pairs: GeometryGroup::ALL
                .iter()
                .map(|&group| GpuBufferPair::new(group, vertex_bytes, index_bytes))
                .collect(),
        }
    }

    /// Arena of a group
    pub fn pair(&self, group: GeometryGroup) -> &GpuBufferPair {
        &self.pairs[group.index()]
    }

    /// Append a geometry block to a group
    pub fn append(&mut self, group: GeometryGroup, geometry: &GeometryData) -> RenderResult<GeometryRenderInfo> {
        self.pairs[group.index()].append(geometry)
    }

    /// Write position of a group
    pub fn mark(&self, group: GeometryGroup) -> BufferMark {
        self.pair(group).mark()
    }

    /// Drop everything appended to a group after `mark` was taken
    pub fn rollback(&mut self, mark: BufferMark) {
        self.pairs[mark.group.index()].truncate_to(mark);
    }

    /// Zero a group's cursors
    pub fn reset(&mut self, group: GeometryGroup) {
        self.pairs[group.index()].reset();
    }

    /// Zero the cursors of every non-static group
    pub fn reset_dynamic(&mut self) {
        self.pairs
            .iter_mut()
            .filter(|pair| !pair.group.is_static())
            .for_each(GpuBufferPair::reset);
    }

    /// Zero every cursor, static groups included
    pub fn reset_all(&mut self) {
        self.pairs.iter_mut().for_each(GpuBufferPair::reset);
    }

    /// Upload everything written since the last flush
    ///
    /// Returns the number of groups uploaded.
    pub fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> RenderResult<usize> {
        let mut uploaded = 0;
        for pair in &mut self.pairs {
            if let Some(upload) = pair.pending_upload() {
                backend.upload_geometry(&upload)?;
                uploaded += 1;
            }
            pair.mark_flushed();
        }
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBackend;

    fn triangle(stride: usize) -> GeometryData {
        let mut vertex_data = Vec::new();
        for v in 0..3u8 {
            vertex_data.extend((0..stride).map(|attribute| f32::from(v * 10) + attribute as f32));
        }
        GeometryData::new(vertex_data, stride, vec![0, 1, 2])
    }

    #[test]
    fn test_rollback_restores_cursor() {
        let mut pool = GeometryBufferPool::with_sizes(4096, 4096);
        pool.append(GeometryGroup::SpriteDynamic, &triangle(5)).unwrap();
        let mark = pool.mark(GeometryGroup::SpriteDynamic);
        pool.append(GeometryGroup::SpriteDynamic, &triangle(5)).unwrap();

        pool.rollback(mark);
        let pair = pool.pair(GeometryGroup::SpriteDynamic);
        assert_eq!(pair.vertex_cursor(), 3);
        assert_eq!(pair.index_cursor(), 3);
        assert_eq!(pair.index_at(3), None);

        let again = pool.append(GeometryGroup::SpriteDynamic, &triangle(5)).unwrap();
        assert_eq!(again, GeometryRenderInfo::new(3, 3));
    }

    #[test]
    fn test_append_advances_cursors() {
        let mut pool = GeometryBufferPool::with_sizes(4096, 4096);
        let first = pool.append(GeometryGroup::MeshDynamic, &triangle(8)).unwrap();
        let second = pool.append(GeometryGroup::MeshDynamic, &triangle(8)).unwrap();

        assert_eq!(first, GeometryRenderInfo::new(0, 0));
        assert_eq!(second, GeometryRenderInfo::new(3, 3));
        let pair = pool.pair(GeometryGroup::MeshDynamic);
        assert_eq!(pair.vertex_cursor(), 6);
        assert_eq!(pair.index_cursor(), 6);
        assert_eq!(pair.index_at(3), Some(3));
        assert_eq!(pair.index_at(5), Some(5));
    }

    #[test]
    fn test_stride_conversion() {
        let mut pool = GeometryBufferPool::with_sizes(4096, 4096);
        // 8-float mesh vertices into the 5-float sprite layout, then back up to 9
        pool.append(GeometryGroup::SpriteDynamic, &triangle(8)).unwrap();
        pool.append(GeometryGroup::Label, &triangle(5)).unwrap();

        let sprite = pool.pair(GeometryGroup::SpriteDynamic).vertex_data();
        assert_eq!(sprite.len(), 15);
        assert_eq!(&sprite[5..10], &[10.0, 11.0, 12.0, 13.0, 14.0]);

        let label = pool.pair(GeometryGroup::Label).vertex_data();
        assert_eq!(label.len(), 27);
        assert_eq!(&label[0..9], &[0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_overflow_leaves_cursor() {
        // room for exactly 4 mesh vertices
        let mut pool = GeometryBufferPool::with_sizes(4 * 8 * 4, 4096);
        pool.append(GeometryGroup::MeshStatic, &triangle(8)).unwrap();

        let result = pool.append(GeometryGroup::MeshStatic, &triangle(8));
        assert!(matches!(
            result,
            Err(RenderError::ResourceExhausted { requested: 3, available: 1, .. })
        ));
        assert_eq!(pool.pair(GeometryGroup::MeshStatic).vertex_cursor(), 3);
        assert_eq!(pool.pair(GeometryGroup::MeshStatic).index_cursor(), 3);
    }

    #[test]
    fn test_index_overflow_for_u16_groups() {
        let mut pool = GeometryBufferPool::with_sizes(usize::MAX / 2, 4096);
        let big = GeometryData::new(vec![0.0; 5 * 65_535], 5, vec![0]);
        pool.append(GeometryGroup::SpriteDynamic, &big).unwrap();

        let result = pool.append(GeometryGroup::SpriteDynamic, &GeometryData::new(vec![0.0; 10], 5, vec![1]));
        assert!(matches!(result, Err(RenderError::IndexOverflow { index: 65_536, .. })));
    }

    #[test]
    fn test_reset_dynamic_keeps_static() {
        let mut pool = GeometryBufferPool::with_sizes(4096, 4096);
        pool.append(GeometryGroup::SpriteStatic, &triangle(5)).unwrap();
        pool.append(GeometryGroup::SpriteDynamic, &triangle(5)).unwrap();

        pool.reset_dynamic();
        assert_eq!(pool.pair(GeometryGroup::SpriteStatic).vertex_cursor(), 3);
        assert_eq!(pool.pair(GeometryGroup::SpriteDynamic).vertex_cursor(), 0);

        pool.reset_all();
        assert_eq!(pool.pair(GeometryGroup::SpriteStatic).vertex_cursor(), 0);
    }

    #[test]
    fn test_flush_uploads_only_new_ranges() {
        let mut pool = GeometryBufferPool::with_sizes(4096, 4096);
        let mut backend = HeadlessBackend::new();

        pool.append(GeometryGroup::MeshStatic, &triangle(8)).unwrap();
        assert_eq!(pool.flush(&mut backend).unwrap(), 1);
        assert_eq!(pool.flush(&mut backend).unwrap(), 0);

        pool.append(GeometryGroup::MeshStatic, &triangle(8)).unwrap();
        pool.flush(&mut backend).unwrap();

        let uploads = backend.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[1].vertex_byte_offset, 3 * 8 * 4);
        assert_eq!(uploads[1].index_byte_offset, 3 * 4);
        assert_eq!(uploads[1].vertex_bytes, 3 * 8 * 4);
    }
}
