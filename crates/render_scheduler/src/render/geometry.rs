//! Geometry blocks and geometry groups
//!
//! Every renderable carries one [`GeometryData`] block. Blocks are written
//! into the shared buffer of their [`GeometryGroup`], which fixes the vertex
//! layout and index width for everything stored in it.

use serde::{Serialize, Deserialize};

/// Whether a renderable's geometry may be cached across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeometryKind {
    /// Uploaded once and reused until geometry is invalidated
    Static,
    /// Re-uploaded every frame it is submitted
    #[default]
    Dynamic,
}

/// Width of the indices stored in a group's index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Largest index value representable
    pub const fn max_index(self) -> u32 {
        match self {
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }
}

/// Named bucket with its own GPU buffer pair and vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryGroup {
    /// Sprites with cached geometry
    SpriteStatic,
    /// Sprites rebuilt every frame
    SpriteDynamic,
    /// Merged sprites sharing a batchable material
    SpriteBatch,
    /// Text labels
    Label,
    /// Merged labels sharing a batchable material
    LabelBatch,
    /// Meshes with cached geometry
    MeshStatic,
    /// Meshes rebuilt every frame
    MeshDynamic,
    /// Merged meshes sharing a batchable material
    MeshBatch,
    /// Particle system quads
    Particles,
}

impl GeometryGroup {
    /// Number of groups
    pub const COUNT: usize = 9;

    /// Every group, in buffer-slot order
    pub const ALL: [Self; Self::COUNT] = [
        Self::SpriteStatic,
        Self::SpriteDynamic,
        Self::SpriteBatch,
        Self::Label,
        Self::LabelBatch,
        Self::MeshStatic,
        Self::MeshDynamic,
        Self::MeshBatch,
        Self::Particles,
    ];

    /// Buffer slot of this group
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Floats per vertex stored in this group
    ///
    /// Sprites: position + uv. Labels and particles: position + color + uv.
    /// Meshes: position + normal + uv.
    pub const fn vertex_stride(self) -> usize {
        match self {
            Self::SpriteStatic | Self::SpriteDynamic | Self::SpriteBatch => 3 + 2,
            Self::Label | Self::LabelBatch | Self::Particles => 3 + 4 + 2,
            Self::MeshStatic | Self::MeshDynamic | Self::MeshBatch => 3 + 3 + 2,
        }
    }

    /// Index width used when writing into this group
    pub const fn index_format(self) -> IndexFormat {
        match self {
            Self::MeshStatic | Self::MeshDynamic | Self::MeshBatch | Self::Particles => IndexFormat::U32,
            _ => IndexFormat::U16,
        }
    }

    /// Static groups keep their contents across frames
    pub const fn is_static(self) -> bool {
        matches!(self, Self::SpriteStatic | Self::MeshStatic)
    }

    /// Groups holding merged batch geometry
    pub const fn is_batch(self) -> bool {
        matches!(self, Self::SpriteBatch | Self::LabelBatch | Self::MeshBatch)
    }
}

/// Raw geometry: interleaved vertex floats plus 16-bit triangle indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    /// Interleaved vertex attributes; position is always the first three floats
    pub vertex_data: Vec<f32>,
    /// Floats per vertex
    pub vertex_stride: usize,
    /// Triangle list indices
    pub indices: Vec<u16>,
}

impl GeometryData {
    /// Create a geometry block
    pub fn new(vertex_data: Vec<f32>, vertex_stride: usize, indices: Vec<u16>) -> Self {
        Self {
            vertex_data,
            vertex_stride,
            indices,
        }
    }

    /// Number of whole vertices in the block
    pub fn vertex_count(&self) -> usize {
        if self.vertex_stride == 0 {
            0
        } else {
            self.vertex_data.len() / self.vertex_stride
        }
    }

    /// Number of indices in the block
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Has indices, at least a position per vertex, and every index names one
    /// of its own vertices
    pub fn is_drawable(&self) -> bool {
        self.vertex_stride >= 3
            && self
                .indices
                .iter()
                .max()
                .is_some_and(|&highest| usize::from(highest) < self.vertex_count())
    }

    /// Attributes of one vertex
    pub fn vertex(&self, index: usize) -> &[f32] {
        let start = index * self.vertex_stride;
        &self.vertex_data[start..start + self.vertex_stride]
    }

    /// Axis-aligned unit quad with `stride` floats per vertex
    ///
    /// Attributes past the position are zeroed.
    pub fn quad(stride: usize) -> Self {
        let corners = [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.5, 0.5, 0.0], [-0.5, 0.5, 0.0]];
        let mut vertex_data = Vec::with_capacity(corners.len() * stride);
        for corner in corners {
            vertex_data.extend_from_slice(&corner[..stride.min(3)]);
            vertex_data.extend(std::iter::repeat(0.0).take(stride.saturating_sub(3)));
        }
        Self::new(vertex_data, stride, vec![0, 1, 2, 0, 2, 3])
    }
}

/// Where a geometry block landed in its group's buffers
///
/// Offsets are in elements (vertices and indices), not bytes. Indices stored
/// in the buffer are already rebased onto `vertex_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeometryRenderInfo {
    /// First vertex of the block
    pub vertex_offset: u32,
    /// First index of the block
    pub index_offset: u32,
}

impl GeometryRenderInfo {
    /// Create a render info entry
    pub const fn new(vertex_offset: u32, index_offset: u32) -> Self {
        Self {
            vertex_offset,
            index_offset,
        }
    }
}
