//! # Materials and Material Passes
//!
//! A [`Material`] is the read-only description the scheduler uses for
//! eligibility and state decisions: which shader program to bind, how to blend,
//! depth-test and cull, and whether draws using it may be merged into batches.
//!
//! A [`MaterialPass`] is one use of a material by a renderable. Passes carry
//! per-instance parameter overrides bound to the parameter layout of the
//! material's shader program. When shaders are reloaded the layout may change,
//! so passes can rebuild their bindings in place.
//!
//! ## Architecture
//!
//! - **Material**: shared, immutable description (`Arc<Material>`)
//! - **MaterialPass**: per-renderable pass with an active flag and overrides
//! - **MaterialState**: the subset of a material bound before every draw

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};

use crate::foundation::math::Color;
use crate::render::{RenderError, RenderResult};

/// Unique identifier for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Identifier of a compiled shader program owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShaderProgramId(pub u32);

/// Identifier of a texture owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// How fragments are combined with the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendingMode {
    /// Fragments overwrite the framebuffer
    #[default]
    None,
    /// Standard alpha blending
    Alpha,
    /// Fragments are added to the framebuffer
    Additive,
}

/// Depth buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DepthBufferMode {
    /// No depth test, no depth write
    NoDepthBuffer,
    /// Depth test without writing
    TestOnly,
    /// Depth test and write
    #[default]
    TestAndWrite,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullingMode {
    /// Cull back faces
    #[default]
    Back,
    /// Cull front faces
    Front,
    /// Draw both sides
    None,
}

bitflags! {
    /// Capability flags of a material
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u8 {
        /// Draws using this material are merged into one batch per frame
        const BATCH_RENDERING = 1 << 0;
        /// Lit draws are issued once for every queued light
        const RENDER_ONCE_PER_LIGHT = 1 << 1;
    }
}

/// Pipeline state bound immediately before a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialState {
    /// Shader program to bind
    pub program: ShaderProgramId,
    /// Blending mode
    pub blending: BlendingMode,
    /// Depth buffer mode
    pub depth: DepthBufferMode,
    /// Culling mode
    pub culling: CullingMode,
}

/// Read-only material description
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Unique identifier, also the batch key
    pub id: MaterialId,
    /// Optional name for debugging
    pub name: Option<String>,
    /// Shader program used by every pass of this material
    pub program: ShaderProgramId,
    /// Blending mode
    pub blending: BlendingMode,
    /// Depth buffer mode
    pub depth: DepthBufferMode,
    /// Culling mode
    pub culling: CullingMode,
    /// Capability flags
    pub flags: MaterialFlags,
    /// Diffuse color multiplied into every draw
    pub diffuse_color: Color,
    /// Optional diffuse texture
    pub diffuse_texture: Option<TextureId>,
}

impl Material {
    /// Create an opaque material with default state
    pub fn new(id: MaterialId, program: ShaderProgramId) -> Self {
        Self {
            id,
            name: None,
            program,
            blending: BlendingMode::default(),
            depth: DepthBufferMode::default(),
            culling: CullingMode::default(),
            flags: MaterialFlags::empty(),
            diffuse_color: Color::WHITE,
            diffuse_texture: None,
        }
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the blending mode
    pub fn with_blending(mut self, blending: BlendingMode) -> Self {
        self.blending = blending;
        self
    }

    /// Set the depth buffer mode
    pub fn with_depth(mut self, depth: DepthBufferMode) -> Self {
        self.depth = depth;
        self
    }

    /// Set the culling mode
    pub fn with_culling(mut self, culling: CullingMode) -> Self {
        self.culling = culling;
        self
    }

    /// Add capability flags
    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the diffuse color
    pub fn with_diffuse_color(mut self, color: Color) -> Self {
        self.diffuse_color = color;
        self
    }

    /// Set the diffuse texture
    pub fn with_diffuse_texture(mut self, texture: TextureId) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    /// Whether draws with this material may be merged
    pub fn is_batchable(&self) -> bool {
        self.flags.contains(MaterialFlags::BATCH_RENDERING)
    }

    /// State bound before each draw
    pub fn state(&self) -> MaterialState {
        MaterialState {
            program: self.program,
            blending: self.blending,
            depth: self.depth,
            culling: self.culling,
        }
    }
}

/// Value of a shader parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    /// Scalar
    Float(f32),
    /// Four-component vector
    Vector([f32; 4]),
    /// Texture sampler
    Texture(Option<TextureId>),
}

impl ParameterValue {
    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// One entry of a shader program's parameter layout
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Uniform name
    pub name: String,
    /// Value used when a pass does not override it
    pub default: ParameterValue,
}

impl ParameterDescriptor {
    /// Create a parameter descriptor
    pub fn new(name: impl Into<String>, default: ParameterValue) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

/// A bound parameter: name plus current value
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParameter {
    /// Uniform name
    pub name: String,
    /// Current value
    pub value: ParameterValue,
}

/// Process-unique identifier of a material pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialPassId(pub u32);

static NEXT_PASS_ID: AtomicU32 = AtomicU32::new(1);

/// One use of a material by a renderable
#[derive(Debug)]
pub struct MaterialPass {
    id: MaterialPassId,
    material: Arc<Material>,
    active: AtomicBool,
    parameters: RwLock<Vec<MaterialParameter>>,
}

impl MaterialPass {
    /// Create an active pass bound to `layout`, every parameter at its default
    pub fn new(material: Arc<Material>, layout: &[ParameterDescriptor]) -> Self {
        Self {
            id: MaterialPassId(NEXT_PASS_ID.fetch_add(1, Ordering::Relaxed)),
            material,
            active: AtomicBool::new(true),
            parameters: RwLock::new(bind_layout(layout, &[])),
        }
    }

    /// Create a pass with no parameters
    pub fn without_parameters(material: Arc<Material>) -> Self {
        Self::new(material, &[])
    }

    /// Pass identifier
    pub fn id(&self) -> MaterialPassId {
        self.id
    }

    /// Material used by this pass
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Whether the pass takes part in rendering
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Enable or disable the pass
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Current value of a parameter
    pub fn parameter(&self, name: &str) -> Option<ParameterValue> {
        self.parameters.read().iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Override a parameter
    ///
    /// Returns `false` when the layout has no parameter of that name and kind.
    pub fn set_parameter(&self, name: &str, value: ParameterValue) -> bool {
        let mut parameters = self.parameters.write();
        match parameters.iter_mut().find(|p| p.name == name && p.value.same_kind(&value)) {
            Some(parameter) => {
                parameter.value = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every bound parameter
    pub fn parameters(&self) -> Vec<MaterialParameter> {
        self.parameters.read().clone()
    }

    /// Copy every parameter value from another pass
    ///
    /// Both passes must be bound to the same layout: same names, same kinds,
    /// same order.
    pub fn copy_parameters_from(&self, other: &Self) -> RenderResult<()> {
        if self.id == other.id {
            return Ok(());
        }
        let source = other.parameters.read().clone();
        let mut target = self.parameters.write();

        let compatible = source.len() == target.len()
            && source
                .iter()
                .zip(target.iter())
                .all(|(s, t)| s.name == t.name && s.value.same_kind(&t.value));
        if !compatible {
            return Err(RenderError::MaterialLayoutMismatch {
                source_pass: other.id.0,
                target_pass: self.id.0,
            });
        }

        *target = source;
        Ok(())
    }

    /// Rebind to a new parameter layout
    ///
    /// Overrides whose name and kind still exist are kept; everything else
    /// takes the layout's default.
    pub fn rebuild_bindings(&self, layout: &[ParameterDescriptor]) {
        let mut parameters = self.parameters.write();
        *parameters = bind_layout(layout, &parameters);
    }
}

fn bind_layout(layout: &[ParameterDescriptor], previous: &[MaterialParameter]) -> Vec<MaterialParameter> {
    layout
        .iter()
        .map(|descriptor| {
            let value = previous
                .iter()
                .find(|p| p.name == descriptor.name && p.value.same_kind(&descriptor.default))
                .map_or(descriptor.default, |p| p.value);
            MaterialParameter {
                name: descriptor.name.clone(),
                value,
            }
        })
        .collect()
}
