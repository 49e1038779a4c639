//! # Renderable Descriptors
//!
//! What the scene layer hands the scheduler every frame. A descriptor is a
//! read-only view of one drawable component: its kind, geometry, material
//! passes, visibility, priority and transform. The scheduler never keeps a
//! reference to it past the `submit` call.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Serialize, Deserialize};

use crate::foundation::math::{Color, Mat4};
use crate::render::geometry::{GeometryData, GeometryKind};
use crate::render::material::{MaterialPass, TextureId};

/// Stable identity of a renderable across frames
///
/// Used as the key of the static geometry cache, so it must not be reused by
/// another renderable while cached geometry exists for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderableId(pub u64);

/// Whether a renderable is drawn in world space or screen space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderingMode {
    /// Screen-space drawing with the 2D projection
    TwoD,
    /// World-space drawing through the active camera
    #[default]
    ThreeD,
}

/// Layer of sprites and labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpriteLayer {
    /// User interface, drawn with the UI passes
    #[default]
    Gui,
    /// Background, drawn before any 3D content
    Pre3D,
    /// Overlay, drawn after the 2D user interface
    PostUi,
}

bitflags! {
    /// Shadow participation of a mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DynamicShadows: u8 {
        /// Rendered into the shadow map
        const CAST = 1 << 0;
        /// Samples the shadow map when drawn
        const RECEIVE = 1 << 1;
    }
}

/// Mesh-specific settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshSettings {
    /// Shadow participation
    pub dynamic_shadows: DynamicShadows,
    /// Drawn back-to-front with the transparent list
    pub transparent: bool,
}

/// Kind of drawable component, with its kind-specific settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableKind {
    /// Triangle mesh
    Mesh(MeshSettings),
    /// Textured quad
    Sprite {
        /// Layer the sprite is drawn in
        layer: SpriteLayer,
    },
    /// Text label
    Label {
        /// Layer the label is drawn in
        layer: SpriteLayer,
        /// Glyph atlas, bound instead of the material's diffuse texture
        font_texture: Option<TextureId>,
    },
    /// Particle system
    ParticleSystem {
        /// Particles are drawn into the shadow map (3D only)
        dynamic_shadows: bool,
    },
}

impl RenderableKind {
    /// Short name used in log messages
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "mesh",
            Self::Sprite { .. } => "sprite",
            Self::Label { .. } => "label",
            Self::ParticleSystem { .. } => "particle system",
        }
    }
}

/// UI element the renderable is parented under
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiElement {
    /// Screen-space element
    Screen {
        /// Opacity multiplied down the UI hierarchy
        alpha_in_hierarchy: f32,
    },
    /// Element living on a world-space canvas
    Canvas {
        /// Canvas slot
        canvas_index: usize,
        /// Opacity multiplied down the UI hierarchy
        alpha_in_hierarchy: f32,
    },
}

impl UiElement {
    /// Opacity multiplied down the UI hierarchy
    pub const fn alpha_in_hierarchy(&self) -> f32 {
        match *self {
            Self::Screen { alpha_in_hierarchy } | Self::Canvas { alpha_in_hierarchy, .. } => alpha_in_hierarchy,
        }
    }
}

/// Per-frame view of one drawable component
#[derive(Debug, Clone)]
pub struct RenderableDescriptor {
    /// Owner identity
    pub id: RenderableId,
    /// Kind and kind-specific settings
    pub kind: RenderableKind,
    /// Whether geometry may be cached across frames
    pub geometry_kind: GeometryKind,
    /// Raw geometry
    pub geometry: Arc<GeometryData>,
    /// Material passes, drawn in order
    pub material_passes: Vec<Arc<MaterialPass>>,
    /// Visibility flag of the component
    pub visible: bool,
    /// Whether the owner and all of its ancestors are active
    pub active_in_hierarchy: bool,
    /// Dominant term of the sort key
    pub render_priority: u8,
    /// 2D or 3D
    pub rendering_mode: RenderingMode,
    /// World transform of the owner
    pub world_transform: Mat4,
    /// Tint multiplied with the material's diffuse color
    pub color: Color,
    /// UI element the owner is parented under, if any
    pub ui_element: Option<UiElement>,
    /// Editor-only helper geometry
    pub debug_geometry: bool,
}

impl RenderableDescriptor {
    /// Create a visible, active descriptor with default settings
    pub fn new(id: RenderableId, kind: RenderableKind, geometry: Arc<GeometryData>) -> Self {
        Self {
            id,
            kind,
            geometry_kind: GeometryKind::Dynamic,
            geometry,
            material_passes: Vec::new(),
            visible: true,
            active_in_hierarchy: true,
            render_priority: 0,
            rendering_mode: RenderingMode::ThreeD,
            world_transform: Mat4::identity(),
            color: Color::WHITE,
            ui_element: None,
            debug_geometry: false,
        }
    }

    /// Opaque mesh
    pub fn mesh(id: RenderableId, geometry: Arc<GeometryData>) -> Self {
        Self::new(id, RenderableKind::Mesh(MeshSettings::default()), geometry)
    }

    /// Sprite in the given layer
    pub fn sprite(id: RenderableId, layer: SpriteLayer, geometry: Arc<GeometryData>) -> Self {
        Self::new(id, RenderableKind::Sprite { layer }, geometry)
    }

    /// Label in the given layer
    pub fn label(id: RenderableId, layer: SpriteLayer, geometry: Arc<GeometryData>) -> Self {
        Self::new(id, RenderableKind::Label { layer, font_texture: None }, geometry)
    }

    /// Particle system
    pub fn particle_system(id: RenderableId, geometry: Arc<GeometryData>) -> Self {
        Self::new(id, RenderableKind::ParticleSystem { dynamic_shadows: false }, geometry)
    }

    /// Append a material pass
    pub fn with_pass(mut self, pass: Arc<MaterialPass>) -> Self {
        self.material_passes.push(pass);
        self
    }

    /// Set the geometry kind
    pub fn with_geometry_kind(mut self, geometry_kind: GeometryKind) -> Self {
        self.geometry_kind = geometry_kind;
        self
    }

    /// Set the render priority
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.render_priority = priority;
        self
    }

    /// Set the rendering mode
    pub fn with_mode(mut self, mode: RenderingMode) -> Self {
        self.rendering_mode = mode;
        self
    }

    /// Set the world transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.world_transform = transform;
        self
    }

    /// Set the tint color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Parent the renderable under a UI element
    pub fn with_ui_element(mut self, element: UiElement) -> Self {
        self.ui_element = Some(element);
        self
    }

    /// Set the visibility flag
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the active-in-hierarchy flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active_in_hierarchy = active;
        self
    }

    /// Mark as editor helper geometry
    pub fn with_debug_geometry(mut self) -> Self {
        self.debug_geometry = true;
        self
    }

    /// Mesh settings, when this is a mesh
    pub fn mesh_settings(&self) -> Option<&MeshSettings> {
        match &self.kind {
            RenderableKind::Mesh(settings) => Some(settings),
            _ => None,
        }
    }
}
