//! # Render Queue Classification
//!
//! Decides, for one submitted renderable, whether it is drawn at all, which
//! geometry group its geometry lives in and which queue its operations go to.
//! Pure functions of the descriptor; no scheduler state is touched here.

use crate::foundation::math::EPSILON;
use crate::render::geometry::{GeometryGroup, GeometryKind};
use crate::render::render_queue::{QueueDestination, RenderOperationFlags};
use crate::render::renderable::{
    DynamicShadows, RenderableDescriptor, RenderableKind, RenderingMode, SpriteLayer, UiElement,
};

/// Why a submission was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Visibility flag cleared
    NotVisible,
    /// Owner or an ancestor inactive
    Inactive,
    /// No material pass to draw with
    NoMaterialPasses,
    /// Geometry has no indices or no vertex positions
    NoGeometry,
    /// Parent UI element fully transparent
    Transparent,
    /// 3D content with no camera to render it through
    NoActiveCamera,
}

/// Check the guard clauses of a submission
///
/// `None` means the renderable is drawn.
pub fn rejection(renderable: &RenderableDescriptor, has_active_camera: bool) -> Option<Rejection> {
    if !renderable.visible {
        return Some(Rejection::NotVisible);
    }
    if !renderable.active_in_hierarchy {
        return Some(Rejection::Inactive);
    }
    if renderable.material_passes.is_empty() {
        return Some(Rejection::NoMaterialPasses);
    }
    if !renderable.geometry.is_drawable() {
        return Some(Rejection::NoGeometry);
    }
    if renderable
        .ui_element
        .is_some_and(|element| element.alpha_in_hierarchy() < EPSILON)
    {
        return Some(Rejection::Transparent);
    }
    if renderable.rendering_mode == RenderingMode::ThreeD && !has_active_camera {
        return Some(Rejection::NoActiveCamera);
    }
    None
}

/// Group holding a standalone renderable's geometry
pub fn geometry_group(kind: &RenderableKind, geometry_kind: GeometryKind) -> GeometryGroup {
    match (kind, geometry_kind) {
        (RenderableKind::Mesh(_), GeometryKind::Static) => GeometryGroup::MeshStatic,
        (RenderableKind::Mesh(_), GeometryKind::Dynamic) => GeometryGroup::MeshDynamic,
        (RenderableKind::Sprite { .. }, GeometryKind::Static) => GeometryGroup::SpriteStatic,
        (RenderableKind::Sprite { .. }, GeometryKind::Dynamic) => GeometryGroup::SpriteDynamic,
        (RenderableKind::Label { .. }, _) => GeometryGroup::Label,
        (RenderableKind::ParticleSystem { .. }, _) => GeometryGroup::Particles,
    }
}

/// Batch group for a kind; particle systems are never batched
pub fn batch_group(kind: &RenderableKind) -> Option<GeometryGroup> {
    match kind {
        RenderableKind::Mesh(_) => Some(GeometryGroup::MeshBatch),
        RenderableKind::Sprite { .. } => Some(GeometryGroup::SpriteBatch),
        RenderableKind::Label { .. } => Some(GeometryGroup::LabelBatch),
        RenderableKind::ParticleSystem { .. } => None,
    }
}

/// Queue a finalized batch is drained from
pub fn batch_destination(group: GeometryGroup) -> QueueDestination {
    if group == GeometryGroup::MeshBatch {
        QueueDestination::Opaque
    } else {
        QueueDestination::Ui2D
    }
}

/// Where a standalone renderable goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Queue its operations are pushed to
    pub destination: QueueDestination,
    /// Group holding its geometry
    pub group: GeometryGroup,
    /// Draw flags of its operations
    pub flags: RenderOperationFlags,
    /// Mesh rendered into the shadow map
    pub casts_shadow: bool,
    /// Particle system rendered into the shadow map
    pub shadowed_particles: bool,
}

/// Classify a standalone renderable
///
/// `geometry_kind` is the effective kind: renderables that were batched are
/// forced dynamic regardless of their descriptor.
pub fn classify(renderable: &RenderableDescriptor, geometry_kind: GeometryKind) -> Classification {
    let three_d = renderable.rendering_mode == RenderingMode::ThreeD;
    let mut flags = RenderOperationFlags::empty();
    flags.set(RenderOperationFlags::RENDER_THROUGH_ACTIVE_CAMERA, three_d);

    let mut casts_shadow = false;
    let mut shadowed_particles = false;

    let destination = match &renderable.kind {
        RenderableKind::Mesh(settings) => {
            casts_shadow = settings.dynamic_shadows.contains(DynamicShadows::CAST);
            flags.insert(RenderOperationFlags::LIGHTING_SUPPORT);
            flags.set(
                RenderOperationFlags::BIND_SHADOW_MAP,
                settings.dynamic_shadows.contains(DynamicShadows::RECEIVE),
            );

            debug_destination(renderable).unwrap_or(match renderable.ui_element {
                Some(element) => ui_destination(element),
                None if settings.transparent => QueueDestination::Transparent,
                None => QueueDestination::Opaque,
            })
        }
        RenderableKind::Sprite { layer } => debug_destination(renderable).unwrap_or(match layer {
            SpriteLayer::Gui => match renderable.ui_element {
                Some(element @ UiElement::Canvas { .. }) => ui_destination(element),
                _ => QueueDestination::Ui2D,
            },
            SpriteLayer::Pre3D => QueueDestination::Pre3D,
            SpriteLayer::PostUi => QueueDestination::PostUi,
        }),
        RenderableKind::Label { layer, .. } => debug_destination(renderable).unwrap_or(match layer {
            SpriteLayer::Gui => renderable
                .ui_element
                .map_or(QueueDestination::Labels3D, ui_destination),
            SpriteLayer::Pre3D => QueueDestination::Pre3D,
            SpriteLayer::PostUi => QueueDestination::PostUi,
        }),
        RenderableKind::ParticleSystem { dynamic_shadows } => {
            shadowed_particles = *dynamic_shadows && three_d;
            match renderable.ui_element {
                Some(element) => ui_destination(element),
                None if !three_d => QueueDestination::Ui2D,
                None => QueueDestination::Transparent,
            }
        }
    };

    Classification {
        destination,
        group: geometry_group(&renderable.kind, geometry_kind),
        flags,
        casts_shadow,
        shadowed_particles,
    }
}

fn ui_destination(element: UiElement) -> QueueDestination {
    match element {
        UiElement::Screen { .. } => QueueDestination::Ui2D,
        UiElement::Canvas { canvas_index, .. } => QueueDestination::Canvas(canvas_index),
    }
}

#[cfg(feature = "editor")]
fn debug_destination(renderable: &RenderableDescriptor) -> Option<QueueDestination> {
    renderable.debug_geometry.then_some(QueueDestination::Debug)
}

#[cfg(not(feature = "editor"))]
fn debug_destination(_renderable: &RenderableDescriptor) -> Option<QueueDestination> {
    None
}
