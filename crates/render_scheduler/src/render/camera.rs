//! Active camera and scene-wide render settings

use serde::{Serialize, Deserialize};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Snapshot of the camera 3D content is rendered through
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// World position, used for distance sorting
    pub position: Vec3,
    /// View matrix
    pub view: Mat4,
    /// Projection matrix
    pub projection: Mat4,
}

impl CameraState {
    /// Create a camera from explicit matrices
    pub fn new(position: Vec3, view: Mat4, projection: Mat4) -> Self {
        Self {
            position,
            view,
            projection,
        }
    }

    /// Perspective camera at `position` looking at `target`
    pub fn perspective(position: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            view: Mat4::look_at(position, target, Vec3::y()),
            projection: Mat4::new_perspective(aspect, fov_y, near, far),
        }
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Settings of the active scene that affect rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Half extent of the shadow camera's box
    pub max_shadow_distance: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            max_shadow_distance: 50.0,
        }
    }
}
