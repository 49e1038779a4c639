//! Math utilities and types
//!
//! Provides the math types used by the scheduler: world transforms, camera and
//! light matrices, and the vertex-position baking done for batched geometry.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix4,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Threshold below which an alpha value counts as fully transparent
pub const EPSILON: f32 = 1e-6;

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color from its four channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Component-wise product of two colors
    pub fn modulate(&self, other: &Self) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    /// Same color with the alpha channel scaled
    pub fn with_alpha_scaled(mut self, factor: f32) -> Self {
        self.a *= factor;
        self
    }

    /// Channels as an array, the layout shaders expect
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// World-space translation stored in the last column of a transform
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Transform a raw `[x, y, z]` position by a world matrix
pub fn transform_position(matrix: &Mat4, position: [f32; 3]) -> [f32; 3] {
    let point = matrix.transform_point(&Point3::new(position[0], position[1], position[2]));
    [point.x, point.y, point.z]
}

/// Extension trait for Mat4 with the projections the scheduler needs
pub trait Mat4Ext {
    /// Create a right-handed look-at view matrix
    ///
    /// Falls back to +Z as the up vector when `up` is parallel to the view direction.
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Orthographic view-projection used for screen-space (2D) geometry
    fn screen_space(aspect_ratio: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let direction = target - eye;
        let up = if direction.cross(&up).norm_squared() < EPSILON {
            Vec3::z()
        } else {
            up
        };

        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn screen_space(aspect_ratio: f32) -> Mat4 {
        let projection = Self::orthographic(-1.0, 1.0, -aspect_ratio, aspect_ratio, 0.1, 100.0);
        let view = Self::look_at(Vec3::z(), Vec3::zeros(), Vec3::y());
        projection * view
    }
}
