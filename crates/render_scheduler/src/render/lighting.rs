//! Lighting system
//!
//! Lights are submitted every frame like renderables. The first queued light
//! drives the shadow pass when it is directional.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// World position; for directional lights, where the shadow camera sits
    pub position: Vec3,
    /// Light direction (for directional/spot lights)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Light range (for point/spot lights)
    pub range: f32,
    /// Whether the owning entity is active in the hierarchy
    pub active: bool,
}

impl Light {
    /// Create a directional light shining from `position` along `direction`
    pub fn directional(position: Vec3, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range: 0.0,
            active: true,
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: Vec3::zeros(),
            color,
            intensity,
            range,
            active: true,
        }
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range,
            active: true,
        }
    }

    /// Set the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether this is a directional light
    pub fn is_directional(&self) -> bool {
        self.light_type == LightType::Directional
    }

    /// View-projection of the shadow camera for this light
    ///
    /// Looks from the light position along its direction with an orthographic
    /// box extending `max_shadow_distance` on every axis.
    pub fn shadow_view_projection(&self, max_shadow_distance: f32) -> Mat4 {
        let d = max_shadow_distance;
        let projection = Mat4::orthographic(-d, d, -d, d, -d, d);
        let view = Mat4::look_at(self.position, self.position + self.direction, Vec3::y());
        projection * view
    }
}

/// Lights queued for the current frame, in submission order
#[derive(Debug, Clone, Default)]
pub struct LightList {
    lights: Vec<Light>,
}

impl LightList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a light; inactive lights are ignored
    pub fn push(&mut self, light: Light) -> bool {
        if !light.active {
            return false;
        }
        self.lights.push(light);
        true
    }

    /// First queued light
    pub fn first(&self) -> Option<&Light> {
        self.lights.first()
    }

    /// First queued light, if it can drive the shadow pass
    pub fn shadow_light(&self) -> Option<&Light> {
        self.first().filter(|light| light.is_directional())
    }

    /// Queued lights
    pub fn as_slice(&self) -> &[Light] {
        &self.lights
    }

    /// Number of queued lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether no light is queued
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Drop every queued light
    pub fn clear(&mut self) {
        self.lights.clear();
    }
}
