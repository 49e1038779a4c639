//! # Render System Configuration
//!
//! Capacities and constants the scheduler is built with. Every field has a
//! default, so partial TOML/RON files are accepted.

use serde::{Serialize, Deserialize};

use super::{Config, ConfigError};

/// Default size of each group's vertex buffer in bytes
pub const DEFAULT_VERTEX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Default size of each group's index buffer in bytes
pub const DEFAULT_INDEX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Default number of floats a batch scratch block can hold
pub const DEFAULT_BATCH_VERTEX_FLOATS: usize = 1024 * 1024;

/// Default number of indices a batch scratch block can hold
pub const DEFAULT_BATCH_INDEX_COUNT: usize = 256 * 1024;

/// Default number of world-space UI canvas slots
pub const DEFAULT_UI_CANVAS_COUNT: usize = 8;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSystemConfig {
    /// Vertex buffer capacity per geometry group, in bytes
    pub vertex_buffer_size: usize,
    /// Index buffer capacity per geometry group, in bytes
    pub index_buffer_size: usize,
    /// Vertex scratch capacity per batch, in floats
    pub batch_vertex_floats: usize,
    /// Index scratch capacity per batch
    pub batch_index_count: usize,
    /// Number of world-space UI canvas slots
    pub ui_canvas_count: usize,
    /// Shadow map resolution handed to the backend
    pub shadow_map_size: u32,
    /// Screen aspect ratio used by the 2D projection
    pub aspect_ratio: f32,
}

impl RenderSystemConfig {
    /// Set per-group buffer capacities in bytes
    pub fn with_buffer_sizes(mut self, vertex_bytes: usize, index_bytes: usize) -> Self {
        self.vertex_buffer_size = vertex_bytes;
        self.index_buffer_size = index_bytes;
        self
    }

    /// Set batch scratch capacities
    pub fn with_batch_capacity(mut self, vertex_floats: usize, index_count: usize) -> Self {
        self.batch_vertex_floats = vertex_floats;
        self.batch_index_count = index_count;
        self
    }

    /// Set the number of world-space UI canvas slots
    pub fn with_ui_canvas_count(mut self, count: usize) -> Self {
        self.ui_canvas_count = count;
        self
    }

    /// Set the aspect ratio used by the 2D projection
    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ui_canvas_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ui_canvas_count",
                reason: "at least one canvas slot is required".to_string(),
            });
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "aspect_ratio",
                reason: format!("{} is not a positive finite number", self.aspect_ratio),
            });
        }
        if self.shadow_map_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "shadow_map_size",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RenderSystemConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_size: DEFAULT_VERTEX_BUFFER_SIZE,
            index_buffer_size: DEFAULT_INDEX_BUFFER_SIZE,
            batch_vertex_floats: DEFAULT_BATCH_VERTEX_FLOATS,
            batch_index_count: DEFAULT_BATCH_INDEX_COUNT,
            ui_canvas_count: DEFAULT_UI_CANVAS_COUNT,
            shadow_map_size: 1024,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

impl Config for RenderSystemConfig {}
