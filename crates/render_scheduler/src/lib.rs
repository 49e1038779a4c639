//! # Render Scheduler
//!
//! Per-frame render queues, geometry batching and pass scheduling for a 2D/3D
//! engine. The scene layer submits drawable components every frame; the
//! scheduler decides what is drawn, in which order, from which shared buffer
//! ranges, and hands the resulting draws to a graphics backend.
//!
//! ## Features
//!
//! - **Composite Sort Keys**: priority, then submission order, then pass
//! - **Shared Geometry Buffers**: one fixed-capacity arena per geometry group,
//!   with static geometry cached across frames
//! - **Batching**: draws sharing a batchable material merge into one draw call
//! - **Fixed Pass Order**: shadow, opaque, transparent, UI, debug
//! - **Concurrent Submission**: cloneable `Submitter` handles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use render_scheduler::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut renderer = RenderSystem::new(RenderSystemConfig::default())?;
//!     let mut backend = HeadlessBackend::new();
//!
//!     let material = Arc::new(Material::new(MaterialId(1), ShaderProgramId(1)));
//!     let pass = Arc::new(MaterialPass::without_parameters(material));
//!     let quad = Arc::new(GeometryData::quad(5));
//!     let sprite = RenderableDescriptor::sprite(RenderableId(1), SpriteLayer::Gui, quad)
//!         .with_mode(RenderingMode::TwoD)
//!         .with_pass(pass);
//!
//!     renderer.submit(&sprite, 0)?;
//!     let stats = renderer.render_frame(&mut backend, None)?;
//!     assert_eq!(stats.draw_calls, 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for scheduler users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RenderSystemConfig},
        foundation::math::{Color, Mat4, Vec3},
        render::{
            CameraState, CanvasSettings, DynamicShadows, FrameStats, GeometryData, GeometryGroup, GeometryKind,
            GraphicsBackend, HeadlessBackend, Light, Material, MaterialFlags, MaterialId, MaterialPass, MeshSettings,
            RenderError, RenderResult, RenderSystem, RenderableDescriptor, RenderableId, RenderableKind,
            RenderingMode, SceneSettings, ShaderProgramId, SpriteLayer, Submitter, TextureId, UiElement,
        },
    };
}
