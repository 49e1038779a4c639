//! Scene demo
//!
//! Builds a small scene of meshes, sprites, labels and particle systems, submits
//! it from worker threads every frame and renders it against the headless
//! backend, logging what each frame drew.

use std::sync::Arc;

use log::{info, warn};
use rand::prelude::*;
use render_scheduler::foundation::logging;
use render_scheduler::prelude::*;
use render_scheduler::render::{BackendCall, BlendingMode, ParameterDescriptor, ParameterValue};

const FRAMES: usize = 4;
const ASTEROIDS: u64 = 48;
const WORKERS: usize = 3;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("submission worker panicked")]
    WorkerPanicked,
}

struct Scene {
    renderables: Vec<RenderableDescriptor>,
    lights: Vec<Light>,
}

fn build_scene(rng: &mut impl Rng) -> Scene {
    let rock = Arc::new(
        Material::new(MaterialId(1), ShaderProgramId(1))
            .with_name("rock")
            .with_diffuse_color(Color::new(0.6, 0.55, 0.5, 1.0)),
    );
    let glass = Arc::new(
        Material::new(MaterialId(2), ShaderProgramId(1))
            .with_name("glass")
            .with_blending(BlendingMode::Alpha),
    );
    let hud = Arc::new(
        Material::new(MaterialId(3), ShaderProgramId(2))
            .with_name("hud")
            .with_flags(MaterialFlags::BATCH_RENDERING)
            .with_blending(BlendingMode::Alpha),
    );
    let sparks = Arc::new(
        Material::new(MaterialId(4), ShaderProgramId(3))
            .with_name("sparks")
            .with_blending(BlendingMode::Additive),
    );
    let rock_layout = [ParameterDescriptor::new("uShininess", ParameterValue::Float(16.0))];

    let mut renderables = Vec::new();
    let mut next_id = 0u64;
    let mut id = || {
        next_id += 1;
        RenderableId(next_id)
    };

    let cube = Arc::new(GeometryData::quad(8));
    for i in 0..ASTEROIDS {
        let position = Vec3::new(rng.gen_range(-20.0..20.0), rng.gen_range(-5.0..5.0), rng.gen_range(-40.0..-5.0));
        let settings = MeshSettings {
            dynamic_shadows: DynamicShadows::CAST | DynamicShadows::RECEIVE,
            transparent: i % 8 == 0,
        };
        let material = if settings.transparent { &glass } else { &rock };
        renderables.push(
            RenderableDescriptor::new(id(), RenderableKind::Mesh(settings), Arc::clone(&cube))
                .with_geometry_kind(GeometryKind::Static)
                .with_priority(rng.gen_range(0..4))
                .with_transform(Mat4::new_translation(&position))
                .with_pass(Arc::new(MaterialPass::new(Arc::clone(material), &rock_layout))),
        );
    }

    let quad = Arc::new(GeometryData::quad(5));
    let background = Arc::new(Material::new(MaterialId(5), ShaderProgramId(2)).with_name("starfield"));
    renderables.push(
        RenderableDescriptor::sprite(id(), SpriteLayer::Pre3D, Arc::clone(&quad))
            .with_mode(RenderingMode::TwoD)
            .with_pass(Arc::new(MaterialPass::without_parameters(background))),
    );

    for slot in 0..6 {
        let offset = Mat4::new_translation(&Vec3::new(-0.9 + 0.15 * slot as f32, 0.9, 0.0)) * Mat4::new_scaling(0.1);
        renderables.push(
            RenderableDescriptor::sprite(id(), SpriteLayer::Gui, Arc::clone(&quad))
                .with_mode(RenderingMode::TwoD)
                .with_transform(offset)
                .with_ui_element(UiElement::Screen { alpha_in_hierarchy: 1.0 })
                .with_pass(Arc::new(MaterialPass::without_parameters(Arc::clone(&hud)))),
        );
    }

    let score = RenderableDescriptor::new(
        id(),
        RenderableKind::Label {
            layer: SpriteLayer::Gui,
            font_texture: Some(TextureId(10)),
        },
        Arc::new(GeometryData::quad(9)),
    )
    .with_transform(Mat4::new_translation(&Vec3::new(0.0, 2.0, -6.0)))
    .with_ui_element(UiElement::Canvas { canvas_index: 0, alpha_in_hierarchy: 0.8 })
    .with_pass(Arc::new(MaterialPass::without_parameters(Arc::clone(&hud))));
    renderables.push(score);

    for _ in 0..3 {
        let position = Vec3::new(rng.gen_range(-10.0..10.0), 0.0, rng.gen_range(-30.0..-10.0));
        renderables.push(
            RenderableDescriptor::new(
                id(),
                RenderableKind::ParticleSystem { dynamic_shadows: false },
                Arc::new(GeometryData::quad(9)),
            )
            .with_transform(Mat4::new_translation(&position))
            .with_pass(Arc::new(MaterialPass::without_parameters(Arc::clone(&sparks)))),
        );
    }

    let lights = vec![
        Light::directional(Vec3::new(0.0, 30.0, 0.0), Vec3::new(0.2, -1.0, -0.3), Vec3::new(1.0, 0.95, 0.9), 1.0),
        Light::point(Vec3::new(0.0, 3.0, -10.0), Vec3::new(1.0, 0.4, 0.1), 2.0, 15.0),
    ];

    Scene { renderables, lights }
}

fn submit_scene(submitter: &Submitter, scene: &Scene) -> Result<(), DemoError> {
    let chunk_size = scene.renderables.len().div_ceil(WORKERS).max(1);

    std::thread::scope(|scope| -> Result<(), DemoError> {
        let workers: Vec<_> = scene
            .renderables
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let submitter = submitter.clone();
                scope.spawn(move || -> Result<(), RenderError> {
                    for (offset, renderable) in chunk.iter().enumerate() {
                        let index = u32::try_from(chunk_index * chunk_size + offset).unwrap_or(u32::MAX);
                        submitter.submit(renderable, index)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for worker in workers {
            worker.join().map_err(|_| DemoError::WorkerPanicked)??;
        }
        Ok(())
    })?;

    for light in &scene.lights {
        submitter.submit_light(light.clone());
    }
    submitter.setup_ui_canvas(0, Vec3::new(0.0, 2.0, -6.0), CanvasSettings::empty());
    Ok(())
}

fn main() -> Result<(), DemoError> {
    logging::init_with_filter("info");

    let config = RenderSystemConfig::load_or_default("render_scheduler.toml")?;
    let mut renderer = RenderSystem::new(config)?;
    let mut backend = HeadlessBackend::new();
    let scene_settings = SceneSettings::default();
    let mut rng = StdRng::seed_from_u64(7);
    let scene = build_scene(&mut rng);

    renderer.set_active_camera(Some(CameraState::perspective(
        Vec3::new(0.0, 4.0, 10.0),
        Vec3::new(0.0, 0.0, -20.0),
        std::f32::consts::FRAC_PI_3,
        renderer.config().aspect_ratio,
        0.1,
        200.0,
    )));
    renderer.set_ambient_light_color(Color::new(0.1, 0.1, 0.15, 1.0));
    info!("Scene built: {} renderables, {} lights", scene.renderables.len(), scene.lights.len());

    let submitter = renderer.submitter();
    for frame in 0..FRAMES {
        if frame == FRAMES - 1 {
            submitter.request_shaders_reload();
        }
        submit_scene(&submitter, &scene)?;

        backend.clear_calls();
        let stats = renderer.render_frame(&mut backend, Some(&scene_settings))?;
        let uploads = backend.count(|call| matches!(call, BackendCall::UploadGeometry(_)));

        info!(
            "Frame {}: {} draws ({} shadow), {} batches merging {} renderables, {} buffer uploads, {:?}",
            frame,
            stats.draw_calls,
            stats.shadow_draw_calls,
            stats.batches,
            stats.batched_renderables,
            uploads,
            stats.frame_time
        );
        if !stats.shadow_pass {
            warn!("Frame {frame} rendered without a shadow pass");
        }
    }

    info!("Rendered {} frames, last at {:.1} fps", renderer.frame_count(), renderer.fps());
    Ok(())
}
