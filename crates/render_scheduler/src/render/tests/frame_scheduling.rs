//! Frame-level tests of the render system against the headless backend
//!
//! Each test submits a small scene, renders one or two frames and checks the
//! recorded backend calls.

use std::sync::Arc;

use crate::config::RenderSystemConfig;
use crate::foundation::math::{translation_of, Color, Mat4, Vec3};
use crate::render::{
    BackendCall, CameraState, CanvasSettings, DynamicShadows, GeometryData, GeometryGroup, GeometryKind,
    HeadlessBackend, Light, LightType, Material, MaterialFlags, MaterialId, MaterialPass, MeshSettings,
    ParameterDescriptor, ParameterValue, RenderError, RenderSystem, RenderableDescriptor, RenderableId,
    RenderableKind, RenderingMode, SceneSettings, ShaderProgramId, SpriteLayer, TextureId, UiCanvasEntry, UiElement,
};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pass(material: u32) -> Arc<MaterialPass> {
        let material = Material::new(MaterialId(material), ShaderProgramId(1));
        Arc::new(MaterialPass::without_parameters(Arc::new(material)))
    }

    fn batch_pass(material: u32) -> Arc<MaterialPass> {
        let material = Material::new(MaterialId(material), ShaderProgramId(1)).with_flags(MaterialFlags::BATCH_RENDERING);
        Arc::new(MaterialPass::without_parameters(Arc::new(material)))
    }

    fn camera_at_origin() -> CameraState {
        CameraState::new(Vec3::zeros(), Mat4::identity(), Mat4::identity())
    }

    fn renderer_with_camera() -> RenderSystem {
        let renderer = RenderSystem::with_defaults();
        renderer.set_active_camera(Some(camera_at_origin()));
        renderer
    }

    fn opaque_mesh(id: u64, material: u32) -> RenderableDescriptor {
        RenderableDescriptor::mesh(RenderableId(id), Arc::new(GeometryData::quad(8))).with_pass(pass(material))
    }

    fn gui_sprite(id: u64, material: u32) -> RenderableDescriptor {
        RenderableDescriptor::sprite(RenderableId(id), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_pass(pass(material))
    }

    fn particles_at(id: u64, position: Vec3) -> RenderableDescriptor {
        RenderableDescriptor::particle_system(RenderableId(id), Arc::new(GeometryData::quad(9)))
            .with_transform(Mat4::new_translation(&position))
            .with_pass(pass(50))
    }

    fn canvas_label(id: u64, canvas_index: usize, material: u32) -> RenderableDescriptor {
        RenderableDescriptor::label(RenderableId(id), SpriteLayer::Gui, Arc::new(GeometryData::quad(9)))
            .with_ui_element(UiElement::Canvas {
                canvas_index,
                alpha_in_hierarchy: 1.0,
            })
            .with_pass(pass(material))
    }

    fn drawn_materials(backend: &HeadlessBackend) -> Vec<MaterialId> {
        backend.draws().iter().map(|draw| draw.material).collect()
    }

    #[test]
    fn test_invisible_submission_changes_nothing() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let submitter = renderer.submitter();

        let hidden = opaque_mesh(1, 1).with_visible(false);
        let inactive = opaque_mesh(2, 1).with_active(false);
        let no_passes = RenderableDescriptor::mesh(RenderableId(3), Arc::new(GeometryData::quad(8)));
        let empty = RenderableDescriptor::mesh(RenderableId(4), Arc::new(GeometryData::default())).with_pass(pass(1));

        for (index, renderable) in [hidden, inactive, no_passes, empty].iter().enumerate() {
            renderer.submit(renderable, index as u32).unwrap();
        }

        assert_eq!(submitter.queued_operations(), 0);
        assert_eq!(submitter.dynamic_geometry_info(RenderableId(1)), None);
        assert_eq!(submitter.vertex_cursor(GeometryGroup::MeshDynamic), 0);

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_transparent_ui_parent_is_skipped() {
        let renderer = RenderSystem::with_defaults();
        let faded = gui_sprite(1, 1).with_ui_element(UiElement::Screen { alpha_in_hierarchy: 0.0 });

        renderer.submit(&faded, 0).unwrap();
        assert_eq!(renderer.submitter().queued_operations(), 0);
    }

    #[test]
    fn test_3d_content_without_camera_is_dropped() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
        renderer.submit(&gui_sprite(2, 2), 1).unwrap();
        assert_eq!(renderer.submitter().queued_operations(), 1);

        renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(drawn_materials(&backend), vec![MaterialId(2)]);
    }

    #[test]
    fn test_priority_dominates_submission_order() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&opaque_mesh(1, 10).with_priority(10), 0).unwrap();
        renderer.submit(&opaque_mesh(2, 5).with_priority(5), 1).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(drawn_materials(&backend), vec![MaterialId(10), MaterialId(5)]);
    }

    #[test]
    fn test_equal_priority_drains_in_descending_key_order() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
        renderer.submit(&opaque_mesh(2, 2), 1).unwrap();
        renderer.submit(&opaque_mesh(3, 3), 2).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(drawn_materials(&backend), vec![MaterialId(3), MaterialId(2), MaterialId(1)]);
    }

    #[test]
    fn test_every_material_pass_is_drawn() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        let outlined = opaque_mesh(1, 1).with_pass(pass(2));
        renderer.submit(&outlined, 0).unwrap();
        let stats = renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(stats.draw_calls, 2);
        // both passes share one geometry registration
        let draws = backend.draws();
        assert_eq!(draws[0].vertex_offset, draws[1].vertex_offset);
        assert_eq!(backend.count(|call| matches!(call, BackendCall::BindMaterialState(_))), 2);
    }

    #[test]
    fn test_inactive_pass_is_skipped() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        let disabled = pass(2);
        disabled.set_active(false);
        renderer.submit(&opaque_mesh(1, 1).with_pass(disabled), 0).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(drawn_materials(&backend), vec![MaterialId(1)]);
    }

    #[test]
    fn test_pass_order_pre_3d_then_3d_then_ui() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        let background = RenderableDescriptor::sprite(RenderableId(3), SpriteLayer::Pre3D, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_pass(pass(3));
        let overlay = RenderableDescriptor::sprite(RenderableId(4), SpriteLayer::PostUi, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_pass(pass(4));

        renderer.submit(&overlay, 0).unwrap();
        renderer.submit(&gui_sprite(2, 2), 1).unwrap();
        renderer.submit(&opaque_mesh(1, 1), 2).unwrap();
        renderer.submit(&background, 3).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(
            drawn_materials(&backend),
            vec![MaterialId(3), MaterialId(1), MaterialId(2), MaterialId(4)]
        );
    }

    #[test]
    fn test_transparent_particles_drain_back_to_front() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&particles_at(1, Vec3::new(0.0, 0.0, -3.0)), 0).unwrap();
        renderer.submit(&particles_at(2, Vec3::new(0.0, 0.0, -10.0)), 1).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        let distances: Vec<f32> = backend
            .draws()
            .iter()
            .map(|draw| translation_of(&draw.world).norm())
            .collect();
        assert_eq!(distances.len(), 2);
        assert_relative_eq!(distances[0], 10.0);
        assert_relative_eq!(distances[1], 3.0);
    }

    #[test]
    fn test_transparent_meshes_drain_back_to_front() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let glass = MeshSettings {
            transparent: true,
            ..MeshSettings::default()
        };

        for (index, z) in [-2.0f32, -8.0, -5.0].into_iter().enumerate() {
            let mesh = RenderableDescriptor::new(
                RenderableId(index as u64),
                RenderableKind::Mesh(glass),
                Arc::new(GeometryData::quad(8)),
            )
            .with_transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))
            .with_pass(pass(1));
            renderer.submit(&mesh, index as u32).unwrap();
        }
        renderer.render_frame(&mut backend, None).unwrap();

        let depths: Vec<f32> = backend.draws().iter().map(|draw| translation_of(&draw.world).z).collect();
        assert_eq!(depths, vec![-8.0, -5.0, -2.0]);
    }

    #[test]
    fn test_batch_merges_sprites_into_one_draw() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let material = batch_pass(7);

        for id in 0..3u64 {
            let sprite = RenderableDescriptor::sprite(RenderableId(id), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
                .with_mode(RenderingMode::TwoD)
                .with_transform(Mat4::new_translation(&Vec3::new(id as f32, 0.0, 0.0)))
                .with_pass(Arc::clone(&material));
            renderer.submit(&sprite, id as u32).unwrap();
        }
        renderer.submit(&gui_sprite(10, 1), 3).unwrap();

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.batched_renderables, 3);
        assert_eq!(stats.draw_calls, 2);

        let batch = backend
            .draws()
            .into_iter()
            .find(|draw| draw.group == GeometryGroup::SpriteBatch)
            .cloned()
            .unwrap();
        assert_eq!(batch.material, MaterialId(7));
        assert_eq!(batch.index_count, 18);
        assert_eq!(batch.world, Mat4::identity());
        assert_eq!(batch.color, Color::WHITE);
    }

    #[test]
    fn test_batch_uploads_merged_geometry() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let material = batch_pass(7);

        for id in 0..4u64 {
            let sprite = RenderableDescriptor::sprite(RenderableId(id), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
                .with_mode(RenderingMode::TwoD)
                .with_pass(Arc::clone(&material));
            renderer.submit(&sprite, id as u32).unwrap();
        }
        renderer.render_frame(&mut backend, None).unwrap();

        let upload = backend
            .uploads()
            .into_iter()
            .find(|upload| upload.group == GeometryGroup::SpriteBatch)
            .unwrap();
        assert_eq!(upload.vertex_bytes, 16 * 5 * 4);
        assert_eq!(upload.index_bytes, 24 * 2);
    }

    #[test]
    fn test_particles_are_never_batched() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let material = batch_pass(7);

        for id in 0..2u64 {
            let particles = RenderableDescriptor::particle_system(RenderableId(id), Arc::new(GeometryData::quad(9)))
                .with_pass(Arc::clone(&material));
            renderer.submit(&particles, id as u32).unwrap();
        }
        let stats = renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(stats.batches, 0);
        assert_eq!(stats.draw_calls, 2);
    }

    #[test]
    fn test_batched_renderable_standalone_pass_uses_dynamic_geometry() {
        let renderer = RenderSystem::with_defaults();
        let submitter = renderer.submitter();

        let sprite = RenderableDescriptor::sprite(RenderableId(1), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_geometry_kind(GeometryKind::Static)
            .with_pass(batch_pass(7))
            .with_pass(pass(2));
        renderer.submit(&sprite, 0).unwrap();

        assert_eq!(submitter.static_geometry_info(RenderableId(1)), None);
        assert!(submitter.dynamic_geometry_info(RenderableId(1)).is_some());
        assert_eq!(submitter.vertex_cursor(GeometryGroup::SpriteDynamic), 4);
    }

    #[test]
    fn test_static_geometry_is_registered_once() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let submitter = renderer.submitter();
        let rock = opaque_mesh(1, 1).with_geometry_kind(GeometryKind::Static);

        renderer.submit(&rock, 0).unwrap();
        let first = submitter.static_geometry_info(RenderableId(1)).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();
        let static_uploads = |backend: &HeadlessBackend| {
            backend
                .uploads()
                .iter()
                .filter(|upload| upload.group == GeometryGroup::MeshStatic)
                .count()
        };
        assert_eq!(static_uploads(&backend), 1);

        backend.clear_calls();
        renderer.submit(&rock, 0).unwrap();
        assert_eq!(submitter.static_geometry_info(RenderableId(1)), Some(first));
        assert_eq!(submitter.vertex_cursor(GeometryGroup::MeshStatic), 4);

        renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(static_uploads(&backend), 0);
        assert_eq!(backend.draws()[0].vertex_offset, first.vertex_offset);
    }

    #[test]
    fn test_dynamic_geometry_is_registered_every_frame() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let submitter = renderer.submitter();

        for _ in 0..2 {
            renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
            assert_eq!(submitter.vertex_cursor(GeometryGroup::MeshDynamic), 4);
            renderer.render_frame(&mut backend, None).unwrap();
            assert_eq!(submitter.dynamic_geometry_info(RenderableId(1)), None);
        }
        assert_eq!(
            backend
                .uploads()
                .iter()
                .filter(|upload| upload.group == GeometryGroup::MeshDynamic)
                .count(),
            2
        );
    }

    #[test]
    fn test_geometry_invalidation_applies_at_end_of_frame() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let submitter = renderer.submitter();

        renderer.submit(&opaque_mesh(1, 1).with_geometry_kind(GeometryKind::Static), 0).unwrap();
        renderer.clear_geometry_render_info_entries();
        assert!(submitter.static_geometry_info(RenderableId(1)).is_some());

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(submitter.static_geometry_info(RenderableId(1)), None);
        assert_eq!(submitter.vertex_cursor(GeometryGroup::MeshStatic), 0);
    }

    #[test]
    fn test_clear_rendering_queues_drops_the_frame() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
        renderer.submit(&gui_sprite(2, 2), 1).unwrap();
        renderer.submit_light(Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 10.0));
        renderer.clear_rendering_queues();

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(backend.count(|call| matches!(call, BackendCall::Draw(_))), 0);
    }

    #[test]
    fn test_buffer_overflow_is_reported() {
        // room for exactly one quad in every mesh group
        let config = RenderSystemConfig::default().with_buffer_sizes(4 * 8 * 4, 6 * 4);
        let renderer = RenderSystem::new(config).unwrap();
        renderer.set_active_camera(Some(camera_at_origin()));

        renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
        let result = renderer.submit(&opaque_mesh(2, 1), 1);

        assert!(matches!(
            result,
            Err(RenderError::ResourceExhausted { requested: 4, available: 0, .. })
        ));
        assert_eq!(renderer.submitter().queued_operations(), 1);
    }

    #[test]
    fn test_failed_batch_pass_queues_nothing() {
        // batch scratch too small for a single quad
        let config = RenderSystemConfig::default().with_batch_capacity(4, 6);
        let renderer = RenderSystem::new(config).unwrap();
        let submitter = renderer.submitter();

        let sprite = gui_sprite(1, 2).with_pass(batch_pass(7));
        let result = renderer.submit(&sprite, 0);

        assert!(matches!(result, Err(RenderError::ResourceExhausted { .. })));
        assert_eq!(submitter.queued_operations(), 0);
        assert_eq!(submitter.vertex_cursor(GeometryGroup::SpriteDynamic), 0);
        assert_eq!(submitter.dynamic_geometry_info(RenderableId(1)), None);
    }

    #[test]
    fn test_failed_standalone_pass_rolls_back_batch() {
        let config = RenderSystemConfig::default().with_buffer_sizes(0, 0);
        let mut renderer = RenderSystem::new(config).unwrap();
        let mut backend = HeadlessBackend::new();

        let sprite = RenderableDescriptor::sprite(RenderableId(1), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_pass(batch_pass(7))
            .with_pass(pass(2));
        assert!(renderer.submit(&sprite, 0).is_err());
        assert_eq!(renderer.submitter().queued_operations(), 0);

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.batches, 0);
        assert_eq!(stats.batched_renderables, 0);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn test_batch_skips_out_of_range_indices() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let material = batch_pass(7);

        let valid = RenderableDescriptor::sprite(RenderableId(1), SpriteLayer::Gui, Arc::new(GeometryData::quad(5)))
            .with_mode(RenderingMode::TwoD)
            .with_pass(Arc::clone(&material));
        let broken = GeometryData::new(vec![0.0; 5], 5, vec![0, 5, 2]);
        let broken = RenderableDescriptor::sprite(RenderableId(2), SpriteLayer::Gui, Arc::new(broken))
            .with_mode(RenderingMode::TwoD)
            .with_pass(Arc::clone(&material));
        renderer.submit(&valid, 0).unwrap();
        renderer.submit(&broken, 1).unwrap();

        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.batched_renderables, 1);
        assert_eq!(backend.draws()[0].index_count, 6);
    }

    #[test]
    fn test_dropped_passes_are_forgotten() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let submitter = renderer.submitter();
        let kept = pass(1);

        for frame in 0..3u64 {
            renderer.submit(&gui_sprite(frame, 10 + frame as u32).with_pass(Arc::clone(&kept)), 0).unwrap();
            renderer.render_frame(&mut backend, None).unwrap();
        }

        // every per-frame pass is gone once its renderable is dropped
        assert_eq!(submitter.tracked_material_passes(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RenderSystemConfig::default().with_ui_canvas_count(0);
        assert!(RenderSystem::new(config).is_err());
    }

    #[test]
    fn test_shadow_pass_runs_for_directional_light() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let caster = RenderableDescriptor::new(
            RenderableId(1),
            RenderableKind::Mesh(MeshSettings {
                dynamic_shadows: DynamicShadows::CAST | DynamicShadows::RECEIVE,
                transparent: false,
            }),
            Arc::new(GeometryData::quad(8)),
        )
        .with_pass(pass(1))
        .with_pass(pass(2));

        renderer.submit(&caster, 0).unwrap();
        renderer.submit_light(Light::directional(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.3, -1.0, 0.2),
            Vec3::new(1.0, 1.0, 1.0),
            1.0,
        ));
        let stats = renderer.render_frame(&mut backend, Some(&SceneSettings::default())).unwrap();

        assert!(stats.shadow_pass);
        // two eligible passes still cast one shadow
        assert_eq!(stats.shadow_draw_calls, 1);
        assert!(matches!(backend.calls()[1], BackendCall::BeginShadowPass(_)));

        let end = backend
            .calls()
            .iter()
            .position(|call| *call == BackendCall::EndShadowPass)
            .unwrap();
        let first_draw = backend
            .calls()
            .iter()
            .position(|call| matches!(call, BackendCall::Draw(_)))
            .unwrap();
        assert!(end < first_draw);
        assert!(backend.draws().iter().all(|draw| draw.world_light_view_projection.is_some()));
    }

    #[test]
    fn test_shadow_pass_needs_scene_settings() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let caster = RenderableDescriptor::new(
            RenderableId(1),
            RenderableKind::Mesh(MeshSettings {
                dynamic_shadows: DynamicShadows::CAST,
                transparent: false,
            }),
            Arc::new(GeometryData::quad(8)),
        )
        .with_pass(pass(1));

        renderer.submit(&caster, 0).unwrap();
        renderer.submit_light(Light::directional(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.3, -1.0, 0.2),
            Vec3::new(1.0, 1.0, 1.0),
            1.0,
        ));
        let stats = renderer.render_frame(&mut backend, None).unwrap();

        assert!(!stats.shadow_pass);
        assert!(backend.shadow_draws().is_empty());
        assert_eq!(stats.draw_calls, 1);
    }

    #[test]
    fn test_lit_draws_use_first_light() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        renderer.set_ambient_light_color(Color::new(0.2, 0.2, 0.2, 1.0));

        renderer.submit(&opaque_mesh(1, 1), 0).unwrap();
        renderer.submit_light(Light::point(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 1.0, 5.0));
        renderer.submit_light(Light::point(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0), 1.0, 5.0).with_active(false));
        renderer.submit_light(Light::spot(Vec3::zeros(), -Vec3::z(), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0));
        renderer.render_frame(&mut backend, None).unwrap();

        let draws = backend.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].light.as_ref().map(|light| light.light_type), Some(LightType::Point));
        assert_eq!(draws[0].ambient_color, Color::new(0.2, 0.2, 0.2, 1.0));
    }

    #[test]
    fn test_once_per_light_material_draws_per_light() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let material = Material::new(MaterialId(1), ShaderProgramId(1)).with_flags(MaterialFlags::RENDER_ONCE_PER_LIGHT);
        let mesh = RenderableDescriptor::mesh(RenderableId(1), Arc::new(GeometryData::quad(8)))
            .with_pass(Arc::new(MaterialPass::without_parameters(Arc::new(material))));

        renderer.submit(&mesh, 0).unwrap();
        renderer.submit_light(Light::point(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 1.0, 5.0));
        renderer.submit_light(Light::spot(Vec3::zeros(), -Vec3::z(), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0));
        let stats = renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(stats.draw_calls, 2);
        let kinds: Vec<_> = backend
            .draws()
            .iter()
            .filter_map(|draw| draw.light.as_ref().map(|light| light.light_type))
            .collect();
        assert_eq!(kinds, vec![LightType::Point, LightType::Spot]);
    }

    #[test]
    fn test_canvases_split_around_transparent_list() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.setup_ui_canvas(0, Vec3::new(0.0, 0.0, -4.0), CanvasSettings::RENDER_BEFORE_TRANSPARENT);
        renderer.setup_ui_canvas(1, Vec3::new(0.0, 0.0, -2.0), CanvasSettings::empty());
        renderer.submit(&canvas_label(1, 1, 11), 0).unwrap();
        renderer.submit(&canvas_label(2, 0, 10), 1).unwrap();
        renderer.submit(&particles_at(3, Vec3::new(0.0, 0.0, -6.0)), 2).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(
            drawn_materials(&backend),
            vec![MaterialId(10), MaterialId(50), MaterialId(11)]
        );
    }

    #[test]
    fn test_canvases_sort_farthest_first() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();

        renderer.setup_ui_canvas(0, Vec3::new(0.0, 0.0, -1.0), CanvasSettings::empty());
        renderer.setup_ui_canvas(1, Vec3::new(0.0, 0.0, -9.0), CanvasSettings::empty());
        renderer.submit(&canvas_label(1, 0, 10), 0).unwrap();
        renderer.submit(&canvas_label(2, 1, 11), 1).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(drawn_materials(&backend), vec![MaterialId(11), MaterialId(10)]);
    }

    #[test]
    fn test_custom_canvas_sort() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        renderer.set_canvas_sort(Some(Arc::new(|a: &UiCanvasEntry, b: &UiCanvasEntry| a.index.cmp(&b.index))));

        renderer.setup_ui_canvas(0, Vec3::new(0.0, 0.0, -1.0), CanvasSettings::empty());
        renderer.setup_ui_canvas(1, Vec3::new(0.0, 0.0, -9.0), CanvasSettings::empty());
        renderer.submit(&canvas_label(1, 0, 10), 0).unwrap();
        renderer.submit(&canvas_label(2, 1, 11), 1).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(drawn_materials(&backend), vec![MaterialId(10), MaterialId(11)]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_canvas_index_out_of_range_panics() {
        let renderer = renderer_with_camera();
        renderer.submit(&canvas_label(1, 99, 1), 0).unwrap();
    }

    #[test]
    fn test_label_uses_font_texture() {
        let mut renderer = renderer_with_camera();
        let mut backend = HeadlessBackend::new();
        let label = RenderableDescriptor::new(
            RenderableId(1),
            RenderableKind::Label {
                layer: SpriteLayer::Gui,
                font_texture: Some(TextureId(4)),
            },
            Arc::new(GeometryData::quad(9)),
        )
        .with_pass(pass(1));

        renderer.submit(&label, 0).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        let draws = backend.draws();
        assert_eq!(draws[0].group, GeometryGroup::Label);
        assert_eq!(draws[0].diffuse_texture, Some(TextureId(4)));
    }

    #[test]
    fn test_ui_alpha_scales_draw_color() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let sprite = gui_sprite(1, 1).with_ui_element(UiElement::Screen { alpha_in_hierarchy: 0.5 });

        renderer.submit(&sprite, 0).unwrap();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_relative_eq!(backend.draws()[0].color.a, 0.5);
    }

    #[test]
    fn test_failed_draw_still_clears_frame() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        backend.fail_draws(true);

        renderer.submit(&gui_sprite(1, 1), 0).unwrap();
        assert!(matches!(renderer.render_frame(&mut backend, None), Err(RenderError::Backend(_))));
        assert_eq!(renderer.submitter().queued_operations(), 0);

        backend.fail_draws(false);
        let stats = renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn test_shader_reload_rebuilds_passes() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();
        let material = Arc::new(Material::new(MaterialId(1), ShaderProgramId(3)));
        let tinted = Arc::new(MaterialPass::new(
            Arc::clone(&material),
            &[ParameterDescriptor::new("uTint", ParameterValue::Vector([1.0; 4]))],
        ));
        assert!(tinted.set_parameter("uTint", ParameterValue::Vector([0.5; 4])));
        let idle = Arc::new(MaterialPass::without_parameters(material));
        renderer.submitter().register_material_pass(&idle);

        backend.set_parameter_layout(
            ShaderProgramId(3),
            vec![
                ParameterDescriptor::new("uTint", ParameterValue::Vector([1.0; 4])),
                ParameterDescriptor::new("uGlow", ParameterValue::Float(2.0)),
            ],
        );
        renderer.submit(&gui_sprite(1, 1).with_pass(Arc::clone(&tinted)), 0).unwrap();
        renderer.request_shaders_reload();
        renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(backend.count(|call| *call == BackendCall::ReloadShaders), 1);
        assert_eq!(tinted.parameter("uTint"), Some(ParameterValue::Vector([0.5; 4])));
        assert_eq!(tinted.parameter("uGlow"), Some(ParameterValue::Float(2.0)));
        assert_eq!(idle.parameter("uGlow"), Some(ParameterValue::Float(2.0)));

        backend.clear_calls();
        renderer.render_frame(&mut backend, None).unwrap();
        assert_eq!(backend.count(|call| *call == BackendCall::ReloadShaders), 0);
    }

    #[test]
    fn test_frame_stats_are_kept() {
        let mut renderer = RenderSystem::with_defaults();
        let mut backend = HeadlessBackend::new();

        renderer.submit(&gui_sprite(1, 1), 0).unwrap();
        let stats = renderer.render_frame(&mut backend, None).unwrap();

        assert_eq!(renderer.frame_stats(), stats);
        assert_eq!(renderer.draw_calls(), 1);
        assert_eq!(renderer.frame_count(), 1);
        assert_eq!(stats.geometry_uploads, 1);
    }
}
