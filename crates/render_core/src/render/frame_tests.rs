//! Tests for whole frames through the renderer and the recording device

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::config::{Config, ConfigFormat, RendererConfig, ShadowMapType};
    use crate::foundation::logging;
    use crate::foundation::math::{Color, Vec3};
    use crate::render::device::{DeviceCommand, RecordingDevice, UniformValue, Viewport};
    use crate::render::{RenderError, Renderer};
    use crate::scene::{
        Camera, Fog, Geometry, Layers, Light, Material, MaterialId, Mesh, Node, NodeId, NodeKind,
        Scene, Side, Texture,
    };

    const EPSILON: f32 = 1e-5;

    fn scene_with_camera() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let camera = scene
            .add_camera(root, Camera::perspective(60.0, 1.0, 0.1, 100.0))
            .expect("camera");
        scene.node_mut(camera).expect("camera").set_position(Vec3::new(0.0, 0.0, 10.0));
        (scene, camera)
    }

    fn renderer(config: RendererConfig) -> Renderer<RecordingDevice> {
        logging::init_for_tests();
        Renderer::new(RecordingDevice::new(), config, 64, 64).expect("renderer")
    }

    fn quad(scene: &mut Scene, parent: NodeId, material: MaterialId, position: Vec3) -> NodeId {
        let geometry = scene.add_geometry(Geometry::plane(1.0, 1.0));
        let node = scene.add_mesh(parent, geometry, material).expect("mesh");
        scene.node_mut(node).expect("mesh").set_position(position);
        node
    }

    fn uniform<'a>(device: &'a RecordingDevice, name: &str) -> Vec<&'a UniformValue> {
        device
            .commands()
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::SetUniform(_, uniform, value) if uniform == name => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Program references held across the cache
    fn used_references(renderer: &Renderer<RecordingDevice>) -> u32 {
        renderer.programs().iter().map(|(_, program)| program.used_times()).sum()
    }

    fn shadow_light(scene: &mut Scene, position: Vec3) -> NodeId {
        let root = scene.root();
        let light = scene
            .add_light(root, Light::directional(Color::new(1.0, 1.0, 1.0), 1.0))
            .expect("light");
        let light_node = scene.node_mut(light).expect("light");
        light_node.set_position(position);
        light_node.cast_shadow = true;
        light
    }

    #[test]
    fn test_nested_transforms_reach_model_matrix() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let outer = scene.add_group(root).expect("group");
        scene.node_mut(outer).expect("group").set_position(Vec3::new(0.0, 0.0, -2.0));
        let inner = scene.add_group(outer).expect("group");
        let inner_node = scene.node_mut(inner).expect("group");
        inner_node.set_position(Vec3::new(0.0, 1.0, 0.0));
        inner_node.set_scale(Vec3::new(2.0, 2.0, 2.0));
        let material = scene.add_material(Material::basic());
        quad(&mut scene, inner, material, Vec3::new(1.0, 0.0, 0.0));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        let models = uniform(renderer.device(), "model_matrix");
        assert_eq!(models.len(), 1);
        let UniformValue::Mat4(model) = models[0] else {
            panic!("model_matrix should be a mat4");
        };
        assert_relative_eq!(model[(0, 3)], 2.0, epsilon = EPSILON);
        assert_relative_eq!(model[(1, 3)], 1.0, epsilon = EPSILON);
        assert_relative_eq!(model[(2, 3)], -2.0, epsilon = EPSILON);
        assert_relative_eq!(model[(0, 0)], 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_opaque_front_to_back_and_transparent_back_to_front() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let opaque = scene.add_material(Material::basic());
        let blended = scene.add_material(Material::basic().with_transparency(0.5));
        let far_opaque = quad(&mut scene, root, opaque, Vec3::new(0.0, 0.0, -5.0));
        let near_opaque = quad(&mut scene, root, opaque, Vec3::new(0.0, 0.0, 0.0));
        let near_blended = quad(&mut scene, root, blended, Vec3::new(0.0, 0.0, 1.0));
        let far_blended = quad(&mut scene, root, blended, Vec3::new(0.0, 0.0, -3.0));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        let order: Vec<NodeId> = renderer.render_list().draw_order().iter().map(|item| item.node).collect();
        assert_eq!(order, vec![near_opaque, far_opaque, far_blended, near_blended]);
        assert_eq!(renderer.device().draws().len(), 4);
    }

    #[test]
    fn test_sorting_disabled_keeps_traversal_order() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        let far = quad(&mut scene, root, material, Vec3::new(0.0, 0.0, -5.0));
        let near = quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default().with_sort_objects(false));
        renderer.render(&mut scene, camera).expect("render");

        let order: Vec<NodeId> = renderer.render_list().draw_order().iter().map(|item| item.node).collect();
        assert_eq!(order, vec![far, near]);
    }

    #[test]
    fn test_custom_opaque_sort_is_used() {
        fn back_to_front(a: &crate::render::RenderItem, b: &crate::render::RenderItem) -> std::cmp::Ordering {
            b.z.total_cmp(&a.z)
        }

        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        let near = quad(&mut scene, root, material, Vec3::zeros());
        let far = quad(&mut scene, root, material, Vec3::new(0.0, 0.0, -5.0));

        let mut renderer = renderer(RendererConfig::default());
        renderer.set_opaque_sort(Some(back_to_front));
        renderer.render(&mut scene, camera).expect("render");

        let order: Vec<NodeId> = renderer.render_list().draw_order().iter().map(|item| item.node).collect();
        assert_eq!(order, vec![far, near]);
    }

    #[test]
    fn test_equal_materials_share_one_program() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let first = scene.add_material(Material::standard());
        let second = scene.add_material(Material::standard());
        quad(&mut scene, root, first, Vec3::zeros());
        quad(&mut scene, root, second, Vec3::new(1.0, 0.0, 0.0));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        assert_eq!(renderer.programs().len(), 1);
        assert_eq!(renderer.device().live_programs(), 1);
        assert_eq!(renderer.info().programs, 1);
        let (_, program) = renderer.programs().iter().next().expect("program");
        assert_eq!(program.used_times(), 2);
    }

    #[test]
    fn test_changed_parameters_swap_programs() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        scene.fog = Some(Fog::Linear {
            color: Color::new(0.5, 0.5, 0.5),
            near: 1.0,
            far: 50.0,
        });
        renderer.render(&mut scene, camera).expect("render");

        assert_eq!(renderer.programs().len(), 1);
        assert_eq!(renderer.device().live_programs(), 1);
        assert_eq!(uniform(renderer.device(), "fog_far"), vec![&UniformValue::Float(50.0)]);
    }

    #[test]
    fn test_disposed_geometry_releases_buffers_once() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        let node = quad(&mut scene, root, material, Vec3::zeros());
        let geometry = scene.node(node).and_then(Node::as_mesh).map(|mesh| mesh.geometry).expect("geometry");

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        let uploaded = renderer.device().live_buffers();
        assert!(uploaded > 0);
        assert_eq!(renderer.info().geometries, 1);

        scene.remove_subtree(node).expect("removed");
        assert!(scene.dispose_geometry(geometry));
        renderer.render(&mut scene, camera).expect("render");
        renderer.render(&mut scene, camera).expect("render");

        assert_eq!(renderer.device().live_buffers(), 0);
        assert_eq!(
            renderer.device().count(|c| matches!(c, DeviceCommand::DestroyBuffer(_))),
            uploaded
        );
        assert_eq!(renderer.info().geometries, 0);
    }

    #[test]
    fn test_texture_uploads_and_binds_once_while_unchanged() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let texture = scene.add_texture(Texture::rgba8(2, 2, vec![255; 16]));
        let material = scene.add_material(Material::basic().with_map(texture));
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        renderer.render(&mut scene, camera).expect("render");

        let device = renderer.device();
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::CreateTexture(..))), 1);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::BindTexture(0, Some(_)))), 1);
        assert_eq!(uniform(device, "map"), vec![&UniformValue::Sampler(0)]);

        scene.texture_mut(texture).expect("texture").data = vec![0; 16];
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(
            renderer.device().count(|c| matches!(c, DeviceCommand::UpdateTexture(_))),
            1
        );

        assert!(scene.dispose_texture(texture));
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().live_textures(), 0);
    }

    #[test]
    fn test_layers_and_visibility_filter_draws() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        let hidden_layer = quad(&mut scene, root, material, Vec3::zeros());
        scene.node_mut(hidden_layer).expect("mesh").layers = Layers::single(1);
        let invisible = quad(&mut scene, root, material, Vec3::new(1.0, 0.0, 0.0));
        scene.node_mut(invisible).expect("mesh").visible = false;
        quad(&mut scene, root, material, Vec3::new(-1.0, 0.0, 0.0));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 1);

        scene.node_mut(camera).expect("camera").layers.enable(1);
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 3);
    }

    #[test]
    fn test_geometry_groups_draw_with_their_materials() {
        let (mut scene, camera) = scene_with_camera();
        let geometry = scene.add_geometry(Geometry::plane(1.0, 1.0).with_group(0, 3, 0).with_group(3, 3, 1));
        let red = scene.add_material(Material::basic().with_color(Color::new(1.0, 0.0, 0.0)));
        let blue = scene.add_material(Material::basic().with_color(Color::new(0.0, 0.0, 1.0)));
        let root = scene.root();
        scene
            .add_node(root, Node::new(NodeKind::Mesh(Mesh::with_groups(geometry, vec![red, blue]))))
            .expect("mesh");

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        let draws = renderer.device().draws();
        assert_eq!(draws.len(), 2);
        let mut ranges: Vec<(u32, u32)> = draws.iter().map(|call| (call.first, call.count)).collect();
        ranges.sort_unstable();
        assert_eq!(ranges, vec![(0, 3), (3, 3)]);
    }

    #[test]
    fn test_draw_range_limits_elements() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        let node = quad(&mut scene, root, material, Vec3::zeros());
        let geometry = scene.node(node).and_then(Node::as_mesh).map(|mesh| mesh.geometry).expect("geometry");
        scene.geometry_mut(geometry).expect("geometry").set_draw_range(3, Some(100));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        let draws = renderer.device().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!((draws[0].first, draws[0].count), (3, 3));
    }

    #[test]
    fn test_override_material_replaces_every_material() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let lambert = scene.add_material(Material::lambert());
        let phong = scene.add_material(Material::phong());
        quad(&mut scene, root, lambert, Vec3::zeros());
        quad(&mut scene, root, phong, Vec3::new(1.0, 0.0, 0.0));
        scene.override_material = Some(scene.add_material(Material::basic()));

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");

        assert_eq!(renderer.device().draws().len(), 2);
        assert_eq!(renderer.programs().len(), 1);
        assert!(renderer
            .device()
            .commands()
            .iter()
            .all(|c| !matches!(c, DeviceCommand::CompileProgram(_, name) if name != "basic")));
    }

    #[test]
    fn test_point_light_shadow_uses_distance_variant() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::standard());
        let caster = quad(&mut scene, root, material, Vec3::zeros());
        scene.node_mut(caster).expect("mesh").cast_shadow = true;

        let light = scene
            .add_light(root, Light::point(Color::new(1.0, 1.0, 1.0), 1.0, 50.0))
            .expect("light");
        let light_node = scene.node_mut(light).expect("light");
        light_node.set_position(Vec3::new(0.0, 0.0, 3.0));
        light_node.cast_shadow = true;

        let mut renderer = renderer(RendererConfig::default().with_shadows(ShadowMapType::Pcf));
        renderer.render(&mut scene, camera).expect("render");

        let map = renderer.shadow_map().map(light).expect("shadow map");
        assert!(map.is_point());
        assert_eq!(map.faces().len(), 6);
        assert!(renderer.device().draws().len() >= 2);
        assert!(renderer
            .device()
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::CompileProgram(_, name) if name == "distance")));
        assert!(!uniform(renderer.device(), "reference_position").is_empty());
    }

    #[test]
    fn test_static_shadows_render_once_until_requested() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::standard());
        let caster = quad(&mut scene, root, material, Vec3::zeros());
        scene.node_mut(caster).expect("mesh").cast_shadow = true;
        let light = scene
            .add_light(root, Light::directional(Color::new(1.0, 1.0, 1.0), 1.0))
            .expect("light");
        let light_node = scene.node_mut(light).expect("light");
        light_node.set_position(Vec3::new(0.0, 0.0, 5.0));
        light_node.cast_shadow = true;
        light_node.as_light_mut().expect("light").shadow.auto_update = false;

        let mut renderer = renderer(RendererConfig::default().with_shadows(ShadowMapType::Basic));
        renderer.render(&mut scene, camera).expect("render");
        let first = renderer.device().draws().len();
        assert_eq!(first, 2);

        renderer.device_mut().clear_commands();
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 1);

        scene
            .node_mut(light)
            .and_then(Node::as_light_mut)
            .expect("light")
            .shadow
            .needs_update = true;
        renderer.device_mut().clear_commands();
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 2);
    }

    #[test]
    fn test_pixel_ratio_scales_viewport_and_scissor() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default().with_pixel_ratio(2.0));
        renderer.set_scissor(Viewport::new(4, 4, 8, 8));
        renderer.set_scissor_test(true);
        renderer.render(&mut scene, camera).expect("render");

        let commands = renderer.device().commands();
        assert!(commands.contains(&DeviceCommand::SetViewport(Viewport::new(0, 0, 128, 128))));
        assert!(commands.contains(&DeviceCommand::SetScissor(Viewport::new(8, 8, 16, 16))));
    }

    #[test]
    fn test_compile_prepares_programs_without_drawing() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let lambert = scene.add_material(Material::lambert());
        let basic = scene.add_material(Material::basic());
        quad(&mut scene, root, lambert, Vec3::zeros());
        quad(&mut scene, root, basic, Vec3::new(1.0, 0.0, 0.0));

        let mut renderer = renderer(RendererConfig::default());
        assert_eq!(renderer.compile(&mut scene, camera).expect("compile"), 2);
        assert!(renderer.device().draws().is_empty());

        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(
            renderer.device().count(|c| matches!(c, DeviceCommand::CompileProgram(..))),
            2
        );
    }

    #[test]
    fn test_shadow_casters_draw_front_to_back_from_light() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::standard());
        for z in [-3.0, 2.0] {
            let caster = quad(&mut scene, root, material, Vec3::new(0.0, 0.0, z));
            scene.node_mut(caster).expect("mesh").cast_shadow = true;
        }
        shadow_light(&mut scene, Vec3::new(0.0, 0.0, 5.0));

        let mut renderer = renderer(RendererConfig::default().with_shadows(ShadowMapType::Pcf));
        renderer.render(&mut scene, camera).expect("render");

        let commands = renderer.device().commands();
        let start = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::BindRenderTarget(Some(_))))
            .expect("shadow pass");
        let end = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::BindRenderTarget(None)))
            .expect("main pass");
        let depths: Vec<f32> = commands[start..end]
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform(_, name, UniformValue::Mat4(model)) if name == "model_matrix" => {
                    Some(model[(2, 3)])
                }
                _ => None,
            })
            .collect();
        assert_eq!(depths.len(), 2);
        assert_relative_eq!(depths[0], 2.0, epsilon = EPSILON);
        assert_relative_eq!(depths[1], -3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_shadow_type_changes_keep_program_references_balanced() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::standard());
        let caster = quad(&mut scene, root, material, Vec3::zeros());
        let caster_node = scene.node_mut(caster).expect("mesh");
        caster_node.cast_shadow = true;
        caster_node.receive_shadow = true;
        shadow_light(&mut scene, Vec3::new(0.0, 0.0, 5.0));

        let mut renderer = renderer(RendererConfig::default().with_shadows(ShadowMapType::Pcf));
        renderer.render(&mut scene, camera).expect("render");
        let before = used_references(&renderer);
        assert_eq!(before, 2);

        for shadow_type in [
            ShadowMapType::Vsm,
            ShadowMapType::Pcf,
            ShadowMapType::Vsm,
            ShadowMapType::Pcf,
            ShadowMapType::Vsm,
        ] {
            renderer
                .set_config(RendererConfig::default().with_shadows(shadow_type))
                .expect("config");
            renderer.render(&mut scene, camera).expect("render");
        }

        assert_eq!(used_references(&renderer), before);
        assert_eq!(renderer.programs().len(), 2);
        assert_eq!(renderer.device().live_programs(), 2);
        assert_eq!(renderer.shadow_map().variant_count(), 1);
    }

    #[test]
    fn test_side_change_releases_previous_program() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        scene.material_mut(material).expect("material").side = Side::Back;
        renderer.render(&mut scene, camera).expect("render");

        assert_eq!(used_references(&renderer), 1);
        assert_eq!(renderer.device().live_programs(), 1);
        assert_eq!(
            renderer.device().count(|c| matches!(c, DeviceCommand::DestroyProgram(_))),
            1
        );
    }

    #[test]
    fn test_compile_prepares_both_passes_of_double_sided_blending() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic().with_transparency(0.5).with_side(Side::Double));
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default());
        assert_eq!(renderer.compile(&mut scene, camera).expect("compile"), 2);
        assert_eq!(used_references(&renderer), 2);

        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 2);
        assert_eq!(used_references(&renderer), 2);
        assert_eq!(
            renderer.device().count(|c| matches!(c, DeviceCommand::CompileProgram(..))),
            2
        );
    }

    #[test]
    fn test_camera_uniforms_upload_once_per_view() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let material = scene.add_material(Material::basic());
        for x in [-1.0, 0.0, 1.0] {
            quad(&mut scene, root, material, Vec3::new(x, 0.0, 0.0));
        }

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(renderer.device().draws().len(), 3);
        assert_eq!(uniform(renderer.device(), "projection_matrix").len(), 1);
        assert_eq!(uniform(renderer.device(), "view_matrix").len(), 1);
        assert_eq!(uniform(renderer.device(), "model_matrix").len(), 3);

        renderer.device_mut().clear_commands();
        renderer.render(&mut scene, camera).expect("render");
        assert_eq!(uniform(renderer.device(), "projection_matrix").len(), 1);

        let wide = scene
            .add_camera(root, Camera::perspective(90.0, 2.0, 0.1, 100.0))
            .expect("camera");
        scene.node_mut(wide).expect("camera").set_position(Vec3::new(0.0, 0.0, 10.0));
        renderer.device_mut().clear_commands();
        renderer.render(&mut scene, wide).expect("render");

        let uploads = uniform(renderer.device(), "projection_matrix");
        assert_eq!(uploads.len(), 1);
        let expected = *scene.node(wide).and_then(Node::as_camera).expect("camera").projection_matrix();
        let UniformValue::Mat4(projection) = uploads[0] else {
            panic!("projection_matrix should be a mat4");
        };
        assert_relative_eq!(*projection, expected, epsilon = EPSILON);
    }

    #[test]
    fn test_dispose_releases_everything_once() {
        let (mut scene, camera) = scene_with_camera();
        let root = scene.root();
        let texture = scene.add_texture(Texture::rgba8(1, 1, vec![255; 4]));
        let material = scene.add_material(Material::basic().with_map(texture));
        quad(&mut scene, root, material, Vec3::zeros());

        let mut renderer = renderer(RendererConfig::default());
        renderer.render(&mut scene, camera).expect("render");
        renderer.dispose();

        let device = renderer.device();
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_textures(), 0);

        renderer.device_mut().clear_commands();
        renderer.dispose();
        assert!(renderer.device().commands().is_empty());
    }

    #[test]
    fn test_update_camera_aspect_follows_output_size() {
        let (mut scene, camera) = scene_with_camera();
        let mut renderer = renderer(RendererConfig::default());
        renderer.set_size(200, 100);
        renderer.update_camera_aspect(&mut scene, camera).expect("camera");

        let projection = *scene.node(camera).and_then(Node::as_camera).expect("camera").projection_matrix();
        assert_relative_eq!(projection[(1, 1)] / projection[(0, 0)], 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_config_loaded_from_toml_drives_renderer() {
        let text = "sort_objects = false\npixel_ratio = 0.0\n";
        let config = RendererConfig::from_str_with_format(text, ConfigFormat::Toml).expect("parse");
        assert!(!config.sort_objects);
        assert!(matches!(
            Renderer::new(RecordingDevice::new(), config, 8, 8),
            Err(RenderError::Config(_))
        ));
    }
}
