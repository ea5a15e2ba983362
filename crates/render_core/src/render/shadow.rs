//! # Shadow Maps
//!
//! One depth render target per shadow-casting light plus the light-space
//! views used to fill it. The renderer draws the casters; this module owns
//! the targets, the shadow cameras and the depth-only material variants.
//!
//! ## Lifecycle
//!
//! A map is allocated the first frame its light casts shadows and is rendered
//! right away. After that it is re-rendered whenever the light (or the whole
//! mapper) asks for updates. Maps are destroyed when their light leaves the
//! scene or stops casting.

use std::collections::HashMap;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use super::device::{
    DeviceResult, GraphicsDevice, RenderTargetDescriptor, RenderTargetHandle, TextureFormat,
    TextureHandle, Viewport,
};
use crate::config::{ShadowMapConfig, ShadowMapType};
use crate::foundation::math::{stable_up, utils, Mat4, Mat4Ext, Vec3};
use crate::scene::{CameraView, Layers, Light, LightKind, Material, NodeId, Scene, Side, TextureId};

new_key_type! {
    /// Handle to a depth-only material variant
    pub struct ShadowVariantId;
}

/// Maps clip space to texture space
fn bias_matrix() -> Mat4 {
    Mat4::new(
        0.5, 0.0, 0.0, 0.5, //
        0.0, 0.5, 0.0, 0.5, //
        0.0, 0.0, 0.5, 0.5, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Cube face look directions, ups and their cell in the 4x2 atlas
const CUBE_FACES: [([f32; 3], [f32; 3], (u32, u32)); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], (2, 1)),
    ([-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], (0, 1)),
    ([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], (3, 1)),
    ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], (1, 1)),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], (3, 0)),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0], (1, 0)),
];

/// Where a map is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMapState {
    /// Target exists, contents undefined
    Allocated,
    /// Contents valid as of this frame
    Rendered {
        /// Frame number of the last depth pass
        frame: u64,
    },
}

/// Light-space view rendered into one region of a shadow map
#[derive(Debug, Clone, Copy)]
pub struct ShadowFace {
    /// Shadow camera
    pub view: CameraView,
    /// Region of the target
    pub viewport: Viewport,
}

/// Depth target and matrices of one light
#[derive(Debug, Clone)]
pub struct ShadowMap {
    target: RenderTargetHandle,
    texture: Option<TextureHandle>,
    map_size: (u32, u32),
    target_size: (u32, u32),
    state: ShadowMapState,
    matrix: Mat4,
    faces: Vec<ShadowFace>,
    light_position: Vec3,
    near: f32,
    far: f32,
    point: bool,
}

impl ShadowMap {
    /// Render target the depth pass draws into
    pub fn target(&self) -> RenderTargetHandle {
        self.target
    }

    /// Texture sampled by receivers
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Size of one face in texels
    pub fn map_size(&self) -> (u32, u32) {
        self.map_size
    }

    /// Size of the whole target
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Lifecycle state
    pub fn state(&self) -> ShadowMapState {
        self.state
    }

    /// `bias * projection * view` for directional and spot lights,
    /// a translation to light space for point lights
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Views rendered by the last depth pass
    pub fn faces(&self) -> &[ShadowFace] {
        &self.faces
    }

    /// Light position at the last update
    pub fn light_position(&self) -> Vec3 {
        self.light_position
    }

    /// Shadow camera near and far distances
    pub fn clip_range(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    /// Cube map packed as a 4x2 atlas
    pub fn is_point(&self) -> bool {
        self.point
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VariantKey {
    distance: bool,
    alpha_test: u32,
    map: Option<TextureId>,
    alpha_map: Option<TextureId>,
    displacement_map: Option<TextureId>,
    side: Side,
}

/// Shadow map owner
#[derive(Debug, Default)]
pub struct ShadowMapper {
    config: ShadowMapConfig,
    maps: SecondaryMap<NodeId, ShadowMap>,
    variants: SlotMap<ShadowVariantId, Material>,
    variant_keys: HashMap<VariantKey, ShadowVariantId>,
    /// Render every map once even when `auto_update` is off
    pub needs_update: bool,
}

impl ShadowMapper {
    /// Create a mapper with no maps
    pub fn new(config: ShadowMapConfig) -> Self {
        Self {
            config,
            maps: SecondaryMap::new(),
            variants: SlotMap::with_key(),
            variant_keys: HashMap::new(),
            needs_update: false,
        }
    }

    /// Current settings
    pub fn config(&self) -> &ShadowMapConfig {
        &self.config
    }

    /// Replace the settings; a changed filter type drops the cached variants
    pub fn set_config(&mut self, config: ShadowMapConfig) {
        if config.shadow_type != self.config.shadow_type {
            self.variants.clear();
            self.variant_keys.clear();
        }
        self.config = config;
    }

    /// Master switch
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Map of a light
    pub fn map(&self, light: NodeId) -> Option<&ShadowMap> {
        self.maps.get(light)
    }

    /// Number of allocated maps
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True when no map is allocated
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Sync maps with the lights that cast shadows this frame.
    ///
    /// Allocates missing targets, destroys those of lights no longer casting,
    /// and refreshes the shadow cameras of every light that has to be
    /// re-rendered. Returns those lights.
    pub fn prepare<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        casting: &[NodeId],
        layers: Layers,
    ) -> DeviceResult<Vec<NodeId>> {
        let orphaned: Vec<NodeId> = self
            .maps
            .keys()
            .filter(|light| !casting.contains(light))
            .collect();
        for light in orphaned {
            self.release_light(device, light);
        }

        if !self.config.enabled || !(self.config.auto_update || self.needs_update) {
            return Ok(Vec::new());
        }

        let mut due = Vec::new();
        for &id in casting {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let Some(light) = node.as_light() else {
                continue;
            };

            self.ensure_target(device, id, light)?;
            let Some(map) = self.maps.get_mut(id) else {
                continue;
            };
            let pending = map.state == ShadowMapState::Allocated;
            if pending || light.shadow.auto_update || light.shadow.needs_update {
                update_shadow_camera(map, light, node.world_position(), layers);
                due.push(id);
            }
        }
        Ok(due)
    }

    /// Record a finished depth pass
    pub fn mark_rendered(&mut self, light: NodeId, frame: u64) {
        if let Some(map) = self.maps.get_mut(light) {
            map.state = ShadowMapState::Rendered { frame };
        }
    }

    /// Depth-only stand-in for `material`, shared by every material with the
    /// same alpha test, cutout textures and side
    pub fn depth_variant(&mut self, material: &Material, distance: bool) -> ShadowVariantId {
        let side = if self.config.shadow_type == ShadowMapType::Vsm {
            flip_side(material.side)
        } else {
            material.side
        };
        let key = VariantKey {
            distance,
            alpha_test: material.alpha_test.to_bits(),
            map: material.textures.map,
            alpha_map: material.textures.alpha_map,
            displacement_map: material.textures.displacement_map,
            side,
        };
        if let Some(id) = self.variant_keys.get(&key) {
            return *id;
        }

        let mut variant = if distance {
            Material::distance()
        } else {
            Material::depth()
        };
        variant.alpha_test = material.alpha_test;
        variant.textures.map = material.textures.map;
        variant.textures.alpha_map = material.textures.alpha_map;
        variant.textures.displacement_map = material.textures.displacement_map;
        variant.displacement_scale = material.displacement_scale;
        variant.side = side;

        let id = self.variants.insert(variant);
        self.variant_keys.insert(key, id);
        log::debug!("ShadowMapper: created depth variant {id:?} (distance: {distance})");
        id
    }

    /// Depth variant by id
    pub fn variant(&self, id: ShadowVariantId) -> Option<&Material> {
        self.variants.get(id)
    }

    /// Number of cached depth variants
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Destroy the map of one light
    pub fn release_light<D: GraphicsDevice>(&mut self, device: &mut D, light: NodeId) -> bool {
        match self.maps.remove(light) {
            Some(map) => {
                device.destroy_render_target(map.target);
                log::debug!("ShadowMapper: destroyed shadow map of {light:?}");
                true
            }
            None => false,
        }
    }

    /// Destroy every map
    pub fn destroy_all<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, map) in self.maps.drain() {
            device.destroy_render_target(map.target);
        }
    }

    /// Forget every map without touching the device (context loss)
    pub fn forget_targets(&mut self) {
        self.maps.clear();
    }

    fn ensure_target<D: GraphicsDevice>(&mut self, device: &mut D, id: NodeId, light: &Light) -> DeviceResult<()> {
        let point = matches!(light.kind, LightKind::Point { .. });
        let map_size = light.shadow.map_size;
        if let Some(map) = self.maps.get(id) {
            if map.map_size == map_size && map.point == point {
                return Ok(());
            }
            self.release_light(device, id);
        }

        let target_size = if point {
            (map_size.0 * 4, map_size.1 * 2)
        } else {
            map_size
        };
        let color_format = (self.config.shadow_type == ShadowMapType::Vsm).then_some(TextureFormat::Rgba16Float);
        let target = device.create_render_target(&RenderTargetDescriptor {
            width: target_size.0,
            height: target_size.1,
            color_format,
            depth: true,
        })?;
        log::debug!(
            "ShadowMapper: allocated {}x{} shadow map for {id:?}",
            target_size.0,
            target_size.1
        );

        self.maps.insert(
            id,
            ShadowMap {
                target,
                texture: device.render_target_texture(target),
                map_size,
                target_size,
                state: ShadowMapState::Allocated,
                matrix: Mat4::identity(),
                faces: Vec::new(),
                light_position: Vec3::zeros(),
                near: light.shadow.camera.near,
                far: light.shadow.camera.far,
                point,
            },
        );
        Ok(())
    }
}

fn flip_side(side: Side) -> Side {
    match side {
        Side::Front => Side::Back,
        Side::Back => Side::Front,
        Side::Double => Side::Double,
    }
}

/// Rebuild the light-space views and matrix of one map
fn update_shadow_camera(map: &mut ShadowMap, light: &Light, position: Vec3, layers: Layers) {
    let camera = &light.shadow.camera;
    let (width, height) = map.map_size;
    let full = Viewport::new(0, 0, width, height);
    map.light_position = position;
    map.faces.clear();

    match light.kind {
        LightKind::Directional { target } => {
            let projection = Mat4::orthographic(camera.left, camera.right, camera.top, camera.bottom, camera.near, camera.far);
            let view = Mat4::look_at(position, target, stable_up(&(position - target)));
            map.matrix = bias_matrix() * projection * view;
            map.near = camera.near;
            map.far = camera.far;
            map.faces.push(ShadowFace {
                view: CameraView::from_matrices(projection, view, layers, true, (camera.near, camera.far)),
                viewport: full,
            });
        }
        LightKind::Spot { target, distance, angle, .. } => {
            let fov = utils::rad_to_deg(2.0 * angle) * camera.focus;
            let aspect = width as f32 / height.max(1) as f32;
            let far = if distance > 0.0 { distance } else { camera.far };
            let projection = Mat4::perspective(utils::deg_to_rad(fov), aspect, camera.near, far);
            let view = Mat4::look_at(position, target, stable_up(&(position - target)));
            map.matrix = bias_matrix() * projection * view;
            map.near = camera.near;
            map.far = far;
            map.faces.push(ShadowFace {
                view: CameraView::from_matrices(projection, view, layers, false, (camera.near, far)),
                viewport: full,
            });
        }
        LightKind::Point { distance, .. } => {
            let far = if distance > 0.0 { distance } else { camera.far };
            let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, camera.near, far);
            map.matrix = Mat4::new_translation(&-position);
            map.near = camera.near;
            map.far = far;
            for (direction, up, (cell_x, cell_y)) in CUBE_FACES {
                let direction = Vec3::from(direction);
                let view = Mat4::look_at(position, position + direction, Vec3::from(up));
                let viewport = Viewport::new(
                    i32::try_from(cell_x * width).unwrap_or(i32::MAX),
                    i32::try_from(cell_y * height).unwrap_or(i32::MAX),
                    width,
                    height,
                );
                map.faces.push(ShadowFace {
                    view: CameraView::from_matrices(projection, view, layers, false, (camera.near, far)),
                    viewport,
                });
            }
        }
        LightKind::Ambient | LightKind::Hemisphere { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;
    use crate::render::device::RecordingDevice;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn enabled() -> ShadowMapConfig {
        ShadowMapConfig {
            enabled: true,
            ..ShadowMapConfig::default()
        }
    }

    fn scene_with_light(light: Light, position: Vec3) -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let id = scene.add_light(root, light).expect("root exists");
        if let Some(node) = scene.node_mut(id) {
            node.set_position(position);
            node.cast_shadow = true;
        }
        scene.update_matrix_world(root, false);
        (scene, id)
    }

    #[test]
    fn test_map_lifecycle_follows_casting_lights() {
        let (scene, sun) = scene_with_light(Light::directional(Color::new(1.0, 1.0, 1.0), 1.0), Vec3::new(0.0, 10.0, 0.0));
        let mut device = RecordingDevice::new();
        let mut mapper = ShadowMapper::new(enabled());

        let due = mapper.prepare(&mut device, &scene, &[sun], Layers::DEFAULT).expect("live device");
        assert_eq!(due, vec![sun]);
        assert_eq!(mapper.map(sun).map(ShadowMap::state), Some(ShadowMapState::Allocated));
        assert_eq!(device.live_render_targets(), 1);

        mapper.mark_rendered(sun, 7);
        assert_eq!(mapper.map(sun).map(ShadowMap::state), Some(ShadowMapState::Rendered { frame: 7 }));

        mapper.prepare(&mut device, &scene, &[], Layers::DEFAULT).expect("live device");
        assert!(mapper.map(sun).is_none());
        assert_eq!(device.live_render_targets(), 0);
    }

    #[test]
    fn test_disabled_mapper_renders_nothing() {
        let (scene, sun) = scene_with_light(Light::directional(Color::new(1.0, 1.0, 1.0), 1.0), Vec3::new(0.0, 10.0, 0.0));
        let mut device = RecordingDevice::new();
        let mut mapper = ShadowMapper::new(ShadowMapConfig::default());

        let due = mapper.prepare(&mut device, &scene, &[sun], Layers::DEFAULT).expect("live device");
        assert!(due.is_empty());
        assert!(mapper.is_empty());
    }

    #[test]
    fn test_manual_updates_render_allocated_maps_once() {
        let mut light = Light::directional(Color::new(1.0, 1.0, 1.0), 1.0);
        light.shadow.auto_update = false;
        let (scene, sun) = scene_with_light(light, Vec3::new(0.0, 10.0, 0.0));
        let mut device = RecordingDevice::new();
        let mut mapper = ShadowMapper::new(enabled());

        assert_eq!(mapper.prepare(&mut device, &scene, &[sun], Layers::DEFAULT).expect("live device"), vec![sun]);
        mapper.mark_rendered(sun, 1);
        assert!(mapper.prepare(&mut device, &scene, &[sun], Layers::DEFAULT).expect("live device").is_empty());
    }

    #[test]
    fn test_point_light_uses_six_faces_in_atlas() {
        let (scene, bulb) = scene_with_light(Light::point(Color::new(1.0, 1.0, 1.0), 1.0, 25.0), Vec3::new(1.0, 2.0, 3.0));
        let mut device = RecordingDevice::new();
        let mut mapper = ShadowMapper::new(enabled());
        mapper.prepare(&mut device, &scene, &[bulb], Layers::DEFAULT).expect("live device");

        let map = mapper.map(bulb).expect("allocated");
        assert_eq!(map.target_size(), (2048, 1024));
        assert_eq!(map.faces().len(), 6);
        assert_eq!(map.faces()[0].viewport, Viewport::new(1024, 512, 512, 512));
        assert_eq!(map.clip_range(), (0.5, 25.0));
        assert_relative_eq!(map.matrix().translation_part(), Vec3::new(-1.0, -2.0, -3.0), epsilon = EPSILON);
    }

    #[test]
    fn test_directional_matrix_maps_target_to_texture_centre() {
        let (scene, sun) = scene_with_light(Light::directional(Color::new(1.0, 1.0, 1.0), 1.0), Vec3::new(0.0, 10.0, 0.0));
        let mut device = RecordingDevice::new();
        let mut mapper = ShadowMapper::new(enabled());
        mapper.prepare(&mut device, &scene, &[sun], Layers::DEFAULT).expect("live device");

        let matrix = mapper.map(sun).map(|map| *map.matrix()).expect("allocated");
        let projected = matrix * crate::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(projected.x, 0.5, epsilon = EPSILON);
        assert_relative_eq!(projected.y, 0.5, epsilon = EPSILON);
    }

    #[test]
    fn test_depth_variants_are_shared_and_inherit_cutout() {
        let mut mapper = ShadowMapper::new(enabled());
        let cutout = Material::standard().with_alpha_test(0.5).with_side(Side::Double);
        let same = Material::lambert().with_alpha_test(0.5).with_side(Side::Double);

        let first = mapper.depth_variant(&cutout, false);
        assert_eq!(mapper.depth_variant(&same, false), first);
        assert_ne!(mapper.depth_variant(&cutout, true), first);

        let variant = mapper.variant(first).expect("cached");
        assert_eq!(variant.alpha_test, 0.5);
        assert_eq!(variant.side, Side::Double);
        assert_eq!(mapper.variant_count(), 2);
    }

    #[test]
    fn test_vsm_flips_variant_side() {
        let mut mapper = ShadowMapper::new(ShadowMapConfig {
            enabled: true,
            shadow_type: ShadowMapType::Vsm,
            ..ShadowMapConfig::default()
        });
        let id = mapper.depth_variant(&Material::basic(), false);
        assert_eq!(mapper.variant(id).map(|m| m.side), Some(Side::Back));
    }
}
