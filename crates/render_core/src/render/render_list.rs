//! # Render Lists
//!
//! Per-frame draw records gathered from the scene and bucketed for
//! submission.
//!
//! ## Architecture
//!
//! - **RenderItem**: one draw of one mesh (or one geometry group of a mesh)
//! - **RenderList**: opaque, transmissive and transparent buckets holding
//!   indices into a pooled item store that keeps its records across frames
//! - **RenderListBuilder**: culling traversal that fills a list and collects
//!   the lights seen on the way
//!
//! Opaque items sort by state first and front to back within a material;
//! transmissive and transparent items sort back to front.

use std::cmp::Ordering;

use crate::foundation::collections::FramePool;
use crate::scene::{
    CameraView, GeometryGroup, GeometryId, MaterialId, MaterialSlot, NodeId, NodeKind, Scene,
};

/// Bucket an item is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Depth-writing surfaces
    Opaque,
    /// Surfaces that refract what is behind them
    Transmissive,
    /// Alpha-blended surfaces
    Transparent,
}

/// Single draw gathered for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderItem {
    /// Insertion order within the frame, the final sort tie-breaker
    pub id: u32,
    /// Mesh node
    pub node: NodeId,
    /// Geometry drawn
    pub geometry: GeometryId,
    /// Material drawn with
    pub material: MaterialId,
    /// Geometry group, `None` for the full draw range
    pub group: Option<GeometryGroup>,
    /// Depth along the view axis, larger is further away
    pub z: f32,
    /// Render order of the node
    pub render_order: i32,
    /// Render order of the closest enclosing group
    pub group_order: i32,
    /// Sequential id of the material
    pub material_id: u32,
}

/// Ordering used for one bucket
pub type RenderItemComparator = fn(&RenderItem, &RenderItem) -> Ordering;

/// Opaque ordering: state groups first, then front to back
pub fn painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(a.material_id.cmp(&b.material_id))
        .then(a.z.total_cmp(&b.z))
        .then(a.id.cmp(&b.id))
}

/// Blended ordering: back to front within each render order
pub fn reverse_painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(b.z.total_cmp(&a.z))
        .then(a.id.cmp(&b.id))
}

/// Bucketed draw list rebuilt every frame
#[derive(Debug, Default)]
pub struct RenderList {
    items: FramePool<RenderItem>,
    opaque: Vec<usize>,
    transmissive: Vec<usize>,
    transparent: Vec<usize>,
}

impl RenderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame; pooled records are reused
    pub fn init(&mut self) {
        self.items.reset();
        self.opaque.clear();
        self.transmissive.clear();
        self.transparent.clear();
    }

    /// Append an item; its `id` is replaced by the insertion counter
    pub fn push(&mut self, bucket: Bucket, item: RenderItem) {
        let (index, slot) = self.items.next_slot();
        *slot = RenderItem {
            id: u32::try_from(index).unwrap_or(u32::MAX),
            ..item
        };
        match bucket {
            Bucket::Opaque => self.opaque.push(index),
            Bucket::Transmissive => self.transmissive.push(index),
            Bucket::Transparent => self.transparent.push(index),
        }
    }

    /// Stable sort of every bucket
    pub fn sort(&mut self, opaque: RenderItemComparator, transparent: RenderItemComparator) {
        let items = self.items.active();
        self.opaque.sort_by(|&a, &b| opaque(&items[a], &items[b]));
        self.transmissive.sort_by(|&a, &b| transparent(&items[a], &items[b]));
        self.transparent.sort_by(|&a, &b| transparent(&items[a], &items[b]));
    }

    /// Drop what unused pool records still point at
    pub fn finish(&mut self) {
        for stale in self.items.stale_mut() {
            *stale = RenderItem::default();
        }
    }

    fn indices(&self, bucket: Bucket) -> &[usize] {
        match bucket {
            Bucket::Opaque => &self.opaque,
            Bucket::Transmissive => &self.transmissive,
            Bucket::Transparent => &self.transparent,
        }
    }

    /// Items of one bucket in draw order
    pub fn bucket(&self, bucket: Bucket) -> impl Iterator<Item = &RenderItem> + '_ {
        self.indices(bucket).iter().filter_map(|&index| self.items.get(index))
    }

    /// Number of items in one bucket
    pub fn bucket_len(&self, bucket: Bucket) -> usize {
        self.indices(bucket).len()
    }

    /// The `position`-th item of a bucket in draw order
    pub fn item(&self, bucket: Bucket, position: usize) -> Option<RenderItem> {
        let index = *self.indices(bucket).get(position)?;
        self.items.get(index).copied()
    }

    /// Opaque items in draw order
    pub fn opaque(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.bucket(Bucket::Opaque)
    }

    /// Transmissive items in draw order
    pub fn transmissive(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.bucket(Bucket::Transmissive)
    }

    /// Transparent items in draw order
    pub fn transparent(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.bucket(Bucket::Transparent)
    }

    /// Snapshot of every bucket in draw order
    pub fn draw_order(&self) -> Vec<RenderItem> {
        self.opaque()
            .chain(self.transmissive())
            .chain(self.transparent())
            .copied()
            .collect()
    }

    /// Items pushed this frame
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was pushed this frame
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records kept for reuse
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}

/// What a traversal gathers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Everything visible from the camera, plus lights
    Main,
    /// Shadow-casting meshes only, all into the opaque bucket
    ShadowCasters,
}

/// Culling traversal that fills a [`RenderList`]
#[derive(Debug, Default)]
pub struct RenderListBuilder {
    lights: Vec<NodeId>,
    shadow_lights: Vec<NodeId>,
    stack: Vec<(NodeId, i32)>,
}

impl RenderListBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Lights found by the last [`BuildMode::Main`] build
    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }

    /// Lights that cast shadows, found by the last main build
    pub fn shadow_lights(&self) -> &[NodeId] {
        &self.shadow_lights
    }

    /// Fill `list` from the scene root as seen by `view`.
    ///
    /// World matrices must be current. The list is initialized but not sorted.
    pub fn build(&mut self, scene: &Scene, view: &CameraView, list: &mut RenderList, mode: BuildMode) {
        list.init();
        if mode == BuildMode::Main {
            self.lights.clear();
            self.shadow_lights.clear();
        }

        self.stack.clear();
        self.stack.push((scene.root(), 0));

        while let Some((id, group_order)) = self.stack.pop() {
            let Some(node) = scene.node(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }

            let mut child_group_order = group_order;
            if node.layers.test(view.layers) {
                match &node.kind {
                    NodeKind::Group => child_group_order = node.render_order,
                    NodeKind::Light(light) if mode == BuildMode::Main => {
                        self.lights.push(id);
                        if node.cast_shadow && light.supports_shadows() {
                            self.shadow_lights.push(id);
                        }
                    }
                    NodeKind::Mesh(mesh) if mode == BuildMode::Main || node.cast_shadow => {
                        Self::push_mesh(scene, view, list, mode, id, mesh.geometry, &mesh.material, group_order);
                    }
                    _ => {}
                }
            } else if matches!(node.kind, NodeKind::Group) {
                child_group_order = node.render_order;
            }

            self.stack
                .extend(node.children().iter().rev().map(|child| (*child, child_group_order)));
        }
    }

    fn push_mesh(
        scene: &Scene,
        view: &CameraView,
        list: &mut RenderList,
        mode: BuildMode,
        id: NodeId,
        geometry_id: GeometryId,
        slot: &MaterialSlot,
        group_order: i32,
    ) {
        let Some(node) = scene.node(id) else {
            return;
        };
        let Some(geometry) = scene.geometry(geometry_id) else {
            log::trace!("RenderListBuilder: mesh {id:?} references missing geometry {geometry_id:?}");
            return;
        };

        let sphere = geometry.bounding_sphere_or_compute().transformed(node.matrix_world());
        if node.frustum_culled && !view.frustum.intersects_sphere(&sphere) {
            return;
        }
        let z = view.depth_of(&sphere.center);

        let mut emit = |material_id: MaterialId, group: Option<GeometryGroup>| {
            let Some(material) = scene.material(material_id) else {
                return;
            };
            if !material.visible {
                return;
            }
            let bucket = match mode {
                BuildMode::ShadowCasters => Bucket::Opaque,
                BuildMode::Main if material.transmission > 0.0 => Bucket::Transmissive,
                BuildMode::Main if material.transparent => Bucket::Transparent,
                BuildMode::Main => Bucket::Opaque,
            };
            list.push(
                bucket,
                RenderItem {
                    id: 0,
                    node: id,
                    geometry: geometry_id,
                    material: material_id,
                    group,
                    z,
                    render_order: node.render_order,
                    group_order,
                    material_id: material.id(),
                },
            );
        };

        match slot {
            MaterialSlot::Single(material) => emit(*material, None),
            MaterialSlot::Multi(_) => {
                for group in geometry.groups() {
                    if let Some(material) = slot.get(group.material_index) {
                        emit(material, Some(*group));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Color, Vec3};
    use crate::scene::{Camera, Geometry, Layers, Light, Material, Mesh, Node};

    fn item(id: u32, z: f32, material_id: u32) -> RenderItem {
        RenderItem {
            id,
            z,
            material_id,
            ..RenderItem::default()
        }
    }

    fn view_from_origin() -> CameraView {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.update_view(&crate::foundation::math::Mat4::identity());
        camera.snapshot(Layers::DEFAULT)
    }

    fn scene_with_quad() -> (Scene, crate::scene::GeometryId) {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(Geometry::plane(1.0, 1.0));
        (scene, geometry)
    }

    #[test]
    fn test_transparent_bucket_sorts_back_to_front() {
        let mut list = RenderList::new();
        list.init();
        for z in [1.0, 10.0, 5.0] {
            list.push(Bucket::Transparent, item(0, z, 0));
        }
        list.sort(painter_sort_stable, reverse_painter_sort_stable);

        let depths: Vec<f32> = list.transparent().map(|item| item.z).collect();
        assert_eq!(depths, vec![10.0, 5.0, 1.0]);
    }

    #[test]
    fn test_opaque_sort_groups_by_material_then_depth() {
        let mut list = RenderList::new();
        list.init();
        list.push(Bucket::Opaque, item(0, 3.0, 1));
        list.push(Bucket::Opaque, item(0, 9.0, 0));
        list.push(Bucket::Opaque, item(0, 1.0, 1));
        list.push(Bucket::Opaque, item(0, 2.0, 0));
        list.sort(painter_sort_stable, reverse_painter_sort_stable);

        let order: Vec<(u32, f32)> = list.opaque().map(|item| (item.material_id, item.z)).collect();
        assert_eq!(order, vec![(0, 2.0), (0, 9.0), (1, 1.0), (1, 3.0)]);
    }

    #[test]
    fn test_equal_keys_keep_insertion_order() {
        let mut first = Vec::new();
        for _ in 0..3 {
            let mut list = RenderList::new();
            list.init();
            for _ in 0..4 {
                list.push(Bucket::Opaque, item(0, 5.0, 2));
            }
            list.sort(painter_sort_stable, reverse_painter_sort_stable);
            let ids: Vec<u32> = list.opaque().map(|item| item.id).collect();
            if first.is_empty() {
                first = ids.clone();
            }
            assert_eq!(ids, first);
        }
        assert_eq!(first, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_render_order_beats_depth() {
        let mut list = RenderList::new();
        list.init();
        list.push(
            Bucket::Transparent,
            RenderItem {
                render_order: 1,
                ..item(0, 100.0, 0)
            },
        );
        list.push(Bucket::Transparent, item(0, 1.0, 0));
        list.sort(painter_sort_stable, reverse_painter_sort_stable);

        let orders: Vec<i32> = list.transparent().map(|item| item.render_order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_indexed_access_follows_sorted_order() {
        let mut list = RenderList::new();
        list.init();
        list.push(Bucket::Opaque, item(0, 9.0, 0));
        list.push(Bucket::Opaque, item(0, 2.0, 0));
        list.push(Bucket::Transparent, item(0, 4.0, 0));
        list.sort(painter_sort_stable, reverse_painter_sort_stable);

        assert_eq!(list.bucket_len(Bucket::Opaque), 2);
        assert_eq!(list.bucket_len(Bucket::Transmissive), 0);
        assert_eq!(list.item(Bucket::Opaque, 0).map(|item| item.id), Some(1));
        assert_eq!(list.item(Bucket::Opaque, 1).map(|item| item.id), Some(0));
        assert_eq!(list.item(Bucket::Opaque, 2), None);
        assert_eq!(list.item(Bucket::Transparent, 0).map(|item| item.id), Some(2));
    }

    #[test]
    fn test_pool_records_survive_frames() {
        let mut list = RenderList::new();
        list.init();
        for _ in 0..5 {
            list.push(Bucket::Opaque, item(0, 0.0, 0));
        }
        list.init();
        list.push(Bucket::Opaque, item(0, 0.0, 0));
        list.finish();

        assert_eq!(list.len(), 1);
        assert_eq!(list.capacity(), 5);
    }

    #[test]
    fn test_culling_keeps_near_sphere_and_drops_far_one() {
        let (mut scene, geometry) = scene_with_quad();
        let material = scene.add_material(Material::basic());
        let root = scene.root();
        let near = scene.add_mesh(root, geometry, material).expect("root exists");
        let far = scene.add_mesh(root, geometry, material).expect("root exists");
        scene.node_mut(near).map(|n| n.set_position(Vec3::new(0.0, 0.0, -50.0)));
        scene.node_mut(far).map(|n| n.set_position(Vec3::new(0.0, 0.0, -200.0)));
        scene.update_matrix_world(root, false);

        let mut list = RenderList::new();
        RenderListBuilder::new().build(&scene, &view_from_origin(), &mut list, BuildMode::Main);

        let nodes: Vec<NodeId> = list.opaque().map(|item| item.node).collect();
        assert_eq!(nodes, vec![near]);
        assert!((list.opaque().next().map_or(0.0, |item| item.z) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_buckets_follow_material_flags() {
        let (mut scene, geometry) = scene_with_quad();
        let opaque = scene.add_material(Material::basic());
        let blended = scene.add_material(Material::basic().with_transparency(0.5));
        let glass = scene.add_material(Material::physical().with_transmission(1.0));
        let root = scene.root();
        for material in [opaque, blended, glass] {
            let mesh = scene.add_mesh(root, geometry, material).expect("root exists");
            scene.node_mut(mesh).map(|n| n.set_position(Vec3::new(0.0, 0.0, -5.0)));
        }
        scene.update_matrix_world(root, false);

        let mut list = RenderList::new();
        RenderListBuilder::new().build(&scene, &view_from_origin(), &mut list, BuildMode::Main);

        assert_eq!(list.opaque().count(), 1);
        assert_eq!(list.transmissive().count(), 1);
        assert_eq!(list.transparent().count(), 1);
    }

    #[test]
    fn test_hidden_subtree_layers_and_invisible_materials_are_skipped() {
        let (mut scene, geometry) = scene_with_quad();
        let shown = scene.add_material(Material::basic());
        let mut hidden_material = Material::basic();
        hidden_material.visible = false;
        let hidden_material = scene.add_material(hidden_material);
        let root = scene.root();

        let hidden_group = scene.add_group(root).expect("root exists");
        scene.node_mut(hidden_group).map(|n| n.visible = false);
        let mut nodes = vec![
            scene.add_mesh(hidden_group, geometry, shown).expect("group exists"),
            scene.add_mesh(root, geometry, hidden_material).expect("root exists"),
        ];
        let other_layer = scene.add_mesh(root, geometry, shown).expect("root exists");
        scene.node_mut(other_layer).map(|n| n.layers = Layers::single(4));
        nodes.push(other_layer);
        let drawn = scene.add_mesh(root, geometry, shown).expect("root exists");
        nodes.push(drawn);
        for node in nodes {
            scene.node_mut(node).map(|n| n.set_position(Vec3::new(0.0, 0.0, -5.0)));
        }
        scene.update_matrix_world(root, false);

        let mut list = RenderList::new();
        RenderListBuilder::new().build(&scene, &view_from_origin(), &mut list, BuildMode::Main);

        let nodes: Vec<NodeId> = list.draw_order().iter().map(|item| item.node).collect();
        assert_eq!(nodes, vec![drawn]);
    }

    #[test]
    fn test_material_array_emits_one_item_per_group() {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(
            Geometry::plane(1.0, 1.0)
                .with_group(0, 3, 0)
                .with_group(3, 3, 1)
                .with_group(0, 6, 7),
        );
        let red = scene.add_material(Material::basic().with_color(Color::new(1.0, 0.0, 0.0)));
        let blue = scene.add_material(Material::basic().with_color(Color::new(0.0, 0.0, 1.0)));
        let root = scene.root();
        let mesh = scene
            .add_node(root, Node::new(NodeKind::Mesh(Mesh::with_groups(geometry, vec![red, blue]))))
            .expect("root exists");
        scene.node_mut(mesh).map(|n| n.set_position(Vec3::new(0.0, 0.0, -5.0)));
        scene.update_matrix_world(root, false);

        let mut list = RenderList::new();
        RenderListBuilder::new().build(&scene, &view_from_origin(), &mut list, BuildMode::Main);

        let groups: Vec<(MaterialId, u32)> = list
            .opaque()
            .filter_map(|item| item.group.map(|group| (item.material, group.start)))
            .collect();
        assert_eq!(groups, vec![(red, 0), (blue, 3)]);
    }

    #[test]
    fn test_group_render_order_propagates_to_children() {
        let (mut scene, geometry) = scene_with_quad();
        let material = scene.add_material(Material::basic());
        let root = scene.root();
        let group = scene.add_group(root).expect("root exists");
        scene.node_mut(group).map(|n| n.render_order = 3);
        let mesh = scene.add_mesh(group, geometry, material).expect("group exists");
        scene.node_mut(mesh).map(|n| n.set_position(Vec3::new(0.0, 0.0, -5.0)));
        scene.update_matrix_world(root, false);

        let mut list = RenderList::new();
        RenderListBuilder::new().build(&scene, &view_from_origin(), &mut list, BuildMode::Main);

        assert_eq!(list.opaque().next().map(|item| item.group_order), Some(3));
    }

    #[test]
    fn test_lights_and_shadow_casters_are_collected() {
        let (mut scene, geometry) = scene_with_quad();
        let material = scene.add_material(Material::basic());
        let root = scene.root();
        let sun = scene
            .add_light(root, Light::directional(Color::new(1.0, 1.0, 1.0), 1.0))
            .expect("root exists");
        scene.node_mut(sun).map(|n| n.cast_shadow = true);
        let ambient = scene
            .add_light(root, Light::ambient(Color::new(1.0, 1.0, 1.0), 0.2))
            .expect("root exists");
        let caster = scene.add_mesh(root, geometry, material).expect("root exists");
        let receiver = scene.add_mesh(root, geometry, material).expect("root exists");
        for node in [caster, receiver] {
            scene.node_mut(node).map(|n| n.set_position(Vec3::new(0.0, 0.0, -5.0)));
        }
        scene.node_mut(caster).map(|n| n.cast_shadow = true);
        scene.update_matrix_world(root, false);

        let view = view_from_origin();
        let mut builder = RenderListBuilder::new();
        let mut list = RenderList::new();
        builder.build(&scene, &view, &mut list, BuildMode::Main);
        assert_eq!(builder.lights(), &[sun, ambient]);
        assert_eq!(builder.shadow_lights(), &[sun]);

        builder.build(&scene, &view, &mut list, BuildMode::ShadowCasters);
        let nodes: Vec<NodeId> = list.opaque().map(|item| item.node).collect();
        assert_eq!(nodes, vec![caster]);
        assert_eq!(builder.lights().len(), 2);
    }

    #[test]
    fn test_rebuild_without_changes_is_idempotent() {
        let (mut scene, geometry) = scene_with_quad();
        let material = scene.add_material(Material::basic().with_transparency(0.5));
        let root = scene.root();
        for z in [-3.0, -8.0, -1.0] {
            let mesh = scene.add_mesh(root, geometry, material).expect("root exists");
            scene.node_mut(mesh).map(|n| n.set_position(Vec3::new(0.0, 0.0, z)));
        }
        scene.update_matrix_world(root, false);

        let view = view_from_origin();
        let mut builder = RenderListBuilder::new();
        let mut list = RenderList::new();
        builder.build(&scene, &view, &mut list, BuildMode::Main);
        let first = list.draw_order();
        builder.build(&scene, &view, &mut list, BuildMode::Main);
        assert_eq!(list.draw_order(), first);
    }
}
