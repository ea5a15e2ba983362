//! Scene arena and graph operations

use slotmap::SlotMap;

use super::{
    Camera, Geometry, GeometryId, Light, Material, MaterialId, MaterialSlot, Mesh, Node, NodeId,
    NodeKind, SceneError, SceneResult, Texture, TextureId, Tracked,
};
use crate::foundation::math::{Color, Mat4, Mat4Ext, Transform};

/// Distance fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fog {
    /// Linear ramp between two distances
    Linear {
        /// Fog colour
        color: Color,
        /// Start distance
        near: f32,
        /// Full-fog distance
        far: f32,
    },
    /// Squared exponential falloff
    Exponential {
        /// Fog colour
        color: Color,
        /// Density
        density: f32,
    },
}

/// Release requested by the host, consumed by the renderer at the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Geometry buffers can be freed
    Geometry(GeometryId),
    /// Material programs can be released
    Material(MaterialId),
    /// Texture can be freed
    Texture(TextureId),
    /// Node left the scene; per-node GPU state (shadow maps) can be freed
    Node(NodeId),
}

/// Node hierarchy plus the data arenas its meshes reference
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    geometries: SlotMap<GeometryId, Geometry>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    next_material_id: u32,
    disposals: Vec<Disposal>,
    /// Distance fog applied to materials with `fog` set
    pub fog: Option<Fog>,
    /// Clear colour override
    pub background: Option<Color>,
    /// Material used for every mesh instead of its own
    pub override_material: Option<MaterialId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene with an empty root group
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(NodeKind::Group).named("root"));
        Self {
            nodes,
            root,
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            next_material_id: 0,
            disposals: Vec::new(),
            fog: None,
            background: None,
            override_material: None,
        }
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    // === Nodes ===

    /// Insert a detached node
    pub fn spawn(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node under `parent`
    pub fn add_node(&mut self, parent: NodeId, node: Node) -> SceneResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(Self::reject(SceneError::NodeNotFound(parent)));
        }
        let id = self.nodes.insert(node);
        self.add(parent, id)?;
        Ok(id)
    }

    /// Insert a group under `parent`
    pub fn add_group(&mut self, parent: NodeId) -> SceneResult<NodeId> {
        self.add_node(parent, Node::new(NodeKind::Group))
    }

    /// Insert a mesh under `parent`
    pub fn add_mesh(&mut self, parent: NodeId, geometry: GeometryId, material: MaterialId) -> SceneResult<NodeId> {
        self.add_node(parent, Node::new(NodeKind::Mesh(Mesh::new(geometry, material))))
    }

    /// Insert a camera under `parent`
    pub fn add_camera(&mut self, parent: NodeId, camera: Camera) -> SceneResult<NodeId> {
        self.add_node(parent, Node::new(NodeKind::Camera(camera)))
    }

    /// Insert a light under `parent`
    pub fn add_light(&mut self, parent: NodeId, light: Light) -> SceneResult<NodeId> {
        self.add_node(parent, Node::new(NodeKind::Light(light)))
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node by id
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// True when `id` names a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every live node, attached or not
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Make `child` the last child of `parent`, detaching it from its previous parent.
    ///
    /// Self-parenting and cycles are rejected without touching the graph.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        if parent == child {
            return Err(Self::reject(SceneError::SelfParent(child)));
        }
        self.validate_link(parent, child)?;

        self.detach(child);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
            child_node.mark_world_dirty();
        }
        Ok(())
    }

    /// Detach `child` from `parent`
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let node = self
            .nodes
            .get(child)
            .ok_or(SceneError::NodeNotFound(child))
            .map_err(Self::reject)?;
        if node.parent != Some(parent) {
            return Err(Self::reject(SceneError::NotAChild { parent, child }));
        }

        self.detach(child);
        Ok(())
    }

    /// Reparent `child` under `parent` keeping its world transform
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        if parent == child {
            return Err(Self::reject(SceneError::SelfParent(child)));
        }
        self.validate_link(parent, child)?;

        self.update_world_matrix(parent, true, false);
        let old_parent_world = match self.nodes.get(child).and_then(|node| node.parent) {
            Some(old_parent) => {
                self.update_world_matrix(old_parent, true, false);
                self.world_matrix(old_parent)
            }
            None => Mat4::identity(),
        };
        let new_parent_inverse = self.world_matrix(parent).try_inverse_or_identity();

        if let Some(node) = self.nodes.get_mut(child) {
            node.update_matrix();
            let local = new_parent_inverse * old_parent_world * node.matrix();
            node.set_transform(Transform::from_matrix(&local));
        }

        self.add(parent, child)
    }

    /// Remove `id` and all of its descendants from the arena
    pub fn remove_subtree(&mut self, id: NodeId) -> SceneResult<()> {
        if id == self.root {
            return Err(Self::reject(SceneError::RootRemoval));
        }
        if !self.nodes.contains_key(id) {
            return Err(Self::reject(SceneError::NodeNotFound(id)));
        }

        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
                self.disposals.push(Disposal::Node(current));
            }
        }
        log::debug!("Scene: removed subtree rooted at {id:?}");
        Ok(())
    }

    /// Visit `id` and its descendants depth first, parents before children
    pub fn traverse(&self, id: NodeId, mut visit: impl FnMut(NodeId, &Node)) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                visit(current, node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// Like [`Scene::traverse`] but skips hidden nodes and their subtrees
    pub fn traverse_visible(&self, id: NodeId, mut visit: impl FnMut(NodeId, &Node)) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                if !node.visible {
                    continue;
                }
                visit(current, node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// First node under the root with the given name, depth first
    pub fn get_object_by_name(&self, name: &str) -> Option<NodeId> {
        let mut found = None;
        self.traverse(self.root, |id, node| {
            if found.is_none() && node.name == name {
                found = Some(id);
            }
        });
        found
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// True when `id` is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_ancestor(self.root, id)
    }

    /// Point a mesh at different geometry
    pub fn set_geometry(&mut self, node: NodeId, geometry: GeometryId) -> SceneResult<()> {
        match self.nodes.get_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Mesh(mesh)) => {
                mesh.geometry = geometry;
                Ok(())
            }
            Some(_) => Err(Self::reject(SceneError::NotAMesh(node))),
            None => Err(Self::reject(SceneError::NodeNotFound(node))),
        }
    }

    /// Bind a mesh to a material or material array
    pub fn set_material(&mut self, node: NodeId, material: impl Into<MaterialSlot>) -> SceneResult<()> {
        match self.nodes.get_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Mesh(mesh)) => {
                mesh.material = material.into();
                Ok(())
            }
            Some(_) => Err(Self::reject(SceneError::NotAMesh(node))),
            None => Err(Self::reject(SceneError::NodeNotFound(node))),
        }
    }

    // === Transforms ===

    /// Dirty-driven update of `id` and its subtree.
    ///
    /// A node recomputes its world matrix when it is dirty or `force` is set,
    /// and once it did, every descendant recomputes too.
    pub fn update_matrix_world(&mut self, id: NodeId, force: bool) {
        let mut stack = vec![(id, force)];
        while let Some((current, force)) = stack.pop() {
            let parent_world = self.parent_world(current);
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };

            if node.matrix_auto_update {
                node.update_matrix();
            }

            let mut force_children = force;
            if node.matrix_world_needs_update || force {
                node.matrix_world = parent_world.map_or(*node.matrix(), |world| world * node.matrix());
                node.matrix_world_needs_update = false;
                force_children = true;
            }

            stack.extend(node.children.iter().rev().map(|child| (*child, force_children)));
        }
    }

    /// Unconditional update of one node, optionally walking the ancestor
    /// chain first and the subtree after
    pub fn update_world_matrix(&mut self, id: NodeId, update_parents: bool, update_children: bool) {
        if update_parents {
            let mut chain = Vec::new();
            let mut current = self.nodes.get(id).and_then(|node| node.parent);
            while let Some(ancestor) = current {
                chain.push(ancestor);
                current = self.nodes.get(ancestor).and_then(|node| node.parent);
            }
            for ancestor in chain.into_iter().rev() {
                self.recompute_world(ancestor);
            }
        }

        self.recompute_world(id);

        if update_children {
            let mut stack: Vec<NodeId> = self
                .nodes
                .get(id)
                .map(|node| node.children.iter().rev().copied().collect())
                .unwrap_or_default();
            while let Some(current) = stack.pop() {
                self.recompute_world(current);
                if let Some(node) = self.nodes.get(current) {
                    stack.extend(node.children.iter().rev().copied());
                }
            }
        }
    }

    /// Cached world matrix, identity for stale ids
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        self.nodes.get(id).map_or_else(Mat4::identity, |node| node.matrix_world)
    }

    fn recompute_world(&mut self, id: NodeId) {
        let parent_world = self.parent_world(id);
        if let Some(node) = self.nodes.get_mut(id) {
            if node.matrix_auto_update {
                node.update_matrix();
            }
            node.matrix_world = parent_world.map_or(*node.matrix(), |world| world * node.matrix());
            node.matrix_world_needs_update = false;
        }
    }

    fn parent_world(&self, id: NodeId) -> Option<Mat4> {
        self.nodes
            .get(id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| parent.matrix_world)
    }

    fn validate_link(&self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(Self::reject(SceneError::NodeNotFound(parent)));
        }
        if !self.nodes.contains_key(child) {
            return Err(Self::reject(SceneError::NodeNotFound(child)));
        }
        if self.is_ancestor(child, parent) {
            return Err(Self::reject(SceneError::CycleDetected { parent, child }));
        }
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.nodes.get_mut(child).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(old_parent) {
            parent_node.children.retain(|id| *id != child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.mark_world_dirty();
        }
    }

    fn reject(error: SceneError) -> SceneError {
        log::error!("Scene: rejected edit: {error}");
        error
    }

    // === Geometry ===

    /// Add geometry; its bounding sphere is computed if absent
    pub fn add_geometry(&mut self, mut geometry: Geometry) -> GeometryId {
        if geometry.bounding_sphere().is_none() {
            geometry.compute_bounding_sphere();
        }
        self.geometries.insert(geometry)
    }

    /// Geometry by id
    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    /// Mutable geometry; writes bump its version when the guard drops
    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<Tracked<'_, Geometry>> {
        self.geometries.get_mut(id).map(Tracked::new)
    }

    /// Remove geometry and queue its buffers for release; false if already gone
    pub fn dispose_geometry(&mut self, id: GeometryId) -> bool {
        let removed = self.geometries.remove(id).is_some();
        if removed {
            self.disposals.push(Disposal::Geometry(id));
        }
        removed
    }

    // === Materials ===

    /// Add a material and assign its sequential id
    pub fn add_material(&mut self, mut material: Material) -> MaterialId {
        material.set_id(self.next_material_id);
        self.next_material_id += 1;
        self.materials.insert(material)
    }

    /// Material by id
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Mutable material; writes bump its version when the guard drops
    pub fn material_mut(&mut self, id: MaterialId) -> Option<Tracked<'_, Material>> {
        self.materials.get_mut(id).map(Tracked::new)
    }

    /// Remove a material and queue its programs for release; false if already gone
    pub fn dispose_material(&mut self, id: MaterialId) -> bool {
        let removed = self.materials.remove(id).is_some();
        if removed {
            self.disposals.push(Disposal::Material(id));
        }
        removed
    }

    // === Textures ===

    /// Add a texture
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    /// Texture by id
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Mutable texture; writes bump its version when the guard drops
    pub fn texture_mut(&mut self, id: TextureId) -> Option<Tracked<'_, Texture>> {
        self.textures.get_mut(id).map(Tracked::new)
    }

    /// Remove a texture and queue it for release; false if already gone
    pub fn dispose_texture(&mut self, id: TextureId) -> bool {
        let removed = self.textures.remove(id).is_some();
        if removed {
            self.disposals.push(Disposal::Texture(id));
        }
        removed
    }

    /// Hand pending releases to the renderer
    pub(crate) fn drain_disposals(&mut self) -> Vec<Disposal> {
        std::mem::take(&mut self.disposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Vec3};
    use crate::scene::Layers;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn group_at(scene: &mut Scene, parent: NodeId, position: Vec3) -> NodeId {
        scene
            .add_node(parent, Node::new(NodeKind::Group).at(position))
            .expect("parent exists")
    }

    #[test]
    fn test_three_level_world_translation() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::new(1.0, 0.0, 0.0));
        let b = group_at(&mut scene, a, Vec3::new(0.0, 2.0, 0.0));
        let c = group_at(&mut scene, b, Vec3::new(0.0, 0.0, 3.0));

        scene.update_matrix_world(root, false);

        let world = scene.world_matrix(c);
        assert_relative_eq!(world.translation_part(), Vec3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
    }

    #[test]
    fn test_world_equals_parent_world_times_local() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = group_at(&mut scene, root, Vec3::new(0.0, 1.0, 0.0));
        if let Some(node) = scene.node_mut(parent) {
            node.set_rotation(Quat::from_axis_angle(&Vec3::z_axis(), 0.5));
            node.set_scale(Vec3::new(2.0, 2.0, 2.0));
        }
        let child = group_at(&mut scene, parent, Vec3::new(1.0, 0.0, 0.0));

        scene.update_matrix_world(root, false);

        let expected = scene.world_matrix(parent) * scene.node(child).map(|n| *n.matrix()).expect("child exists");
        assert_relative_eq!(scene.world_matrix(child), expected, epsilon = EPSILON);
    }

    #[test]
    fn test_second_update_is_bit_identical() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::new(0.3, 0.1, 0.7));
        let b = group_at(&mut scene, a, Vec3::new(1.1, -2.0, 0.5));

        scene.update_matrix_world(root, false);
        let first = scene.world_matrix(b);
        scene.update_matrix_world(root, false);
        assert_eq!(scene.world_matrix(b), first);
        scene.update_matrix_world(root, true);
        assert_eq!(scene.world_matrix(b), first);
    }

    #[test]
    fn test_dirty_parent_forces_children() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, a, Vec3::new(1.0, 0.0, 0.0));
        scene.update_matrix_world(root, false);

        if let Some(node) = scene.node_mut(a) {
            node.set_position(Vec3::new(0.0, 5.0, 0.0));
        }
        scene.update_matrix_world(root, false);

        assert_relative_eq!(scene.world_matrix(b).translation_part(), Vec3::new(1.0, 5.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_self_parent_is_rejected_without_mutation() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());

        assert_eq!(scene.add(a, a), Err(SceneError::SelfParent(a)));
        assert_eq!(scene.node(a).and_then(Node::parent), Some(root));
    }

    #[test]
    fn test_cycle_is_rejected_without_mutation() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, a, Vec3::zeros());
        let c = group_at(&mut scene, b, Vec3::zeros());

        assert_eq!(scene.add(c, a), Err(SceneError::CycleDetected { parent: c, child: a }));
        assert_eq!(scene.node(a).and_then(Node::parent), Some(root));
        assert!(scene.node(c).map_or(false, |n| n.children().is_empty()));
    }

    #[test]
    fn test_add_moves_child_between_parents() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, root, Vec3::zeros());
        let child = group_at(&mut scene, a, Vec3::zeros());

        scene.add(b, child).expect("valid reparent");

        assert!(scene.node(a).map_or(false, |n| n.children().is_empty()));
        assert_eq!(scene.node(b).map(|n| n.children().to_vec()), Some(vec![child]));
        assert_eq!(scene.node(child).and_then(Node::parent), Some(b));
    }

    #[test]
    fn test_remove_requires_direct_child() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, a, Vec3::zeros());

        assert_eq!(scene.remove(root, b), Err(SceneError::NotAChild { parent: root, child: b }));
        scene.remove(a, b).expect("direct child");
        assert_eq!(scene.node(b).and_then(Node::parent), None);
        assert!(!scene.is_attached(b));
    }

    #[test]
    fn test_attach_preserves_world_transform() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::new(5.0, 0.0, 0.0));
        let b = group_at(&mut scene, root, Vec3::new(0.0, 3.0, 0.0));
        let child = group_at(&mut scene, a, Vec3::new(1.0, 0.0, 0.0));
        scene.update_matrix_world(root, false);
        let before = scene.world_matrix(child);

        scene.attach(b, child).expect("valid attach");
        scene.update_matrix_world(root, false);

        assert_relative_eq!(scene.world_matrix(child), before, epsilon = EPSILON);
        assert_relative_eq!(
            scene.node(child).map(Node::position).expect("child exists"),
            Vec3::new(6.0, -3.0, 0.0),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_remove_subtree_invalidates_ids_and_queues_disposal() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, a, Vec3::zeros());

        scene.remove_subtree(a).expect("live node");

        assert!(scene.node(a).is_none());
        assert!(scene.node(b).is_none());
        assert!(scene.node(root).map_or(false, |n| n.children().is_empty()));
        let disposals = scene.drain_disposals();
        assert!(disposals.contains(&Disposal::Node(a)));
        assert!(disposals.contains(&Disposal::Node(b)));
        assert_eq!(scene.remove_subtree(root), Err(SceneError::RootRemoval));
    }

    #[test]
    fn test_update_world_matrix_walks_detached_parent_chain() {
        let mut scene = Scene::new();
        let rig = scene.spawn(Node::new(NodeKind::Group).at(Vec3::new(0.0, 0.0, 10.0)));
        let camera = scene
            .add_camera(rig, Camera::perspective(60.0, 1.0, 0.1, 100.0))
            .expect("rig exists");
        if let Some(node) = scene.node_mut(camera) {
            node.set_position(Vec3::new(0.0, 1.0, 0.0));
        }

        scene.update_world_matrix(camera, true, false);

        assert_relative_eq!(scene.world_matrix(camera).translation_part(), Vec3::new(0.0, 1.0, 10.0), epsilon = EPSILON);
    }

    #[test]
    fn test_traverse_visits_parents_first_and_visible_skips_hidden() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = group_at(&mut scene, root, Vec3::zeros());
        let b = group_at(&mut scene, a, Vec3::zeros());
        let c = group_at(&mut scene, root, Vec3::zeros());

        let mut order = Vec::new();
        scene.traverse(root, |id, _| order.push(id));
        assert_eq!(order, vec![root, a, b, c]);

        if let Some(node) = scene.node_mut(a) {
            node.visible = false;
        }
        let mut visible = Vec::new();
        scene.traverse_visible(root, |id, _| visible.push(id));
        assert_eq!(visible, vec![root, c]);
    }

    #[test]
    fn test_get_object_by_name() {
        let mut scene = Scene::new();
        let root = scene.root();
        let lamp = scene
            .add_node(root, Node::new(NodeKind::Group).named("lamp"))
            .expect("root exists");
        assert_eq!(scene.get_object_by_name("lamp"), Some(lamp));
        assert_eq!(scene.get_object_by_name("missing"), None);
    }

    #[test]
    fn test_material_ids_are_sequential_and_mutation_bumps_version() {
        let mut scene = Scene::new();
        let first = scene.add_material(Material::basic());
        let second = scene.add_material(Material::lambert());
        assert_eq!(scene.material(first).map(Material::id), Some(0));
        assert_eq!(scene.material(second).map(Material::id), Some(1));

        if let Some(material) = scene.material_mut(first) {
            let _ = material.opacity;
        }
        assert_eq!(scene.material(first).map(Material::version), Some(0));

        if let Some(mut material) = scene.material_mut(first) {
            material.opacity = 0.5;
        }
        assert_eq!(scene.material(first).map(Material::version), Some(1));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::basic());
        assert!(scene.dispose_material(material));
        assert!(!scene.dispose_material(material));
        assert_eq!(scene.drain_disposals(), vec![Disposal::Material(material)]);
    }

    #[test]
    fn test_new_nodes_default_to_layer_zero() {
        let mut scene = Scene::new();
        let root = scene.root();
        let node = group_at(&mut scene, root, Vec3::zeros());
        assert_eq!(scene.node(node).map(|n| n.layers), Some(Layers::DEFAULT));
    }
}
