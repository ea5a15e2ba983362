//! Scene nodes
//!
//! A node carries a local transform, cached local and world matrices, the
//! visibility flags read by the render-list builder, and a kind payload that
//! makes it a group, a mesh, a camera or a light. Nodes are stored in the
//! [`Scene`](super::Scene) arena and linked by [`NodeId`](super::NodeId).

use bitflags::bitflags;

use super::camera::Camera;
use super::light::Light;
use super::{GeometryId, MaterialId, NodeId};
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};

bitflags! {
    /// Visibility layers; a node renders when its mask intersects the camera's
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Layers: u32 {
        /// Layer 0, enabled on every new node
        const DEFAULT = 1;
        /// Every layer
        const ALL = u32::MAX;
    }
}

impl Default for Layers {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Layers {
    /// Number of layers a mask holds
    pub const COUNT: u32 = u32::BITS;

    /// Mask containing only `layer`.
    ///
    /// `layer` must be below [`Layers::COUNT`]; release builds return an
    /// empty mask for larger values.
    pub fn single(layer: u32) -> Self {
        debug_assert!(layer < Self::COUNT, "layer {layer} out of range 0..{}", Self::COUNT);
        Self::from_bits_retain(1u32.checked_shl(layer).unwrap_or(0))
    }

    /// Add `layer` to the mask
    pub fn enable(&mut self, layer: u32) {
        *self |= Self::single(layer);
    }

    /// Remove `layer` from the mask
    pub fn disable(&mut self, layer: u32) {
        *self &= !Self::single(layer);
    }

    /// True when the two masks share a layer
    pub fn test(self, other: Self) -> bool {
        self.intersects(other)
    }
}

/// How a mesh's vertices are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    /// Triangle list
    #[default]
    Triangles,
    /// Line segments
    Lines,
    /// Points
    Points,
}

/// Material binding of a mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialSlot {
    /// One material for the whole geometry
    Single(MaterialId),
    /// One material per geometry group, indexed by the group's `material_index`
    Multi(Vec<MaterialId>),
}

impl MaterialSlot {
    /// Material at `index`; a single material answers every index
    pub fn get(&self, index: usize) -> Option<MaterialId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::Multi(ids) => ids.get(index).copied(),
        }
    }

    /// Every bound material
    pub fn ids(&self) -> &[MaterialId] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Multi(ids) => ids,
        }
    }
}

impl From<MaterialId> for MaterialSlot {
    fn from(id: MaterialId) -> Self {
        Self::Single(id)
    }
}

/// Drawable payload: shared geometry plus material binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    /// Vertex data
    pub geometry: GeometryId,
    /// Material or material array
    pub material: MaterialSlot,
    /// Primitive assembly
    pub primitive: Primitive,
}

impl Mesh {
    /// Triangle mesh with one material
    pub fn new(geometry: GeometryId, material: MaterialId) -> Self {
        Self {
            geometry,
            material: MaterialSlot::Single(material),
            primitive: Primitive::Triangles,
        }
    }

    /// Triangle mesh with a material per geometry group
    pub fn with_groups(geometry: GeometryId, materials: Vec<MaterialId>) -> Self {
        Self {
            geometry,
            material: MaterialSlot::Multi(materials),
            primitive: Primitive::Triangles,
        }
    }
}

/// What a node is
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Transform-only node
    Group,
    /// Drawable
    Mesh(Mesh),
    /// Viewpoint
    Camera(Camera),
    /// Light source
    Light(Light),
}

/// Scene graph node
#[derive(Debug, Clone)]
pub struct Node {
    /// Optional name for lookups and logs
    pub name: String,
    /// Payload
    pub kind: NodeKind,
    /// Recompose the local matrix from position/rotation/scale during updates
    pub matrix_auto_update: bool,
    /// Hidden nodes skip their whole subtree
    pub visible: bool,
    /// Layer mask
    pub layers: Layers,
    /// Sorting override, lower draws first
    pub render_order: i32,
    /// Cull against the camera frustum
    pub frustum_culled: bool,
    /// Render into shadow maps
    pub cast_shadow: bool,
    /// Sample shadow maps
    pub receive_shadow: bool,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    transform: Transform,
    local_dirty: bool,
    matrix: Mat4,
    pub(crate) matrix_world: Mat4,
    pub(crate) matrix_world_needs_update: bool,
}

impl Node {
    /// Create a detached node with identity transform
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: String::new(),
            kind,
            matrix_auto_update: true,
            visible: true,
            layers: Layers::DEFAULT,
            render_order: 0,
            frustum_culled: true,
            cast_shadow: false,
            receive_shadow: false,
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            local_dirty: false,
            matrix: Mat4::identity(),
            matrix_world: Mat4::identity(),
            matrix_world_needs_update: false,
        }
    }

    /// Set the name (builder style)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the position (builder style)
    pub fn at(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Parent, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Local transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    /// Replace the local transform
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.mark_local_dirty();
    }

    /// Set the local position
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        self.mark_local_dirty();
    }

    /// Set the local rotation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.mark_local_dirty();
    }

    /// Set the local scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.mark_local_dirty();
    }

    /// Rotate so that local -Z faces `target` (in parent space)
    pub fn look_at(&mut self, target: Vec3) {
        let direction = self.transform.position - target;
        if direction.norm_squared() == 0.0 {
            return;
        }
        let up = crate::foundation::math::stable_up(&direction);
        self.set_rotation(Quat::face_towards(&direction, &up));
    }

    /// Cached local matrix
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Set the local matrix directly; disables auto update
    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.transform = Transform::from_matrix(&matrix);
        self.matrix = matrix;
        self.matrix_auto_update = false;
        self.local_dirty = false;
        self.matrix_world_needs_update = true;
    }

    /// Cached world matrix, valid after the last world update
    pub fn matrix_world(&self) -> &Mat4 {
        &self.matrix_world
    }

    /// World position from the cached world matrix
    pub fn world_position(&self) -> Vec3 {
        Vec3::new(self.matrix_world.m14, self.matrix_world.m24, self.matrix_world.m34)
    }

    /// Recompose the local matrix if the transform changed
    pub fn update_matrix(&mut self) {
        if self.local_dirty {
            self.matrix = self.transform.to_matrix();
            self.local_dirty = false;
            self.matrix_world_needs_update = true;
        }
    }

    /// Mark the world matrix stale; descendants follow on the next update
    pub fn mark_world_dirty(&mut self) {
        self.matrix_world_needs_update = true;
    }

    fn mark_local_dirty(&mut self) {
        self.local_dirty = true;
        self.matrix_world_needs_update = true;
    }

    /// Mesh payload
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Camera payload
    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable camera payload
    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Light payload
    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable light payload
    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeKind::Group)
    }
}
