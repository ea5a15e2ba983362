//! # Scene
//!
//! Host-owned description of what to draw: a node hierarchy with world
//! transforms, plus the geometry, material and texture arenas the nodes refer
//! to. The renderer reads a [`Scene`] every frame and keeps its own GPU-side
//! records keyed by the same ids.
//!
//! ## Ownership
//!
//! Nodes live in a generational arena. A node owns its children through an
//! ordered list of ids and points back at its parent with a non-owning id.
//! Removing a subtree frees its slots; stale ids resolve to `None`.

pub mod bounds;
pub mod camera;
pub mod geometry;
mod graph;
pub mod light;
pub mod material;
pub mod node;
pub mod texture;

pub use bounds::{Aabb, Frustum, Plane, Sphere};
pub use camera::{Camera, CameraView, Projection};
pub use geometry::{AttributeSemantic, BufferAttribute, DrawRange, Geometry, GeometryError, GeometryGroup};
pub use graph::{Disposal, Fog, Scene};
pub use light::{Light, LightKind, LightShadow, ShadowCamera};
pub use material::{Blending, Material, MaterialKind, PolygonOffset, Side, StencilState, TextureSlots};
pub use node::{Layers, MaterialSlot, Mesh, Node, NodeKind, Primitive};
pub use texture::Texture;

use std::ops::{Deref, DerefMut};

use slotmap::new_key_type;
use thiserror::Error;

new_key_type! {
    /// Handle to a node in a [`Scene`]
    pub struct NodeId;
    /// Handle to a geometry in a [`Scene`]
    pub struct GeometryId;
    /// Handle to a material in a [`Scene`]
    pub struct MaterialId;
    /// Handle to a texture in a [`Scene`]
    pub struct TextureId;
}

/// Rejected scene edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A node cannot be its own parent
    #[error("node {0:?} cannot be added as a child of itself")]
    SelfParent(NodeId),

    /// The edit would make a node its own ancestor
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Requested parent
        parent: NodeId,
        /// Requested child, an ancestor of `parent`
        child: NodeId,
    },

    /// Stale or foreign id
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// `remove` called with a node that is not a direct child
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Supposed parent
        parent: NodeId,
        /// Supposed child
        child: NodeId,
    },

    /// The root holds the scene together and cannot be removed
    #[error("the scene root cannot be removed")]
    RootRemoval,

    /// The node payload does not support the operation
    #[error("node {0:?} is not a mesh")]
    NotAMesh(NodeId),
}

/// Result type for scene edits
pub type SceneResult<T> = Result<T, SceneError>;

/// Data whose changes the renderer detects through a version counter
pub trait Versioned {
    /// Current version
    fn version(&self) -> u32;

    /// Record a change
    fn mark_changed(&mut self);
}

impl Versioned for Geometry {
    fn version(&self) -> u32 {
        Geometry::version(self)
    }

    fn mark_changed(&mut self) {
        self.bump_version();
    }
}

impl Versioned for Material {
    fn version(&self) -> u32 {
        Material::version(self)
    }

    fn mark_changed(&mut self) {
        self.needs_update();
    }
}

impl Versioned for Texture {
    fn version(&self) -> u32 {
        Texture::version(self)
    }

    fn mark_changed(&mut self) {
        self.bump_version();
    }
}

/// Mutable borrow that bumps the version when dropped, if it was written through
pub struct Tracked<'a, T: Versioned> {
    value: &'a mut T,
    touched: bool,
}

impl<'a, T: Versioned> Tracked<'a, T> {
    pub(crate) fn new(value: &'a mut T) -> Self {
        Self {
            value,
            touched: false,
        }
    }
}

impl<T: Versioned> Deref for Tracked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T: Versioned> DerefMut for Tracked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.touched = true;
        self.value
    }
}

impl<T: Versioned> Drop for Tracked<'_, T> {
    fn drop(&mut self) {
        if self.touched {
            self.value.mark_changed();
        }
    }
}
