//! Vertex data
//!
//! A geometry is a set of named vertex attributes with an optional index
//! buffer, material groups, a draw range and cached bounds. Geometries live in
//! the scene arena and can be shared by any number of meshes. Every change
//! made through [`Scene::geometry_mut`](super::Scene::geometry_mut) bumps the
//! version the renderer compares against its uploaded buffers.

use std::collections::BTreeMap;

use thiserror::Error;

use super::bounds::{Aabb, Sphere};
use crate::foundation::math::{Vec2, Vec3};

/// Geometry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// A required attribute is absent
    #[error("missing vertex attribute: {0:?}")]
    MissingAttribute(AttributeSemantic),

    /// The operation needs indexed triangles
    #[error("geometry is not indexed")]
    NotIndexed,

    /// Attribute lengths disagree
    #[error("attribute {semantic:?} holds {found} vertices, expected {expected}")]
    LengthMismatch {
        /// Offending attribute
        semantic: AttributeSemantic,
        /// Vertex count of `position`
        expected: usize,
        /// Vertex count found
        found: usize,
    },
}

/// Attribute meaning, also its binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeSemantic {
    /// xyz, mandatory
    Position,
    /// xyz
    Normal,
    /// uv
    Uv,
    /// rgb or rgba
    Color,
    /// xyzw, w holds handedness
    Tangent,
}

impl AttributeSemantic {
    /// Shader attribute name
    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Uv => "uv",
            Self::Color => "color",
            Self::Tangent => "tangent",
        }
    }

    /// Components per vertex when the attribute is created from raw floats
    pub fn default_item_size(self) -> usize {
        match self {
            Self::Position | Self::Normal | Self::Color => 3,
            Self::Uv => 2,
            Self::Tangent => 4,
        }
    }
}

/// Packed float attribute
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    /// Interleaved components
    pub data: Vec<f32>,
    /// Components per vertex
    pub item_size: usize,
    /// Bumped on every replacement
    pub version: u32,
}

impl BufferAttribute {
    /// Wrap packed components
    pub fn new(data: Vec<f32>, item_size: usize) -> Self {
        Self {
            data,
            item_size,
            version: 0,
        }
    }

    /// Number of vertices
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size
        }
    }
}

/// Index buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    /// Vertex indices
    pub data: Vec<u32>,
    /// Bumped on every replacement
    pub version: u32,
}

/// Range of vertices (or indices) drawn by a mesh or group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// First element
    pub start: u32,
    /// Element count, `None` for everything after `start`
    pub count: Option<u32>,
}

impl Default for DrawRange {
    fn default() -> Self {
        Self {
            start: 0,
            count: None,
        }
    }
}

/// Slice of the geometry drawn with one entry of a material array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    /// First element
    pub start: u32,
    /// Element count
    pub count: u32,
    /// Index into the mesh's material array
    pub material_index: usize,
}

/// Vertex data shared by meshes
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Optional name
    pub name: String,
    index: Option<IndexBuffer>,
    attributes: BTreeMap<AttributeSemantic, BufferAttribute>,
    groups: Vec<GeometryGroup>,
    draw_range: DrawRange,
    bounding_box: Option<Aabb>,
    bounding_sphere: Option<Sphere>,
    version: u32,
}

impl Geometry {
    /// Geometry from packed xyz positions
    pub fn new(positions: Vec<f32>) -> Self {
        let mut geometry = Self::default();
        geometry.attributes.insert(
            AttributeSemantic::Position,
            BufferAttribute::new(positions, 3),
        );
        geometry
    }

    /// Add or replace an attribute (builder style)
    pub fn with_attribute(mut self, semantic: AttributeSemantic, data: Vec<f32>) -> Self {
        self.set_attribute(semantic, BufferAttribute::new(data, semantic.default_item_size()));
        self
    }

    /// Set the index buffer (builder style)
    pub fn with_index(mut self, indices: Vec<u32>) -> Self {
        self.set_index(indices);
        self
    }

    /// Add a material group (builder style)
    pub fn with_group(mut self, start: u32, count: u32, material_index: usize) -> Self {
        self.add_group(start, count, material_index);
        self
    }

    /// Monotonic change counter
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Record a change made through a mutable borrow
    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.bounding_sphere.is_some() {
            self.compute_bounding_sphere();
        }
        if self.bounding_box.is_some() {
            self.compute_bounding_box();
        }
    }

    /// Attribute by semantic
    pub fn attribute(&self, semantic: AttributeSemantic) -> Option<&BufferAttribute> {
        self.attributes.get(&semantic)
    }

    /// True when `semantic` is present
    pub fn has_attribute(&self, semantic: AttributeSemantic) -> bool {
        self.attributes.contains_key(&semantic)
    }

    /// Attributes in binding order
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeSemantic, &BufferAttribute)> {
        self.attributes.iter().map(|(semantic, attribute)| (*semantic, attribute))
    }

    /// Add or replace an attribute; the replacement continues the old version
    pub fn set_attribute(&mut self, semantic: AttributeSemantic, mut attribute: BufferAttribute) {
        if let Some(previous) = self.attributes.get(&semantic) {
            attribute.version = previous.version.wrapping_add(1);
        }
        self.attributes.insert(semantic, attribute);
    }

    /// Drop an attribute
    pub fn remove_attribute(&mut self, semantic: AttributeSemantic) -> Option<BufferAttribute> {
        self.attributes.remove(&semantic)
    }

    /// Index buffer, if indexed
    pub fn index(&self) -> Option<&IndexBuffer> {
        self.index.as_ref()
    }

    /// Replace the index buffer
    pub fn set_index(&mut self, indices: Vec<u32>) {
        let version = self.index.as_ref().map_or(0, |index| index.version.wrapping_add(1));
        self.index = Some(IndexBuffer {
            data: indices,
            version,
        });
    }

    /// Material groups
    pub fn groups(&self) -> &[GeometryGroup] {
        &self.groups
    }

    /// Append a material group
    pub fn add_group(&mut self, start: u32, count: u32, material_index: usize) {
        self.groups.push(GeometryGroup {
            start,
            count,
            material_index,
        });
    }

    /// Remove every group
    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Draw range
    pub fn draw_range(&self) -> DrawRange {
        self.draw_range
    }

    /// Limit drawing to a range
    pub fn set_draw_range(&mut self, start: u32, count: Option<u32>) {
        self.draw_range = DrawRange { start, count };
    }

    /// Vertex count of `position`
    pub fn vertex_count(&self) -> usize {
        self.attribute(AttributeSemantic::Position)
            .map_or(0, BufferAttribute::count)
    }

    /// Elements a full draw covers: indices when indexed, else vertices
    pub fn element_count(&self) -> usize {
        self.index
            .as_ref()
            .map_or_else(|| self.vertex_count(), |index| index.data.len())
    }

    /// Cached box
    pub fn bounding_box(&self) -> Option<&Aabb> {
        self.bounding_box.as_ref()
    }

    /// Cached sphere
    pub fn bounding_sphere(&self) -> Option<&Sphere> {
        self.bounding_sphere.as_ref()
    }

    /// Recompute the cached box from `position`
    pub fn compute_bounding_box(&mut self) {
        let positions = self
            .attribute(AttributeSemantic::Position)
            .map_or(&[][..], |attribute| attribute.data.as_slice());
        self.bounding_box = Some(Aabb::from_positions(positions));
    }

    /// Recompute the cached sphere from `position`
    pub fn compute_bounding_sphere(&mut self) {
        let positions = self
            .attribute(AttributeSemantic::Position)
            .map_or(&[][..], |attribute| attribute.data.as_slice());
        let sphere = Sphere::from_positions(positions);
        if sphere.radius.is_nan() {
            log::error!(
                "Geometry '{}': bounding sphere radius is NaN, position data is probably corrupt",
                self.name
            );
        }
        self.bounding_sphere = Some(sphere);
    }

    /// Sphere from the cache, or computed on the fly without caching
    pub fn bounding_sphere_or_compute(&self) -> Sphere {
        self.bounding_sphere.unwrap_or_else(|| {
            self.attribute(AttributeSemantic::Position)
                .map_or_else(Sphere::empty, |attribute| Sphere::from_positions(&attribute.data))
        })
    }

    /// Per-vertex tangents (xyzw) for indexed triangles.
    ///
    /// Needs `index`, `position`, `normal` and `uv`. Tangents are accumulated
    /// per triangle from uv gradients, Gram-Schmidt orthogonalized against the
    /// normal, and `w` stores the bitangent handedness.
    pub fn compute_tangents(&self) -> Result<Vec<f32>, GeometryError> {
        let index = self.index.as_ref().ok_or(GeometryError::NotIndexed)?;
        let positions = self.required(AttributeSemantic::Position)?;
        let normals = self.required(AttributeSemantic::Normal)?;
        let uvs = self.required(AttributeSemantic::Uv)?;

        let vertex_count = positions.count();
        for attribute in [(AttributeSemantic::Normal, normals), (AttributeSemantic::Uv, uvs)] {
            if attribute.1.count() != vertex_count {
                return Err(GeometryError::LengthMismatch {
                    semantic: attribute.0,
                    expected: vertex_count,
                    found: attribute.1.count(),
                });
            }
        }

        let position = |i: usize| Vec3::new(positions.data[i * 3], positions.data[i * 3 + 1], positions.data[i * 3 + 2]);
        let normal = |i: usize| Vec3::new(normals.data[i * 3], normals.data[i * 3 + 1], normals.data[i * 3 + 2]);
        let uv = |i: usize| Vec2::new(uvs.data[i * uvs.item_size], uvs.data[i * uvs.item_size + 1]);

        let mut tan1 = vec![Vec3::zeros(); vertex_count];
        let mut tan2 = vec![Vec3::zeros(); vertex_count];

        for triangle in index.data.chunks_exact(3) {
            let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            if a >= vertex_count || b >= vertex_count || c >= vertex_count {
                continue;
            }

            let (va, vb, vc) = (position(a), position(b), position(c));
            let (ua, ub, uc) = (uv(a), uv(b), uv(c));

            let edge1 = vb - va;
            let edge2 = vc - va;
            let duv1 = ub - ua;
            let duv2 = uc - ua;

            let denominator = duv1.x * duv2.y - duv2.x * duv1.y;
            // Degenerate uv mapping contributes nothing
            if !denominator.is_finite() || denominator == 0.0 {
                continue;
            }
            let r = 1.0 / denominator;

            let sdir = (edge1 * duv2.y - edge2 * duv1.y) * r;
            let tdir = (edge2 * duv1.x - edge1 * duv2.x) * r;

            for vertex in [a, b, c] {
                tan1[vertex] += sdir;
                tan2[vertex] += tdir;
            }
        }

        let mut tangents = Vec::with_capacity(vertex_count * 4);
        for vertex in 0..vertex_count {
            let n = normal(vertex);
            let t = tan1[vertex];

            let orthogonal = t - n * n.dot(&t);
            let tangent = orthogonal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::x);
            let handedness = if n.cross(&t).dot(&tan2[vertex]) < 0.0 { -1.0 } else { 1.0 };

            tangents.extend_from_slice(&[tangent.x, tangent.y, tangent.z, handedness]);
        }

        Ok(tangents)
    }

    fn required(&self, semantic: AttributeSemantic) -> Result<&BufferAttribute, GeometryError> {
        self.attribute(semantic).ok_or(GeometryError::MissingAttribute(semantic))
    }

    /// Unit quad in the XY plane facing +Z, indexed, with normals and uvs
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self::new(vec![-hw, -hh, 0.0, hw, -hh, 0.0, hw, hh, 0.0, -hw, hh, 0.0])
            .with_attribute(AttributeSemantic::Normal, [0.0, 0.0, 1.0].repeat(4))
            .with_attribute(AttributeSemantic::Uv, vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
            .with_index(vec![0, 1, 2, 0, 2, 3])
    }
}
