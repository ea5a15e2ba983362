//! Uniform refresh
//!
//! Builds the named uniform values a program needs, grouped by how often they
//! change: per material (refreshed when the material or lights move), per view
//! (camera) and per object. Nothing here talks to the device; the renderer
//! uploads a [`UniformSet`] and binds the textures listed in a
//! [`SamplerTable`] to consecutive units.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::device::{TextureHandle, UniformValue};
use crate::render::lights::{LightUniforms, ShadowUniform};
use crate::scene::{CameraView, Fog, Material, MaterialKind, TextureId};

/// Texture feeding a sampler uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerSource {
    /// Scene texture, uploaded on demand
    Texture(TextureId),
    /// Renderer-owned texture such as a shadow map
    Handle(Option<TextureHandle>),
}

/// Sampler uniform and the run of table sources bound behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Uniform name
    pub name: &'static str,
    /// First unit, an index into [`SamplerTable::sources`]
    pub start: usize,
    /// Units used, one texture each
    pub count: usize,
    /// Declared as a sampler array in the shader
    pub array: bool,
}

/// Textures one draw samples, refilled per draw without reallocating.
///
/// Unit `n` is bound to `sources()[n]`.
#[derive(Debug, Clone, Default)]
pub struct SamplerTable {
    bindings: Vec<SamplerBinding>,
    sources: Vec<SamplerSource>,
}

impl SamplerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Refill for one draw: material slots first, then the shadow maps of
    /// each light type when the draw receives shadows
    pub fn fill(&mut self, material: &Material, lights: &LightUniforms, receive_shadow: bool) {
        self.bindings.clear();
        self.sources.clear();

        for (name, texture) in material.textures.bound() {
            self.push(name, false, std::iter::once(SamplerSource::Texture(texture)));
        }
        if receive_shadow {
            for (name, shadows) in [
                ("directional_shadow_map", &lights.directional_shadows),
                ("spot_shadow_map", &lights.spot_shadows),
                ("point_shadow_map", &lights.point_shadows),
            ] {
                if !shadows.is_empty() {
                    self.push(name, true, shadows.iter().map(|shadow| SamplerSource::Handle(shadow.map)));
                }
            }
        }
    }

    fn push(&mut self, name: &'static str, array: bool, sources: impl Iterator<Item = SamplerSource>) {
        let start = self.sources.len();
        self.sources.extend(sources);
        self.bindings.push(SamplerBinding {
            name,
            start,
            count: self.sources.len() - start,
            array,
        });
    }

    /// Sampler uniforms in declaration order
    pub fn bindings(&self) -> &[SamplerBinding] {
        &self.bindings
    }

    /// Every texture in unit order
    pub fn sources(&self) -> &[SamplerSource] {
        &self.sources
    }

    /// True when the draw samples nothing
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sampler uniform values pointing at the bound units
    pub fn uniform_values(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.bindings.iter().map(|binding| {
            let first = u32::try_from(binding.start).unwrap_or(u32::MAX);
            let value = if !binding.array && binding.count == 1 {
                UniformValue::Sampler(first)
            } else {
                UniformValue::SamplerArray((first..).take(binding.count).collect())
            };
            (binding.name, value)
        })
    }
}

/// Named values for one upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    values: Vec<(&'static str, UniformValue)>,
}

impl UniformSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value
    pub fn set(&mut self, name: &'static str, value: UniformValue) {
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Value by name
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.iter().find(|(existing, _)| *existing == name).map(|(_, value)| value)
    }

    /// Values in insertion order
    pub fn values(&self) -> &[(&'static str, UniformValue)] {
        &self.values
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append another set, replacing values with the same name
    pub fn extend(&mut self, other: UniformSet) {
        for (name, value) in other.values {
            self.set(name, value);
        }
    }
}

/// Frame-level inputs to a material refresh
#[derive(Debug, Clone, Copy)]
pub struct MaterialContext {
    /// Tone mapping exposure
    pub exposure: f32,
    /// Upload local clipping planes
    pub local_clipping: bool,
    /// Distance pass reference point and range
    pub distance: Option<DistanceReference>,
}

/// Reference point of a distance (point light shadow) pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReference {
    /// Light position
    pub position: Vec3,
    /// Shadow camera near
    pub near: f32,
    /// Shadow camera far
    pub far: f32,
}

type RefreshFn = fn(&mut UniformSet, &Material, &MaterialContext);

fn refresh_common(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    uniforms.set("diffuse", UniformValue::Vec3(material.color));
    uniforms.set("opacity", UniformValue::Float(material.opacity));
    uniforms.set("tone_mapping_exposure", UniformValue::Float(context.exposure));
    if material.alpha_test > 0.0 {
        uniforms.set("alpha_test", UniformValue::Float(material.alpha_test));
    }
    if material.textures.displacement_map.is_some() {
        uniforms.set("displacement_scale", UniformValue::Float(material.displacement_scale));
    }
    if context.local_clipping && !material.clipping_planes.is_empty() {
        let packed = material
            .clipping_planes
            .iter()
            .flat_map(|plane| [plane.normal.x, plane.normal.y, plane.normal.z, plane.constant])
            .collect();
        uniforms.set("clipping_planes", UniformValue::FloatArray(packed));
    }
}

fn refresh_basic(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_common(uniforms, material, context);
}

fn refresh_lambert(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_common(uniforms, material, context);
    uniforms.set("emissive", UniformValue::Vec3(material.emissive * material.emissive_intensity));
}

fn refresh_phong(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_lambert(uniforms, material, context);
    uniforms.set("specular", UniformValue::Vec3(material.specular));
    uniforms.set("shininess", UniformValue::Float(material.shininess.max(1e-4)));
}

fn refresh_standard(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_lambert(uniforms, material, context);
    uniforms.set("roughness", UniformValue::Float(material.roughness));
    uniforms.set("metalness", UniformValue::Float(material.metalness));
    if material.textures.normal_map.is_some() {
        uniforms.set("normal_scale", UniformValue::Vec2(material.normal_scale));
    }
}

fn refresh_physical(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_standard(uniforms, material, context);
    uniforms.set("transmission", UniformValue::Float(material.transmission));
    uniforms.set("ior", UniformValue::Float(material.ior));
    uniforms.set("clearcoat", UniformValue::Float(material.clearcoat));
}

fn refresh_depth(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_common(uniforms, material, context);
}

fn refresh_distance(uniforms: &mut UniformSet, material: &Material, context: &MaterialContext) {
    refresh_common(uniforms, material, context);
    if let Some(reference) = context.distance {
        uniforms.set("reference_position", UniformValue::Vec3(reference.position));
        uniforms.set("near_distance", UniformValue::Float(reference.near));
        uniforms.set("far_distance", UniformValue::Float(reference.far));
    }
}

fn refresh_fn(kind: MaterialKind) -> RefreshFn {
    match kind {
        MaterialKind::Basic => refresh_basic,
        MaterialKind::Lambert => refresh_lambert,
        MaterialKind::Phong => refresh_phong,
        MaterialKind::Standard => refresh_standard,
        MaterialKind::Physical => refresh_physical,
        MaterialKind::Depth => refresh_depth,
        MaterialKind::Distance => refresh_distance,
    }
}

/// Material uniforms for the material's shading model
pub fn material_uniforms(material: &Material, context: &MaterialContext) -> UniformSet {
    let mut uniforms = UniformSet::new();
    refresh_fn(material.kind)(&mut uniforms, material, context);
    uniforms
}

/// Scene fog uniforms
pub fn fog_uniforms(fog: &Fog) -> UniformSet {
    let mut uniforms = UniformSet::new();
    match *fog {
        Fog::Linear { color, near, far } => {
            uniforms.set("fog_color", UniformValue::Vec3(color));
            uniforms.set("fog_near", UniformValue::Float(near));
            uniforms.set("fog_far", UniformValue::Float(far));
        }
        Fog::Exponential { color, density } => {
            uniforms.set("fog_color", UniformValue::Vec3(color));
            uniforms.set("fog_density", UniformValue::Float(density));
        }
    }
    uniforms
}

/// Per-view uniforms
pub fn camera_uniforms(view: &CameraView) -> UniformSet {
    let mut uniforms = UniformSet::new();
    uniforms.set("projection_matrix", UniformValue::Mat4(view.projection));
    uniforms.set("view_matrix", UniformValue::Mat4(view.view));
    uniforms.set("camera_position", UniformValue::Vec3(view.position));
    uniforms
}

/// Per-object uniforms, set on every draw
pub fn object_uniforms(model: &Mat4, view: &CameraView) -> [(&'static str, UniformValue); 3] {
    let model_view = view.view * model;
    [
        ("model_matrix", UniformValue::Mat4(*model)),
        ("model_view_matrix", UniformValue::Mat4(model_view)),
        ("normal_matrix", UniformValue::Mat3(model_view.normal_matrix())),
    ]
}

fn shadow_arrays(uniforms: &mut UniformSet, shadows: &[ShadowUniform], names: ShadowNames) {
    if shadows.is_empty() {
        return;
    }
    uniforms.set(names.matrix, UniformValue::Mat4Array(shadows.iter().map(|s| s.matrix).collect()));
    uniforms.set(names.bias, UniformValue::FloatArray(shadows.iter().map(|s| s.bias).collect()));
    if let Some(far) = names.camera_far {
        uniforms.set(far, UniformValue::FloatArray(shadows.iter().map(|s| s.camera_far).collect()));
    }
}

struct ShadowNames {
    matrix: &'static str,
    bias: &'static str,
    camera_far: Option<&'static str>,
}

/// Light uniforms; shadow entries are included only when `receive_shadow` is set
pub fn light_uniforms(lights: &LightUniforms, receive_shadow: bool) -> UniformSet {
    let mut uniforms = UniformSet::new();
    uniforms.set("ambient_light_color", UniformValue::Vec3(lights.ambient));

    if !lights.directional.is_empty() {
        let d = &lights.directional;
        uniforms.set("directional_light_direction", UniformValue::Vec3Array(d.iter().map(|l| l.direction).collect()));
        uniforms.set("directional_light_color", UniformValue::Vec3Array(d.iter().map(|l| l.color).collect()));
    }
    if !lights.point.is_empty() {
        let p = &lights.point;
        uniforms.set("point_light_position", UniformValue::Vec3Array(p.iter().map(|l| l.position).collect()));
        uniforms.set("point_light_color", UniformValue::Vec3Array(p.iter().map(|l| l.color).collect()));
        uniforms.set("point_light_distance", UniformValue::FloatArray(p.iter().map(|l| l.distance).collect()));
        uniforms.set("point_light_decay", UniformValue::FloatArray(p.iter().map(|l| l.decay).collect()));
    }
    if !lights.spot.is_empty() {
        let s = &lights.spot;
        uniforms.set("spot_light_position", UniformValue::Vec3Array(s.iter().map(|l| l.position).collect()));
        uniforms.set("spot_light_direction", UniformValue::Vec3Array(s.iter().map(|l| l.direction).collect()));
        uniforms.set("spot_light_color", UniformValue::Vec3Array(s.iter().map(|l| l.color).collect()));
        uniforms.set("spot_light_distance", UniformValue::FloatArray(s.iter().map(|l| l.distance).collect()));
        uniforms.set("spot_light_decay", UniformValue::FloatArray(s.iter().map(|l| l.decay).collect()));
        uniforms.set("spot_light_cone_cos", UniformValue::FloatArray(s.iter().map(|l| l.cone_cos).collect()));
        uniforms.set(
            "spot_light_penumbra_cos",
            UniformValue::FloatArray(s.iter().map(|l| l.penumbra_cos).collect()),
        );
    }
    if !lights.hemisphere.is_empty() {
        let h = &lights.hemisphere;
        uniforms.set("hemisphere_light_direction", UniformValue::Vec3Array(h.iter().map(|l| l.direction).collect()));
        uniforms.set("hemisphere_light_sky_color", UniformValue::Vec3Array(h.iter().map(|l| l.sky_color).collect()));
        uniforms.set(
            "hemisphere_light_ground_color",
            UniformValue::Vec3Array(h.iter().map(|l| l.ground_color).collect()),
        );
    }

    if receive_shadow {
        shadow_arrays(
            &mut uniforms,
            &lights.directional_shadows,
            ShadowNames {
                matrix: "directional_shadow_matrix",
                bias: "directional_shadow_bias",
                camera_far: None,
            },
        );
        shadow_arrays(
            &mut uniforms,
            &lights.spot_shadows,
            ShadowNames {
                matrix: "spot_shadow_matrix",
                bias: "spot_shadow_bias",
                camera_far: None,
            },
        );
        shadow_arrays(
            &mut uniforms,
            &lights.point_shadows,
            ShadowNames {
                matrix: "point_shadow_matrix",
                bias: "point_shadow_bias",
                camera_far: Some("point_shadow_camera_far"),
            },
        );
    }
    uniforms
}
