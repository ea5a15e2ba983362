//! Material definitions
//!
//! A material picks a shading model ([`MaterialKind`]), carries the pipeline
//! state it draws with, its shading parameters and texture slots. Materials
//! live in the scene arena; each one also gets a sequential `id` that the
//! render-list sorter uses to group draws sharing a material.
//!
//! Every mutation made through [`Scene::material_mut`](super::Scene::material_mut)
//! or an explicit [`Material::needs_update`] bumps `version`. The renderer
//! re-derives programs and re-uploads uniforms only when that number moves.

use super::TextureId;
use crate::foundation::math::{Color, Vec2};
use crate::render::device::{BlendEquation, BlendFactor, BlendState, CompareFunction, StencilOp};
use crate::scene::bounds::Plane;

/// Shading model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    /// Unlit colour
    Basic,
    /// Diffuse-only lighting
    Lambert,
    /// Blinn-Phong
    Phong,
    /// Metallic-roughness PBR
    Standard,
    /// PBR with transmission and clearcoat
    Physical,
    /// Packed depth, used by shadow passes
    Depth,
    /// Distance to a reference point, used by point light shadows
    Distance,
}

impl MaterialKind {
    /// Program name prefix
    pub fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Lambert => "lambert",
            Self::Phong => "phong",
            Self::Standard => "standard",
            Self::Physical => "physical",
            Self::Depth => "depth",
            Self::Distance => "distance",
        }
    }

    /// Reads light uniforms
    pub fn is_lit(self) -> bool {
        matches!(self, Self::Lambert | Self::Phong | Self::Standard | Self::Physical)
    }

    /// Uses the metallic-roughness model
    pub fn is_physically_based(self) -> bool {
        matches!(self, Self::Standard | Self::Physical)
    }
}

/// Blend preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    /// Blending disabled
    None,
    /// Alpha over
    #[default]
    Normal,
    /// Source added to destination
    Additive,
    /// Source subtracted from destination
    Subtractive,
    /// Source multiplied into destination
    Multiply,
    /// Explicit equations and factors
    Custom(BlendState),
}

impl Blending {
    /// Fixed-function configuration, `None` when blending is off
    pub fn state(self) -> Option<BlendState> {
        use BlendFactor::{One, OneMinusSrcAlpha, OneMinusSrcColor, SrcAlpha, SrcColor, Zero};

        let separate = |src_color, dst_color, src_alpha, dst_alpha| BlendState {
            color_equation: BlendEquation::Add,
            alpha_equation: BlendEquation::Add,
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
        };

        match self {
            Self::None => None,
            Self::Normal => Some(separate(SrcAlpha, OneMinusSrcAlpha, One, OneMinusSrcAlpha)),
            Self::Additive => Some(separate(SrcAlpha, One, SrcAlpha, One)),
            Self::Subtractive => Some(separate(Zero, OneMinusSrcColor, Zero, One)),
            Self::Multiply => Some(separate(Zero, SrcColor, Zero, SrcAlpha)),
            Self::Custom(state) => Some(state),
        }
    }
}

/// Rendered faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Front faces only
    #[default]
    Front,
    /// Back faces only
    Back,
    /// Both faces
    Double,
}

/// Stencil test configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Comparison
    pub func: CompareFunction,
    /// Reference value
    pub reference: i32,
    /// Mask applied to both sides of the comparison
    pub func_mask: u32,
    /// Bits that may be written
    pub write_mask: u32,
    /// Operation when the stencil test fails
    pub fail: StencilOp,
    /// Operation when the depth test fails
    pub z_fail: StencilOp,
    /// Operation when both pass
    pub z_pass: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            func: CompareFunction::Always,
            reference: 0,
            func_mask: 0xff,
            write_mask: 0xff,
            fail: StencilOp::Keep,
            z_fail: StencilOp::Keep,
            z_pass: StencilOp::Keep,
        }
    }
}

/// Depth offset for coplanar geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    /// Slope factor
    pub factor: f32,
    /// Constant units
    pub units: f32,
}

/// Texture slots; presence of each slot changes the generated program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSlots {
    /// Base colour
    pub map: Option<TextureId>,
    /// Tangent-space normals
    pub normal_map: Option<TextureId>,
    /// Opacity
    pub alpha_map: Option<TextureId>,
    /// Vertex displacement
    pub displacement_map: Option<TextureId>,
    /// Emission
    pub emissive_map: Option<TextureId>,
}

impl TextureSlots {
    /// Bound textures with their sampler names, in unit order
    pub fn bound(&self) -> impl Iterator<Item = (&'static str, TextureId)> + '_ {
        [
            ("map", self.map),
            ("normal_map", self.normal_map),
            ("alpha_map", self.alpha_map),
            ("displacement_map", self.displacement_map),
            ("emissive_map", self.emissive_map),
        ]
        .into_iter()
        .filter_map(|(name, slot)| slot.map(|id| (name, id)))
    }
}

/// Surface description
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Optional name
    pub name: String,
    /// Shading model
    pub kind: MaterialKind,

    // Pipeline state
    /// Blend preset
    pub blending: Blending,
    /// Rendered faces
    pub side: Side,
    /// Goes into the transparent bucket
    pub transparent: bool,
    /// Global opacity
    pub opacity: f32,
    /// Discard fragments below this alpha, 0 disables
    pub alpha_test: f32,
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: CompareFunction,
    /// Colour writes
    pub color_write: bool,
    /// Depth offset
    pub polygon_offset: Option<PolygonOffset>,
    /// Stencil test, `None` disables it
    pub stencil: Option<StencilState>,
    /// Skipped entirely when false
    pub visible: bool,
    /// Draw double-sided transparent surfaces in one pass
    pub force_single_pass: bool,

    // Shading
    /// Base colour
    pub color: Color,
    /// Emitted colour
    pub emissive: Color,
    /// Emission scale
    pub emissive_intensity: f32,
    /// Phong specular colour
    pub specular: Color,
    /// Phong exponent
    pub shininess: f32,
    /// PBR roughness
    pub roughness: f32,
    /// PBR metalness
    pub metalness: f32,
    /// Physical transmission, non-zero moves draws to the transmissive bucket
    pub transmission: f32,
    /// Physical index of refraction
    pub ior: f32,
    /// Physical clearcoat
    pub clearcoat: f32,
    /// Normal map strength
    pub normal_scale: Vec2,
    /// Displacement scale
    pub displacement_scale: f32,
    /// Texture slots
    pub textures: TextureSlots,
    /// Multiply by the `color` attribute
    pub vertex_colors: bool,
    /// Per-face normals
    pub flat_shading: bool,
    /// Affected by scene fog
    pub fog: bool,
    /// Apply tone mapping
    pub tone_mapped: bool,
    /// Local clipping planes (world space)
    pub clipping_planes: Vec<Plane>,
    /// Clip shadows with the same planes
    pub clip_shadows: bool,

    id: u32,
    version: u32,
}

impl Material {
    /// Material of the given kind with default parameters
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            name: String::new(),
            kind,
            blending: Blending::Normal,
            side: Side::Front,
            transparent: false,
            opacity: 1.0,
            alpha_test: 0.0,
            depth_test: true,
            depth_write: true,
            depth_func: CompareFunction::LessEqual,
            color_write: true,
            polygon_offset: None,
            stencil: None,
            visible: true,
            force_single_pass: false,
            color: Color::new(1.0, 1.0, 1.0),
            emissive: Color::zeros(),
            emissive_intensity: 1.0,
            specular: Color::new(0.067, 0.067, 0.067),
            shininess: 30.0,
            roughness: 1.0,
            metalness: 0.0,
            transmission: 0.0,
            ior: 1.5,
            clearcoat: 0.0,
            normal_scale: Vec2::new(1.0, 1.0),
            displacement_scale: 1.0,
            textures: TextureSlots::default(),
            vertex_colors: false,
            flat_shading: false,
            fog: kind != MaterialKind::Depth && kind != MaterialKind::Distance,
            tone_mapped: true,
            clipping_planes: Vec::new(),
            clip_shadows: false,
            id: 0,
            version: 0,
        }
    }

    /// Unlit material
    pub fn basic() -> Self {
        Self::new(MaterialKind::Basic)
    }

    /// Lambert material
    pub fn lambert() -> Self {
        Self::new(MaterialKind::Lambert)
    }

    /// Phong material
    pub fn phong() -> Self {
        Self::new(MaterialKind::Phong)
    }

    /// Metallic-roughness material
    pub fn standard() -> Self {
        Self::new(MaterialKind::Standard)
    }

    /// Physical material
    pub fn physical() -> Self {
        Self::new(MaterialKind::Physical)
    }

    /// Depth material
    pub fn depth() -> Self {
        Self::new(MaterialKind::Depth)
    }

    /// Distance material
    pub fn distance() -> Self {
        Self::new(MaterialKind::Distance)
    }

    /// Set the name (builder style)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the base colour (builder style)
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Mark transparent with the given opacity (builder style)
    pub fn with_transparency(mut self, opacity: f32) -> Self {
        self.transparent = true;
        self.opacity = opacity;
        self
    }

    /// Set rendered faces (builder style)
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Set the blend preset (builder style)
    pub fn with_blending(mut self, blending: Blending) -> Self {
        self.blending = blending;
        self
    }

    /// Set the alpha test cutoff (builder style)
    pub fn with_alpha_test(mut self, cutoff: f32) -> Self {
        self.alpha_test = cutoff;
        self
    }

    /// Set the transmission factor (builder style)
    pub fn with_transmission(mut self, transmission: f32) -> Self {
        self.transmission = transmission;
        self
    }

    /// Set the base colour map (builder style)
    pub fn with_map(mut self, texture: TextureId) -> Self {
        self.textures.map = Some(texture);
        self
    }

    /// Set the normal map (builder style)
    pub fn with_normal_map(mut self, texture: TextureId) -> Self {
        self.textures.normal_map = Some(texture);
        self
    }

    /// Set roughness and metalness (builder style)
    pub fn with_pbr(mut self, roughness: f32, metalness: f32) -> Self {
        self.roughness = roughness;
        self.metalness = metalness;
        self
    }

    /// Sequential id assigned when added to a scene
    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    /// Monotonic change counter
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flag a change made outside the tracked accessors
    pub fn needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Blend configuration actually applied: opaque normal-blended
    /// materials draw without blending
    pub fn effective_blending(&self) -> Option<BlendState> {
        if self.blending == Blending::Normal && !self.transparent {
            None
        } else {
            self.blending.state()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::basic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_update_bumps_version() {
        let mut material = Material::standard();
        assert_eq!(material.version(), 0);
        material.needs_update();
        material.needs_update();
        assert_eq!(material.version(), 2);
    }

    #[test]
    fn test_opaque_normal_blending_is_disabled() {
        let opaque = Material::basic();
        assert!(opaque.effective_blending().is_none());

        let transparent = Material::basic().with_transparency(0.5);
        let state = transparent.effective_blending().expect("transparent blends");
        assert_eq!(state.src_color, BlendFactor::SrcAlpha);
        assert_eq!(state.dst_color, BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn test_additive_blending_applies_when_opaque() {
        let material = Material::basic().with_blending(Blending::Additive);
        assert_eq!(material.effective_blending().map(|s| s.dst_color), Some(BlendFactor::One));
    }

    #[test]
    fn test_shadow_kinds_ignore_fog() {
        assert!(!Material::depth().fog);
        assert!(!Material::distance().fog);
        assert!(Material::lambert().fog);
    }

    #[test]
    fn test_kind_classification() {
        assert!(MaterialKind::Physical.is_lit());
        assert!(MaterialKind::Physical.is_physically_based());
        assert!(!MaterialKind::Basic.is_lit());
        assert!(!MaterialKind::Phong.is_physically_based());
    }
}
