//! Program parameters and cache keys
//!
//! Everything that changes generated shader source is collected into
//! [`ProgramParameters`]. Deriving them is pure, and two draws whose
//! parameters are equal share one compiled program.

use std::fmt;

use crate::config::{ColorSpace, Precision, RendererConfig, ShadowMapType, ToneMapping};
use crate::render::lights::LightCounts;
use crate::scene::{Fog, Material, MaterialKind, Side};

/// Fog model compiled into a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogKind {
    /// Linear ramp
    Linear,
    /// Squared exponential
    Exponential,
}

impl From<&Fog> for FogKind {
    fn from(fog: &Fog) -> Self {
        match fog {
            Fog::Linear { .. } => Self::Linear,
            Fog::Exponential { .. } => Self::Exponential,
        }
    }
}

/// Cache key of a compiled program
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramCacheKey(String);

impl ProgramCacheKey {
    /// Key text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-draw facts about the mesh and frame that feed program selection
#[derive(Debug, Clone, Copy)]
pub struct ParameterInputs<'a> {
    /// Material drawn
    pub material: &'a Material,
    /// Faces drawn by this pass; the material's own side unless a two-pass
    /// draw splits it into back and front
    pub side: Side,
    /// Mesh samples shadow maps
    pub receive_shadow: bool,
    /// Tangents can be bound for this draw (stored or derived)
    pub tangents_available: bool,
    /// Scene fog
    pub fog: Option<&'a Fog>,
    /// Lights of the current frame
    pub lights: LightCounts,
    /// Renderer settings
    pub config: &'a RendererConfig,
}

/// Shader-affecting state of one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramParameters {
    /// Shading model
    pub kind: MaterialKind,
    /// Float precision
    pub precision: Precision,
    /// Colour map bound
    pub map: bool,
    /// Normal map bound and usable
    pub normal_map: bool,
    /// Alpha map bound
    pub alpha_map: bool,
    /// Displacement map bound
    pub displacement_map: bool,
    /// Emissive map bound
    pub emissive_map: bool,
    /// Alpha cutout enabled
    pub alpha_test: bool,
    /// Per-vertex colours
    pub vertex_colors: bool,
    /// Tangent attribute bound
    pub vertex_tangents: bool,
    /// Faceted normals
    pub flat_shading: bool,
    /// Fog model, `None` when the material ignores fog or the scene has none
    pub fog: Option<FogKind>,
    /// Both faces drawn
    pub double_sided: bool,
    /// Only back faces drawn
    pub flip_sided: bool,
    /// Transmission enabled
    pub transmission: bool,
    /// Light counts, zero for unlit kinds
    pub lights: LightCounts,
    /// Shadow sampling compiled in
    pub shadow_map_enabled: bool,
    /// Shadow filter
    pub shadow_map_type: ShadowMapType,
    /// Mesh receives shadows
    pub receive_shadow: bool,
    /// Active clipping planes
    pub clipping_planes: usize,
    /// Tone mapping operator
    pub tone_mapping: ToneMapping,
    /// Output colour space
    pub output_color_space: ColorSpace,
}

impl ProgramParameters {
    /// Derive parameters for one draw
    pub fn derive(inputs: &ParameterInputs<'_>) -> Self {
        let material = inputs.material;
        let config = inputs.config;
        let kind = material.kind;
        let lit = kind.is_lit();
        let depth_only = matches!(kind, MaterialKind::Depth | MaterialKind::Distance);

        let lights = if lit { inputs.lights } else { LightCounts::default() };
        let shadow_map_enabled = lit && config.shadow_map.enabled && lights.shadows() > 0;
        let normal_map = material.textures.normal_map.is_some() && inputs.tangents_available && !depth_only;

        Self {
            kind,
            precision: config.precision,
            map: material.textures.map.is_some(),
            normal_map,
            alpha_map: material.textures.alpha_map.is_some(),
            displacement_map: material.textures.displacement_map.is_some(),
            emissive_map: material.textures.emissive_map.is_some() && !depth_only,
            alpha_test: material.alpha_test > 0.0,
            vertex_colors: material.vertex_colors && !depth_only,
            vertex_tangents: normal_map,
            flat_shading: material.flat_shading && lit,
            fog: if material.fog { inputs.fog.map(FogKind::from) } else { None },
            double_sided: inputs.side == Side::Double,
            flip_sided: inputs.side == Side::Back,
            transmission: material.transmission > 0.0 && kind == MaterialKind::Physical,
            lights,
            shadow_map_enabled,
            shadow_map_type: config.shadow_map.shadow_type,
            receive_shadow: inputs.receive_shadow && shadow_map_enabled,
            clipping_planes: if config.local_clipping_enabled {
                material.clipping_planes.len()
            } else {
                0
            },
            tone_mapping: if material.tone_mapped && !depth_only {
                config.tone_mapping
            } else {
                ToneMapping::None
            },
            output_color_space: config.output_color_space,
        }
    }

    /// Boolean features packed into one word for the key
    fn feature_bits(&self) -> u32 {
        [
            self.map,
            self.normal_map,
            self.alpha_map,
            self.displacement_map,
            self.emissive_map,
            self.alpha_test,
            self.vertex_colors,
            self.vertex_tangents,
            self.flat_shading,
            self.double_sided,
            self.flip_sided,
            self.transmission,
            self.shadow_map_enabled,
            self.receive_shadow,
        ]
        .iter()
        .enumerate()
        .fold(0, |bits, (bit, enabled)| bits | (u32::from(*enabled) << bit))
    }

    /// Deterministic key; equal parameters give equal keys
    pub fn cache_key(&self) -> ProgramCacheKey {
        let lights = &self.lights;
        ProgramCacheKey(format!(
            "{}|{:?}|{:04x}|fog:{:?}|l:{},{},{},{}|s:{},{},{}|{:?}|clip:{}|{:?}|{:?}",
            self.kind.name(),
            self.precision,
            self.feature_bits(),
            self.fog,
            lights.directional,
            lights.point,
            lights.spot,
            lights.hemisphere,
            lights.directional_shadows,
            lights.point_shadows,
            lights.spot_shadows,
            self.shadow_map_type,
            self.clipping_planes,
            self.tone_mapping,
            self.output_color_space,
        ))
    }
}
