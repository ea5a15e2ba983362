//! # Renderer Configuration
//!
//! Settings that shape every frame: sorting, clearing, diagnostics, output
//! transfer, shadow maps and light limits. Everything here is plain data so it
//! can live in a `.toml` or `.ron` file next to the host application.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Tone mapping operator applied by lit programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToneMapping {
    /// Output linear values untouched
    #[default]
    None,
    /// Exposure scale only
    Linear,
    /// Reinhard operator
    Reinhard,
    /// Cineon film curve
    Cineon,
    /// ACES filmic fit
    AcesFilmic,
    /// AgX
    AgX,
    /// Khronos PBR neutral
    Neutral,
}

/// Colour space of the final output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorSpace {
    /// sRGB transfer
    #[default]
    Srgb,
    /// Linear sRGB primaries, no transfer
    LinearSrgb,
}

/// Shader float precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Precision {
    /// highp
    #[default]
    High,
    /// mediump
    Medium,
    /// lowp
    Low,
}

impl Precision {
    /// GLSL qualifier
    pub fn qualifier(self) -> &'static str {
        match self {
            Self::High => "highp",
            Self::Medium => "mediump",
            Self::Low => "lowp",
        }
    }
}

/// Shadow filtering technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShadowMapType {
    /// Single depth comparison
    Basic,
    /// Percentage closer filtering
    #[default]
    Pcf,
    /// PCF with a softened kernel
    PcfSoft,
    /// Variance shadow maps
    Vsm,
}

/// Shadow map master switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowMapConfig {
    /// Master switch for the shadow pass
    pub enabled: bool,
    /// Filtering technique
    pub shadow_type: ShadowMapType,
    /// Re-render shadow maps every frame
    pub auto_update: bool,
}

impl Default for ShadowMapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shadow_type: ShadowMapType::default(),
            auto_update: true,
        }
    }
}

/// Upper bounds on lights fed to programs each frame; extra lights are dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightLimits {
    /// Directional lights
    pub directional: usize,
    /// Point lights
    pub point: usize,
    /// Spot lights
    pub spot: usize,
    /// Hemisphere lights
    pub hemisphere: usize,
}

impl Default for LightLimits {
    fn default() -> Self {
        Self {
            directional: 8,
            point: 16,
            spot: 8,
            hemisphere: 2,
        }
    }
}

/// # Renderer Configuration
///
/// Per-renderer behaviour. Build with `RendererConfig::new()` and the
/// `with_*` methods, or load through [`Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Sort the render list before drawing
    pub sort_objects: bool,
    /// Clear the output target at the start of every frame
    pub auto_clear: bool,
    /// RGBA clear colour
    pub clear_color: [f32; 4],
    /// Fail `render` on shader compile errors instead of skipping the draw
    pub strict_diagnostics: bool,
    /// Defer draws whose program is still compiling
    pub parallel_shader_compile: bool,
    /// Tone mapping operator
    pub tone_mapping: ToneMapping,
    /// Exposure fed to tone mapping
    pub tone_mapping_exposure: f32,
    /// Output colour space
    pub output_color_space: ColorSpace,
    /// Shader precision
    pub precision: Precision,
    /// Shadow map settings
    pub shadow_map: ShadowMapConfig,
    /// Honour per-material clipping planes
    pub local_clipping_enabled: bool,
    /// Device pixels per logical pixel
    pub pixel_ratio: f32,
    /// Light count limits
    pub max_lights: LightLimits,
    /// Reset frame statistics at the start of every frame
    pub auto_reset_info: bool,
}

impl RendererConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            sort_objects: true,
            auto_clear: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            strict_diagnostics: false,
            parallel_shader_compile: false,
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
            output_color_space: ColorSpace::Srgb,
            precision: Precision::High,
            shadow_map: ShadowMapConfig::default(),
            local_clipping_enabled: false,
            pixel_ratio: 1.0,
            max_lights: LightLimits::default(),
            auto_reset_info: true,
        }
    }

    /// Enable or disable render-list sorting
    pub fn with_sort_objects(mut self, enabled: bool) -> Self {
        self.sort_objects = enabled;
        self
    }

    /// Enable or disable clearing at frame start
    pub fn with_auto_clear(mut self, enabled: bool) -> Self {
        self.auto_clear = enabled;
        self
    }

    /// Set the clear colour
    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    /// Turn shader compile errors into `render` errors
    pub fn with_strict_diagnostics(mut self, enabled: bool) -> Self {
        self.strict_diagnostics = enabled;
        self
    }

    /// Defer draws until their programs finish compiling
    pub fn with_parallel_shader_compile(mut self, enabled: bool) -> Self {
        self.parallel_shader_compile = enabled;
        self
    }

    /// Set tone mapping operator and exposure
    pub fn with_tone_mapping(mut self, tone_mapping: ToneMapping, exposure: f32) -> Self {
        self.tone_mapping = tone_mapping;
        self.tone_mapping_exposure = exposure;
        self
    }

    /// Set the output colour space
    pub fn with_output_color_space(mut self, color_space: ColorSpace) -> Self {
        self.output_color_space = color_space;
        self
    }

    /// Set shader precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Enable the shadow pass with the given filtering
    pub fn with_shadows(mut self, shadow_type: ShadowMapType) -> Self {
        self.shadow_map.enabled = true;
        self.shadow_map.shadow_type = shadow_type;
        self
    }

    /// Honour per-material clipping planes
    pub fn with_local_clipping(mut self, enabled: bool) -> Self {
        self.local_clipping_enabled = enabled;
        self
    }

    /// Set the device pixel ratio
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    /// Set light count limits
    pub fn with_max_lights(mut self, limits: LightLimits) -> Self {
        self.max_lights = limits;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pixel ratio must be positive, got {}",
                self.pixel_ratio
            )));
        }

        if !self.tone_mapping_exposure.is_finite() || self.tone_mapping_exposure < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tone mapping exposure must be non-negative, got {}",
                self.tone_mapping_exposure
            )));
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("clear colour must be finite".to_string()));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RendererConfig {}
