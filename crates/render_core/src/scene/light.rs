//! Light sources
//!
//! Lights are scene node payloads. Position and orientation come from the
//! node's world matrix; directional and spot lights aim at a world-space
//! target point. Whether a light casts shadows is the node's `cast_shadow`
//! flag; the per-light shadow settings live in [`LightShadow`].

use crate::foundation::math::{Color, Vec3};

/// Shadow camera frustum settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    /// Near distance
    pub near: f32,
    /// Far distance
    pub far: f32,
    /// Orthographic left extent (directional lights)
    pub left: f32,
    /// Orthographic right extent
    pub right: f32,
    /// Orthographic top extent
    pub top: f32,
    /// Orthographic bottom extent
    pub bottom: f32,
    /// Fraction of the cone covered by a spot light's shadow camera
    pub focus: f32,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            near: 0.5,
            far: 500.0,
            left: -5.0,
            right: 5.0,
            top: 5.0,
            bottom: -5.0,
            focus: 1.0,
        }
    }
}

/// Per-light shadow settings
#[derive(Debug, Clone, PartialEq)]
pub struct LightShadow {
    /// Shadow map size in texels
    pub map_size: (u32, u32),
    /// Depth bias
    pub bias: f32,
    /// Offset along the surface normal
    pub normal_bias: f32,
    /// Filter radius
    pub radius: f32,
    /// Samples for VSM blur
    pub blur_samples: u32,
    /// Shadow camera settings
    pub camera: ShadowCamera,
    /// Re-render this light's map every frame
    pub auto_update: bool,
    /// Re-render once even when `auto_update` is off
    pub needs_update: bool,
}

impl Default for LightShadow {
    fn default() -> Self {
        Self {
            map_size: (512, 512),
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            blur_samples: 8,
            camera: ShadowCamera::default(),
            auto_update: true,
            needs_update: false,
        }
    }
}

/// Light type and its type-specific parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Uniform light from everywhere
    Ambient,
    /// Sky colour from above, ground colour from below
    Hemisphere {
        /// Colour from below
        ground_color: Color,
    },
    /// Parallel rays towards `target`
    Directional {
        /// World-space point the light aims at
        target: Vec3,
    },
    /// Omnidirectional point source
    Point {
        /// Cutoff distance, 0 for none
        distance: f32,
        /// Falloff exponent
        decay: f32,
    },
    /// Cone towards `target`
    Spot {
        /// World-space point the light aims at
        target: Vec3,
        /// Cutoff distance, 0 for none
        distance: f32,
        /// Half-angle of the cone in radians
        angle: f32,
        /// Fraction of the cone that fades out
        penumbra: f32,
        /// Falloff exponent
        decay: f32,
    },
}

/// Light payload of a scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Type-specific parameters
    pub kind: LightKind,
    /// Light colour
    pub color: Color,
    /// Intensity multiplier
    pub intensity: f32,
    /// Shadow settings, used when the node casts shadows
    pub shadow: LightShadow,
}

impl Light {
    fn with_kind(kind: LightKind, color: Color, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            shadow: LightShadow::default(),
        }
    }

    /// Create an ambient light
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self::with_kind(LightKind::Ambient, color, intensity)
    }

    /// Create a hemisphere light
    pub fn hemisphere(sky_color: Color, ground_color: Color, intensity: f32) -> Self {
        Self::with_kind(LightKind::Hemisphere { ground_color }, sky_color, intensity)
    }

    /// Create a directional light aimed at the origin
    pub fn directional(color: Color, intensity: f32) -> Self {
        Self::with_kind(LightKind::Directional { target: Vec3::zeros() }, color, intensity)
    }

    /// Create a point light
    pub fn point(color: Color, intensity: f32, distance: f32) -> Self {
        Self::with_kind(LightKind::Point { distance, decay: 2.0 }, color, intensity)
    }

    /// Create a spot light aimed at the origin, `angle` in radians
    pub fn spot(color: Color, intensity: f32, distance: f32, angle: f32, penumbra: f32) -> Self {
        Self::with_kind(
            LightKind::Spot {
                target: Vec3::zeros(),
                distance,
                angle,
                penumbra,
                decay: 2.0,
            },
            color,
            intensity,
        )
    }

    /// Aim a directional or spot light (builder style)
    pub fn aimed_at(mut self, point: Vec3) -> Self {
        self.set_target(point);
        self
    }

    /// Aim a directional or spot light; other kinds ignore it
    pub fn set_target(&mut self, point: Vec3) {
        match &mut self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => *target = point,
            LightKind::Ambient | LightKind::Hemisphere { .. } | LightKind::Point { .. } => {}
        }
    }

    /// Target point of directional and spot lights
    pub fn target(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Only directional, spot and point lights render shadow maps
    pub fn supports_shadows(&self) -> bool {
        matches!(
            self.kind,
            LightKind::Directional { .. } | LightKind::Spot { .. } | LightKind::Point { .. }
        )
    }

    /// Colour scaled by intensity
    pub fn radiance(&self) -> Color {
        self.color * self.intensity
    }
}
