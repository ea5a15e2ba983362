//! # Lights Snapshot
//!
//! Flattens the lights gathered by the render-list builder into the arrays
//! lit programs consume. Lights with a shadow map come first in each array so
//! that shadow binding `i` belongs to light `i`.
//!
//! The snapshot is versioned: programs re-upload light uniforms only when the
//! version moved, and the per-type [`LightCounts`] feed the program cache key.

use crate::config::LightLimits;
use crate::foundation::math::{Color, Mat4, Vec2, Vec3};
use crate::render::device::TextureHandle;
use crate::render::shadow::ShadowMapper;
use crate::scene::{LightKind, NodeId, Scene};

/// Number of lights per type, the part of the lighting setup that changes
/// generated shader code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    /// Directional lights
    pub directional: usize,
    /// Point lights
    pub point: usize,
    /// Spot lights
    pub spot: usize,
    /// Hemisphere lights
    pub hemisphere: usize,
    /// Directional lights with a shadow map
    pub directional_shadows: usize,
    /// Point lights with a shadow map
    pub point_shadows: usize,
    /// Spot lights with a shadow map
    pub spot_shadows: usize,
}

impl LightCounts {
    /// Shadow maps bound in total
    pub fn shadows(&self) -> usize {
        self.directional_shadows + self.point_shadows + self.spot_shadows
    }
}

/// Directional light uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightUniform {
    /// World-space direction towards the light
    pub direction: Vec3,
    /// Colour times intensity
    pub color: Color,
}

/// Point light uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightUniform {
    /// World-space position
    pub position: Vec3,
    /// Colour times intensity
    pub color: Color,
    /// Cutoff distance
    pub distance: f32,
    /// Falloff exponent
    pub decay: f32,
}

/// Spot light uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLightUniform {
    /// World-space position
    pub position: Vec3,
    /// World-space direction towards the light
    pub direction: Vec3,
    /// Colour times intensity
    pub color: Color,
    /// Cutoff distance
    pub distance: f32,
    /// Falloff exponent
    pub decay: f32,
    /// Cosine of the outer cone angle
    pub cone_cos: f32,
    /// Cosine of the angle where the penumbra starts
    pub penumbra_cos: f32,
}

/// Hemisphere light uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLightUniform {
    /// World-space up direction of the sky
    pub direction: Vec3,
    /// Sky colour times intensity
    pub sky_color: Color,
    /// Ground colour times intensity
    pub ground_color: Color,
}

/// Shadow sampling parameters of one light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowUniform {
    /// Light that owns the map
    pub light: NodeId,
    /// World to shadow texture space
    pub matrix: Mat4,
    /// Depth texture
    pub map: Option<TextureHandle>,
    /// Face size in texels
    pub map_size: Vec2,
    /// Depth bias
    pub bias: f32,
    /// Normal offset
    pub normal_bias: f32,
    /// Filter radius
    pub radius: f32,
    /// Shadow camera near distance (point lights)
    pub camera_near: f32,
    /// Shadow camera far distance (point lights)
    pub camera_far: f32,
}

/// Uniform arrays for lit programs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightUniforms {
    /// Sum of ambient lights
    pub ambient: Color,
    /// Directional lights, shadowed first
    pub directional: Vec<DirectionalLightUniform>,
    /// Point lights, shadowed first
    pub point: Vec<PointLightUniform>,
    /// Spot lights, shadowed first
    pub spot: Vec<SpotLightUniform>,
    /// Hemisphere lights
    pub hemisphere: Vec<HemisphereLightUniform>,
    /// Shadows of the leading directional lights
    pub directional_shadows: Vec<ShadowUniform>,
    /// Shadows of the leading point lights
    pub point_shadows: Vec<ShadowUniform>,
    /// Shadows of the leading spot lights
    pub spot_shadows: Vec<ShadowUniform>,
}

/// Per-frame lighting snapshot
#[derive(Debug, Default)]
pub struct LightsState {
    uniforms: LightUniforms,
    counts: LightCounts,
    version: u32,
    limit_warned: bool,
}

impl LightsState {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current uniform arrays
    pub fn uniforms(&self) -> &LightUniforms {
        &self.uniforms
    }

    /// Per-type counts
    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    /// Bumped whenever any uniform value changed
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Rebuild from the lights of the current frame.
    ///
    /// World matrices must be current; shadow maps must already be prepared
    /// so their matrices match this frame.
    pub fn setup(&mut self, scene: &Scene, lights: &[NodeId], shadows: &ShadowMapper, limits: &LightLimits) {
        let mut ordered: Vec<NodeId> = lights.to_vec();
        let has_map = |id: &NodeId| shadows.is_enabled() && shadows.map(*id).is_some();
        ordered.sort_by_key(|id| !has_map(id));

        let mut next = LightUniforms::default();
        let mut dropped = 0usize;

        for id in ordered {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let Some(light) = node.as_light() else {
                continue;
            };
            let position = node.world_position();
            let color = light.radiance();
            let shadow = if has_map(&id) {
                shadows.map(id).map(|map| {
                    let (near, far) = map.clip_range();
                    ShadowUniform {
                        light: id,
                        matrix: *map.matrix(),
                        map: map.texture(),
                        map_size: Vec2::new(map.map_size().0 as f32, map.map_size().1 as f32),
                        bias: light.shadow.bias,
                        normal_bias: light.shadow.normal_bias,
                        radius: light.shadow.radius,
                        camera_near: near,
                        camera_far: far,
                    }
                })
            } else {
                None
            };

            match light.kind {
                LightKind::Ambient => next.ambient += color,
                LightKind::Hemisphere { ground_color } => {
                    if next.hemisphere.len() >= limits.hemisphere {
                        dropped += 1;
                        continue;
                    }
                    next.hemisphere.push(HemisphereLightUniform {
                        direction: direction_or_up(position),
                        sky_color: color,
                        ground_color: ground_color * light.intensity,
                    });
                }
                LightKind::Directional { target } => {
                    if next.directional.len() >= limits.directional {
                        dropped += 1;
                        continue;
                    }
                    next.directional.push(DirectionalLightUniform {
                        direction: direction_or_up(position - target),
                        color,
                    });
                    next.directional_shadows.extend(shadow);
                }
                LightKind::Point { distance, decay } => {
                    if next.point.len() >= limits.point {
                        dropped += 1;
                        continue;
                    }
                    next.point.push(PointLightUniform {
                        position,
                        color,
                        distance,
                        decay,
                    });
                    next.point_shadows.extend(shadow);
                }
                LightKind::Spot { target, distance, angle, penumbra, decay } => {
                    if next.spot.len() >= limits.spot {
                        dropped += 1;
                        continue;
                    }
                    next.spot.push(SpotLightUniform {
                        position,
                        direction: direction_or_up(position - target),
                        color,
                        distance,
                        decay,
                        cone_cos: angle.cos(),
                        penumbra_cos: (angle * (1.0 - penumbra)).cos(),
                    });
                    next.spot_shadows.extend(shadow);
                }
            }
        }

        if dropped > 0 && !self.limit_warned {
            log::warn!("LightsState: {dropped} lights exceed the configured limits and are ignored");
            self.limit_warned = true;
        }

        self.counts = LightCounts {
            directional: next.directional.len(),
            point: next.point.len(),
            spot: next.spot.len(),
            hemisphere: next.hemisphere.len(),
            directional_shadows: next.directional_shadows.len(),
            point_shadows: next.point_shadows.len(),
            spot_shadows: next.spot_shadows.len(),
        };
        if next != self.uniforms {
            self.uniforms = next;
            self.version = self.version.wrapping_add(1);
        }
    }
}

fn direction_or_up(direction: Vec3) -> Vec3 {
    direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y)
}
