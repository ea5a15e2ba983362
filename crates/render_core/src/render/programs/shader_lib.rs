//! Shader templates
//!
//! One GLSL ES 3.0 template pair per [`MaterialKind`]. Features are switched
//! with `#define`s generated from [`ProgramParameters`], so a template never
//! changes at runtime and the prefix alone distinguishes programs.

use std::fmt::Write;

use super::parameters::{FogKind, ProgramParameters};
use crate::config::{ColorSpace, ShadowMapType, ToneMapping};
use crate::render::device::ShaderSource;
use crate::scene::MaterialKind;

/// Vertex and fragment template of one shading model
#[derive(Debug, Clone, Copy)]
pub struct ShaderTemplate {
    /// Vertex stage body
    pub vertex: &'static str,
    /// Fragment stage body
    pub fragment: &'static str,
}

const COMMON_VERTEX: &str = r"
in vec3 position;
in vec3 normal;
#ifdef USE_UV
in vec2 uv;
out vec2 v_uv;
#endif
#ifdef USE_COLOR
in vec3 color;
out vec3 v_color;
#endif
#ifdef USE_TANGENT
in vec4 tangent;
out vec3 v_tangent;
out vec3 v_bitangent;
#endif
#ifdef USE_DISPLACEMENTMAP
uniform sampler2D displacement_map;
uniform float displacement_scale;
#endif
uniform mat4 model_matrix;
uniform mat4 model_view_matrix;
uniform mat4 projection_matrix;
uniform mat4 view_matrix;
uniform mat3 normal_matrix;
uniform vec3 camera_position;
out vec3 v_world_position;
out vec3 v_normal;
out float v_fog_depth;
#if NUM_CLIPPING_PLANES > 0
out vec3 v_clip_position;
#endif
";

const COMMON_VERTEX_MAIN: &str = r"
vec3 transformed = position;
#ifdef USE_UV
v_uv = uv;
#endif
#ifdef USE_COLOR
v_color = color;
#endif
#ifdef USE_DISPLACEMENTMAP
transformed += normalize(normal) * texture(displacement_map, uv).x * displacement_scale;
#endif
vec4 world_position = model_matrix * vec4(transformed, 1.0);
vec4 mv_position = model_view_matrix * vec4(transformed, 1.0);
v_world_position = world_position.xyz;
v_normal = normalize(mat3(model_matrix) * normal);
#ifdef FLIP_SIDED
v_normal = -v_normal;
#endif
#ifdef USE_TANGENT
v_tangent = normalize(mat3(model_matrix) * tangent.xyz);
v_bitangent = normalize(cross(v_normal, v_tangent) * tangent.w);
#endif
v_fog_depth = -mv_position.z;
#if NUM_CLIPPING_PLANES > 0
v_clip_position = -mv_position.xyz;
#endif
gl_Position = projection_matrix * mv_position;
";

const COMMON_FRAGMENT: &str = r"
in vec3 v_world_position;
in vec3 v_normal;
in float v_fog_depth;
#ifdef USE_UV
in vec2 v_uv;
#endif
#ifdef USE_COLOR
in vec3 v_color;
#endif
#ifdef USE_TANGENT
in vec3 v_tangent;
in vec3 v_bitangent;
#endif
#ifdef USE_MAP
uniform sampler2D map;
#endif
#ifdef USE_ALPHAMAP
uniform sampler2D alpha_map;
#endif
#ifdef USE_ALPHATEST
uniform float alpha_test;
#endif
#ifdef USE_FOG
uniform vec3 fog_color;
#ifdef FOG_EXP2
uniform float fog_density;
#else
uniform float fog_near;
uniform float fog_far;
#endif
#endif
#if NUM_CLIPPING_PLANES > 0
in vec3 v_clip_position;
uniform vec4 clipping_planes[NUM_CLIPPING_PLANES];
#endif
uniform vec3 diffuse;
uniform float opacity;
uniform vec3 camera_position;
uniform float tone_mapping_exposure;
out vec4 frag_color;

vec4 sample_diffuse() {
    vec4 color = vec4(diffuse, opacity);
#ifdef USE_MAP
    color *= texture(map, v_uv);
#endif
#ifdef USE_COLOR
    color.rgb *= v_color;
#endif
#ifdef USE_ALPHAMAP
    color.a *= texture(alpha_map, v_uv).g;
#endif
#ifdef USE_ALPHATEST
    if (color.a < alpha_test) discard;
#endif
    return color;
}

void clip_fragment() {
#if NUM_CLIPPING_PLANES > 0
    for (int i = 0; i < NUM_CLIPPING_PLANES; i++) {
        vec4 plane = clipping_planes[i];
        if (dot(v_clip_position, plane.xyz) > plane.w) discard;
    }
#endif
}

vec3 finish_color(vec3 color) {
#ifdef TONE_MAPPING
    color = TONE_MAPPING(color * tone_mapping_exposure);
#endif
#ifdef OUTPUT_SRGB
    color = mix(color * 12.92, 1.055 * pow(color, vec3(0.41666)) - 0.055, step(vec3(0.0031308), color));
#endif
#ifdef USE_FOG
#ifdef FOG_EXP2
    float fog_factor = 1.0 - exp(-fog_density * fog_density * v_fog_depth * v_fog_depth);
#else
    float fog_factor = smoothstep(fog_near, fog_far, v_fog_depth);
#endif
    color = mix(color, fog_color, fog_factor);
#endif
    return color;
}

vec3 linear_tone_mapping(vec3 color) { return clamp(color, 0.0, 1.0); }
vec3 reinhard_tone_mapping(vec3 color) { return clamp(color / (vec3(1.0) + color), 0.0, 1.0); }
vec3 cineon_tone_mapping(vec3 color) {
    color = max(vec3(0.0), color - 0.004);
    return pow((color * (6.2 * color + 0.5)) / (color * (6.2 * color + 1.7) + 0.06), vec3(2.2));
}
vec3 aces_filmic_tone_mapping(vec3 color) {
    color *= 0.6;
    return clamp((color * (2.51 * color + 0.03)) / (color * (2.43 * color + 0.59) + 0.14), 0.0, 1.0);
}
vec3 agx_tone_mapping(vec3 color) { return clamp(color / (color + vec3(0.155)) * 1.019, 0.0, 1.0); }
vec3 neutral_tone_mapping(vec3 color) {
    float peak = max(color.r, max(color.g, color.b));
    return peak > 0.8 ? color * (0.8 + 0.2 * (1.0 - exp(0.8 - peak))) / peak : color;
}
";

const LIGHTS_FRAGMENT: &str = r"
uniform vec3 ambient_light_color;
#if NUM_DIR_LIGHTS > 0
uniform vec3 directional_light_direction[NUM_DIR_LIGHTS];
uniform vec3 directional_light_color[NUM_DIR_LIGHTS];
#endif
#if NUM_POINT_LIGHTS > 0
uniform vec3 point_light_position[NUM_POINT_LIGHTS];
uniform vec3 point_light_color[NUM_POINT_LIGHTS];
uniform float point_light_distance[NUM_POINT_LIGHTS];
uniform float point_light_decay[NUM_POINT_LIGHTS];
#endif
#if NUM_SPOT_LIGHTS > 0
uniform vec3 spot_light_position[NUM_SPOT_LIGHTS];
uniform vec3 spot_light_direction[NUM_SPOT_LIGHTS];
uniform vec3 spot_light_color[NUM_SPOT_LIGHTS];
uniform float spot_light_distance[NUM_SPOT_LIGHTS];
uniform float spot_light_decay[NUM_SPOT_LIGHTS];
uniform float spot_light_cone_cos[NUM_SPOT_LIGHTS];
uniform float spot_light_penumbra_cos[NUM_SPOT_LIGHTS];
#endif
#if NUM_HEMI_LIGHTS > 0
uniform vec3 hemisphere_light_direction[NUM_HEMI_LIGHTS];
uniform vec3 hemisphere_light_sky_color[NUM_HEMI_LIGHTS];
uniform vec3 hemisphere_light_ground_color[NUM_HEMI_LIGHTS];
#endif
#ifdef USE_SHADOWMAP
#if NUM_DIR_LIGHT_SHADOWS > 0
uniform sampler2D directional_shadow_map[NUM_DIR_LIGHT_SHADOWS];
uniform mat4 directional_shadow_matrix[NUM_DIR_LIGHT_SHADOWS];
uniform float directional_shadow_bias[NUM_DIR_LIGHT_SHADOWS];
#endif
#if NUM_SPOT_LIGHT_SHADOWS > 0
uniform sampler2D spot_shadow_map[NUM_SPOT_LIGHT_SHADOWS];
uniform mat4 spot_shadow_matrix[NUM_SPOT_LIGHT_SHADOWS];
uniform float spot_shadow_bias[NUM_SPOT_LIGHT_SHADOWS];
#endif
#if NUM_POINT_LIGHT_SHADOWS > 0
uniform sampler2D point_shadow_map[NUM_POINT_LIGHT_SHADOWS];
uniform mat4 point_shadow_matrix[NUM_POINT_LIGHT_SHADOWS];
uniform float point_shadow_bias[NUM_POINT_LIGHT_SHADOWS];
uniform float point_shadow_camera_far[NUM_POINT_LIGHT_SHADOWS];
#endif

float sample_shadow(sampler2D shadow_map, vec4 coord, float bias) {
    coord.xyz /= coord.w;
    if (coord.x < 0.0 || coord.x > 1.0 || coord.y < 0.0 || coord.y > 1.0 || coord.z > 1.0) return 1.0;
    float depth = coord.z + bias;
#if defined(SHADOWMAP_TYPE_PCF) || defined(SHADOWMAP_TYPE_PCF_SOFT)
    vec2 texel = 1.0 / vec2(textureSize(shadow_map, 0));
    float lit = 0.0;
    for (int x = -1; x <= 1; x++) {
        for (int y = -1; y <= 1; y++) {
            lit += step(depth, texture(shadow_map, coord.xy + vec2(x, y) * texel).r);
        }
    }
    return lit / 9.0;
#elif defined(SHADOWMAP_TYPE_VSM)
    vec2 moments = texture(shadow_map, coord.xy).xy;
    float variance = max(moments.y - moments.x * moments.x, 0.00002);
    float delta = depth - moments.x;
    return depth <= moments.x ? 1.0 : variance / (variance + delta * delta);
#else
    return step(depth, texture(shadow_map, coord.xy).r);
#endif
}
#endif

float distance_attenuation(float light_distance, float cutoff, float decay) {
    float attenuation = 1.0 / max(pow(light_distance, decay), 0.01);
    if (cutoff > 0.0) {
        attenuation *= pow(clamp(1.0 - pow(light_distance / cutoff, 4.0), 0.0, 1.0), 2.0);
    }
    return attenuation;
}

vec3 surface_normal() {
    vec3 n = normalize(v_normal);
#ifdef DOUBLE_SIDED
    n *= gl_FrontFacing ? 1.0 : -1.0;
#endif
#ifdef FLAT_SHADED
    n = normalize(cross(dFdx(v_world_position), dFdy(v_world_position)));
#endif
    return n;
}

vec3 accumulate_lights(vec3 n, vec3 view_dir, vec3 albedo, float specular_power, vec3 specular_color) {
    vec3 total = ambient_light_color * albedo;
#if NUM_DIR_LIGHTS > 0
    for (int i = 0; i < NUM_DIR_LIGHTS; i++) {
        vec3 l = directional_light_direction[i];
        float shadow = 1.0;
#if defined(USE_SHADOWMAP) && NUM_DIR_LIGHT_SHADOWS > 0
        if (i < NUM_DIR_LIGHT_SHADOWS) shadow = sample_shadow(directional_shadow_map[i], directional_shadow_matrix[i] * vec4(v_world_position, 1.0), directional_shadow_bias[i]);
#endif
        vec3 h = normalize(l + view_dir);
        total += shadow * directional_light_color[i] * (albedo * max(dot(n, l), 0.0) + specular_color * pow(max(dot(n, h), 0.0), specular_power));
    }
#endif
#if NUM_POINT_LIGHTS > 0
    for (int i = 0; i < NUM_POINT_LIGHTS; i++) {
        vec3 to_light = point_light_position[i] - v_world_position;
        vec3 l = normalize(to_light);
        float attenuation = distance_attenuation(length(to_light), point_light_distance[i], point_light_decay[i]);
        vec3 h = normalize(l + view_dir);
        total += attenuation * point_light_color[i] * (albedo * max(dot(n, l), 0.0) + specular_color * pow(max(dot(n, h), 0.0), specular_power));
    }
#endif
#if NUM_SPOT_LIGHTS > 0
    for (int i = 0; i < NUM_SPOT_LIGHTS; i++) {
        vec3 to_light = spot_light_position[i] - v_world_position;
        vec3 l = normalize(to_light);
        float cone = smoothstep(spot_light_cone_cos[i], spot_light_penumbra_cos[i], dot(l, spot_light_direction[i]));
        float shadow = 1.0;
#if defined(USE_SHADOWMAP) && NUM_SPOT_LIGHT_SHADOWS > 0
        if (i < NUM_SPOT_LIGHT_SHADOWS) shadow = sample_shadow(spot_shadow_map[i], spot_shadow_matrix[i] * vec4(v_world_position, 1.0), spot_shadow_bias[i]);
#endif
        float attenuation = cone * distance_attenuation(length(to_light), spot_light_distance[i], spot_light_decay[i]);
        vec3 h = normalize(l + view_dir);
        total += shadow * attenuation * spot_light_color[i] * (albedo * max(dot(n, l), 0.0) + specular_color * pow(max(dot(n, h), 0.0), specular_power));
    }
#endif
#if NUM_HEMI_LIGHTS > 0
    for (int i = 0; i < NUM_HEMI_LIGHTS; i++) {
        float weight = 0.5 * dot(n, hemisphere_light_direction[i]) + 0.5;
        total += albedo * mix(hemisphere_light_ground_color[i], hemisphere_light_sky_color[i], weight);
    }
#endif
    return total;
}
";

const BASIC_FRAGMENT: &str = r"
void main() {
    clip_fragment();
    vec4 color = sample_diffuse();
    frag_color = vec4(finish_color(color.rgb), color.a);
}
";

const LAMBERT_FRAGMENT: &str = r"
uniform vec3 emissive;
void main() {
    clip_fragment();
    vec4 color = sample_diffuse();
    vec3 lit = accumulate_lights(surface_normal(), normalize(camera_position - v_world_position), color.rgb, 1.0, vec3(0.0));
    frag_color = vec4(finish_color(lit + emissive), color.a);
}
";

const PHONG_FRAGMENT: &str = r"
uniform vec3 emissive;
uniform vec3 specular;
uniform float shininess;
void main() {
    clip_fragment();
    vec4 color = sample_diffuse();
    vec3 lit = accumulate_lights(surface_normal(), normalize(camera_position - v_world_position), color.rgb, shininess, specular);
    frag_color = vec4(finish_color(lit + emissive), color.a);
}
";

const STANDARD_FRAGMENT: &str = r"
uniform vec3 emissive;
uniform float roughness;
uniform float metalness;
#ifdef USE_NORMALMAP
uniform sampler2D normal_map;
uniform vec2 normal_scale;
#endif
#ifdef USE_EMISSIVEMAP
uniform sampler2D emissive_map;
#endif
#ifdef USE_TRANSMISSION
uniform float transmission;
uniform float ior;
#endif
#ifdef PHYSICAL
uniform float clearcoat;
#endif
void main() {
    clip_fragment();
    vec4 color = sample_diffuse();
    vec3 n = surface_normal();
#ifdef USE_NORMALMAP
    vec3 mapped = texture(normal_map, v_uv).xyz * 2.0 - 1.0;
    mapped.xy *= normal_scale;
    n = normalize(mat3(normalize(v_tangent), normalize(v_bitangent), n) * mapped);
#endif
    vec3 albedo = color.rgb * (1.0 - metalness);
    vec3 f0 = mix(vec3(0.04), color.rgb, metalness);
    float power = 2.0 / max(roughness * roughness * roughness * roughness, 0.0001) - 2.0;
    vec3 lit = accumulate_lights(n, normalize(camera_position - v_world_position), albedo, power, f0);
    vec3 glow = emissive;
#ifdef USE_EMISSIVEMAP
    glow *= texture(emissive_map, v_uv).rgb;
#endif
    float alpha = color.a;
#ifdef USE_TRANSMISSION
    alpha *= 1.0 - transmission;
#endif
#ifdef PHYSICAL
    lit += clearcoat * 0.04 * ambient_light_color;
#endif
    frag_color = vec4(finish_color(lit + glow), alpha);
}
";

const DEPTH_FRAGMENT: &str = r"
void main() {
    clip_fragment();
    sample_diffuse();
#ifdef SHADOWMAP_TYPE_VSM
    float depth = gl_FragCoord.z;
    frag_color = vec4(depth, depth * depth, 0.0, 1.0);
#else
    frag_color = vec4(gl_FragCoord.z);
#endif
}
";

const DISTANCE_FRAGMENT: &str = r"
uniform vec3 reference_position;
uniform float near_distance;
uniform float far_distance;
void main() {
    clip_fragment();
    sample_diffuse();
    float dist = (length(v_world_position - reference_position) - near_distance) / (far_distance - near_distance);
    gl_FragDepth = clamp(dist, 0.0, 1.0);
    frag_color = vec4(gl_FragDepth);
}
";

const SHADED_VERTEX: &str = r"
void main() {
#include <common_vertex_main>
}
";

static TEMPLATES: [(MaterialKind, ShaderTemplate); 7] = [
    (MaterialKind::Basic, ShaderTemplate { vertex: SHADED_VERTEX, fragment: BASIC_FRAGMENT }),
    (MaterialKind::Lambert, ShaderTemplate { vertex: SHADED_VERTEX, fragment: LAMBERT_FRAGMENT }),
    (MaterialKind::Phong, ShaderTemplate { vertex: SHADED_VERTEX, fragment: PHONG_FRAGMENT }),
    (MaterialKind::Standard, ShaderTemplate { vertex: SHADED_VERTEX, fragment: STANDARD_FRAGMENT }),
    (MaterialKind::Physical, ShaderTemplate { vertex: SHADED_VERTEX, fragment: STANDARD_FRAGMENT }),
    (MaterialKind::Depth, ShaderTemplate { vertex: SHADED_VERTEX, fragment: DEPTH_FRAGMENT }),
    (MaterialKind::Distance, ShaderTemplate { vertex: SHADED_VERTEX, fragment: DISTANCE_FRAGMENT }),
];

/// Template of a shading model
pub fn template(kind: MaterialKind) -> &'static ShaderTemplate {
    TEMPLATES
        .iter()
        .find(|(template_kind, _)| *template_kind == kind)
        .map_or(&TEMPLATES[0].1, |(_, template)| template)
}

fn tone_mapping_function(tone_mapping: ToneMapping) -> Option<&'static str> {
    match tone_mapping {
        ToneMapping::None => None,
        ToneMapping::Linear => Some("linear_tone_mapping"),
        ToneMapping::Reinhard => Some("reinhard_tone_mapping"),
        ToneMapping::Cineon => Some("cineon_tone_mapping"),
        ToneMapping::AcesFilmic => Some("aces_filmic_tone_mapping"),
        ToneMapping::AgX => Some("agx_tone_mapping"),
        ToneMapping::Neutral => Some("neutral_tone_mapping"),
    }
}

/// `#define` block for a parameter set
pub fn defines(parameters: &ProgramParameters) -> String {
    let mut out = String::new();
    let mut flag = |enabled: bool, name: &str| {
        if enabled {
            let _ = writeln!(out, "#define {name}");
        }
    };

    let uses_uv = parameters.map
        || parameters.normal_map
        || parameters.alpha_map
        || parameters.displacement_map
        || parameters.emissive_map;
    flag(uses_uv, "USE_UV");
    flag(parameters.map, "USE_MAP");
    flag(parameters.normal_map, "USE_NORMALMAP");
    flag(parameters.alpha_map, "USE_ALPHAMAP");
    flag(parameters.displacement_map, "USE_DISPLACEMENTMAP");
    flag(parameters.emissive_map, "USE_EMISSIVEMAP");
    flag(parameters.alpha_test, "USE_ALPHATEST");
    flag(parameters.vertex_colors, "USE_COLOR");
    flag(parameters.vertex_tangents, "USE_TANGENT");
    flag(parameters.flat_shading, "FLAT_SHADED");
    flag(parameters.fog.is_some(), "USE_FOG");
    flag(parameters.fog == Some(FogKind::Exponential), "FOG_EXP2");
    flag(parameters.double_sided, "DOUBLE_SIDED");
    flag(parameters.flip_sided, "FLIP_SIDED");
    flag(parameters.transmission, "USE_TRANSMISSION");
    flag(parameters.kind == MaterialKind::Physical, "PHYSICAL");
    flag(parameters.receive_shadow, "USE_SHADOWMAP");
    flag(parameters.output_color_space == ColorSpace::Srgb, "OUTPUT_SRGB");

    let filter = match parameters.shadow_map_type {
        ShadowMapType::Basic => "SHADOWMAP_TYPE_BASIC",
        ShadowMapType::Pcf => "SHADOWMAP_TYPE_PCF",
        ShadowMapType::PcfSoft => "SHADOWMAP_TYPE_PCF_SOFT",
        ShadowMapType::Vsm => "SHADOWMAP_TYPE_VSM",
    };
    let depth_only = matches!(parameters.kind, MaterialKind::Depth | MaterialKind::Distance);
    flag(parameters.shadow_map_enabled || depth_only, filter);

    if let Some(function) = tone_mapping_function(parameters.tone_mapping) {
        let _ = writeln!(out, "#define TONE_MAPPING {function}");
    }

    let lights = &parameters.lights;
    for (name, count) in [
        ("NUM_DIR_LIGHTS", lights.directional),
        ("NUM_POINT_LIGHTS", lights.point),
        ("NUM_SPOT_LIGHTS", lights.spot),
        ("NUM_HEMI_LIGHTS", lights.hemisphere),
        ("NUM_DIR_LIGHT_SHADOWS", lights.directional_shadows),
        ("NUM_POINT_LIGHT_SHADOWS", lights.point_shadows),
        ("NUM_SPOT_LIGHT_SHADOWS", lights.spot_shadows),
        ("NUM_CLIPPING_PLANES", parameters.clipping_planes),
    ] {
        let _ = writeln!(out, "#define {name} {count}");
    }
    out
}

/// Full program source for a parameter set
pub fn generate(parameters: &ProgramParameters) -> ShaderSource {
    let template = template(parameters.kind);
    let header = format!(
        "#version 300 es\nprecision {precision} float;\nprecision {precision} int;\n{defines}",
        precision = parameters.precision.qualifier(),
        defines = defines(parameters),
    );

    let vertex = format!(
        "{header}{COMMON_VERTEX}{}",
        template.vertex.replace("#include <common_vertex_main>", COMMON_VERTEX_MAIN)
    );
    let lights = if parameters.kind.is_lit() { LIGHTS_FRAGMENT } else { "" };
    let fragment = format!("{header}{COMMON_FRAGMENT}{lights}{}", template.fragment);

    ShaderSource {
        name: parameters.kind.name().to_string(),
        vertex,
        fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::render::lights::LightCounts;
    use crate::render::programs::ParameterInputs;
    use crate::scene::Material;

    fn parameters(material: &Material, lights: LightCounts) -> ProgramParameters {
        ProgramParameters::derive(&ParameterInputs {
            material,
            side: material.side,
            receive_shadow: false,
            tangents_available: false,
            fog: None,
            lights,
            config: &RendererConfig::default(),
        })
    }

    #[test]
    fn test_every_kind_has_a_template() {
        for kind in [
            MaterialKind::Basic,
            MaterialKind::Lambert,
            MaterialKind::Phong,
            MaterialKind::Standard,
            MaterialKind::Physical,
            MaterialKind::Depth,
            MaterialKind::Distance,
        ] {
            assert!(TEMPLATES.iter().any(|(template_kind, _)| *template_kind == kind));
            assert!(template(kind).fragment.contains("void main()"));
        }
    }

    #[test]
    fn test_defines_reflect_features_and_counts() {
        let material = Material::phong().with_alpha_test(0.3);
        let lights = LightCounts {
            point: 3,
            ..LightCounts::default()
        };
        let block = defines(&parameters(&material, lights));

        assert!(block.contains("#define USE_ALPHATEST\n"));
        assert!(block.contains("#define NUM_POINT_LIGHTS 3\n"));
        assert!(!block.contains("USE_MAP"));
    }

    #[test]
    fn test_unlit_programs_skip_light_code() {
        let source = generate(&parameters(&Material::basic(), LightCounts::default()));
        assert_eq!(source.name, "basic");
        assert!(!source.fragment.contains("accumulate_lights"));
        assert!(source.vertex.starts_with("#version 300 es"));
        assert!(source.vertex.contains("gl_Position"));
    }
}
