//! Fixed-function state cache
//!
//! Mirrors the device's pipeline state so redundant calls are never issued.
//! Every field starts unknown (`None`); the first set always reaches the
//! device. After a context loss the cache is [`reset`](PipelineStateCache::reset)
//! back to unknown.

use std::collections::HashMap;

use crate::render::device::{
    BlendState, Capability, CompareFunction, CullFace, FrontFace, GraphicsDevice, ProgramHandle,
    RenderTargetHandle, StencilOp, TextureHandle, Viewport,
};
use crate::scene::{Material, PolygonOffset, Side, StencilState};

/// Stencil function triple
type StencilFunc = (CompareFunction, i32, u32);

/// Known device state
#[derive(Debug, Default)]
pub struct PipelineStateCache {
    capabilities: HashMap<Capability, bool>,
    blend: Option<BlendState>,
    depth_func: Option<CompareFunction>,
    depth_mask: Option<bool>,
    color_mask: Option<bool>,
    stencil_func: Option<StencilFunc>,
    stencil_op: Option<(StencilOp, StencilOp, StencilOp)>,
    stencil_mask: Option<u32>,
    cull_face: Option<CullFace>,
    front_face: Option<FrontFace>,
    polygon_offset: Option<(u32, u32)>,
    viewport: Option<Viewport>,
    scissor: Option<Viewport>,
    clear_color: Option<[u32; 4]>,
    program: Option<ProgramHandle>,
    render_target: Option<Option<RenderTargetHandle>>,
    texture_units: HashMap<u32, Option<TextureHandle>>,
}

impl PipelineStateCache {
    /// Cache with every field unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; the next set of each field reaches the device
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Enable or disable a capability
    pub fn set_capability<D: GraphicsDevice>(&mut self, device: &mut D, capability: Capability, enabled: bool) {
        if self.capabilities.get(&capability) != Some(&enabled) {
            device.set_capability(capability, enabled);
            self.capabilities.insert(capability, enabled);
        }
    }

    /// Blend configuration, `None` disables blending
    pub fn set_blending<D: GraphicsDevice>(&mut self, device: &mut D, blend: Option<BlendState>) {
        let Some(state) = blend else {
            self.set_capability(device, Capability::Blend, false);
            return;
        };
        self.set_capability(device, Capability::Blend, true);
        if self.blend != Some(state) {
            let previous = self.blend;
            if previous.map(|p| (p.color_equation, p.alpha_equation)) != Some((state.color_equation, state.alpha_equation)) {
                device.set_blend_equation(state.color_equation, state.alpha_equation);
            }
            let factors = |s: BlendState| (s.src_color, s.dst_color, s.src_alpha, s.dst_alpha);
            if previous.map(factors) != Some(factors(state)) {
                device.set_blend_func(state.src_color, state.dst_color, state.src_alpha, state.dst_alpha);
            }
            self.blend = Some(state);
        }
    }

    /// Depth test, comparison and writes
    pub fn set_depth<D: GraphicsDevice>(&mut self, device: &mut D, test: bool, func: CompareFunction, write: bool) {
        self.set_capability(device, Capability::DepthTest, test);
        if test && self.depth_func != Some(func) {
            device.set_depth_func(func);
            self.depth_func = Some(func);
        }
        self.set_depth_mask(device, write);
    }

    /// Depth writes
    pub fn set_depth_mask<D: GraphicsDevice>(&mut self, device: &mut D, write: bool) {
        if self.depth_mask != Some(write) {
            device.set_depth_mask(write);
            self.depth_mask = Some(write);
        }
    }

    /// Colour writes
    pub fn set_color_mask<D: GraphicsDevice>(&mut self, device: &mut D, write: bool) {
        if self.color_mask != Some(write) {
            device.set_color_mask(write);
            self.color_mask = Some(write);
        }
    }

    /// Stencil test, `None` disables it
    pub fn set_stencil<D: GraphicsDevice>(&mut self, device: &mut D, stencil: Option<&StencilState>) {
        let Some(stencil) = stencil else {
            self.set_capability(device, Capability::StencilTest, false);
            return;
        };
        self.set_capability(device, Capability::StencilTest, true);

        let func = (stencil.func, stencil.reference, stencil.func_mask);
        if self.stencil_func != Some(func) {
            device.set_stencil_func(func.0, func.1, func.2);
            self.stencil_func = Some(func);
        }
        let ops = (stencil.fail, stencil.z_fail, stencil.z_pass);
        if self.stencil_op != Some(ops) {
            device.set_stencil_op(ops.0, ops.1, ops.2);
            self.stencil_op = Some(ops);
        }
        if self.stencil_mask != Some(stencil.write_mask) {
            device.set_stencil_mask(stencil.write_mask);
            self.stencil_mask = Some(stencil.write_mask);
        }
    }

    /// Culling for a material side; `flip` mirrors the winding for
    /// negatively scaled objects
    pub fn set_side<D: GraphicsDevice>(&mut self, device: &mut D, side: Side, flip: bool) {
        match side {
            Side::Double => self.set_capability(device, Capability::CullFace, false),
            Side::Front | Side::Back => {
                self.set_capability(device, Capability::CullFace, true);
                let face = if side == Side::Front { CullFace::Back } else { CullFace::Front };
                self.set_cull_face(device, face);
            }
        }
        self.set_front_face(device, if flip { FrontFace::Cw } else { FrontFace::Ccw });
    }

    /// Culled faces
    pub fn set_cull_face<D: GraphicsDevice>(&mut self, device: &mut D, face: CullFace) {
        if self.cull_face != Some(face) {
            device.set_cull_face(face);
            self.cull_face = Some(face);
        }
    }

    /// Front-face winding
    pub fn set_front_face<D: GraphicsDevice>(&mut self, device: &mut D, face: FrontFace) {
        if self.front_face != Some(face) {
            device.set_front_face(face);
            self.front_face = Some(face);
        }
    }

    /// Polygon offset, `None` disables it
    pub fn set_polygon_offset<D: GraphicsDevice>(&mut self, device: &mut D, offset: Option<PolygonOffset>) {
        let Some(offset) = offset else {
            self.set_capability(device, Capability::PolygonOffsetFill, false);
            return;
        };
        self.set_capability(device, Capability::PolygonOffsetFill, true);
        let bits = (offset.factor.to_bits(), offset.units.to_bits());
        if self.polygon_offset != Some(bits) {
            device.set_polygon_offset(offset.factor, offset.units);
            self.polygon_offset = Some(bits);
        }
    }

    /// Apply every fixed-function setting a material carries, culling for `side`
    pub fn set_material<D: GraphicsDevice>(&mut self, device: &mut D, material: &Material, side: Side, flip_winding: bool) {
        self.set_blending(device, material.effective_blending());
        self.set_depth(device, material.depth_test, material.depth_func, material.depth_write);
        self.set_color_mask(device, material.color_write);
        self.set_stencil(device, material.stencil.as_ref());
        self.set_side(device, side, flip_winding);
        self.set_polygon_offset(device, material.polygon_offset);
    }

    /// Viewport
    pub fn set_viewport<D: GraphicsDevice>(&mut self, device: &mut D, viewport: Viewport) {
        if self.viewport != Some(viewport) {
            device.set_viewport(viewport);
            self.viewport = Some(viewport);
        }
    }

    /// Scissor box
    pub fn set_scissor<D: GraphicsDevice>(&mut self, device: &mut D, scissor: Viewport) {
        if self.scissor != Some(scissor) {
            device.set_scissor(scissor);
            self.scissor = Some(scissor);
        }
    }

    /// Scissor testing
    pub fn set_scissor_test<D: GraphicsDevice>(&mut self, device: &mut D, enabled: bool) {
        self.set_capability(device, Capability::ScissorTest, enabled);
    }

    /// Clear colour
    pub fn set_clear_color<D: GraphicsDevice>(&mut self, device: &mut D, rgba: [f32; 4]) {
        let bits = rgba.map(f32::to_bits);
        if self.clear_color != Some(bits) {
            device.set_clear_color(rgba);
            self.clear_color = Some(bits);
        }
    }

    /// Current program; returns true if it changed
    pub fn use_program<D: GraphicsDevice>(&mut self, device: &mut D, program: ProgramHandle) -> bool {
        if self.program == Some(program) {
            return false;
        }
        device.use_program(program);
        self.program = Some(program);
        true
    }

    /// Forget the current program, e.g. after it was destroyed
    pub fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    /// Current render target, `None` for the default framebuffer
    pub fn bind_render_target<D: GraphicsDevice>(&mut self, device: &mut D, target: Option<RenderTargetHandle>) {
        if self.render_target != Some(target) {
            device.bind_render_target(target);
            self.render_target = Some(target);
        }
    }

    /// Texture on a unit, `None` unbinds
    pub fn bind_texture<D: GraphicsDevice>(&mut self, device: &mut D, unit: u32, texture: Option<TextureHandle>) {
        if self.texture_units.get(&unit) != Some(&texture) {
            device.bind_texture(unit, texture);
            self.texture_units.insert(unit, texture);
        }
    }

    /// Forget texture unit contents; destroyed texture names may be reused
    pub fn forget_texture_units(&mut self) {
        self.texture_units.clear();
    }

    /// Render target known to be bound
    pub fn render_target(&self) -> Option<Option<RenderTargetHandle>> {
        self.render_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{DeviceCommand, RecordingDevice};
    use crate::scene::Blending;

    #[test]
    fn test_repeated_material_issues_no_state_calls() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();
        let material = Material::standard().with_transparency(0.5).with_side(Side::Double);

        state.set_material(&mut device, &material, material.side, false);
        assert!(device.count(DeviceCommand::is_state_change) > 0);

        device.clear_commands();
        state.set_material(&mut device, &material, material.side, false);
        state.set_material(&mut device, &material, material.side, false);
        assert_eq!(device.count(DeviceCommand::is_state_change), 0);
    }

    #[test]
    fn test_only_differences_reach_the_device() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();
        let opaque = Material::standard().with_blending(Blending::None);
        state.set_material(&mut device, &opaque, Side::Front, false);
        device.clear_commands();

        let mut no_depth_write = opaque.clone();
        no_depth_write.depth_write = false;
        state.set_material(&mut device, &no_depth_write, Side::Front, false);

        assert_eq!(device.commands(), &[DeviceCommand::SetDepthMask(false)]);
    }

    #[test]
    fn test_side_selects_cull_face_and_winding() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();

        state.set_side(&mut device, Side::Back, true);
        assert!(device.commands().contains(&DeviceCommand::SetCullFace(CullFace::Front)));
        assert!(device.commands().contains(&DeviceCommand::SetFrontFace(FrontFace::Cw)));

        device.clear_commands();
        state.set_side(&mut device, Side::Double, true);
        assert_eq!(
            device.commands(),
            &[DeviceCommand::SetCapability(Capability::CullFace, false)]
        );
    }

    #[test]
    fn test_reset_forces_reissue() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();
        let viewport = Viewport::new(0, 0, 640, 480);

        state.set_viewport(&mut device, viewport);
        state.set_viewport(&mut device, viewport);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::SetViewport(_))), 1);

        state.reset();
        state.set_viewport(&mut device, viewport);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::SetViewport(_))), 2);
    }

    #[test]
    fn test_texture_units_are_diffed() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();
        let texture = TextureHandle(9);

        state.bind_texture(&mut device, 0, Some(texture));
        state.bind_texture(&mut device, 0, Some(texture));
        state.bind_texture(&mut device, 1, Some(texture));
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::BindTexture(..))), 2);

        state.forget_texture_units();
        state.bind_texture(&mut device, 0, Some(texture));
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::BindTexture(..))), 3);
    }

    #[test]
    fn test_use_program_reports_changes() {
        let mut device = RecordingDevice::new();
        let mut state = PipelineStateCache::new();
        let program = ProgramHandle(3);

        assert!(state.use_program(&mut device, program));
        assert!(!state.use_program(&mut device, program));
        state.forget_program(program);
        assert!(state.use_program(&mut device, program));
    }
}
