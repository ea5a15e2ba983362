//! Headless device that records every call
//!
//! Handles are sequential integers. Live resources are tracked so tests can
//! assert that nothing leaks and nothing is destroyed twice. Program builds can
//! be made to fail or to stay pending for a number of polls.

use std::collections::{HashMap, HashSet};

use super::types::{
    BlendEquation, BlendFactor, BufferHandle, BufferKind, Capability, ClearFlags, CompareFunction,
    CompileStatus, CullFace, DrawCall, FenceHandle, FrontFace, ProgramHandle,
    RenderTargetDescriptor, RenderTargetHandle, ShaderSource, StencilOp, TextureDescriptor,
    TextureHandle, UniformValue, Viewport, WaitStatus,
};
use super::{DeviceError, DeviceResult, GraphicsDevice};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// `create_buffer`
    CreateBuffer(BufferHandle, BufferKind, usize),
    /// `update_buffer`
    UpdateBuffer(BufferHandle, usize),
    /// `destroy_buffer`
    DestroyBuffer(BufferHandle),
    /// `create_texture`
    CreateTexture(TextureHandle, TextureDescriptor),
    /// `update_texture`
    UpdateTexture(TextureHandle),
    /// `destroy_texture`
    DestroyTexture(TextureHandle),
    /// `create_render_target`
    CreateRenderTarget(RenderTargetHandle, RenderTargetDescriptor),
    /// `destroy_render_target`
    DestroyRenderTarget(RenderTargetHandle),
    /// `compile_program`
    CompileProgram(ProgramHandle, String),
    /// `destroy_program`
    DestroyProgram(ProgramHandle),
    /// `use_program`
    UseProgram(ProgramHandle),
    /// `set_uniform`
    SetUniform(ProgramHandle, String, UniformValue),
    /// `bind_texture`
    BindTexture(u32, Option<TextureHandle>),
    /// `bind_vertex_buffer`
    BindVertexBuffer(String, BufferHandle),
    /// `bind_index_buffer`
    BindIndexBuffer(Option<BufferHandle>),
    /// `bind_render_target`
    BindRenderTarget(Option<RenderTargetHandle>),
    /// `set_viewport`
    SetViewport(Viewport),
    /// `set_scissor`
    SetScissor(Viewport),
    /// `set_capability`
    SetCapability(Capability, bool),
    /// `set_blend_equation`
    SetBlendEquation(BlendEquation, BlendEquation),
    /// `set_blend_func`
    SetBlendFunc(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    /// `set_depth_func`
    SetDepthFunc(CompareFunction),
    /// `set_depth_mask`
    SetDepthMask(bool),
    /// `set_stencil_func`
    SetStencilFunc(CompareFunction, i32, u32),
    /// `set_stencil_op`
    SetStencilOp(StencilOp, StencilOp, StencilOp),
    /// `set_stencil_mask`
    SetStencilMask(u32),
    /// `set_cull_face`
    SetCullFace(CullFace),
    /// `set_front_face`
    SetFrontFace(FrontFace),
    /// `set_polygon_offset`
    SetPolygonOffset(f32, f32),
    /// `set_color_mask`
    SetColorMask(bool),
    /// `set_clear_color`
    SetClearColor([f32; 4]),
    /// `clear`
    Clear(ClearFlags),
    /// `draw`
    Draw(DrawCall),
    /// `fence_sync`
    FenceSync(FenceHandle),
    /// `delete_sync`
    DeleteSync(FenceHandle),
    /// `read_pixels`
    ReadPixels(Viewport),
}

impl DeviceCommand {
    /// Fixed-function state setters, the calls a state cache should elide
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Self::SetCapability(..)
                | Self::SetBlendEquation(..)
                | Self::SetBlendFunc(..)
                | Self::SetDepthFunc(_)
                | Self::SetDepthMask(_)
                | Self::SetStencilFunc(..)
                | Self::SetStencilOp(..)
                | Self::SetStencilMask(_)
                | Self::SetCullFace(_)
                | Self::SetFrontFace(_)
                | Self::SetPolygonOffset(..)
                | Self::SetColorMask(_)
                | Self::SetViewport(_)
                | Self::SetScissor(_)
                | Self::UseProgram(_)
                | Self::BindRenderTarget(_)
        )
    }
}

#[derive(Debug)]
struct PendingProgram {
    polls_remaining: u32,
    outcome: CompileStatus,
}

/// Device double that records calls and simulates compile latency and loss
#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    next_handle: u64,
    context_lost: bool,
    compile_latency: u32,
    failing_sources: Vec<String>,
    programs: HashMap<ProgramHandle, PendingProgram>,
    buffers: HashSet<BufferHandle>,
    textures: HashSet<TextureHandle>,
    render_targets: HashMap<RenderTargetHandle, TextureHandle>,
    fences: HashSet<FenceHandle>,
    pixel: [u8; 4],
}

impl RecordingDevice {
    /// Create a device with instant compiles and a live context
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs stay `Pending` for this many polls
    pub fn with_compile_latency(mut self, polls: u32) -> Self {
        self.compile_latency = polls;
        self
    }

    /// Programs whose name or source contains `pattern` fail to link
    pub fn fail_programs_containing(&mut self, pattern: impl Into<String>) {
        self.failing_sources.push(pattern.into());
    }

    /// Simulate losing or restoring the context
    pub fn set_context_lost(&mut self, lost: bool) {
        if lost && !self.context_lost {
            self.programs.clear();
            self.buffers.clear();
            self.textures.clear();
            self.render_targets.clear();
            self.fences.clear();
        }
        self.context_lost = lost;
    }

    /// Colour returned for every pixel by `read_pixels`
    pub fn set_readback_pixel(&mut self, rgba: [u8; 4]) {
        self.pixel = rgba;
    }

    /// Everything recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Clear the log
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Count recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    /// Recorded draws
    pub fn draws(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    /// Live programs
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Live textures, excluding render target attachments
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Live render targets
    pub fn live_render_targets(&self) -> usize {
        self.render_targets.len()
    }

    /// Live fences
    pub fn live_fences(&self) -> usize {
        self.fences.len()
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn ensure_context(&self) -> DeviceResult<()> {
        if self.context_lost {
            Err(DeviceError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, command: DeviceCommand) {
        self.commands.push(command);
    }
}

impl GraphicsDevice for RecordingDevice {
    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> DeviceResult<BufferHandle> {
        self.ensure_context()?;
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(handle);
        self.record(DeviceCommand::CreateBuffer(handle, kind, data.len()));
        Ok(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> DeviceResult<()> {
        self.ensure_context()?;
        if !self.buffers.contains(&buffer) {
            return Err(DeviceError::InvalidHandle(format!("{buffer:?}")));
        }
        self.record(DeviceCommand::UpdateBuffer(buffer, data.len()));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer) {
            self.record(DeviceCommand::DestroyBuffer(buffer));
        } else {
            log::warn!("RecordingDevice: destroy of unknown buffer {buffer:?}");
        }
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor, _data: Option<&[u8]>) -> DeviceResult<TextureHandle> {
        self.ensure_context()?;
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle);
        self.record(DeviceCommand::CreateTexture(handle, *descriptor));
        Ok(handle)
    }

    fn update_texture(&mut self, texture: TextureHandle, _data: &[u8]) -> DeviceResult<()> {
        self.ensure_context()?;
        if !self.textures.contains(&texture) {
            return Err(DeviceError::InvalidHandle(format!("{texture:?}")));
        }
        self.record(DeviceCommand::UpdateTexture(texture));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture) {
            self.record(DeviceCommand::DestroyTexture(texture));
        } else {
            log::warn!("RecordingDevice: destroy of unknown texture {texture:?}");
        }
    }

    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> DeviceResult<RenderTargetHandle> {
        self.ensure_context()?;
        let handle = RenderTargetHandle(self.allocate());
        let attachment = TextureHandle(self.allocate());
        self.render_targets.insert(handle, attachment);
        self.record(DeviceCommand::CreateRenderTarget(handle, *descriptor));
        Ok(handle)
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if self.render_targets.remove(&target).is_some() {
            self.record(DeviceCommand::DestroyRenderTarget(target));
        } else {
            log::warn!("RecordingDevice: destroy of unknown render target {target:?}");
        }
    }

    fn render_target_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle> {
        self.render_targets.get(&target).copied()
    }

    fn compile_program(&mut self, source: &ShaderSource) -> DeviceResult<ProgramHandle> {
        self.ensure_context()?;
        let handle = ProgramHandle(self.allocate());
        let failing = self.failing_sources.iter().find(|pattern| {
            source.name.contains(pattern.as_str())
                || source.vertex.contains(pattern.as_str())
                || source.fragment.contains(pattern.as_str())
        });
        let outcome = match failing {
            Some(pattern) => CompileStatus::Failed(format!("ERROR: 0:1: '{pattern}' : syntax error")),
            None => CompileStatus::Ready,
        };
        self.programs.insert(
            handle,
            PendingProgram {
                polls_remaining: self.compile_latency,
                outcome,
            },
        );
        self.record(DeviceCommand::CompileProgram(handle, source.name.clone()));
        Ok(handle)
    }

    fn program_status(&mut self, program: ProgramHandle) -> CompileStatus {
        match self.programs.get_mut(&program) {
            Some(pending) if pending.polls_remaining > 0 => {
                pending.polls_remaining -= 1;
                CompileStatus::Pending
            }
            Some(pending) => pending.outcome.clone(),
            None => CompileStatus::Failed("unknown program".to_string()),
        }
    }

    fn finish_program(&mut self, program: ProgramHandle) -> CompileStatus {
        match self.programs.get_mut(&program) {
            Some(pending) => {
                pending.polls_remaining = 0;
                pending.outcome.clone()
            }
            None => CompileStatus::Failed("unknown program".to_string()),
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.record(DeviceCommand::DestroyProgram(program));
        } else {
            log::warn!("RecordingDevice: destroy of unknown program {program:?}");
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.record(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue) {
        self.record(DeviceCommand::SetUniform(program, name.to_string(), value.clone()));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        self.record(DeviceCommand::BindTexture(unit, texture));
    }

    fn bind_vertex_buffer(&mut self, attribute: &str, buffer: BufferHandle, _item_size: usize) {
        self.record(DeviceCommand::BindVertexBuffer(attribute.to_string(), buffer));
    }

    fn bind_index_buffer(&mut self, buffer: Option<BufferHandle>) {
        self.record(DeviceCommand::BindIndexBuffer(buffer));
    }

    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>) {
        self.record(DeviceCommand::BindRenderTarget(target));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(DeviceCommand::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: Viewport) {
        self.record(DeviceCommand::SetScissor(scissor));
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.record(DeviceCommand::SetCapability(capability, enabled));
    }

    fn set_blend_equation(&mut self, color: BlendEquation, alpha: BlendEquation) {
        self.record(DeviceCommand::SetBlendEquation(color, alpha));
    }

    fn set_blend_func(&mut self, src_color: BlendFactor, dst_color: BlendFactor, src_alpha: BlendFactor, dst_alpha: BlendFactor) {
        self.record(DeviceCommand::SetBlendFunc(src_color, dst_color, src_alpha, dst_alpha));
    }

    fn set_depth_func(&mut self, func: CompareFunction) {
        self.record(DeviceCommand::SetDepthFunc(func));
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.record(DeviceCommand::SetDepthMask(write));
    }

    fn set_stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        self.record(DeviceCommand::SetStencilFunc(func, reference, mask));
    }

    fn set_stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.record(DeviceCommand::SetStencilOp(fail, depth_fail, pass));
    }

    fn set_stencil_mask(&mut self, mask: u32) {
        self.record(DeviceCommand::SetStencilMask(mask));
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.record(DeviceCommand::SetCullFace(face));
    }

    fn set_front_face(&mut self, face: FrontFace) {
        self.record(DeviceCommand::SetFrontFace(face));
    }

    fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        self.record(DeviceCommand::SetPolygonOffset(factor, units));
    }

    fn set_color_mask(&mut self, write: bool) {
        self.record(DeviceCommand::SetColorMask(write));
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.record(DeviceCommand::SetClearColor(rgba));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.record(DeviceCommand::Clear(flags));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.record(DeviceCommand::Draw(*call));
    }

    fn fence_sync(&mut self) -> FenceHandle {
        let handle = FenceHandle(self.allocate());
        self.fences.insert(handle);
        self.record(DeviceCommand::FenceSync(handle));
        handle
    }

    fn client_wait_sync(&mut self, fence: FenceHandle, _timeout_ns: u64) -> WaitStatus {
        if self.context_lost || !self.fences.contains(&fence) {
            WaitStatus::WaitFailed
        } else {
            WaitStatus::AlreadySignaled
        }
    }

    fn delete_sync(&mut self, fence: FenceHandle) {
        if self.fences.remove(&fence) {
            self.record(DeviceCommand::DeleteSync(fence));
        }
    }

    fn read_pixels(&mut self, rect: Viewport) -> DeviceResult<Vec<u8>> {
        self.ensure_context()?;
        self.record(DeviceCommand::ReadPixels(rect));
        let texels = rect.width as usize * rect.height as usize;
        Ok(self.pixel.repeat(texels))
    }
}
