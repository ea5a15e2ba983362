//! Hardware abstraction layer
//!
//! The renderer talks to the GPU only through [`GraphicsDevice`]. The trait is
//! shaped like a GL-style immediate API: resources are created and destroyed
//! through opaque handles, fixed-function state is set one piece at a time,
//! and program builds are submitted without blocking and polled later.
//!
//! [`RecordingDevice`] is the headless implementation shipped with the crate;
//! it logs every call and backs the renderer's tests.

mod recording;
mod types;

pub use recording::{DeviceCommand, RecordingDevice};
pub use types::{
    BlendEquation, BlendFactor, BlendState, BufferHandle, BufferKind, Capability, ClearFlags,
    CompareFunction, CompileStatus, CullFace, DrawCall, DrawMode, FenceHandle, FrontFace,
    ProgramHandle, RenderTargetDescriptor, RenderTargetHandle, ShaderSource, StencilOp,
    TextureDescriptor, TextureFormat, TextureHandle, UniformValue, Viewport, WaitStatus,
};

use thiserror::Error;

/// Errors reported by a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The context is gone; every handle is invalid
    #[error("graphics context lost")]
    ContextLost,

    /// Allocation failed
    #[error("out of device memory allocating {0}")]
    OutOfMemory(String),

    /// Handle does not name a live resource
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Readback or similar operation failed
    #[error("device operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// GPU command surface used by the renderer
pub trait GraphicsDevice {
    /// True while the context is lost
    fn is_context_lost(&self) -> bool;

    // === Resources ===

    /// Create a buffer initialized with `data`
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> DeviceResult<BufferHandle>;

    /// Replace the contents of a buffer
    fn update_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> DeviceResult<()>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a texture, optionally uploading texels
    fn create_texture(&mut self, descriptor: &TextureDescriptor, data: Option<&[u8]>) -> DeviceResult<TextureHandle>;

    /// Replace the texels of a texture
    fn update_texture(&mut self, texture: TextureHandle, data: &[u8]) -> DeviceResult<()>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create an offscreen render target
    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> DeviceResult<RenderTargetHandle>;

    /// Release a render target
    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    /// Texture that samples a render target's depth (or colour for colour targets)
    fn render_target_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle>;

    // === Programs ===

    /// Submit a program build; never blocks
    fn compile_program(&mut self, source: &ShaderSource) -> DeviceResult<ProgramHandle>;

    /// Poll a program build
    fn program_status(&mut self, program: ProgramHandle) -> CompileStatus;

    /// Block until a program build completes
    fn finish_program(&mut self, program: ProgramHandle) -> CompileStatus;

    /// Release a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Set a uniform of the current program
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue);

    // === Bindings ===

    /// Bind a texture to a unit, `None` unbinds
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    /// Bind a vertex buffer to a named attribute
    fn bind_vertex_buffer(&mut self, attribute: &str, buffer: BufferHandle, item_size: usize);

    /// Bind the index buffer, `None` unbinds
    fn bind_index_buffer(&mut self, buffer: Option<BufferHandle>);

    /// Bind a render target, `None` selects the default framebuffer
    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>);

    // === Fixed-function state ===

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Set the scissor box
    fn set_scissor(&mut self, scissor: Viewport);

    /// Enable or disable a capability
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Set blend equations
    fn set_blend_equation(&mut self, color: BlendEquation, alpha: BlendEquation);

    /// Set blend factors
    fn set_blend_func(&mut self, src_color: BlendFactor, dst_color: BlendFactor, src_alpha: BlendFactor, dst_alpha: BlendFactor);

    /// Set the depth comparison
    fn set_depth_func(&mut self, func: CompareFunction);

    /// Enable or disable depth writes
    fn set_depth_mask(&mut self, write: bool);

    /// Set the stencil comparison
    fn set_stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32);

    /// Set stencil operations
    fn set_stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);

    /// Set the stencil write mask
    fn set_stencil_mask(&mut self, mask: u32);

    /// Select culled faces
    fn set_cull_face(&mut self, face: CullFace);

    /// Select front-face winding
    fn set_front_face(&mut self, face: FrontFace);

    /// Set polygon offset factor and units
    fn set_polygon_offset(&mut self, factor: f32, units: f32);

    /// Enable or disable colour writes
    fn set_color_mask(&mut self, write: bool);

    /// Set the clear colour
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    // === Commands ===

    /// Clear the bound target
    fn clear(&mut self, flags: ClearFlags);

    /// Issue a draw
    fn draw(&mut self, call: &DrawCall);

    /// Insert a fence after all submitted work
    fn fence_sync(&mut self) -> FenceHandle;

    /// Wait on a fence for up to `timeout_ns`
    fn client_wait_sync(&mut self, fence: FenceHandle, timeout_ns: u64) -> WaitStatus;

    /// Release a fence
    fn delete_sync(&mut self, fence: FenceHandle);

    /// Read RGBA8 pixels from the bound target
    fn read_pixels(&mut self, rect: Viewport) -> DeviceResult<Vec<u8>>;
}
