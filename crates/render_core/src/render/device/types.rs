//! Value types exchanged with a [`GraphicsDevice`](super::GraphicsDevice)

use bitflags::bitflags;

use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Handle to a vertex or index buffer owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Handle to a texture owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Handle to an offscreen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u64);

/// Handle to a GPU fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceHandle(pub u64);

/// Buffer binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data
    Vertex,
    /// Element indices (u32)
    Index,
}

/// Texel formats the renderer allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// Half-float RGBA, used for variance shadow maps
    Rgba16Float,
    /// 24-bit depth
    Depth24,
}

/// Texture allocation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Generate a mip chain after upload
    pub generate_mipmaps: bool,
}

/// Render target allocation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Colour attachment format, `None` for depth-only targets
    pub color_format: Option<TextureFormat>,
    /// Attach a depth buffer
    pub depth: bool,
}

/// Rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a rectangle
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True when nothing can be drawn into it
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale by the device pixel ratio, flooring
    pub fn scaled(&self, ratio: f32) -> Self {
        let scale = |v: f32| (v * ratio).floor();
        Self {
            x: scale(self.x as f32) as i32,
            y: scale(self.y as f32) as i32,
            width: scale(self.width as f32) as u32,
            height: scale(self.height as f32) as u32,
        }
    }
}

/// Depth and stencil comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes
    Never,
    /// Passes if less
    Less,
    /// Passes if equal
    Equal,
    /// Passes if less or equal
    #[default]
    LessEqual,
    /// Passes if greater
    Greater,
    /// Passes if not equal
    NotEqual,
    /// Passes if greater or equal
    GreaterEqual,
    /// Always passes
    Always,
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    /// src + dst
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
    /// min(src, dst)
    Min,
    /// max(src, dst)
    Max,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source colour
    SrcColor,
    /// 1 - source colour
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
    /// Destination colour
    DstColor,
    /// 1 - destination colour
    OneMinusDstColor,
    /// min(src alpha, 1 - dst alpha)
    SrcAlphaSaturate,
}

/// Full blend configuration applied when blending is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Colour equation
    pub color_equation: BlendEquation,
    /// Alpha equation
    pub alpha_equation: BlendEquation,
    /// Colour source factor
    pub src_color: BlendFactor,
    /// Colour destination factor
    pub dst_color: BlendFactor,
    /// Alpha source factor
    pub src_alpha: BlendFactor,
    /// Alpha destination factor
    pub dst_alpha: BlendFactor,
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the current value
    #[default]
    Keep,
    /// Set to zero
    Zero,
    /// Set to the reference value
    Replace,
    /// Increment, clamping
    Increment,
    /// Increment, wrapping
    IncrementWrap,
    /// Decrement, clamping
    Decrement,
    /// Decrement, wrapping
    DecrementWrap,
    /// Bitwise invert
    Invert,
}

/// Faces removed by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    /// Back faces
    Back,
    /// Front faces
    Front,
    /// Both
    FrontAndBack,
}

/// Winding that counts as front facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise
    Ccw,
    /// Clockwise
    Cw,
}

/// Toggleable fixed-function stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Colour blending
    Blend,
    /// Depth testing
    DepthTest,
    /// Face culling
    CullFace,
    /// Polygon offset for filled primitives
    PolygonOffsetFill,
    /// Stencil testing
    StencilTest,
    /// Scissor testing
    ScissorTest,
}

bitflags! {
    /// Buffers cleared by [`GraphicsDevice::clear`](super::GraphicsDevice::clear)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Colour buffer
        const COLOR = 1;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

/// Primitive assembly for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    /// Triangle list
    Triangles,
    /// Line list
    Lines,
    /// Point list
    Points,
}

/// One draw submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCall {
    /// Primitive assembly
    pub mode: DrawMode,
    /// First element
    pub first: u32,
    /// Element count
    pub count: u32,
    /// Read elements through the bound index buffer
    pub indexed: bool,
    /// Instance count, 1 for plain draws
    pub instances: u32,
}

/// Uniform payloads
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// float
    Float(f32),
    /// int
    Int(i32),
    /// bool as int
    Bool(bool),
    /// vec2
    Vec2(Vec2),
    /// vec3
    Vec3(Vec3),
    /// vec4
    Vec4(Vec4),
    /// mat3
    Mat3(Mat3),
    /// mat4
    Mat4(Mat4),
    /// Texture unit of a sampler
    Sampler(u32),
    /// float[]
    FloatArray(Vec<f32>),
    /// vec3[]
    Vec3Array(Vec<Vec3>),
    /// mat4[]
    Mat4Array(Vec<Mat4>),
    /// sampler[] units
    SamplerArray(Vec<u32>),
}

/// Program source handed to the device compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Debug label
    pub name: String,
    /// Vertex stage
    pub vertex: String,
    /// Fragment stage
    pub fragment: String,
}

/// Outcome of an asynchronous program build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStatus {
    /// Still compiling or linking
    Pending,
    /// Linked and usable
    Ready,
    /// Failed with the driver's info log
    Failed(String),
}

/// Result of waiting on a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Already signalled when the wait began
    AlreadySignaled,
    /// Signalled during the wait
    ConditionSatisfied,
    /// Timed out
    TimeoutExpired,
    /// Wait failed (context loss)
    WaitFailed,
}
