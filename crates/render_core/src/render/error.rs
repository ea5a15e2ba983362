//! Renderer errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::render::device::DeviceError;
use crate::scene::{NodeId, SceneError};

/// Errors returned by [`Renderer`](super::Renderer)
#[derive(Error, Debug)]
pub enum RenderError {
    /// A program failed to compile or link (strict diagnostics only)
    #[error("shader program '{name}' failed to compile: {log}")]
    ShaderCompilation {
        /// Program name
        name: String,
        /// Driver info log
        log: String,
    },

    /// The device context is lost; nothing can be drawn until it is restored
    #[error("graphics context lost")]
    ContextLost,

    /// The camera node is missing or not a camera
    #[error("node {0:?} is not a usable camera")]
    InvalidCamera(NodeId),

    /// Device call failed
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected scene access
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
