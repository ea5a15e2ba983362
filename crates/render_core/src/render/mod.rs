//! # Rendering System
//!
//! Everything between a [`Scene`](crate::scene::Scene) and the GPU: list
//! building, program management, state caching and shadow passes.
//!
//! ## Architecture
//!
//! - **Renderer**: frame orchestration and the public entry point
//! - **Device**: the [`GraphicsDevice`] seam and its recording implementation
//! - **Render Lists**: culling, bucketing and sorting of draws
//! - **Programs**: parameter derivation, shader generation and the shared cache
//! - **Uniforms**: per-material, per-view and per-object uniform values
//! - **State**: redundant-call elimination for fixed-function state
//! - **Shadows**: shadow targets, shadow cameras and depth variants
//!
//! ## Design Goals
//!
//! - **Device Agnostic**: nothing above [`device`] knows which API draws
//! - **Lazy Resources**: buffers, textures and programs are created on first use
//! - **Recoverable**: a lost context suspends drawing and rebuilds on return

pub mod device;
pub mod lights;
pub mod programs;
pub mod render_list;
pub mod shadow;
pub mod state;
pub mod uniforms;

mod error;
mod frame_tests;
mod info;
mod renderer;
mod resources;

pub use device::{DeviceError, DeviceResult, GraphicsDevice, RecordingDevice, Viewport};
pub use error::{RenderError, RenderResult};
pub use info::RenderInfo;
pub use lights::{LightCounts, LightsState};
pub use programs::{ProgramCache, ProgramCacheKey, ProgramParameters};
pub use render_list::{Bucket, RenderItem, RenderItemComparator, RenderList, RenderListBuilder};
pub use renderer::{Renderer, RendererEvent, RendererState};
pub use resources::GpuResources;
pub use shadow::{ShadowMap, ShadowMapState, ShadowMapper};
pub use state::PipelineStateCache;
