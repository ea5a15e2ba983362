//! # Render Core
//!
//! A retained-mode 3D rendering core: a scene graph, a per-frame render list,
//! shared shader programs, cached pipeline state and shadow maps, driven
//! through a pluggable graphics device.
//!
//! ## Features
//!
//! - **Scene Graph**: hierarchical transforms, cameras, lights and meshes
//! - **Render Lists**: frustum culling plus opaque/transparent sorting
//! - **Program Cache**: one program per distinct shader configuration
//! - **State Cache**: no redundant fixed-function calls
//! - **Shadows**: directional, spot and point light shadow maps
//! - **Context Loss**: drawing suspends and resources rebuild on restore
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new();
//!     let root = scene.root();
//!     let camera = scene.add_camera(root, Camera::perspective(60.0, 16.0 / 9.0, 0.1, 100.0))?;
//!
//!     let geometry = scene.add_geometry(Geometry::plane(1.0, 1.0));
//!     let material = scene.add_material(Material::standard());
//!     scene.add_mesh(root, geometry, material)?;
//!
//!     let mut renderer = Renderer::new(RecordingDevice::new(), RendererConfig::default(), 1280, 720)?;
//!     renderer.render(&mut scene, camera)?;
//!     println!("{} draw calls", renderer.info().calls);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, RendererConfig, ShadowMapType},
        foundation::math::{Color, Mat4, Quat, Vec3},
        render::{
            GraphicsDevice, RecordingDevice, RenderError, RenderInfo, Renderer, RendererEvent,
            Viewport,
        },
        scene::{Camera, Geometry, Light, Material, NodeId, Scene, Side, Texture},
    };
}
