//! # Cameras
//!
//! A camera is a scene node payload. Its placement comes from the node's world
//! matrix; the payload only owns the projection and the matrices derived from
//! it each frame.
//!
//! ## Conventions
//! - Right handed, Y up, the camera looks down its local -Z axis
//! - Clip space depth spans `[-1, 1]`
//! - The view matrix is the inverse of the camera node's world matrix
//!
//! ## Frame usage
//! The renderer calls [`Camera::update_view`] after transform propagation and
//! takes a [`CameraView`] snapshot, which carries the frustum used for culling
//! and the matrices uploaded as camera uniforms.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::scene::bounds::Frustum;
use crate::scene::node::Layers;

/// Projection model and its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Pinhole perspective
    Perspective {
        /// Vertical field of view in degrees
        fov_y: f32,
        /// Width / height
        aspect: f32,
        /// Near clip distance (> 0)
        near: f32,
        /// Far clip distance (> near)
        far: f32,
        /// Zoom factor, narrows the field of view
        zoom: f32,
    },
    /// Parallel projection of a view-space box
    Orthographic {
        /// Left extent
        left: f32,
        /// Right extent
        right: f32,
        /// Top extent
        top: f32,
        /// Bottom extent
        bottom: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
        /// Zoom factor, shrinks the extents
        zoom: f32,
    },
}

impl Projection {
    /// Build the projection matrix
    ///
    /// # Zoom
    /// Perspective zoom scales `tan(fov / 2)` down; orthographic zoom scales
    /// the extents about their centre. A zoom of 1 is neutral.
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, aspect, near, far, zoom } => {
                let half = (utils::deg_to_rad(fov_y) * 0.5).tan() / zoom;
                Mat4::perspective(2.0 * half.atan(), aspect, near, far)
            }
            Self::Orthographic { left, right, top, bottom, near, far, zoom } => {
                let dx = (right - left) / (2.0 * zoom);
                let dy = (top - bottom) / (2.0 * zoom);
                let cx = (right + left) * 0.5;
                let cy = (top + bottom) * 0.5;
                Mat4::orthographic(cx - dx, cx + dx, cy + dy, cy - dy, near, far)
            }
        }
    }

    /// Near and far clip distances
    pub fn clip_range(&self) -> (f32, f32) {
        match *self {
            Self::Perspective { near, far, .. } | Self::Orthographic { near, far, .. } => {
                (near, far)
            }
        }
    }

    /// True for orthographic projections
    pub fn is_orthographic(&self) -> bool {
        matches!(self, Self::Orthographic { .. })
    }

    /// Reject parameters that produce a singular or inverted projection
    pub fn is_valid(&self) -> bool {
        let (near, far) = self.clip_range();
        let depth_ok = far > near && near.is_finite() && far.is_finite();
        match *self {
            Self::Perspective { fov_y, aspect, zoom, .. } => {
                depth_ok && near > 0.0 && fov_y > 0.0 && fov_y < 180.0 && aspect > 0.0 && zoom > 0.0
            }
            Self::Orthographic { left, right, top, bottom, zoom, .. } => {
                depth_ok && right != left && top != bottom && zoom > 0.0
            }
        }
    }
}

/// Camera payload of a scene node
///
/// Holds the projection plus matrices derived during the frame. The cached
/// matrices are only meaningful after [`Camera::update_view`] ran for the
/// current world matrix.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    projection_matrix: Mat4,
    projection_matrix_inverse: Mat4,
    view_matrix: Mat4,
    world_matrix: Mat4,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Width / height of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// # Example
    /// ```rust
    /// use render_core::scene::Camera;
    ///
    /// let camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
    /// assert!(!camera.projection().is_orthographic());
    /// ```
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::from_projection(Projection::Perspective {
            fov_y: fov_degrees,
            aspect,
            near,
            far,
            zoom: 1.0,
        })
    }

    /// Create an orthographic camera from view-space extents
    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self::from_projection(Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            near,
            far,
            zoom: 1.0,
        })
    }

    /// Create a camera from an explicit projection
    pub fn from_projection(projection: Projection) -> Self {
        let mut camera = Self {
            projection,
            projection_matrix: Mat4::identity(),
            projection_matrix_inverse: Mat4::identity(),
            view_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
        };
        camera.update_projection_matrix();
        camera
    }

    /// Current projection parameters
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Replace the projection and rebuild its matrices
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.update_projection_matrix();
    }

    /// Change the aspect ratio of a perspective camera.
    ///
    /// Orthographic cameras keep their vertical extent and widen or narrow
    /// the horizontal one around its centre.
    pub fn set_aspect(&mut self, new_aspect: f32) {
        match &mut self.projection {
            Projection::Perspective { aspect, .. } => *aspect = new_aspect,
            Projection::Orthographic { left, right, top, bottom, .. } => {
                let half_width = (*top - *bottom) * 0.5 * new_aspect;
                let center = (*left + *right) * 0.5;
                *left = center - half_width;
                *right = center + half_width;
            }
        }
        self.update_projection_matrix();
    }

    /// Change the zoom factor
    pub fn set_zoom(&mut self, new_zoom: f32) {
        match &mut self.projection {
            Projection::Perspective { zoom, .. } | Projection::Orthographic { zoom, .. } => {
                *zoom = new_zoom;
            }
        }
        self.update_projection_matrix();
    }

    /// Rebuild the projection matrix and its inverse
    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = self.projection.matrix();
        self.projection_matrix_inverse = self.projection_matrix.try_inverse_or_identity();
    }

    /// Adopt a new world matrix; the view matrix becomes its inverse
    pub fn update_view(&mut self, world: &Mat4) {
        self.world_matrix = *world;
        self.view_matrix = world.try_inverse_or_identity();
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Inverse projection matrix
    pub fn projection_matrix_inverse(&self) -> &Mat4 {
        &self.projection_matrix_inverse
    }

    /// View matrix (world to camera)
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Combined `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    /// Frustum from the current matrices
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection())
    }

    /// Frozen copy of everything one frame needs from this camera
    pub fn snapshot(&self, layers: Layers) -> CameraView {
        let view_projection = self.view_projection();
        CameraView {
            projection: self.projection_matrix,
            view: self.view_matrix,
            view_projection,
            position: self.world_matrix.translation_part(),
            frustum: Frustum::from_matrix(&view_projection),
            layers,
            orthographic: self.projection.is_orthographic(),
            clip_range: self.projection.clip_range(),
        }
    }
}

/// Per-frame camera snapshot used for culling, sorting and uniforms
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    /// Projection matrix
    pub projection: Mat4,
    /// View matrix
    pub view: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// World-space eye position
    pub position: Vec3,
    /// Culling volume
    pub frustum: Frustum,
    /// Layers this view renders
    pub layers: Layers,
    /// Orthographic projection
    pub orthographic: bool,
    /// Near and far distances
    pub clip_range: (f32, f32),
}

impl CameraView {
    /// Build a view from explicit matrices (shadow cameras)
    pub fn from_matrices(projection: Mat4, view: Mat4, layers: Layers, orthographic: bool, clip_range: (f32, f32)) -> Self {
        let view_projection = projection * view;
        Self {
            projection,
            view,
            view_projection,
            position: view.try_inverse_or_identity().translation_part(),
            frustum: Frustum::from_matrix(&view_projection),
            layers,
            orthographic,
            clip_range,
        }
    }

    /// Distance in front of the camera along its view axis
    pub fn depth_of(&self, world_point: &Vec3) -> f32 {
        let row = self.view.row(2);
        -(row[0] * world_point.x + row[1] * world_point.y + row[2] * world_point.z + row[3])
    }
}
