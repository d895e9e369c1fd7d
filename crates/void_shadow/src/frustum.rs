//! Camera snapshots and frustum slice corners

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Squared length below which a basis vector is treated as missing
const DEGENERATE_LENGTH_SQ: f32 = 1e-12;

/// Camera projection parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CameraProjection {
    /// Vertical field of view in radians, width / height aspect
    Perspective { fov_y: f32, aspect: f32 },
    /// View-space extents of the orthographic volume
    Orthographic { left: f32, right: f32, bottom: f32, top: f32 },
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self::Perspective { fov_y: 60.0_f32.to_radians(), aspect: 16.0 / 9.0 }
    }
}

/// Read-only view of the camera for one frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub near: f32,
    pub far: f32,
    pub projection: CameraProjection,
}

impl Default for CameraSnapshot {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            near: 0.1,
            far: 1000.0,
            projection: CameraProjection::default(),
        }
    }
}

impl CameraSnapshot {
    /// Snapshot of a camera at `position` looking toward `target`
    pub fn looking_at(
        position: Vec3,
        target: Vec3,
        world_up: Vec3,
        projection: CameraProjection,
        near: f32,
        far: f32,
    ) -> Self {
        let forward = axis_or(target - position, Vec3::NEG_Z);
        let mut right = forward.cross(world_up);
        if right.length_squared() < DEGENERATE_LENGTH_SQ {
            right = forward.cross(Vec3::Z);
        }
        let right = axis_or(right, Vec3::X);
        let up = right.cross(forward);
        Self { position, forward, right, up, near, far, projection }
    }

    /// Forward, right and up with canonical axes substituted for degenerate vectors
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (
            axis_or(self.forward, Vec3::NEG_Z),
            axis_or(self.right, Vec3::X),
            axis_or(self.up, Vec3::Y),
        )
    }

    /// View-space (left, right, bottom, top) extents at distance `depth`
    fn extents_at(&self, depth: f32) -> (f32, f32, f32, f32) {
        match self.projection {
            CameraProjection::Perspective { fov_y, aspect } => {
                let half_height = depth * (fov_y * 0.5).tan();
                let half_width = half_height * aspect;
                (-half_width, half_width, -half_height, half_height)
            }
            CameraProjection::Orthographic { left, right, bottom, top } => (left, right, bottom, top),
        }
    }

    /// World-space corners of the frustum slice between two depths.
    ///
    /// Near-plane corners come first (top-left, top-right, bottom-right,
    /// bottom-left), then the far-plane corners in the same order.
    pub fn corners(&self, near_split: f32, far_split: f32) -> [Vec3; 8] {
        let (forward, right, up) = self.basis();
        let mut corners = [Vec3::ZERO; 8];

        for (plane, depth) in [near_split, far_split].into_iter().enumerate() {
            let (l, r, b, t) = self.extents_at(depth);
            let center = self.position + forward * depth;
            let base = plane * 4;
            corners[base] = center + right * l + up * t;
            corners[base + 1] = center + right * r + up * t;
            corners[base + 2] = center + right * r + up * b;
            corners[base + 3] = center + right * l + up * b;
        }

        corners
    }
}

/// Free-function form of [`CameraSnapshot::corners`]
pub fn frustum_corners(camera: &CameraSnapshot, near_split: f32, far_split: f32) -> [Vec3; 8] {
    camera.corners(near_split, far_split)
}

/// Centroid of the points and the largest distance from it
pub fn bounding_sphere(points: &[Vec3; 8]) -> (Vec3, f32) {
    let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let radius = points.iter().map(|p| p.distance(center)).fold(0.0f32, f32::max);
    (center, radius)
}

fn axis_or(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.is_finite() && v.length_squared() > DEGENERATE_LENGTH_SQ {
        v.normalize()
    } else {
        fallback
    }
}
