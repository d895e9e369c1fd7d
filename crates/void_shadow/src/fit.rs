//! Cascade Projection Fitting
//!
//! Fits an orthographic projection in light space around one cascade's
//! frustum slice and composes it with the light view. This module is
//! backend-agnostic and only performs the mathematical calculations.
//!
//! # Stabilization
//!
//! With stabilization on, the bounding radius is rounded up to 1/16 of a
//! unit and the light-space origin of the projection is floored to whole
//! texels. A camera that moves by sub-texel amounts then leaves the
//! shadow map texel grid where it was, which removes edge shimmer.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::SceneBounds;
use crate::frustum::bounding_sphere;

const RADIUS_QUANTUM: f32 = 16.0;
const MIN_EXTENT: f32 = 1e-3;
const MIN_DEPTH_RANGE: f32 = 1e-3;
const MIN_TEXEL_SIZE: f32 = 1e-6;
const MIN_Z_PADDING: f32 = 0.5;
const Z_PADDING_FRACTION: f32 = 0.05;

/// Inputs for [`fit_cascade`] besides the light view and the corners
#[derive(Clone, Copy, Debug)]
pub struct CascadeFitParams<'a> {
    pub shadow_map_size: u32,
    pub stabilize: bool,
    pub guard_band_texels: f32,
    pub use_constant_size: bool,
    pub scene_bounds: Option<&'a SceneBounds>,
    pub z_extension_factor: f32,
}

impl Default for CascadeFitParams<'_> {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            stabilize: true,
            guard_band_texels: 0.0,
            use_constant_size: false,
            scene_bounds: None,
            z_extension_factor: 0.0,
        }
    }
}

/// Result of fitting one cascade
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeFit {
    /// World to cascade clip space
    pub view_projection: Mat4,
    /// Light space to cascade clip space
    pub projection: Mat4,
    /// World-space size of one shadow map texel
    pub world_units_per_texel: f32,
    /// Lower-left corner of the projection in light space
    pub light_space_origin: Vec2,
    /// Center of the projection in light space
    pub light_space_center: Vec2,
    /// Side length of the square projection, in world units
    pub extent: f32,
    /// Orthographic near plane distance
    pub near_clip: f32,
    /// Orthographic far plane distance
    pub far_clip: f32,
    /// Bounding sphere center of the slice
    pub bounds_center: Vec3,
    /// Bounding sphere radius of the slice
    pub bounds_radius: f32,
}

fn light_space_bounds(light_view: &Mat4, points: &[Vec3]) -> (Vec3, Vec3) {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for point in points {
        let p = light_view.transform_point3(*point);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

/// Fit an orthographic projection around a frustum slice.
///
/// Every division is floored, so the result is finite for any finite input.
pub fn fit_cascade(light_view: &Mat4, corners: &[Vec3; 8], params: &CascadeFitParams<'_>) -> CascadeFit {
    let (bounds_center, mut radius) = bounding_sphere(corners);
    if params.stabilize {
        radius = (radius * RADIUS_QUANTUM).ceil() / RADIUS_QUANTUM;
    }
    let radius = radius.max(MIN_EXTENT);

    let (mut min, mut max) = light_space_bounds(light_view, corners);

    // Pull casters outside the camera frustum into the depth range
    match params.scene_bounds {
        Some(bounds) if bounds.is_authoritative() => {
            let (scene_min, scene_max) = light_space_bounds(light_view, &bounds.corners());
            min.z = min.z.min(scene_min.z);
            max.z = max.z.max(scene_max.z);
        }
        _ if params.z_extension_factor > 0.0 => {
            let extension = radius * params.z_extension_factor;
            min.z -= extension;
            max.z += extension;
        }
        _ => {}
    }

    let z_pad = ((max.z - min.z) * Z_PADDING_FRACTION).max(MIN_Z_PADDING);
    min.z -= z_pad;
    max.z += z_pad;

    let mut extent = (max.x - min.x).max(max.y - min.y).max(MIN_EXTENT);
    let mut center = Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    if params.use_constant_size {
        extent = radius * 2.0;
        center = light_view.transform_point3(bounds_center).truncate();
    }

    let resolution = params.shadow_map_size.max(1) as f32;
    let mut texel_size = (extent / resolution).max(MIN_TEXEL_SIZE);
    let mut guard_texels = params.guard_band_texels.max(0.0);
    if params.stabilize {
        // Snapping moves the bounds by up to one texel
        guard_texels += 1.0;
    }
    extent += 2.0 * texel_size * guard_texels;
    texel_size = (extent / resolution).max(MIN_TEXEL_SIZE);

    let mut origin = center - Vec2::splat(extent * 0.5);
    if params.stabilize {
        origin = (origin / texel_size).floor() * texel_size;
        center = origin + Vec2::splat(extent * 0.5);
    }

    let near_clip = -max.z;
    let far_clip = (-min.z).max(near_clip + MIN_DEPTH_RANGE);
    let projection = Mat4::orthographic_rh(
        origin.x,
        origin.x + extent,
        origin.y,
        origin.y + extent,
        near_clip,
        far_clip,
    );

    CascadeFit {
        view_projection: projection * *light_view,
        projection,
        world_units_per_texel: texel_size,
        light_space_origin: origin,
        light_space_center: center,
        extent,
        near_clip,
        far_clip,
        bounds_center,
        bounds_radius: radius,
    }
}
