//! Directional Light View
//!
//! Builds the light's view transform. The light is treated as an
//! orthographic camera looking along its direction toward an anchor point;
//! the anchor comes from the scene bounds when they are authoritative, from
//! the camera otherwise. Snapping the anchor to the texel grid keeps the
//! light from sliding by sub-texel amounts as the anchor drifts.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::SceneBounds;
use crate::frustum::CameraSnapshot;
use crate::splits::effective_far;

/// Direction used when the light direction is missing
pub const DEFAULT_LIGHT_DIRECTION: Vec3 = Vec3::NEG_Y;

const MIN_RADIUS: f32 = 1e-3;
const MIN_SNAP_STEP: f32 = 1e-3;

/// Where the light anchor was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorSource {
    SceneBounds,
    Camera,
    Fallback,
}

/// Inputs for [`build_light_view`]
#[derive(Clone, Copy, Debug)]
pub struct LightViewParams<'a> {
    /// Direction the light travels in (toward the scene)
    pub light_direction: Vec3,
    pub scene_bounds: Option<&'a SceneBounds>,
    pub camera: Option<&'a CameraSnapshot>,
    /// Caps the camera range used for the camera-derived radius (0 = camera far)
    pub max_shadow_distance: f32,
    /// Used to size anchor snapping; 0 disables snapping
    pub shadow_map_size: u32,
    /// Anchor snap step in texels; 0 disables snapping
    pub anchor_snap_texels: f32,
}

/// Light-space view transform and the volume it was built around
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightView {
    /// World to light space
    pub view: Mat4,
    /// Normalized light direction
    pub direction: Vec3,
    /// Up reference handed to the look-at construction
    pub up_reference: Vec3,
    /// Point the light looks at (after snapping)
    pub anchor: Vec3,
    /// Radius of the volume around the anchor
    pub radius: f32,
    /// Light eye position
    pub position: Vec3,
    pub source: AnchorSource,
}

impl Default for LightView {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            direction: DEFAULT_LIGHT_DIRECTION,
            up_reference: Vec3::Z,
            anchor: Vec3::ZERO,
            radius: 1.0,
            position: Vec3::ZERO,
            source: AnchorSource::Fallback,
        }
    }
}

impl LightView {
    /// Light-space right and up axes in world space
    pub fn axes(&self) -> (Vec3, Vec3) {
        light_axes(self.direction, self.up_reference)
    }
}

/// Normalized light direction, straight down when the input is degenerate
pub fn normalize_light_direction(direction: Vec3) -> Vec3 {
    if direction.is_finite() && direction.length_squared() > 1e-8 {
        direction.normalize()
    } else {
        DEFAULT_LIGHT_DIRECTION
    }
}

/// Up reference that never lines up with the light direction
pub fn up_reference(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

fn light_axes(direction: Vec3, up: Vec3) -> (Vec3, Vec3) {
    let right = direction.cross(up).normalize();
    let up = right.cross(direction);
    (right, up)
}

fn quantize(value: f32, step: f32) -> f32 {
    (value / step).floor() * step
}

/// Build the light view transform
pub fn build_light_view(params: &LightViewParams<'_>) -> LightView {
    let direction = normalize_light_direction(params.light_direction);
    let up = up_reference(direction);

    let (anchor, radius, source) = match (params.scene_bounds, params.camera) {
        (Some(bounds), _) if bounds.is_authoritative() => {
            (bounds.center(), bounds.half_diagonal(), AnchorSource::SceneBounds)
        }
        (_, Some(camera)) => {
            let far = effective_far(camera.near.max(0.0), camera.far, params.max_shadow_distance);
            let radius = camera
                .corners(camera.near, far)
                .iter()
                .map(|corner| corner.distance(camera.position))
                .fold(0.0f32, f32::max);
            (camera.position, radius, AnchorSource::Camera)
        }
        _ => (Vec3::ZERO, 1.0, AnchorSource::Fallback),
    };
    let radius = if radius.is_finite() { radius.max(MIN_RADIUS) } else { 1.0 };

    let mut anchor = if anchor.is_finite() { anchor } else { Vec3::ZERO };
    if params.shadow_map_size > 0 && params.anchor_snap_texels > 0.0 {
        let texel_size = (radius * 2.0) / params.shadow_map_size as f32;
        let step = (texel_size * params.anchor_snap_texels).max(MIN_SNAP_STEP);
        let (right, light_up) = light_axes(direction, up);

        let x = quantize(anchor.dot(right), step);
        let y = quantize(anchor.dot(light_up), step);
        let z = anchor.dot(direction);
        anchor = right * x + light_up * y + direction * z;
    }

    let position = anchor - direction * (radius * 2.0).max(1.0);
    let view = Mat4::look_at_rh(position, anchor, up);

    LightView { view, direction, up_reference: up, anchor, radius, position, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frustum::CameraProjection;
    use approx::assert_abs_diff_eq;

    fn camera() -> CameraSnapshot {
        CameraSnapshot::looking_at(
            Vec3::new(3.3, 4.0, 7.9),
            Vec3::new(0.0, 0.0, -20.0),
            Vec3::Y,
            CameraProjection::Perspective { fov_y: 1.0, aspect: 1.5 },
            0.5,
            60.0,
        )
    }

    fn params<'a>(
        direction: Vec3,
        bounds: Option<&'a SceneBounds>,
        camera: Option<&'a CameraSnapshot>,
    ) -> LightViewParams<'a> {
        LightViewParams {
            light_direction: direction,
            scene_bounds: bounds,
            camera,
            max_shadow_distance: 0.0,
            shadow_map_size: 0,
            anchor_snap_texels: 0.0,
        }
    }

    #[test]
    fn test_straight_down_uses_z_up() {
        let light = build_light_view(&params(Vec3::new(0.0, -1.0, 0.0), None, None));

        assert_eq!(light.up_reference, Vec3::Z);
        assert!(light.view.is_finite());
        assert!(!light.view.is_nan());
    }

    #[test]
    fn test_zero_direction_defaults_down() {
        let light = build_light_view(&params(Vec3::ZERO, None, None));
        assert_eq!(light.direction, DEFAULT_LIGHT_DIRECTION);
        assert!(light.view.is_finite());
        assert_eq!(light.source, AnchorSource::Fallback);
        assert_eq!(light.radius, 1.0);
        assert_eq!(light.anchor, Vec3::ZERO);
    }

    #[test]
    fn test_oblique_light_uses_y_up() {
        let light = build_light_view(&params(Vec3::new(1.0, -1.0, 0.5), None, None));
        assert_eq!(light.up_reference, Vec3::Y);
        assert_abs_diff_eq!(light.direction.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_scene_bounds_take_priority() {
        let bounds = SceneBounds::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 4.0, 10.0));
        let cam = camera();
        let light = build_light_view(&params(Vec3::new(0.3, -1.0, 0.2), Some(&bounds), Some(&cam)));

        assert_eq!(light.source, AnchorSource::SceneBounds);
        assert_abs_diff_eq!(light.anchor, Vec3::new(0.0, 2.0, 0.0), epsilon = 1e-5);
        assert_abs_diff_eq!(light.radius, bounds.half_diagonal(), epsilon = 1e-5);
    }

    #[test]
    fn test_non_authoritative_bounds_fall_back_to_camera() {
        let bounds = SceneBounds {
            use_scene_bounds: false,
            ..SceneBounds::new(Vec3::splat(-1.0), Vec3::splat(1.0))
        };
        let cam = camera();
        let light = build_light_view(&params(Vec3::NEG_Y, Some(&bounds), Some(&cam)));

        assert_eq!(light.source, AnchorSource::Camera);
        assert_eq!(light.anchor, cam.position);

        let expected = cam
            .corners(cam.near, cam.far)
            .iter()
            .map(|c| c.distance(cam.position))
            .fold(0.0f32, f32::max);
        assert_abs_diff_eq!(light.radius, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_camera_radius_respects_shadow_distance() {
        let cam = camera();
        let full = build_light_view(&params(Vec3::NEG_Y, None, Some(&cam)));
        let capped = build_light_view(&LightViewParams {
            max_shadow_distance: 20.0,
            ..params(Vec3::NEG_Y, None, Some(&cam))
        });
        assert!(capped.radius < full.radius);
    }

    #[test]
    fn test_anchor_lies_in_front_of_light() {
        let bounds = SceneBounds::new(Vec3::splat(-5.0), Vec3::splat(5.0));
        let light = build_light_view(&params(Vec3::new(0.2, -0.9, 0.1), Some(&bounds), None));

        let in_light = light.view.transform_point3(light.anchor);
        assert_abs_diff_eq!(in_light.x, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(in_light.y, 0.0, epsilon = 1e-4);
        assert!(in_light.z < 0.0);
        assert_abs_diff_eq!(-in_light.z, (light.radius * 2.0).max(1.0), epsilon = 1e-3);
    }

    #[test]
    fn test_anchor_snaps_to_grid() {
        let cam = camera();
        let light = build_light_view(&LightViewParams {
            light_direction: Vec3::new(0.4, -1.0, 0.3),
            shadow_map_size: 1024,
            anchor_snap_texels: 2.0,
            ..params(Vec3::ZERO, None, Some(&cam))
        });
        let step = ((light.radius * 2.0) / 1024.0 * 2.0).max(MIN_SNAP_STEP);
        let (right, up) = light.axes();

        let x = light.anchor.dot(right) / step;
        let y = light.anchor.dot(up) / step;
        assert_abs_diff_eq!(x, x.round(), epsilon = 1e-2);
        assert_abs_diff_eq!(y, y.round(), epsilon = 1e-2);

        // Depth along the light is untouched and the shift stays within one step per axis
        assert_abs_diff_eq!(
            light.anchor.dot(light.direction),
            cam.position.dot(light.direction),
            epsilon = 1e-3
        );
        assert!(light.anchor.distance(cam.position) <= step * 2.0_f32.sqrt() + 1e-4);
    }
}
