//! Shadow Configuration
//!
//! [`ShadowSettings`] is the raw, serde-friendly form that tools and
//! hot-reload write. [`ShadowConfig`] is the sanitized form the shadow
//! system runs on: every numeric field is finite and in range, and it
//! cannot be changed once built.

use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};

/// Maximum supported cascade count
pub const MAX_CASCADES: usize = 4;

/// Largest shadow map face accepted by the config
pub const MAX_SHADOW_MAP_SIZE: u32 = 16384;

/// World-space scene volume used to anchor the light and extend the depth range
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
    /// Whether the bounds are trusted to contain every shadow caster
    pub use_scene_bounds: bool,
}

impl SceneBounds {
    /// Authoritative bounds spanning `min..max`
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max, use_scene_bounds: true }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the length of the box diagonal
    pub fn half_diagonal(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    /// True when the bounds are flagged for use and describe a real box
    pub fn is_authoritative(&self) -> bool {
        self.use_scene_bounds
            && self.min.is_finite()
            && self.max.is_finite()
            && self.min.cmple(self.max).all()
    }

    /// The 8 box corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Raw shadow settings, as written by tools or loaded for hot-reload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Cascade count for the directional light (1-4)
    pub cascade_count: u32,

    /// Shadow map resolution per cascade face
    pub shadow_map_size: u32,

    /// Cascade split lambda (0 = linear, 1 = logarithmic)
    pub cascade_split_lambda: f32,

    /// Maximum shadow distance from camera (0 = camera far plane)
    pub max_shadow_distance: f32,

    /// Extra margin around each cascade, in texels
    pub cascade_guard_band_texels: f32,

    /// Depth range extension, in bounding radii, when no scene bounds are known
    pub z_extension_factor: f32,

    /// Light anchor snapping granularity, in texels
    pub anchor_snap_texels: f32,

    /// Size every cascade by its bounding sphere instead of its tight box
    pub use_constant_cascade_size: bool,

    /// Snap cascade bounds to the texel grid
    pub stabilize_cascades: bool,

    /// Constant depth bias applied while rasterizing casters
    pub depth_bias_constant: f32,

    /// Slope-scaled depth bias applied while rasterizing casters
    pub depth_bias_slope: f32,

    /// Receiver offset along the normal, in texels
    pub receiver_normal_bias: f32,

    /// PCF kernel radius, in texels
    pub pcf_radius: f32,

    /// Distance over which neighbouring cascades are blended
    pub cascade_blend_distance: f32,

    /// Known scene volume
    pub scene_bounds: Option<SceneBounds>,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            shadow_map_size: 2048,
            cascade_split_lambda: 0.75,
            max_shadow_distance: 150.0,
            cascade_guard_band_texels: 1.0,
            z_extension_factor: 2.0,
            anchor_snap_texels: 1.0,
            use_constant_cascade_size: false,
            stabilize_cascades: true,
            depth_bias_constant: 1.0,
            depth_bias_slope: 2.0,
            receiver_normal_bias: 0.5,
            pcf_radius: 1.0,
            cascade_blend_distance: 2.0,
            scene_bounds: None,
        }
    }
}

impl ShadowSettings {
    /// Settings for a named quality tier
    pub fn preset(quality: ShadowQuality) -> Self {
        let values = quality.values();
        Self {
            cascade_count: values.cascade_count,
            shadow_map_size: values.shadow_map_size,
            cascade_split_lambda: values.cascade_split_lambda,
            max_shadow_distance: values.max_shadow_distance,
            pcf_radius: values.pcf_radius,
            use_constant_cascade_size: values.use_constant_cascade_size,
            ..Default::default()
        }
    }

    pub fn with_scene_bounds(mut self, bounds: SceneBounds) -> Self {
        self.scene_bounds = Some(bounds);
        self
    }

    pub fn with_cascade_count(mut self, count: u32) -> Self {
        self.cascade_count = count;
        self
    }

    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }
}

/// Shadow quality preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowQuality {
    Low,
    Medium,
    High,
    Ultra,
}

#[derive(Clone, Copy, Debug)]
struct PresetValues {
    cascade_count: u32,
    shadow_map_size: u32,
    cascade_split_lambda: f32,
    max_shadow_distance: f32,
    pcf_radius: f32,
    use_constant_cascade_size: bool,
}

const QUALITY_PRESETS: [(ShadowQuality, &str, PresetValues); 4] = [
    (
        ShadowQuality::Low,
        "low",
        PresetValues {
            cascade_count: 2,
            shadow_map_size: 1024,
            cascade_split_lambda: 0.5,
            max_shadow_distance: 60.0,
            pcf_radius: 0.0,
            use_constant_cascade_size: false,
        },
    ),
    (
        ShadowQuality::Medium,
        "medium",
        PresetValues {
            cascade_count: 4,
            shadow_map_size: 2048,
            cascade_split_lambda: 0.75,
            max_shadow_distance: 150.0,
            pcf_radius: 1.0,
            use_constant_cascade_size: false,
        },
    ),
    (
        ShadowQuality::High,
        "high",
        PresetValues {
            cascade_count: 4,
            shadow_map_size: 4096,
            cascade_split_lambda: 0.8,
            max_shadow_distance: 200.0,
            pcf_radius: 1.5,
            use_constant_cascade_size: true,
        },
    ),
    (
        ShadowQuality::Ultra,
        "ultra",
        PresetValues {
            cascade_count: 4,
            shadow_map_size: 8192,
            cascade_split_lambda: 0.85,
            max_shadow_distance: 300.0,
            pcf_radius: 2.0,
            use_constant_cascade_size: true,
        },
    ),
];

impl ShadowQuality {
    /// Look up a preset by its config name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        QUALITY_PRESETS
            .iter()
            .find(|(_, preset_name, _)| preset_name.eq_ignore_ascii_case(name.trim()))
            .map(|(quality, _, _)| *quality)
    }

    pub fn name(self) -> &'static str {
        QUALITY_PRESETS
            .iter()
            .find(|(quality, _, _)| *quality == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("medium")
    }

    fn values(self) -> PresetValues {
        QUALITY_PRESETS
            .iter()
            .find(|(quality, _, _)| *quality == self)
            .map(|(_, _, values)| *values)
            .unwrap_or(QUALITY_PRESETS[1].2)
    }
}

/// Sanitized, immutable shadow configuration
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShadowConfig {
    cascade_count: usize,
    shadow_map_size: u32,
    cascade_split_lambda: f32,
    max_shadow_distance: f32,
    cascade_guard_band_texels: f32,
    z_extension_factor: f32,
    anchor_snap_texels: f32,
    use_constant_cascade_size: bool,
    stabilize_cascades: bool,
    depth_bias_constant: f32,
    depth_bias_slope: f32,
    receiver_normal_bias: f32,
    pcf_radius: f32,
    cascade_blend_distance: f32,
    scene_bounds: Option<SceneBounds>,
}

impl ShadowConfig {
    /// Build a config, clamping every out-of-range or non-finite value
    pub fn new(settings: &ShadowSettings) -> Self {
        let defaults = ShadowSettings::default();

        let cascade_count = settings.cascade_count.clamp(1, MAX_CASCADES as u32) as usize;
        if cascade_count as u32 != settings.cascade_count {
            warn!(
                "Shadow config: cascade_count {} clamped to {}",
                settings.cascade_count, cascade_count
            );
        }

        let shadow_map_size = settings.shadow_map_size.clamp(1, MAX_SHADOW_MAP_SIZE);
        if shadow_map_size != settings.shadow_map_size {
            warn!(
                "Shadow config: shadow_map_size {} clamped to {}",
                settings.shadow_map_size, shadow_map_size
            );
        }

        let lambda = non_negative(
            "cascade_split_lambda",
            settings.cascade_split_lambda,
            defaults.cascade_split_lambda,
        );
        let cascade_split_lambda = lambda.min(1.0);
        if cascade_split_lambda != lambda {
            warn!("Shadow config: cascade_split_lambda {} clamped to 1.0", lambda);
        }

        let scene_bounds = settings.scene_bounds.map(|bounds| {
            if bounds.use_scene_bounds && !bounds.is_authoritative() {
                warn!("Shadow config: scene bounds are degenerate and will be ignored");
                SceneBounds { use_scene_bounds: false, ..bounds }
            } else {
                bounds
            }
        });

        Self {
            cascade_count,
            shadow_map_size,
            cascade_split_lambda,
            max_shadow_distance: non_negative(
                "max_shadow_distance",
                settings.max_shadow_distance,
                defaults.max_shadow_distance,
            ),
            cascade_guard_band_texels: non_negative(
                "cascade_guard_band_texels",
                settings.cascade_guard_band_texels,
                defaults.cascade_guard_band_texels,
            ),
            z_extension_factor: non_negative(
                "z_extension_factor",
                settings.z_extension_factor,
                defaults.z_extension_factor,
            ),
            anchor_snap_texels: non_negative(
                "anchor_snap_texels",
                settings.anchor_snap_texels,
                defaults.anchor_snap_texels,
            ),
            use_constant_cascade_size: settings.use_constant_cascade_size,
            stabilize_cascades: settings.stabilize_cascades,
            depth_bias_constant: non_negative(
                "depth_bias_constant",
                settings.depth_bias_constant,
                defaults.depth_bias_constant,
            ),
            depth_bias_slope: non_negative(
                "depth_bias_slope",
                settings.depth_bias_slope,
                defaults.depth_bias_slope,
            ),
            receiver_normal_bias: non_negative(
                "receiver_normal_bias",
                settings.receiver_normal_bias,
                defaults.receiver_normal_bias,
            ),
            pcf_radius: non_negative("pcf_radius", settings.pcf_radius, defaults.pcf_radius),
            cascade_blend_distance: non_negative(
                "cascade_blend_distance",
                settings.cascade_blend_distance,
                defaults.cascade_blend_distance,
            ),
            scene_bounds,
        }
    }

    /// Copy of this config with a different shadow map size
    pub(crate) fn with_shadow_map_size(&self, size: u32) -> Self {
        Self { shadow_map_size: size.clamp(1, MAX_SHADOW_MAP_SIZE), ..self.clone() }
    }

    #[inline]
    pub fn cascade_count(&self) -> usize {
        self.cascade_count
    }

    #[inline]
    pub fn shadow_map_size(&self) -> u32 {
        self.shadow_map_size
    }

    #[inline]
    pub fn cascade_split_lambda(&self) -> f32 {
        self.cascade_split_lambda
    }

    #[inline]
    pub fn max_shadow_distance(&self) -> f32 {
        self.max_shadow_distance
    }

    #[inline]
    pub fn cascade_guard_band_texels(&self) -> f32 {
        self.cascade_guard_band_texels
    }

    #[inline]
    pub fn z_extension_factor(&self) -> f32 {
        self.z_extension_factor
    }

    #[inline]
    pub fn anchor_snap_texels(&self) -> f32 {
        self.anchor_snap_texels
    }

    #[inline]
    pub fn use_constant_cascade_size(&self) -> bool {
        self.use_constant_cascade_size
    }

    #[inline]
    pub fn stabilize_cascades(&self) -> bool {
        self.stabilize_cascades
    }

    #[inline]
    pub fn depth_bias_constant(&self) -> f32 {
        self.depth_bias_constant
    }

    #[inline]
    pub fn depth_bias_slope(&self) -> f32 {
        self.depth_bias_slope
    }

    #[inline]
    pub fn receiver_normal_bias(&self) -> f32 {
        self.receiver_normal_bias
    }

    #[inline]
    pub fn pcf_radius(&self) -> f32 {
        self.pcf_radius
    }

    #[inline]
    pub fn cascade_blend_distance(&self) -> f32 {
        self.cascade_blend_distance
    }

    #[inline]
    pub fn scene_bounds(&self) -> Option<&SceneBounds> {
        self.scene_bounds.as_ref()
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self::new(&ShadowSettings::default())
    }
}

impl From<ShadowSettings> for ShadowConfig {
    fn from(settings: ShadowSettings) -> Self {
        Self::new(&settings)
    }
}

impl From<&ShadowSettings> for ShadowConfig {
    fn from(settings: &ShadowSettings) -> Self {
        Self::new(settings)
    }
}

fn non_negative(field: &'static str, value: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        warn!("Shadow config: {} is not finite ({}), using {}", field, value, fallback);
        return fallback;
    }
    if value < 0.0 {
        warn!("Shadow config: {} {} clamped to 0", field, value);
        return 0.0;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_config_default() {
        let config = ShadowConfig::default();
        assert_eq!(config.cascade_count(), 4);
        assert_eq!(config.shadow_map_size(), 2048);
        assert!(config.stabilize_cascades());
        assert!(config.scene_bounds().is_none());
    }

    #[test]
    fn test_shadow_config_clamps() {
        let settings = ShadowSettings {
            cascade_count: 10,
            shadow_map_size: 0,
            cascade_split_lambda: 2.0,
            max_shadow_distance: -5.0,
            cascade_guard_band_texels: f32::NAN,
            z_extension_factor: f32::INFINITY,
            depth_bias_slope: f32::NAN,
            receiver_normal_bias: -1.0,
            ..Default::default()
        };

        let config = ShadowConfig::new(&settings);

        assert_eq!(config.cascade_count(), 4);
        assert_eq!(config.shadow_map_size(), 1);
        assert_eq!(config.cascade_split_lambda(), 1.0);
        assert_eq!(config.max_shadow_distance(), 0.0);
        assert_eq!(config.cascade_guard_band_texels(), 1.0);
        assert_eq!(config.z_extension_factor(), 2.0);
        assert_eq!(config.depth_bias_slope(), 2.0);
        assert_eq!(config.receiver_normal_bias(), 0.0);
    }

    #[test]
    fn test_zero_cascades_clamped_to_one() {
        let config = ShadowConfig::from(ShadowSettings::default().with_cascade_count(0));
        assert_eq!(config.cascade_count(), 1);
    }

    #[test]
    fn test_nan_lambda_uses_default() {
        let settings = ShadowSettings { cascade_split_lambda: f32::NAN, ..Default::default() };
        let config = ShadowConfig::new(&settings);
        assert_eq!(config.cascade_split_lambda(), 0.75);
    }

    #[test]
    fn test_degenerate_scene_bounds_not_authoritative() {
        let inverted = SceneBounds::new(Vec3::splat(5.0), Vec3::splat(-5.0));
        let config = ShadowConfig::from(ShadowSettings::default().with_scene_bounds(inverted));
        let bounds = config.scene_bounds().unwrap();
        assert!(!bounds.use_scene_bounds);
        assert!(!bounds.is_authoritative());

        let valid = SceneBounds::new(Vec3::splat(-5.0), Vec3::splat(5.0));
        let config = ShadowConfig::from(ShadowSettings::default().with_scene_bounds(valid));
        assert!(config.scene_bounds().unwrap().is_authoritative());
    }

    #[test]
    fn test_scene_bounds_geometry() {
        let bounds = SceneBounds::new(Vec3::new(-1.0, -2.0, -2.0), Vec3::new(1.0, 2.0, 2.0));
        assert_eq!(bounds.center(), Vec3::ZERO);
        assert!((bounds.half_diagonal() - 3.0).abs() < 1e-5);
        let corners = bounds.corners();
        assert!(corners.contains(&Vec3::new(1.0, -2.0, 2.0)));
        assert!(corners.contains(&Vec3::new(-1.0, 2.0, -2.0)));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = ShadowSettings::preset(ShadowQuality::High)
            .with_scene_bounds(SceneBounds::new(Vec3::splat(-10.0), Vec3::splat(10.0)));
        let json = serde_json::to_string(&settings).unwrap();
        let restored: ShadowSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, settings);
        assert_eq!(restored.shadow_map_size, 4096);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let restored: ShadowSettings =
            serde_json::from_str(r#"{ "cascade_count": 2, "stabilize_cascades": false }"#).unwrap();
        assert_eq!(restored.cascade_count, 2);
        assert!(!restored.stabilize_cascades);
        assert_eq!(restored.shadow_map_size, 2048);
    }

    #[test]
    fn test_quality_preset_lookup() {
        assert_eq!(ShadowQuality::from_name("ultra"), Some(ShadowQuality::Ultra));
        assert_eq!(ShadowQuality::from_name(" High "), Some(ShadowQuality::High));
        assert_eq!(ShadowQuality::from_name("cinematic"), None);
        assert_eq!(ShadowQuality::Low.name(), "low");

        let low = ShadowSettings::preset(ShadowQuality::Low);
        assert_eq!(low.cascade_count, 2);
        assert_eq!(low.shadow_map_size, 1024);
        assert_eq!(ShadowSettings::preset(ShadowQuality::Medium), ShadowSettings::default());
    }
}
