//! GPU Shadow Data Structures
//!
//! Per-cascade results and the flat block the shading stage consumes.
//! [`ShadowUniforms`] is bytemuck Pod/Zeroable for direct GPU upload.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::backend::TextureHandle;
use crate::config::{ShadowConfig, MAX_CASCADES};
use crate::fit::CascadeFit;

/// One cascade's shadow setup for the current frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeData {
    /// World to cascade clip space
    pub view_projection: Mat4,
    /// View-space distance of the slice's far edge
    pub split_far: f32,
    /// World-space size of one shadow map texel
    pub world_units_per_texel: f32,
    /// Lower-left corner of the cascade's texel grid in light space
    pub light_space_origin: Vec2,
    pub bounds_center: Vec3,
    pub bounds_radius: f32,
}

impl CascadeData {
    /// Identity matrix and zeroed metadata
    pub const DISABLED: Self = Self {
        view_projection: Mat4::IDENTITY,
        split_far: 0.0,
        world_units_per_texel: 0.0,
        light_space_origin: Vec2::ZERO,
        bounds_center: Vec3::ZERO,
        bounds_radius: 0.0,
    };

    pub fn from_fit(fit: &CascadeFit, split_far: f32) -> Self {
        Self {
            view_projection: fit.view_projection,
            split_far,
            world_units_per_texel: fit.world_units_per_texel,
            light_space_origin: fit.light_space_origin,
            bounds_center: fit.bounds_center,
            bounds_radius: fit.bounds_radius,
        }
    }

    pub fn is_disabled(&self) -> bool {
        *self == Self::DISABLED
    }
}

impl Default for CascadeData {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Shadow uniform block (std140-compatible, 432 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniforms {
    /// View-projection matrices for each cascade
    pub view_projection: [[[f32; 4]; 4]; MAX_CASCADES],

    /// Cascade far split distances (view-space)
    pub split_far: [f32; MAX_CASCADES],

    /// World units per texel for each cascade
    pub world_units_per_texel: [f32; MAX_CASCADES],

    /// Light-space texel grid origins
    pub light_space_origin: [[f32; 2]; MAX_CASCADES],

    /// Cascade bounding spheres (xyz = center, w = radius)
    pub bounds: [[f32; 4]; MAX_CASCADES],

    /// Constant depth bias, slope depth bias, receiver normal bias, PCF radius
    pub bias: [f32; 4],

    /// Light direction (xyz), w unused
    pub light_direction: [f32; 4],

    /// 1 when shadows are active this frame
    pub enabled: u32,

    /// Number of active cascades
    pub cascade_count: u32,

    /// Shadow map resolution (for PCF texel size)
    pub shadow_map_size: u32,

    /// Cascade blend distance
    pub cascade_blend_distance: f32,
}

impl Default for ShadowUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl ShadowUniforms {
    /// Pack the per-cascade results and the config scalars
    pub fn new(
        cascades: &[CascadeData; MAX_CASCADES],
        config: &ShadowConfig,
        light_direction: Vec3,
        enabled: bool,
    ) -> Self {
        let mut uniforms = Self {
            bias: [
                config.depth_bias_constant(),
                config.depth_bias_slope(),
                config.receiver_normal_bias(),
                config.pcf_radius(),
            ],
            light_direction: light_direction.extend(0.0).to_array(),
            enabled: enabled as u32,
            cascade_count: config.cascade_count() as u32,
            shadow_map_size: config.shadow_map_size(),
            cascade_blend_distance: config.cascade_blend_distance(),
            ..Default::default()
        };

        for (i, cascade) in cascades.iter().enumerate() {
            uniforms.view_projection[i] = cascade.view_projection.to_cols_array_2d();
            uniforms.split_far[i] = cascade.split_far;
            uniforms.world_units_per_texel[i] = cascade.world_units_per_texel;
            uniforms.light_space_origin[i] = cascade.light_space_origin.to_array();
            uniforms.bounds[i] = cascade.bounds_center.extend(cascade.bounds_radius).to_array();
        }

        uniforms
    }
}

/// Everything the shading stage needs to sample cascaded shadows for one frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowFrameData {
    pub uniforms: ShadowUniforms,
    /// Depth texture per cascade for this frame; invalid past the cascade count
    pub depth_textures: [TextureHandle; MAX_CASCADES],
}

impl ShadowFrameData {
    pub fn is_enabled(&self) -> bool {
        self.uniforms.enabled != 0
    }

    pub fn cascade_count(&self) -> usize {
        self.uniforms.cascade_count as usize
    }

    /// Uniform block as bytes for upload
    pub fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }
}
