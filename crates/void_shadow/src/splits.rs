//! Cascade Split Planning
//!
//! Partitions the view frustum depth range into cascade slices using the
//! practical split scheme, a blend between logarithmic and linear splits:
//! - lambda = 0: Linear splits (uniform in view space)
//! - lambda = 1: Logarithmic splits (uniform in screen space)

use serde::{Deserialize, Serialize};

use crate::config::MAX_CASCADES;

/// Smallest near distance accepted by the logarithmic split term
const MIN_NEAR: f32 = 1e-4;

/// Minimum depth span of the shadowed range
const MIN_RANGE: f32 = 1e-3;

/// Split distances along the camera forward axis.
///
/// `values()[0]` is the near plane, `values()[count]` the effective far plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeSplits {
    splits: [f32; MAX_CASCADES + 1],
    count: usize,
}

impl CascadeSplits {
    /// Compute `cascade_count + 1` split distances.
    ///
    /// `max_distance > 0` caps the far plane; the far plane is never closer
    /// than `near + 1e-3`.
    pub fn compute(cascade_count: usize, near: f32, far: f32, max_distance: f32, lambda: f32) -> Self {
        let near = if near.is_finite() { near.max(MIN_NEAR) } else { MIN_NEAR };
        let mut splits = [near; MAX_CASCADES + 1];

        let count = cascade_count.min(MAX_CASCADES);
        if count == 0 {
            return Self { splits, count: 0 };
        }

        let far = effective_far(near, far, max_distance);
        let lambda = if lambda.is_finite() { lambda.clamp(0.0, 1.0) } else { 0.5 };

        for i in 1..count {
            let p = i as f32 / count as f32;

            let log_split = near * (far / near).powf(p);
            let lin_split = near + (far - near) * p;

            let split = lambda * log_split + (1.0 - lambda) * lin_split;
            splits[i] = split.clamp(splits[i - 1], far);
        }
        splits[count] = far;

        for value in splits.iter_mut().skip(count + 1) {
            *value = far;
        }

        Self { splits, count }
    }

    /// Number of cascades described
    pub fn count(&self) -> usize {
        self.count
    }

    /// The `count + 1` split values
    pub fn values(&self) -> &[f32] {
        &self.splits[..=self.count]
    }

    pub fn near(&self) -> f32 {
        self.splits[0]
    }

    pub fn far(&self) -> f32 {
        self.splits[self.count]
    }

    /// Depth range `[near, far]` of one cascade
    pub fn range(&self, cascade: usize) -> Option<(f32, f32)> {
        if cascade < self.count {
            Some((self.splits[cascade], self.splits[cascade + 1]))
        } else {
            None
        }
    }

    /// Cascade covering a view-space depth, as selected by the shader
    pub fn cascade_for_depth(&self, view_depth: f32) -> usize {
        for i in 0..self.count {
            if view_depth < self.splits[i + 1] {
                return i;
            }
        }
        self.count.saturating_sub(1)
    }

    /// Cascade for a depth plus a 0-1 weight toward the next cascade.
    ///
    /// The weight ramps up over the last `blend_distance` units before the
    /// cascade's far split; the last cascade never blends.
    pub fn cascade_blend(&self, view_depth: f32, blend_distance: f32) -> (usize, f32) {
        let cascade = self.cascade_for_depth(view_depth);
        if cascade + 1 >= self.count || blend_distance <= 0.0 {
            return (cascade, 0.0);
        }

        let remaining = self.splits[cascade + 1] - view_depth;
        let weight = 1.0 - remaining / blend_distance;
        (cascade, weight.clamp(0.0, 1.0))
    }
}

/// Far plane used for splitting: camera far, optionally capped by the shadow distance
pub fn effective_far(near: f32, far: f32, max_distance: f32) -> f32 {
    let mut target = if far.is_finite() { far } else { near + MIN_RANGE };
    if max_distance > 0.0 && max_distance.is_finite() {
        target = target.min(max_distance);
    }
    target.max(near + MIN_RANGE)
}

/// Free-function form of [`CascadeSplits::compute`]
pub fn compute_splits(
    cascade_count: usize,
    near: f32,
    far: f32,
    max_distance: f32,
    lambda: f32,
) -> CascadeSplits {
    CascadeSplits::compute(cascade_count, near, far, max_distance, lambda)
}
