//! # void_shadow - Cascaded Shadow Maps
//!
//! CPU-side cascaded shadow mapping for a single directional light:
//! - Practical (log/linear) cascade split distribution
//! - Light view anchored on scene bounds or the camera, snapped to texels
//! - Per-cascade orthographic fitting with texel-grid stabilization
//! - Per-frame depth targets behind a backend-agnostic resource trait
//! - Flat, upload-ready shadow data for the shading stage
//!
//! ## Architecture
//!
//! 1. **Config**: [`ShadowSettings`] are sanitized into an immutable [`ShadowConfig`]
//! 2. **Math**: [`splits`], [`frustum`], [`light_view`] and [`fit`] are pure functions
//! 3. **System**: [`ShadowSystem`] owns GPU resources and runs the math once per frame
//!
//! ## Example
//!
//! ```ignore
//! use void_shadow::prelude::*;
//!
//! let mut backend = HeadlessBackend::new(2);
//! let mut shadows = ShadowSystem::new();
//! shadows.init(&mut backend, ShadowConfig::new(&ShadowSettings::preset(ShadowQuality::High)))?;
//!
//! // Once per frame, after camera and scene state are final
//! shadows.update(Some(&camera), light.enabled, light.direction);
//!
//! for cascade in 0..shadows.config().cascade_count() {
//!     let target = shadows.get_render_target(frame_index, cascade);
//!     // record caster draws into `target`
//! }
//!
//! let data = shadows.get_frame_data(frame_index);
//! queue.write_buffer(&shadow_buffer, 0, data.uniform_bytes());
//!
//! shadows.shutdown(&mut backend);
//! ```

pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod frustum;
pub mod light_view;
pub mod splits;
pub mod system;

// Configuration
pub use config::{
    SceneBounds, ShadowConfig, ShadowQuality, ShadowSettings, MAX_CASCADES, MAX_SHADOW_MAP_SIZE,
};

// Cascade math
pub use fit::{fit_cascade, CascadeFit, CascadeFitParams};
pub use frustum::{bounding_sphere, frustum_corners, CameraProjection, CameraSnapshot};
pub use light_view::{build_light_view, AnchorSource, LightView, LightViewParams, DEFAULT_LIGHT_DIRECTION};
pub use splits::{compute_splits, effective_far, CascadeSplits};

// GPU data
pub use data::{CascadeData, ShadowFrameData, ShadowUniforms};

// Backend
pub use backend::{
    CullFace, DepthFormat, DepthTextureDesc, HeadlessBackend, PipelineHandle, RenderPassHandle,
    RenderTargetDesc, RenderTargetHandle, ResourceKind, ShadowBackend, ShadowPipelineDesc,
    ShadowRenderPassDesc, TextureHandle,
};

// System
pub use error::{BackendError, ShadowError};
pub use system::{
    CascadeTarget, ShadowFrameResources, ShadowSystem, ShadowSystemState, SHADOW_DEPTH_FORMAT,
    SHADOW_RENDER_PASS_NAME, SHADOW_SHADER_CONFIG,
};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::backend::{HeadlessBackend, RenderTargetHandle, ShadowBackend, TextureHandle};
    pub use crate::config::{SceneBounds, ShadowConfig, ShadowQuality, ShadowSettings, MAX_CASCADES};
    pub use crate::data::{CascadeData, ShadowFrameData, ShadowUniforms};
    pub use crate::error::ShadowError;
    pub use crate::frustum::{CameraProjection, CameraSnapshot};
    pub use crate::system::{ShadowSystem, ShadowSystemState};
}
