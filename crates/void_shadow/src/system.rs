//! Shadow System
//!
//! Owns the shadow configuration and the per-frame, per-cascade depth
//! targets, and recomputes every cascade once per frame.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Initialized -> ShutDown`. A failed [`ShadowSystem::init`]
//! destroys whatever it had created and leaves the system `Uninitialized`.
//!
//! # Frame ordering
//!
//! [`ShadowSystem::update`] runs once per frame after camera and scene
//! state are final and before any command recording that binds cascade
//! matrices or samples the depth textures. Resizing requires the GPU to be
//! idle; the caller enforces that.

use glam::Vec3;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::backend::{
    CullFace, DepthFormat, DepthTextureDesc, PipelineHandle, RenderPassHandle, RenderTargetDesc,
    RenderTargetHandle, ShadowBackend, ShadowPipelineDesc, ShadowRenderPassDesc, TextureHandle,
};
use crate::config::{SceneBounds, ShadowConfig, MAX_CASCADES};
use crate::data::{CascadeData, ShadowFrameData, ShadowUniforms};
use crate::error::ShadowError;
use crate::fit::{fit_cascade, CascadeFitParams};
use crate::frustum::CameraSnapshot;
use crate::light_view::{build_light_view, normalize_light_direction, LightView, LightViewParams};
use crate::splits::CascadeSplits;

/// Name the shadow render pass is registered under
pub const SHADOW_RENDER_PASS_NAME: &str = "void.shadow.cascades";

/// Shader configuration the caster pipeline is built from
pub const SHADOW_SHADER_CONFIG: &str = "shaders/shadow_depth.shadercfg";

/// Depth format of every cascade map
pub const SHADOW_DEPTH_FORMAT: DepthFormat = DepthFormat::Depth32Float;

/// Lifecycle state of a [`ShadowSystem`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowSystemState {
    Uninitialized,
    Initialized,
    ShutDown,
}

/// Depth texture and render target for one cascade face
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeTarget {
    pub depth_texture: TextureHandle,
    pub render_target: RenderTargetHandle,
}

/// GPU resources for one frame in flight, one slot per cascade
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShadowFrameResources {
    targets: Vec<CascadeTarget>,
}

impl ShadowFrameResources {
    pub fn targets(&self) -> &[CascadeTarget] {
        &self.targets
    }

    pub fn target(&self, cascade: usize) -> Option<&CascadeTarget> {
        self.targets.get(cascade)
    }

    /// Destroy every handle held, render targets before their textures
    fn release(&mut self, backend: &mut dyn ShadowBackend) {
        for target in self.targets.drain(..) {
            if target.render_target.is_valid() {
                backend.destroy_render_target(target.render_target);
            }
            if target.depth_texture.is_valid() {
                backend.destroy_texture(target.depth_texture);
            }
        }
    }
}

/// Cascaded shadow maps for a single directional light
#[derive(Debug)]
pub struct ShadowSystem {
    state: ShadowSystemState,
    config: ShadowConfig,
    scene_bounds: Option<SceneBounds>,
    render_pass: RenderPassHandle,
    owns_render_pass: bool,
    pipeline: PipelineHandle,
    frames: Vec<ShadowFrameResources>,
    cascades: [CascadeData; MAX_CASCADES],
    splits: Option<CascadeSplits>,
    light_view: Option<LightView>,
    light_direction: Vec3,
    enabled: bool,
}

impl Default for ShadowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowSystem {
    pub fn new() -> Self {
        Self {
            state: ShadowSystemState::Uninitialized,
            config: ShadowConfig::default(),
            scene_bounds: None,
            render_pass: RenderPassHandle::INVALID,
            owns_render_pass: false,
            pipeline: PipelineHandle::INVALID,
            frames: Vec::new(),
            cascades: [CascadeData::DISABLED; MAX_CASCADES],
            splits: None,
            light_view: None,
            light_direction: Vec3::ZERO,
            enabled: false,
        }
    }

    /// Create the render pass, depth targets and caster pipeline.
    ///
    /// On failure everything created so far is destroyed and the system
    /// stays `Uninitialized`.
    pub fn init(&mut self, backend: &mut dyn ShadowBackend, config: ShadowConfig) -> Result<(), ShadowError> {
        match self.state {
            ShadowSystemState::Initialized => return Err(ShadowError::AlreadyInitialized),
            ShadowSystemState::ShutDown => return Err(ShadowError::ShutDown),
            ShadowSystemState::Uninitialized => {}
        }

        self.scene_bounds = config.scene_bounds().copied();
        self.config = config;

        if let Err(err) = self.create_resources(backend) {
            error!("Shadow system initialization failed: {}", err);
            self.release_resources(backend);
            return Err(err);
        }

        self.state = ShadowSystemState::Initialized;
        self.write_disabled();
        info!(
            "Shadow system initialized: {} cascades, {}x{} maps, {} frames in flight",
            self.config.cascade_count(),
            self.config.shadow_map_size(),
            self.config.shadow_map_size(),
            self.frames.len()
        );
        Ok(())
    }

    fn create_resources(&mut self, backend: &mut dyn ShadowBackend) -> Result<(), ShadowError> {
        let frame_count = backend.frames_in_flight();
        if frame_count == 0 {
            return Err(ShadowError::NoFramesInFlight);
        }

        match backend.find_render_pass(SHADOW_RENDER_PASS_NAME) {
            Some(pass) => {
                debug!("Reusing shared shadow render pass {:?}", pass);
                self.render_pass = pass;
                self.owns_render_pass = false;
            }
            None => {
                let desc = ShadowRenderPassDesc {
                    name: SHADOW_RENDER_PASS_NAME.to_string(),
                    depth_format: SHADOW_DEPTH_FORMAT,
                    clear_depth: 1.0,
                };
                self.render_pass = backend
                    .create_render_pass(&desc)
                    .map_err(|source| ShadowError::resource("render pass", None, None, source))?;
                self.owns_render_pass = true;
            }
        }

        self.allocate_frames(backend, frame_count)?;

        let desc = ShadowPipelineDesc {
            name: "shadow_depth".to_string(),
            shader_config: SHADOW_SHADER_CONFIG.to_string(),
            pass: self.render_pass,
            depth_format: SHADOW_DEPTH_FORMAT,
            depth_bias_constant: self.config.depth_bias_constant(),
            depth_bias_slope: self.config.depth_bias_slope(),
            cull: CullFace::Back,
        };
        self.pipeline = backend
            .create_pipeline(&desc)
            .map_err(|source| ShadowError::resource("pipeline", None, None, source))?;

        Ok(())
    }

    /// Allocate one depth texture and render target per cascade per frame.
    ///
    /// Handles are recorded as soon as they exist so a later failure can
    /// release them.
    fn allocate_frames(&mut self, backend: &mut dyn ShadowBackend, frame_count: usize) -> Result<(), ShadowError> {
        let size = self.config.shadow_map_size();
        for frame in 0..frame_count {
            self.frames.push(ShadowFrameResources::default());
            for cascade in 0..self.config.cascade_count() {
                let texture_desc = DepthTextureDesc {
                    label: format!("shadow_cascade_depth_f{}_c{}", frame, cascade),
                    size,
                    format: SHADOW_DEPTH_FORMAT,
                    sampled: true,
                };
                let depth_texture = backend
                    .create_depth_texture(&texture_desc)
                    .map_err(|source| ShadowError::resource("depth texture", Some(frame), Some(cascade), source))?;

                let targets = &mut self.frames[frame].targets;
                targets.push(CascadeTarget { depth_texture, render_target: RenderTargetHandle::INVALID });

                let target_desc = RenderTargetDesc {
                    label: format!("shadow_cascade_target_f{}_c{}", frame, cascade),
                    pass: self.render_pass,
                    depth_attachment: depth_texture,
                    size,
                };
                let render_target = backend
                    .create_render_target(&target_desc)
                    .map_err(|source| ShadowError::resource("render target", Some(frame), Some(cascade), source))?;
                if let Some(slot) = targets.last_mut() {
                    slot.render_target = render_target;
                }
            }
        }
        Ok(())
    }

    fn release_frames(&mut self, backend: &mut dyn ShadowBackend) {
        for frame in &mut self.frames {
            frame.release(backend);
        }
        self.frames.clear();
    }

    /// Destroy everything this system created. Safe on partial state and
    /// safe to call twice.
    fn release_resources(&mut self, backend: &mut dyn ShadowBackend) {
        if self.pipeline.is_valid() {
            backend.destroy_pipeline(self.pipeline);
            self.pipeline = PipelineHandle::INVALID;
        }

        self.release_frames(backend);

        if self.owns_render_pass && self.render_pass.is_valid() {
            backend.destroy_render_pass(self.render_pass);
        }
        self.render_pass = RenderPassHandle::INVALID;
        self.owns_render_pass = false;
    }

    /// Reallocate every depth target at a new resolution.
    ///
    /// The GPU must be idle. On failure the system keeps no depth targets
    /// until a later resize succeeds.
    pub fn resize(&mut self, backend: &mut dyn ShadowBackend, shadow_map_size: u32) -> Result<(), ShadowError> {
        match self.state {
            ShadowSystemState::Initialized => {}
            ShadowSystemState::ShutDown => return Err(ShadowError::ShutDown),
            ShadowSystemState::Uninitialized => return Err(ShadowError::NotInitialized),
        }

        let config = self.config.with_shadow_map_size(shadow_map_size);
        if config == self.config && !self.frames.is_empty() {
            return Ok(());
        }

        self.release_frames(backend);
        self.config = config;

        let frame_count = backend.frames_in_flight();
        if frame_count == 0 {
            error!("Shadow resize failed: backend reports zero frames in flight");
            return Err(ShadowError::NoFramesInFlight);
        }
        if let Err(err) = self.allocate_frames(backend, frame_count) {
            error!("Shadow resize to {} failed: {}", self.config.shadow_map_size(), err);
            self.release_frames(backend);
            return Err(err);
        }

        info!(
            "Shadow maps resized to {}x{}",
            self.config.shadow_map_size(),
            self.config.shadow_map_size()
        );
        Ok(())
    }

    /// Destroy all GPU resources. A render pass borrowed from the backend's
    /// registry is left alone.
    pub fn shutdown(&mut self, backend: &mut dyn ShadowBackend) {
        if self.state == ShadowSystemState::ShutDown {
            return;
        }
        self.release_resources(backend);
        self.write_disabled();
        self.state = ShadowSystemState::ShutDown;
        info!("Shadow system shut down");
    }

    /// Replace the scene volume used for anchoring and depth extension
    pub fn set_scene_bounds(&mut self, bounds: Option<SceneBounds>) {
        self.scene_bounds = bounds;
    }

    /// Recompute every cascade for this frame.
    ///
    /// A disabled light (or a missing camera) writes identity matrices and
    /// zeroed metadata into every cascade.
    pub fn update(&mut self, camera: Option<&CameraSnapshot>, light_enabled: bool, light_direction: Vec3) {
        if self.state != ShadowSystemState::Initialized {
            debug!("Shadow update skipped: system is {:?}", self.state);
            return;
        }

        if !light_enabled {
            self.write_disabled();
            return;
        }

        let Some(camera) = camera else {
            warn!("Shadow update without a camera; cascades disabled for this frame");
            self.write_disabled();
            return;
        };

        let config = &self.config;
        let cascade_count = config.cascade_count();
        let splits = CascadeSplits::compute(
            cascade_count,
            camera.near,
            camera.far,
            config.max_shadow_distance(),
            config.cascade_split_lambda(),
        );
        debug!("Shadow cascade splits: {:?}", splits.values());

        let scene_bounds = self.scene_bounds.as_ref().filter(|bounds| bounds.is_authoritative());
        let light_view = build_light_view(&LightViewParams {
            light_direction,
            scene_bounds,
            camera: Some(camera),
            max_shadow_distance: config.max_shadow_distance(),
            shadow_map_size: config.shadow_map_size(),
            anchor_snap_texels: config.anchor_snap_texels(),
        });

        let fit_params = CascadeFitParams {
            shadow_map_size: config.shadow_map_size(),
            stabilize: config.stabilize_cascades(),
            guard_band_texels: config.cascade_guard_band_texels(),
            use_constant_size: config.use_constant_cascade_size(),
            scene_bounds,
            z_extension_factor: config.z_extension_factor(),
        };

        for (index, slot) in self.cascades.iter_mut().enumerate() {
            *slot = match splits.range(index) {
                Some((near, far)) => {
                    let corners = camera.corners(near, far);
                    let fit = fit_cascade(&light_view.view, &corners, &fit_params);
                    trace!(
                        "Cascade {}: [{:.3}, {:.3}] extent {:.3}, {:.5} units/texel",
                        index,
                        near,
                        far,
                        fit.extent,
                        fit.world_units_per_texel
                    );
                    CascadeData::from_fit(&fit, far)
                }
                None => CascadeData::DISABLED,
            };
        }

        self.splits = Some(splits);
        self.light_view = Some(light_view);
        self.light_direction = light_view.direction;
        self.enabled = true;
    }

    fn write_disabled(&mut self) {
        self.cascades = [CascadeData::DISABLED; MAX_CASCADES];
        self.splits = None;
        self.light_view = None;
        self.light_direction = Vec3::ZERO;
        self.enabled = false;
    }

    /// Render target for one cascade of one frame, invalid when out of range
    pub fn get_render_target(&self, frame_index: usize, cascade_index: usize) -> RenderTargetHandle {
        self.cascade_target(frame_index, cascade_index)
            .map(|target| target.render_target)
            .unwrap_or(RenderTargetHandle::INVALID)
    }

    /// Depth texture for one cascade of one frame, invalid when out of range
    pub fn get_depth_texture(&self, frame_index: usize, cascade_index: usize) -> TextureHandle {
        self.cascade_target(frame_index, cascade_index)
            .map(|target| target.depth_texture)
            .unwrap_or(TextureHandle::INVALID)
    }

    fn cascade_target(&self, frame_index: usize, cascade_index: usize) -> Option<&CascadeTarget> {
        if self.state != ShadowSystemState::Initialized || cascade_index >= self.config.cascade_count() {
            return None;
        }
        self.frames.get(frame_index)?.target(cascade_index)
    }

    /// Flat shadow data for the shading stage; zero-filled when the system
    /// is not initialized or the frame index is out of range
    pub fn get_frame_data(&self, frame_index: usize) -> ShadowFrameData {
        if self.state != ShadowSystemState::Initialized {
            return ShadowFrameData::default();
        }
        let Some(frame) = self.frames.get(frame_index) else {
            return ShadowFrameData::default();
        };

        let mut depth_textures = [TextureHandle::INVALID; MAX_CASCADES];
        for (slot, target) in depth_textures.iter_mut().zip(frame.targets()) {
            *slot = target.depth_texture;
        }

        let light_direction = if self.enabled { normalize_light_direction(self.light_direction) } else { Vec3::ZERO };
        ShadowFrameData {
            uniforms: ShadowUniforms::new(&self.cascades, &self.config, light_direction, self.enabled),
            depth_textures,
        }
    }

    pub fn state(&self) -> ShadowSystemState {
        self.state
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn scene_bounds(&self) -> Option<&SceneBounds> {
        self.scene_bounds.as_ref()
    }

    /// Whether the last update produced live cascades
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// All cascade slots; entries past the cascade count stay disabled
    pub fn cascades(&self) -> &[CascadeData; MAX_CASCADES] {
        &self.cascades
    }

    pub fn cascade(&self, index: usize) -> Option<&CascadeData> {
        self.cascades[..self.config.cascade_count()].get(index)
    }

    /// Splits from the last enabled update
    pub fn splits(&self) -> Option<&CascadeSplits> {
        self.splits.as_ref()
    }

    /// Light view from the last enabled update
    pub fn light_view(&self) -> Option<&LightView> {
        self.light_view.as_ref()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_resources(&self, frame_index: usize) -> Option<&ShadowFrameResources> {
        self.frames.get(frame_index)
    }

    pub fn render_pass(&self) -> RenderPassHandle {
        self.render_pass
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }
}
