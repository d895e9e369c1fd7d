//! Graphics Backend Abstraction
//!
//! Abstract representations of the GPU resources the shadow system needs.
//! Any graphics backend (Vulkan, WGPU, ...) implements [`ShadowBackend`];
//! the shadow system only ever holds the opaque handles it hands out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Handle that refers to nothing
            pub const INVALID: Self = Self(0);

            pub fn is_valid(&self) -> bool {
                self.0 != 0
            }
        }
    };
}

resource_handle!(
    /// Abstract depth texture handle
    TextureHandle
);
resource_handle!(
    /// Abstract render target (framebuffer) handle
    RenderTargetHandle
);
resource_handle!(
    /// Abstract render pass handle
    RenderPassHandle
);
resource_handle!(
    /// Abstract pipeline handle
    PipelineHandle
);

/// Depth formats usable for shadow maps
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthFormat {
    Depth16Unorm,
    Depth24Plus,
    #[default]
    Depth32Float,
}

impl DepthFormat {
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            Self::Depth16Unorm => 2,
            Self::Depth24Plus | Self::Depth32Float => 4,
        }
    }
}

/// Face culling used while rasterizing casters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullFace {
    None,
    #[default]
    Back,
    Front,
}

/// Depth-only render pass description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowRenderPassDesc {
    pub name: String,
    pub depth_format: DepthFormat,
    pub clear_depth: f32,
}

/// Depth texture description (one cascade face)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthTextureDesc {
    pub label: String,
    pub size: u32,
    pub format: DepthFormat,
    /// Sampled by the shading stage in addition to being rendered to
    pub sampled: bool,
}

impl DepthTextureDesc {
    pub fn byte_size(&self) -> usize {
        self.size as usize * self.size as usize * self.format.bytes_per_texel()
    }
}

/// Render target binding one depth texture to the shadow pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderTargetDesc {
    pub label: String,
    pub pass: RenderPassHandle,
    pub depth_attachment: TextureHandle,
    pub size: u32,
}

/// Depth-only caster pipeline description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowPipelineDesc {
    pub name: String,
    /// Shader configuration resource the pipeline is built from
    pub shader_config: String,
    pub pass: RenderPassHandle,
    pub depth_format: DepthFormat,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
    pub cull: CullFace,
}

/// Graphics resource layer consumed by the shadow system
pub trait ShadowBackend {
    /// Number of frames the backend keeps in flight
    fn frames_in_flight(&self) -> usize;

    /// Look up a render pass registered under `name` by someone else
    fn find_render_pass(&self, name: &str) -> Option<RenderPassHandle>;

    fn create_render_pass(&mut self, desc: &ShadowRenderPassDesc) -> Result<RenderPassHandle, BackendError>;
    fn destroy_render_pass(&mut self, pass: RenderPassHandle);

    fn create_depth_texture(&mut self, desc: &DepthTextureDesc) -> Result<TextureHandle, BackendError>;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetHandle, BackendError>;
    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    fn create_pipeline(&mut self, desc: &ShadowPipelineDesc) -> Result<PipelineHandle, BackendError>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);
}

/// Kinds of resources a backend creates
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    RenderPass,
    DepthTexture,
    RenderTarget,
    Pipeline,
}

/// In-memory backend that hands out handles without touching a GPU.
///
/// Tracks every live resource so leaks and double frees show up, and can
/// be told to fail the n-th creation of a resource kind.
#[derive(Debug)]
pub struct HeadlessBackend {
    frames_in_flight: usize,
    next_handle: u64,
    shared_passes: BTreeMap<String, RenderPassHandle>,
    passes: BTreeMap<RenderPassHandle, String>,
    textures: BTreeMap<TextureHandle, DepthTextureDesc>,
    targets: BTreeMap<RenderTargetHandle, RenderTargetDesc>,
    pipelines: BTreeMap<PipelineHandle, ShadowPipelineDesc>,
    attempts: BTreeMap<ResourceKind, usize>,
    failures: Vec<(ResourceKind, usize)>,
    invalid_destroys: usize,
}

impl HeadlessBackend {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            next_handle: 1,
            shared_passes: BTreeMap::new(),
            passes: BTreeMap::new(),
            textures: BTreeMap::new(),
            targets: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            attempts: BTreeMap::new(),
            failures: Vec::new(),
            invalid_destroys: 0,
        }
    }

    /// Register a render pass owned by some other system
    pub fn register_shared_pass(&mut self, name: &str) -> RenderPassHandle {
        let handle = RenderPassHandle(self.allocate_handle());
        self.shared_passes.insert(name.to_string(), handle);
        handle
    }

    /// Make the `nth` (0-based) creation attempt of `kind` fail
    pub fn fail_on(&mut self, kind: ResourceKind, nth: usize) {
        self.failures.push((kind, nth));
    }

    pub fn set_frames_in_flight(&mut self, frames: usize) {
        self.frames_in_flight = frames;
    }

    /// Number of live resources of a kind (shared passes excluded)
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::RenderPass => self.passes.len(),
            ResourceKind::DepthTexture => self.textures.len(),
            ResourceKind::RenderTarget => self.targets.len(),
            ResourceKind::Pipeline => self.pipelines.len(),
        }
    }

    /// Total live resources created through this backend
    pub fn live_resources(&self) -> usize {
        self.passes.len() + self.textures.len() + self.targets.len() + self.pipelines.len()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&DepthTextureDesc> {
        self.textures.get(&handle)
    }

    pub fn render_target(&self, handle: RenderTargetHandle) -> Option<&RenderTargetDesc> {
        self.targets.get(&handle)
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> Option<&ShadowPipelineDesc> {
        self.pipelines.get(&handle)
    }

    pub fn is_shared_pass(&self, handle: RenderPassHandle) -> bool {
        self.shared_passes.values().any(|pass| *pass == handle)
    }

    /// Destroy calls that named an unknown or already destroyed resource
    pub fn invalid_destroys(&self) -> usize {
        self.invalid_destroys
    }

    /// Bytes held by live depth textures
    pub fn texture_memory(&self) -> usize {
        self.textures.values().map(DepthTextureDesc::byte_size).sum()
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn attempt(&mut self, kind: ResourceKind, resource: &'static str) -> Result<u64, BackendError> {
        let attempt = self.attempts.entry(kind).or_insert(0);
        let index = *attempt;
        *attempt += 1;
        if self.failures.contains(&(kind, index)) {
            return Err(BackendError::OutOfMemory { resource });
        }
        Ok(self.allocate_handle())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ShadowBackend for HeadlessBackend {
    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn find_render_pass(&self, name: &str) -> Option<RenderPassHandle> {
        self.shared_passes.get(name).copied().or_else(|| {
            self.passes.iter().find(|(_, pass_name)| pass_name.as_str() == name).map(|(handle, _)| *handle)
        })
    }

    fn create_render_pass(&mut self, desc: &ShadowRenderPassDesc) -> Result<RenderPassHandle, BackendError> {
        let handle = RenderPassHandle(self.attempt(ResourceKind::RenderPass, "render pass")?);
        self.passes.insert(handle, desc.name.clone());
        Ok(handle)
    }

    fn destroy_render_pass(&mut self, pass: RenderPassHandle) {
        if self.passes.remove(&pass).is_none() {
            self.invalid_destroys += 1;
        }
    }

    fn create_depth_texture(&mut self, desc: &DepthTextureDesc) -> Result<TextureHandle, BackendError> {
        if desc.size == 0 {
            return Err(BackendError::Unsupported("zero-sized depth texture".into()));
        }
        let handle = TextureHandle(self.attempt(ResourceKind::DepthTexture, "depth texture")?);
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            self.invalid_destroys += 1;
        }
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetHandle, BackendError> {
        if !self.textures.contains_key(&desc.depth_attachment) {
            return Err(BackendError::Device(format!(
                "render target '{}' references unknown texture {:?}",
                desc.label, desc.depth_attachment
            )));
        }
        let handle = RenderTargetHandle(self.attempt(ResourceKind::RenderTarget, "render target")?);
        self.targets.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if self.targets.remove(&target).is_none() {
            self.invalid_destroys += 1;
        }
    }

    fn create_pipeline(&mut self, desc: &ShadowPipelineDesc) -> Result<PipelineHandle, BackendError> {
        let handle = PipelineHandle(self.attempt(ResourceKind::Pipeline, "pipeline")?);
        self.pipelines.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(&pipeline).is_none() {
            self.invalid_destroys += 1;
        }
    }
}
