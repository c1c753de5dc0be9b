// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native-device boundary.

Everything above this module is backend-independent: caches, dirty tracking, and the
bind/unbind protocol. Everything the protocol needs from a graphics API goes through two
traits:

* [`NativeDevice`], a thread-safe factory ("allocate a buffer of this description").
* [`NativeContext`], the command surface of one device ("set these output targets").

Backends in this crate:

* [`headless`] records what it is asked to do. It needs no GPU and is what the tests run on.
* `wgpu` (feature `backend_wgpu`) drives a real device.

Native objects cross the boundary as [`NativeHandle`]s, which are reference counted.
Dropping the last handle destroys the native object.
*/

use crate::bindings::sampler::SamplerDescriptor;
use crate::bindings::state::blend::BlendDescriptor;
use crate::bindings::state::depth_stencil::DepthStencilDescriptor;
use crate::bindings::state::rasterizer::RasterizerDescriptor;
use crate::pixel_formats::PixelFormat;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod headless;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

/// Failures reported by a backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("native allocation of {bytes} bytes failed")]
    OutOfMemory { bytes: u64 },
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("device lost")]
    DeviceLost,
    #[error("{0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// An opaque, reference-counted native object.
///
/// Clones share the object; the id identifies it for equality and logging.
#[derive(Clone)]
pub struct NativeHandle {
    id: u64,
    type_name: &'static str,
    object: Arc<dyn Any + Send + Sync>,
}

impl NativeHandle {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self::with_id(Self::next_id(), object)
    }

    //headless needs the id before the object exists
    pub(crate) fn next_id() -> u64 {
        NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn with_id<T: Any + Send + Sync>(id: u64, object: T) -> Self {
        NativeHandle {
            id,
            type_name: std::any::type_name::<T>(),
            object: Arc::new(object),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The backend object, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }
}

impl Debug for NativeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeHandle({} {})", self.id, self.type_name)
    }
}

impl PartialEq for NativeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NativeHandle {}

pub type NativeBuffer = NativeHandle;
pub type NativeTexture = NativeHandle;
pub type NativeView = NativeHandle;
pub type NativeState = NativeHandle;
pub type NativeSampler = NativeHandle;
pub type NativeQuery = NativeHandle;

/// Ordered so that `level < FeatureLevel::Level10_1` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLevel {
    Level9_3,
    Level10_0,
    Level10_1,
    Level11_0,
    Level12_0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub feature_level: FeatureLevel,
    /// Whether stream-output capture and its statistics query are available.
    pub stream_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Shader parameters, written from the host.
    Constant,
    /// Written by the geometry stage, copied out for readback.
    StreamOutput,
    /// Host-readable copy destination.
    Staging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureUsage {
    pub render_target: bool,
    pub depth_stencil: bool,
    pub shader_resource: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sample_count: u32,
    pub mip_level_count: u32,
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Bytes reported as memory pressure for the base level.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Number of levels in a full mip chain for the given extent.
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    RenderTarget,
    DepthStencil,
    ShaderResource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Covers a whole `width` × `height` surface with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    StreamOutputStatistics,
}

/// Counters produced by a stream-output statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOutputStatistics {
    pub primitives_written: u64,
    /// Primitives that would have been written had the capture buffer been large enough.
    pub storage_needed: u64,
}

/// Resource creation for one device. Safe to call from any thread.
pub trait NativeDevice: Send + Sync + Debug {
    fn capabilities(&self) -> Capabilities;

    /// Allocates a buffer, optionally filled with `contents` (which is then `desc.size` long).
    fn create_buffer(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<NativeBuffer>;
    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<NativeTexture>;
    fn create_view(&self, texture: &NativeTexture, kind: ViewKind) -> Result<NativeView>;
    fn create_blend_state(&self, desc: &BlendDescriptor) -> Result<NativeState>;
    fn create_rasterizer_state(&self, desc: &RasterizerDescriptor) -> Result<NativeState>;
    fn create_depth_stencil_state(&self, desc: &DepthStencilDescriptor) -> Result<NativeState>;
    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<NativeSampler>;
    fn create_query(&self, kind: QueryKind) -> Result<NativeQuery>;
}

/// The command surface of one device.
///
/// Setters take `None` to clear a slot. Methods are called in program order from a single
/// thread at a time.
pub trait NativeContext: Send + Debug {
    fn update_buffer(&mut self, buffer: &NativeBuffer, contents: &[u8]) -> Result<()>;
    fn copy_buffer(&mut self, source: &NativeBuffer, destination: &NativeBuffer) -> Result<()>;
    /// Maps `buffer` for reading, hands the bytes to `read`, then unmaps.
    fn read_buffer(&mut self, buffer: &NativeBuffer, read: &mut dyn FnMut(&[u8])) -> Result<()>;

    fn set_blend_state(&mut self, state: Option<&NativeState>);
    fn set_rasterizer_state(&mut self, state: Option<&NativeState>);
    fn set_depth_stencil_state(&mut self, state: Option<&NativeState>);

    /// Replaces the whole output stage in one call.
    fn set_output_targets(&mut self, depth_stencil: Option<&NativeView>, colors: &[&NativeView]);
    fn set_viewports(&mut self, viewports: &[Viewport]);
    fn set_stream_output_target(&mut self, buffer: Option<&NativeBuffer>);

    fn begin_query(&mut self, query: &NativeQuery);
    fn end_query(&mut self, query: &NativeQuery);
    /// Non-blocking. `None` until the result of the last ended query is available.
    fn query_data(&mut self, query: &NativeQuery) -> Option<StreamOutputStatistics>;

    /// Rebuilds every level of `texture` below the base from the base level.
    ///
    /// [`Error::Unsupported`] for textures whose format or sample count has no
    /// filtered downsample.
    fn generate_mips(&mut self, texture: &NativeTexture) -> Result<()>;
    fn clear_render_target(&mut self, view: &NativeView, color: [f32; 4]);
    fn clear_depth_stencil(&mut self, view: &NativeView, depth: Option<f32>, stencil: Option<u8>);
}
