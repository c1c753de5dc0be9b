// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A backend without a GPU.

Every native object is a small bookkeeping record. Buffers hold their bytes, and the
context remembers what is bound to each slot. Tests (and hosts that want to exercise the
binding layer without a device) inspect that record through [`Headless`].

Device-side effects are scripted: the harness decides what the next statistics query
returns, how many polls it takes to become available, and what the geometry stage
"wrote" into the attached capture buffer.

```
use nested_binds::imp::headless::{Headless, ObjectKind};
use nested_binds::BlendState;
use std::sync::Arc;

let headless = Headless::new();
let mut context = headless.context();
let blend = Arc::new(BlendState::additive());
blend.bind(&mut context).unwrap();
assert_eq!(headless.created(ObjectKind::BlendState), 1);
assert!(headless.blend_state().is_some());
blend.unbind(&mut context).unwrap();
assert!(headless.blend_state().is_none());
```
*/

use crate::bindings::sampler::SamplerDescriptor;
use crate::bindings::state::blend::BlendDescriptor;
use crate::bindings::state::depth_stencil::DepthStencilDescriptor;
use crate::bindings::state::rasterizer::RasterizerDescriptor;
use crate::images::context::{ContextOptions, DeviceContext};
use crate::images::device::Device;
use crate::imp::{
    BufferDescriptor, Capabilities, Error, FeatureLevel, NativeBuffer, NativeContext,
    NativeDevice, NativeHandle, NativeQuery, NativeSampler, NativeState, NativeTexture,
    NativeView, QueryKind, Result, StreamOutputStatistics, TextureDescriptor, ViewKind, Viewport,
};
use crate::pixel_formats::PixelFormat;
use std::collections::HashMap;
use std::ops::DerefMut;
use std::sync::{Arc, Weak};
use wasm_safe_mutex::Mutex;

/// Categories of native object, for creation and liveness counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    View,
    BlendState,
    RasterizerState,
    DepthStencilState,
    Sampler,
    Query,
}

/// How many polls an ended statistics query takes to become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLatency {
    Polls(u32),
    /// Simulates a lost device.
    Never,
}

#[derive(Debug)]
enum QueryState {
    Idle,
    Running,
    Ended {
        polls_left: QueryLatency,
        result: StreamOutputStatistics,
    },
}

#[derive(Debug)]
struct Recording {
    created: HashMap<ObjectKind, usize>,
    live: HashMap<ObjectKind, usize>,
    buffers: HashMap<u64, Vec<u8>>,
    //format and sample count
    textures: HashMap<u64, (PixelFormat, u32)>,
    queries: HashMap<u64, QueryState>,

    blend: Option<u64>,
    rasterizer: Option<u64>,
    depth_stencil: Option<u64>,
    depth_target: Option<u64>,
    color_targets: Vec<u64>,
    viewports: Vec<Viewport>,
    stream_output: Option<u64>,

    buffer_updates: usize,
    buffer_copies: usize,
    mip_generations: usize,
    clears: usize,

    next_statistics: StreamOutputStatistics,
    query_latency: QueryLatency,
    fail_next_allocation: bool,
}

impl Recording {
    fn new() -> Self {
        Recording {
            created: HashMap::new(),
            live: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            queries: HashMap::new(),
            blend: None,
            rasterizer: None,
            depth_stencil: None,
            depth_target: None,
            color_targets: Vec::new(),
            viewports: Vec::new(),
            stream_output: None,
            buffer_updates: 0,
            buffer_copies: 0,
            mip_generations: 0,
            clears: 0,
            next_statistics: StreamOutputStatistics::default(),
            query_latency: QueryLatency::Polls(0),
            fail_next_allocation: false,
        }
    }
}

#[derive(Debug)]
struct Shared {
    capabilities: Capabilities,
    recording: Mutex<Recording>,
}

/// The native object behind every headless handle.
#[derive(Debug)]
struct Object {
    kind: ObjectKind,
    id: u64,
    shared: Weak<Shared>,
    //views keep their texture alive
    _parent: Option<NativeHandle>,
}

impl Drop for Object {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut recording = shared.recording.lock_sync();
        if let Some(live) = recording.live.get_mut(&self.kind) {
            *live = live.saturating_sub(1);
        }
        recording.buffers.remove(&self.id);
        recording.textures.remove(&self.id);
        recording.queries.remove(&self.id);
    }
}

impl Shared {
    fn object(
        self: &Arc<Self>,
        kind: ObjectKind,
        parent: Option<NativeHandle>,
        init: impl FnOnce(&mut Recording, u64),
    ) -> NativeHandle {
        let id = NativeHandle::next_id();
        {
            let mut recording = self.recording.lock_sync();
            *recording.created.entry(kind).or_insert(0) += 1;
            *recording.live.entry(kind).or_insert(0) += 1;
            init(&mut recording, id);
        }
        logwise::debuginternal_sync!(
            "headless created {kind} {id}",
            kind = logwise::privacy::LogIt(&kind),
            id = id
        );
        NativeHandle::with_id(
            id,
            Object {
                kind,
                id,
                shared: Arc::downgrade(self),
                _parent: parent,
            },
        )
    }

    fn check_allocation(&self, bytes: u64) -> Result<()> {
        let mut recording = self.recording.lock_sync();
        if std::mem::take(&mut recording.fail_next_allocation) {
            return Err(Error::OutOfMemory { bytes });
        }
        Ok(())
    }
}

fn require_kind(handle: &NativeHandle, kind: ObjectKind) -> Result<()> {
    match handle.downcast_ref::<Object>() {
        Some(object) if object.kind == kind => Ok(()),
        _ => Err(Error::Backend(format!(
            "{handle:?} is not a headless {kind:?}"
        ))),
    }
}

#[derive(Debug)]
struct HeadlessDevice {
    shared: Arc<Shared>,
}

impl NativeDevice for HeadlessDevice {
    fn capabilities(&self) -> Capabilities {
        self.shared.capabilities
    }

    fn create_buffer(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<NativeBuffer> {
        self.shared.check_allocation(desc.size)?;
        let mut bytes = vec![0; desc.size as usize];
        if let Some(contents) = contents {
            let n = contents.len().min(bytes.len());
            bytes[..n].copy_from_slice(&contents[..n]);
        }
        Ok(self
            .shared
            .object(ObjectKind::Buffer, None, move |recording, id| {
                recording.buffers.insert(id, bytes);
            }))
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<NativeTexture> {
        self.shared.check_allocation(desc.byte_size())?;
        let texture = (desc.format, desc.sample_count);
        Ok(self
            .shared
            .object(ObjectKind::Texture, None, move |recording, id| {
                recording.textures.insert(id, texture);
            }))
    }

    fn create_view(&self, texture: &NativeTexture, _kind: ViewKind) -> Result<NativeView> {
        require_kind(texture, ObjectKind::Texture)?;
        Ok(self
            .shared
            .object(ObjectKind::View, Some(texture.clone()), |_, _| {}))
    }

    fn create_blend_state(&self, _desc: &BlendDescriptor) -> Result<NativeState> {
        Ok(self.shared.object(ObjectKind::BlendState, None, |_, _| {}))
    }

    fn create_rasterizer_state(&self, _desc: &RasterizerDescriptor) -> Result<NativeState> {
        Ok(self
            .shared
            .object(ObjectKind::RasterizerState, None, |_, _| {}))
    }

    fn create_depth_stencil_state(&self, _desc: &DepthStencilDescriptor) -> Result<NativeState> {
        Ok(self
            .shared
            .object(ObjectKind::DepthStencilState, None, |_, _| {}))
    }

    fn create_sampler(&self, _desc: &SamplerDescriptor) -> Result<NativeSampler> {
        Ok(self.shared.object(ObjectKind::Sampler, None, |_, _| {}))
    }

    fn create_query(&self, kind: QueryKind) -> Result<NativeQuery> {
        match kind {
            QueryKind::StreamOutputStatistics if !self.shared.capabilities.stream_output => {
                Err(Error::Unsupported("stream-output statistics queries"))
            }
            QueryKind::StreamOutputStatistics => Ok(self.shared.object(
                ObjectKind::Query,
                None,
                |recording, id| {
                    recording.queries.insert(id, QueryState::Idle);
                },
            )),
        }
    }
}

#[derive(Debug)]
struct HeadlessContext {
    shared: Arc<Shared>,
}

impl HeadlessContext {
    fn recording(&self) -> impl DerefMut<Target = Recording> + '_ {
        self.shared.recording.lock_sync()
    }
}

impl NativeContext for HeadlessContext {
    fn update_buffer(&mut self, buffer: &NativeBuffer, contents: &[u8]) -> Result<()> {
        require_kind(buffer, ObjectKind::Buffer)?;
        let mut recording = self.recording();
        let bytes = recording
            .buffers
            .get_mut(&buffer.id())
            .ok_or_else(|| Error::Backend(format!("{buffer:?} was destroyed")))?;
        if bytes.len() != contents.len() {
            return Err(Error::Backend(format!(
                "update of {} bytes into a {} byte buffer",
                contents.len(),
                bytes.len()
            )));
        }
        bytes.copy_from_slice(contents);
        recording.buffer_updates += 1;
        Ok(())
    }

    fn copy_buffer(&mut self, source: &NativeBuffer, destination: &NativeBuffer) -> Result<()> {
        require_kind(source, ObjectKind::Buffer)?;
        require_kind(destination, ObjectKind::Buffer)?;
        let mut recording = self.recording();
        let data = recording
            .buffers
            .get(&source.id())
            .cloned()
            .ok_or_else(|| Error::Backend(format!("{source:?} was destroyed")))?;
        let target = recording
            .buffers
            .get_mut(&destination.id())
            .ok_or_else(|| Error::Backend(format!("{destination:?} was destroyed")))?;
        let n = data.len().min(target.len());
        target[..n].copy_from_slice(&data[..n]);
        recording.buffer_copies += 1;
        Ok(())
    }

    fn read_buffer(&mut self, buffer: &NativeBuffer, read: &mut dyn FnMut(&[u8])) -> Result<()> {
        require_kind(buffer, ObjectKind::Buffer)?;
        let bytes = self
            .recording()
            .buffers
            .get(&buffer.id())
            .cloned()
            .ok_or_else(|| Error::Backend(format!("{buffer:?} was destroyed")))?;
        read(&bytes);
        Ok(())
    }

    fn set_blend_state(&mut self, state: Option<&NativeState>) {
        self.recording().blend = state.map(NativeHandle::id);
    }

    fn set_rasterizer_state(&mut self, state: Option<&NativeState>) {
        self.recording().rasterizer = state.map(NativeHandle::id);
    }

    fn set_depth_stencil_state(&mut self, state: Option<&NativeState>) {
        self.recording().depth_stencil = state.map(NativeHandle::id);
    }

    fn set_output_targets(&mut self, depth_stencil: Option<&NativeView>, colors: &[&NativeView]) {
        let mut recording = self.recording();
        recording.depth_target = depth_stencil.map(NativeHandle::id);
        recording.color_targets = colors.iter().map(|view| view.id()).collect();
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.recording().viewports = viewports.to_vec();
    }

    fn set_stream_output_target(&mut self, buffer: Option<&NativeBuffer>) {
        self.recording().stream_output = buffer.map(NativeHandle::id);
    }

    fn begin_query(&mut self, query: &NativeQuery) {
        self.recording()
            .queries
            .insert(query.id(), QueryState::Running);
    }

    fn end_query(&mut self, query: &NativeQuery) {
        let mut recording = self.recording();
        let ended = QueryState::Ended {
            polls_left: recording.query_latency,
            result: recording.next_statistics,
        };
        match recording.queries.get_mut(&query.id()) {
            Some(state @ QueryState::Running) => *state = ended,
            _ => {
                logwise::warn_sync!(
                    "headless end_query on a query that was not running {query}",
                    query = query.id()
                );
            }
        }
    }

    fn query_data(&mut self, query: &NativeQuery) -> Option<StreamOutputStatistics> {
        match self.recording().queries.get_mut(&query.id()) {
            Some(QueryState::Ended {
                polls_left: QueryLatency::Polls(0),
                result,
            }) => Some(*result),
            Some(QueryState::Ended {
                polls_left: QueryLatency::Polls(n),
                ..
            }) => {
                *n -= 1;
                None
            }
            _ => None,
        }
    }

    fn generate_mips(&mut self, texture: &NativeTexture) -> Result<()> {
        require_kind(texture, ObjectKind::Texture)?;
        let mut recording = self.recording();
        match recording.textures.get(&texture.id()) {
            Some((format, 1)) if format.is_filterable() => {
                recording.mip_generations += 1;
                Ok(())
            }
            Some(_) => Err(Error::Unsupported("mip generation for this texture")),
            None => Err(Error::Backend(format!("{texture:?} was destroyed"))),
        }
    }

    fn clear_render_target(&mut self, _view: &NativeView, _color: [f32; 4]) {
        self.recording().clears += 1;
    }

    fn clear_depth_stencil(&mut self, _view: &NativeView, _depth: Option<f32>, _stencil: Option<u8>) {
        self.recording().clears += 1;
    }
}

/// A headless device plus the handle used to inspect and script it.
///
/// Clones share the same device and recording.
#[derive(Debug, Clone)]
pub struct Headless {
    shared: Arc<Shared>,
    device: Device,
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

impl Headless {
    /// A feature-level 11 device with stream output.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities {
            feature_level: FeatureLevel::Level11_0,
            stream_output: true,
        })
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let shared = Arc::new(Shared {
            capabilities,
            recording: Mutex::new(Recording::new()),
        });
        let device = Device::new(HeadlessDevice {
            shared: shared.clone(),
        });
        Headless { shared, device }
    }

    pub fn device(&self) -> Device {
        self.device.clone()
    }

    pub fn context(&self) -> DeviceContext {
        self.context_with_options(ContextOptions::default())
    }

    pub fn context_with_options(&self, options: ContextOptions) -> DeviceContext {
        DeviceContext::with_options(
            self.device.clone(),
            HeadlessContext {
                shared: self.shared.clone(),
            },
            options,
        )
    }

    fn recording(&self) -> impl DerefMut<Target = Recording> + '_ {
        self.shared.recording.lock_sync()
    }

    /// Objects of `kind` created so far, destroyed or not.
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.recording().created.get(&kind).copied().unwrap_or(0)
    }

    /// Objects of `kind` not yet destroyed.
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.recording().live.get(&kind).copied().unwrap_or(0)
    }

    pub fn blend_state(&self) -> Option<u64> {
        self.recording().blend
    }

    pub fn rasterizer_state(&self) -> Option<u64> {
        self.recording().rasterizer
    }

    pub fn depth_stencil_state(&self) -> Option<u64> {
        self.recording().depth_stencil
    }

    /// Ids of the bound depth-stencil view and color views.
    pub fn output_targets(&self) -> (Option<u64>, Vec<u64>) {
        let recording = self.recording();
        (recording.depth_target, recording.color_targets.clone())
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.recording().viewports.clone()
    }

    pub fn stream_output_target(&self) -> Option<u64> {
        self.recording().stream_output
    }

    pub fn buffer_contents(&self, buffer: &NativeBuffer) -> Option<Vec<u8>> {
        self.recording().buffers.get(&buffer.id()).cloned()
    }

    pub fn buffer_updates(&self) -> usize {
        self.recording().buffer_updates
    }

    pub fn buffer_copies(&self) -> usize {
        self.recording().buffer_copies
    }

    pub fn mip_generations(&self) -> usize {
        self.recording().mip_generations
    }

    pub fn clears(&self) -> usize {
        self.recording().clears
    }

    /// What the next ended statistics query reports.
    pub fn set_next_statistics(&self, statistics: StreamOutputStatistics) {
        self.recording().next_statistics = statistics;
    }

    pub fn set_query_latency(&self, latency: QueryLatency) {
        self.recording().query_latency = latency;
    }

    /// Makes the next buffer or texture allocation fail with [`Error::OutOfMemory`].
    pub fn fail_next_allocation(&self) {
        self.recording().fail_next_allocation = true;
    }

    /// Writes `bytes` to the start of the attached capture buffer, as the geometry stage would.
    ///
    /// Returns `false` when no capture buffer is attached. Bytes past the end are dropped.
    pub fn write_stream_output(&self, bytes: &[u8]) -> bool {
        let mut recording = self.recording();
        let Some(target) = recording.stream_output else {
            return false;
        };
        match recording.buffers.get_mut(&target) {
            Some(buffer) => {
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                true
            }
            None => false,
        }
    }
}
