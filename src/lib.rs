// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! nested_binds is the resource layer underneath a renderer: every GPU-backed object
(parameter blocks, pipeline states, render targets, stream-output buffers) is lazily
materialized per device, recreated when it changes, and bound through a save-and-restore
stack.

# Devices and contexts

A [`Device`] creates native resources; a [`DeviceContext`] is that device's command
surface and remembers what is bound. Nothing in this crate opens a device on its own.
Wrap one from a backend in [`imp`] (or write your own [`imp::NativeDevice`]).

Every `bind` and `unbind` takes `&mut DeviceContext`, so one device is driven by one thread
at a time. Different devices are independent and can be driven from different threads;
the per-device caches inside each resource are shared safely between them.

# Lazy materialization

Resources hold a [`DeviceScopedCache`] per native object. The first time a resource is used
on a device its native object is created, and its size is reported to
[`memory_pressure`]. Releasing, replacing, or dropping the resource reverses that exactly
once.

Parameter blocks go a step further: a [`ConstantBuffer`] keeps its bytes on the host in a
[`DirtyByteBuffer`] and each device tracks whether its copy is stale. Writing bytes that are
already there does not dirty anything.

# Nested binding

| Kind | Slot |
|------|------|
| [`BlendState`] | one per device |
| [`RasterizerState`] | one per device |
| [`DepthStencilState`] | one per device |
| [`RenderTarget`], [`StreamOutputBuffer`] | one shared target slot per device |

Binding records whatever occupied the slot as the new object's predecessor; unbinding
restores it. Binds and unbinds nest:

```
use nested_binds::{BindableTarget, BlendState, ColorBuffer, RenderTarget, TextureColorBuffer};
use nested_binds::imp::headless::Headless;
use nested_binds::pixel_formats::PixelFormat;
use std::sync::Arc;

let headless = Headless::new();
let mut context = headless.context();

let frame: Arc<dyn ColorBuffer> =
    Arc::new(TextureColorBuffer::new("scene", PixelFormat::Rgba8Unorm, 800, 600, 1, false));
let hud: Arc<dyn ColorBuffer> =
    Arc::new(TextureColorBuffer::new("hud", PixelFormat::Rgba8Unorm, 256, 256, 1, false));
let scene = Arc::new(RenderTarget::new(vec![frame], None));
let overlay = Arc::new(
    RenderTarget::new(vec![hud], None).with_blend_state(Arc::new(BlendState::default_alpha())),
);

scene.clone().bind(&mut context).unwrap();
overlay.clone().bind(&mut context).unwrap();
assert!(context.active_blend_state().is_some());
overlay.clone().unbind(&mut context).unwrap();
assert!(context.active().is_target(&scene));
assert!(context.active_blend_state().is_none());
scene.clone().unbind(&mut context).unwrap();
assert!(context.active_target().is_none());
```

Each object keeps one predecessor per device. Binding the same object twice at different
depths without unbinding between loses the outer restoration point.

# Stream output

[`StreamOutputBuffer`] captures geometry-stage output. Unbinding it waits for the
statistics query; [`QueryWait`] on the context's [`ContextOptions`] bounds that wait, and
[`StreamOutputBuffer::unbind_async`] waits without spinning.

# Backends

* [`imp::headless`] records instead of rendering. Tests run on it.
* `imp::wgpu` (feature `backend_wgpu`, on by default) wraps a `wgpu::Device`.
*/

logwise::declare_logging_domain!();

pub mod bindings;
mod cache;
mod error;
pub mod images;
pub mod imp;
pub mod memory_pressure;
pub mod pixel_formats;
mod sys;

pub use bindings::c_repr::CRepr;
pub use bindings::constant_buffer::ConstantBuffer;
pub use bindings::dirty_tracking::DirtyByteBuffer;
pub use bindings::sampler::Sampler;
pub use bindings::state::{BindableState, BlendState, DepthStencilState, RasterizerState};
pub use cache::DeviceScopedCache;
pub use error::{Error, Result};
pub use images::color_buffer::{ColorBuffer, TextureColorBuffer};
pub use images::context::{ActiveSlots, ContextOptions, DeviceContext, QueryWait};
pub use images::depth_stencil_buffer::DepthStencilBuffer;
pub use images::device::{Device, DeviceId};
pub use images::render_target::RenderTarget;
pub use images::stream_output::StreamOutputBuffer;
pub use images::target::BindableTarget;
