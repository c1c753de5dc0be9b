// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

[`WgpuDevice`] wraps a caller-supplied `wgpu::Device` and `wgpu::Queue`. Buffers, textures,
views and samplers are real wgpu objects. wgpu has no separate pipeline-state objects, so
blend, rasterizer and depth-stencil states are stored as the wgpu values a render pipeline
is built from; [`WgpuContext`] collects whatever is bound into an [`OutputStage`] that the
draw layer reads when it builds pipelines and render passes.

wgpu has no stream-output stage or statistics queries; those report
[`Unsupported`](crate::imp::Error::Unsupported). Nor does it build mip chains, so the
context draws each level from the one above it. Textures that cannot be filtered or
rendered that way report `Unsupported` too.

```no_run
# async fn open() -> Result<(), nested_binds::imp::Error> {
use nested_binds::{Device, DeviceContext};
use nested_binds::imp::wgpu::WgpuDevice;

let native = WgpuDevice::request().await?;
let native_context = native.context();
let output_stage = native_context.output_stage();
let device = Device::new(native);
let mut context = DeviceContext::new(device, native_context);
# drop((output_stage, &mut context));
# Ok(())
# }
```
*/

mod context;
mod convert;
mod device;
mod mips;

pub use context::{OutputStage, SharedOutputStage, WgpuContext};
pub use convert::{WgpuBlend, WgpuDepthStencil, WgpuRasterizer};
pub use device::WgpuDevice;

use crate::imp::{Error, NativeHandle, Result};
use std::any::Any;

/// The wgpu object behind `handle`.
fn object<'a, T: Any>(handle: &'a NativeHandle, what: &'static str) -> Result<&'a T> {
    handle
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Backend(format!("{handle:?} is not a wgpu {what}")))
}

fn unsupported(what: &'static str) -> Error {
    logwise::error_sync!("wgpu backend does not support {what}", what = what);
    Error::Unsupported(what)
}
