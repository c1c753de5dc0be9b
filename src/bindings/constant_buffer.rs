// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shader parameter blocks.
//!
//! [`ConstantBuffer`] connects a [`DirtyByteBuffer`] to the native boundary: creation goes
//! through the device's factory and refreshes through the context's `update_buffer`.
//!
//! ```
//! use nested_binds::ConstantBuffer;
//! use nested_binds::imp::headless::Headless;
//!
//! let headless = Headless::new();
//! let mut context = headless.context();
//! let parameters = ConstantBuffer::new("light");
//! assert!(parameters.buffer(&mut context).unwrap().is_none());
//! parameters.update(0, &[1.0f32, 0.5, 0.25, 1.0]);
//! let native = parameters.buffer(&mut context).unwrap().unwrap();
//! assert_eq!(&headless.buffer_contents(&native).unwrap()[..4], &1.0f32.to_ne_bytes());
//! ```

use crate::bindings::c_repr::CRepr;
use crate::bindings::dirty_tracking::DirtyByteBuffer;
use crate::error::Result;
use crate::images::context::DeviceContext;
use crate::images::device::Device;
use crate::imp::{self, BufferDescriptor, BufferUsage, NativeBuffer};

#[derive(Debug)]
pub struct ConstantBuffer {
    label: String,
    bytes: DirtyByteBuffer<NativeBuffer>,
}

impl ConstantBuffer {
    pub fn new(label: impl Into<String>) -> Self {
        ConstantBuffer {
            label: label.into(),
            bytes: DirtyByteBuffer::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Writes `value` at byte `offset`. Devices are only dirtied if the bytes changed.
    ///
    /// A write ending past [`MAX_LEN`](crate::bindings::dirty_tracking::MAX_LEN) is logged
    /// and ignored, returning `false`.
    pub fn update<V: CRepr>(&self, offset: usize, value: &V) -> bool {
        self.bytes.write(offset, value)
    }

    /// The up-to-date native buffer for the context's device, or `None` if nothing has
    /// been written yet.
    pub fn buffer(&self, context: &mut DeviceContext) -> Result<Option<NativeBuffer>> {
        let label = self.label.as_str();
        let (device, native) = context.parts();
        let buffer = self.bytes.materialize(
            device,
            |bytes| -> imp::Result<NativeBuffer> {
                device.native().create_buffer(
                    &BufferDescriptor {
                        label: Some(label),
                        size: bytes.len() as u64,
                        usage: BufferUsage::Constant,
                    },
                    Some(bytes),
                )
            },
            |buffer, bytes| native.update_buffer(buffer, bytes),
        )?;
        Ok(buffer)
    }

    /// Materializes now rather than at first use.
    pub fn preload(&self, context: &mut DeviceContext) -> Result<()> {
        self.buffer(context).map(drop)
    }

    /// Forces the next [`buffer`](Self::buffer) on every device to re-upload.
    pub fn invalidate(&self) {
        self.bytes.invalidate();
    }

    pub fn is_dirty(&self, device: &Device) -> bool {
        self.bytes.is_dirty(device)
    }

    pub fn release(&self, device: &Device) {
        self.bytes.release(device);
    }

    pub fn release_all(&self) {
        self.bytes.release_all();
    }

    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.bytes.memory_pressure(device)
    }
}
