// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Dirty tracking for parameter blocks.

A [`DirtyByteBuffer`] is the host copy of a block of shader parameters, plus, for each
device it has been materialized on, whether that device's copy is stale.

The programming model is write-often, upload-rarely. Materials write their parameters
every frame, but most frames nothing changed, so a write only dirties devices when the
bytes actually differ. Re-uploading unconditionally would cost a copy per parameter
block per frame for nothing.

# Growth

The host copy grows in 16-byte quanta and always keeps at least 128 bytes of slack past
the furthest write, so a block filled field by field reallocates a handful of times
rather than on every write. Growth preserves existing bytes and dirties every device,
and a device whose native copy has the old size gets a new native buffer rather than
an update.

Writes must end within [`MAX_LEN`] bytes, the largest parameter block a shader can bind.
A write past that is logged and dropped, leaving the block as it was.
*/

use crate::bindings::c_repr::{CRepr, bytes_of};
use crate::cache::DeviceScopedCache;
use crate::images::device::Device;
use wasm_safe_mutex::Mutex;

const ALIGNMENT: usize = 16;
const SLACK: usize = 128;

/// Writes must end at or before this byte.
pub const MAX_LEN: usize = 64 * 1024;

fn aligned(size: usize) -> usize {
    size.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Host bytes of a parameter block, with per-device staleness and native handles of type `H`.
#[derive(Debug)]
pub struct DirtyByteBuffer<H> {
    //None until the first write
    data: Mutex<Option<Vec<u8>>>,
    dirty: DeviceScopedCache<bool>,
    native_sizes: DeviceScopedCache<usize>,
    native: DeviceScopedCache<Option<H>>,
}

impl<H: Clone> Default for DirtyByteBuffer<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> DirtyByteBuffer<H> {
    pub fn new() -> Self {
        DirtyByteBuffer {
            data: Mutex::new(None),
            //devices that never materialized are stale by definition
            dirty: DeviceScopedCache::new(true),
            native_sizes: DeviceScopedCache::new(0),
            native: DeviceScopedCache::new(None),
        }
    }

    /// Writes `value` at byte `offset`.
    ///
    /// Returns whether devices were dirtied, which happens only when the buffer grew or
    /// the bytes at `offset` changed. A write ending past [`MAX_LEN`] changes nothing and
    /// returns `false`.
    pub fn write<V: CRepr>(&self, offset: usize, value: &V) -> bool {
        self.write_bytes(offset, bytes_of(value))
    }

    /// [`write`](Self::write) for bytes that are already serialized.
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> bool {
        let Some(end) = offset.checked_add(bytes.len()).filter(|end| *end <= MAX_LEN) else {
            logwise::error_sync!(
                "parameter write at {offset} ({len} bytes) ends past the {max} byte limit",
                offset = offset,
                len = bytes.len(),
                max = MAX_LEN
            );
            return false;
        };
        let required = aligned(end + SLACK);
        let mut data = self.data.lock_sync();
        let buffer = data.get_or_insert_with(Vec::new);
        let resized = buffer.len() < required;
        if resized {
            buffer.resize(required, 0);
        }
        let region = &mut buffer[offset..end];
        let changed = region[..] != bytes[..];
        if changed {
            region.copy_from_slice(bytes);
        }
        if resized || changed {
            logwise::trace_sync!(
                "parameter write at {offset} ({len} bytes) dirtied all devices",
                offset = offset,
                len = bytes.len()
            );
            self.dirty.release_all();
            true
        } else {
            false
        }
    }

    /// Current size of the host copy; zero before any write.
    pub fn len(&self) -> usize {
        Option::as_ref(&*self.data.lock_sync()).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the host bytes, or `None` before any write.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.data.lock_sync().clone()
    }

    /// Whether `device`'s native copy is missing or stale.
    pub fn is_dirty(&self, device: &Device) -> bool {
        let len = self.len();
        self.dirty.get(device) || self.native_sizes.get(device) != len
    }

    /// Marks every device stale without touching the host bytes.
    pub fn invalidate(&self) {
        self.dirty.release_all();
    }

    /// The native handle for `device`, brought up to date.
    ///
    /// * Before any write, returns `Ok(None)`; an unwritten block is absent, not zeroes.
    /// * Without a handle, or when the host copy has been resized since the handle was
    ///   made, `create` is called with the full host bytes and its result stored with
    ///   memory pressure equal to their length.
    /// * With a stale handle of the right size, `update` refreshes it in place.
    /// * Otherwise neither is called.
    pub fn materialize<E>(
        &self,
        device: &Device,
        create: impl FnOnce(&[u8]) -> Result<H, E>,
        update: impl FnOnce(&H, &[u8]) -> Result<(), E>,
    ) -> Result<Option<H>, E> {
        let data = self.data.lock_sync();
        let Some(bytes) = data.as_ref() else {
            return Ok(None);
        };
        let len = bytes.len();
        let existing = self.native.get(device);
        let handle = match existing {
            Some(handle) if self.native_sizes.get(device) == len => {
                if self.dirty.get(device) {
                    update(&handle, bytes)?;
                    logwise::trace_sync!("updated parameter block ({len} bytes)", len = len);
                }
                handle
            }
            stale => {
                //drop the outdated handle before allocating its replacement
                drop(stale);
                self.native.release(device);
                let handle = create(bytes)?;
                logwise::trace_sync!("created parameter block ({len} bytes)", len = len);
                self.native.set(device, Some(handle.clone()), len as u64);
                self.native_sizes.set(device, len, 0);
                handle
            }
        };
        self.dirty.set(device, false, 0);
        Ok(Some(handle))
    }

    /// Drops `device`'s native handle. The next materialize creates a new one.
    pub fn release(&self, device: &Device) {
        self.native.release(device);
        self.native_sizes.release(device);
        self.dirty.release(device);
    }

    pub fn release_all(&self) {
        self.native.release_all();
        self.native_sizes.release_all();
        self.dirty.release_all();
    }

    /// Memory pressure recorded for `device`'s native handle.
    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.native.memory_pressure(device)
    }
}
