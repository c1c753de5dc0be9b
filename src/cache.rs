// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Per-device storage for lazily materialized values.

A logical resource (a blend state, a parameter block, a render target's texture) may be
realized on several [`Device`]s at once, each with its own native handle. [`DeviceScopedCache`]
is the map from device to that handle, plus the memory-pressure bookkeeping that goes with it.

# Ownership

The cache exclusively owns what it stores. Replacing, releasing, or dropping an entry drops the
value, which for a [`crate::imp::NativeHandle`] destroys the native object once no other handle
refers to it. Values without a destructor (`bool`, `usize`) are simply forgotten.

# Locking

One lock guards both the value map and the pressure table, so a value is never observable
without its pressure having been recorded, and pressure is never reversed twice.
Values are dropped *after* the lock is released; a destructor that reenters the cache
cannot deadlock.

```
# use nested_binds::DeviceScopedCache;
# use nested_binds::imp::headless::Headless;
let headless = Headless::new();
let device = headless.device();
let cache: DeviceScopedCache<Option<u32>> = DeviceScopedCache::new(None);
cache.set(&device, Some(7), 100);
assert_eq!(cache.get(&device), Some(7));
assert_eq!(cache.memory_pressure(&device), 100);
cache.release(&device);
assert_eq!(cache.get(&device), None);
assert_eq!(cache.memory_pressure(&device), 0);
```
*/

use crate::images::device::{Device, DeviceId};
use crate::memory_pressure;
use std::collections::HashMap;
use std::fmt::Debug;
use wasm_safe_mutex::Mutex;

#[derive(Debug)]
struct Entries<T> {
    values: HashMap<DeviceId, T>,
    pressure: HashMap<DeviceId, u64>,
}

impl<T> Entries<T> {
    /// Removes the entry and reverses its pressure. Returns the value so the caller can
    /// drop it outside the lock.
    fn take(&mut self, device: DeviceId) -> Option<T> {
        if let Some(bytes) = self.pressure.remove(&device) {
            memory_pressure::remove(bytes);
        }
        self.values.remove(&device)
    }

    fn insert(&mut self, device: DeviceId, value: T, memory_pressure: u64) -> Option<T> {
        let old = self.take(device);
        if memory_pressure > 0 {
            memory_pressure::add(memory_pressure);
            self.pressure.insert(device, memory_pressure);
        }
        self.values.insert(device, value);
        old
    }
}

/// A value per [`Device`], with a default for devices that have none.
pub struct DeviceScopedCache<T> {
    default: T,
    entries: Mutex<Entries<T>>,
}

impl<T> DeviceScopedCache<T> {
    /// Creates an empty cache. [`get`](Self::get) returns `default` for every device until a
    /// value is [`set`](Self::set).
    pub fn new(default: T) -> Self {
        DeviceScopedCache {
            default,
            entries: Mutex::new(Entries {
                values: HashMap::new(),
                pressure: HashMap::new(),
            }),
        }
    }

    /// Stores `value` for `device`, releasing any value already there first.
    ///
    /// A nonzero `memory_pressure` is reported to [`crate::memory_pressure`] and reversed
    /// exactly once when the entry is released or replaced.
    pub fn set(&self, device: &Device, value: T, memory_pressure: u64) {
        let old = self
            .entries
            .lock_sync()
            .insert(device.id(), value, memory_pressure);
        drop(old);
    }

    /// Drops the value for `device` and reverses its pressure. No entry is not an error.
    pub fn release(&self, device: &Device) {
        let old = self.entries.lock_sync().take(device.id());
        drop(old);
    }

    /// [`release`](Self::release) for every device.
    ///
    /// Used when the logical resource changed and every materialization is stale.
    pub fn release_all(&self) {
        let old: Vec<T> = {
            let mut entries = self.entries.lock_sync();
            let devices: Vec<DeviceId> = entries.values.keys().copied().collect();
            devices
                .into_iter()
                .filter_map(|device| entries.take(device))
                .collect()
        };
        drop(old);
    }

    /// Pressure currently recorded for `device`; zero without an entry.
    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.entries
            .lock_sync()
            .pressure
            .get(&device.id())
            .copied()
            .unwrap_or(0)
    }

    /// Number of devices with an entry.
    pub fn len(&self) -> usize {
        self.entries.lock_sync().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> DeviceScopedCache<T> {
    /// The value for `device`, or the default. Never creates.
    pub fn get(&self, device: &Device) -> T {
        self.entries
            .lock_sync()
            .values
            .get(&device.id())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl<T: Clone> DeviceScopedCache<Option<T>> {
    /// Returns the stored value, or runs `create` and stores its result.
    ///
    /// The lock is held across `create`, so concurrent callers on the same device
    /// materialize exactly once. `create` must not touch this cache.
    pub fn get_or_try_insert_with<E>(
        &self,
        device: &Device,
        create: impl FnOnce() -> Result<(T, u64), E>,
    ) -> Result<T, E> {
        let mut entries = self.entries.lock_sync();
        if let Some(Some(value)) = entries.values.get(&device.id()) {
            return Ok(value.clone());
        }
        let (value, memory_pressure) = create()?;
        let old = entries.insert(device.id(), Some(value.clone()), memory_pressure);
        drop(entries);
        drop(old);
        Ok(value)
    }
}

impl<T> Drop for DeviceScopedCache<T> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<T: Debug> Debug for DeviceScopedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock_sync();
        f.debug_struct("DeviceScopedCache")
            .field("default", &self.default)
            .field("values", &entries.values)
            .field("pressure", &entries.pressure)
            .finish()
    }
}
