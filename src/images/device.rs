// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device handles.
//!
//! A [`Device`] is the resource-creation half of a rendering context. Devices are supplied
//! by the caller (usually by wrapping a backend device); the crate never opens one on its
//! own. Every cache in the crate is keyed by [`DeviceId`], so a fresh device after device
//! loss simply starts with no materializations.

use crate::imp::{Capabilities, NativeDevice};
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DEVICE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rendering device that resources can be materialized on.
///
/// Cloning is cheap and clones compare equal. Two devices wrapping the same native
/// device separately are still distinct devices.
#[derive(Clone)]
pub struct Device {
    id: DeviceId,
    native: Arc<dyn NativeDevice>,
}

impl Device {
    pub fn new(native: impl NativeDevice + 'static) -> Self {
        Self::from_arc(Arc::new(native))
    }

    pub fn from_arc(native: Arc<dyn NativeDevice>) -> Self {
        let id = DeviceId(NEXT_DEVICE.fetch_add(1, Ordering::Relaxed));
        logwise::info_sync!(
            "opened device {id} {native}",
            id = logwise::privacy::LogIt(&id),
            native = logwise::privacy::LogIt(&native)
        );
        Device { id, native }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn native(&self) -> &dyn NativeDevice {
        &*self.native
    }

    pub fn capabilities(&self) -> Capabilities {
        self.native.capabilities()
    }
}

// Boilerplate implementations

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("native", &self.native)
            .finish()
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
