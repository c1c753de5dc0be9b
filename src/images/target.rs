// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Output targets and the shared active-target slot.
//!
//! Render targets and stream-output buffers are mutually exclusive: a device has one
//! active target, whatever its kind. Each target remembers, per device, the target that
//! was active when it was bound, and unbinding hands the slot back to that predecessor.

use crate::cache::DeviceScopedCache;
use crate::error::{Error, Result};
use crate::images::context::DeviceContext;
use crate::images::device::Device;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// Something that can occupy a device's active-target slot.
pub trait BindableTarget: Send + Sync + Debug {
    /// Makes this the active target, remembering the previous one.
    fn bind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()>;

    /// Hands the active-target slot back to whatever was active before [`bind`](Self::bind).
    ///
    /// Fails with [`Error::NotActive`] if this is not the active target.
    fn unbind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()>;

    /// Materializes every native object the target needs, without binding.
    fn preload(&self, context: &mut DeviceContext) -> Result<()>;

    /// Re-applies this target's native bindings after a target nested inside it unbinds.
    ///
    /// The active slot has already been pointed at `self`. No predecessor is recorded.
    fn reinstate(self: Arc<Self>, context: &mut DeviceContext) -> Result<()>;
}

/// Per-device predecessor bookkeeping shared by every target kind.
#[derive(Debug)]
pub(crate) struct TargetLink {
    kind: &'static str,
    predecessor: DeviceScopedCache<Option<Weak<dyn BindableTarget>>>,
}

impl TargetLink {
    pub(crate) fn new(kind: &'static str) -> Self {
        TargetLink {
            kind,
            predecessor: DeviceScopedCache::new(None),
        }
    }

    /// Records the active target as predecessor (unless it is `this`), then makes `this`
    /// active.
    pub(crate) fn push(&self, this: Arc<dyn BindableTarget>, context: &mut DeviceContext) {
        let device = context.device().clone();
        let slot = &mut context.active_mut().target;
        match slot.as_ref() {
            Some(active) if std::ptr::addr_eq(Arc::as_ptr(active), Arc::as_ptr(&this)) => {}
            previous => {
                self.predecessor
                    .set(&device, previous.map(Arc::downgrade), 0);
            }
        }
        *slot = Some(this);
        logwise::trace_sync!("bound {kind}", kind = self.kind);
    }

    /// Checks that `this` is active, then points the slot at its predecessor (or at
    /// nothing) and returns that predecessor for the caller to reinstate.
    pub(crate) fn pop<T: BindableTarget>(
        &self,
        this: &Arc<T>,
        context: &mut DeviceContext,
    ) -> Result<Option<Arc<dyn BindableTarget>>> {
        let device = context.device().clone();
        if !context.active().is_target(this) {
            return Err(Error::NotActive {
                kind: self.kind,
                device: device.id(),
            });
        }
        let predecessor = self.predecessor(&device);
        self.predecessor.release(&device);
        context.active_mut().target = predecessor.clone();
        logwise::trace_sync!(
            "unbound {kind}, restoring {restored}",
            kind = self.kind,
            restored = logwise::privacy::LogIt(&predecessor)
        );
        Ok(predecessor)
    }

    pub(crate) fn predecessor(&self, device: &Device) -> Option<Arc<dyn BindableTarget>> {
        self.predecessor.get(device).and_then(|weak| weak.upgrade())
    }
}
