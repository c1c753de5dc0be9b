// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pipeline state objects with nestable binding.

A [`BindableState`] is an immutable description (blend, rasterizer, or depth-stencil)
that is lazily turned into a native state object on each device it is bound on.

# Nesting

Binding records whatever state of the same kind was active on that device as the new
state's *predecessor*; unbinding reinstates it. Binds and unbinds therefore nest like a
stack:

```
use nested_binds::BlendState;
use nested_binds::imp::headless::Headless;
use std::sync::Arc;

let headless = Headless::new();
let mut context = headless.context();
let a = Arc::new(BlendState::default_alpha());
let b = Arc::new(BlendState::additive());

a.bind(&mut context).unwrap();
b.bind(&mut context).unwrap();
b.unbind(&mut context).unwrap();
assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &a));
a.unbind(&mut context).unwrap();
assert!(context.active_blend_state().is_none());
```

Only one predecessor is kept per state per device. Binding the same state at two depths
without unbinding in between loses the outer restoration point.

Predecessors are held weakly. A predecessor that has since been dropped restores as
"no state".
*/

pub mod blend;
pub mod depth_stencil;
pub mod rasterizer;

use crate::cache::DeviceScopedCache;
use crate::error::{Error, Result};
use crate::images::context::{ActiveSlots, DeviceContext};
use crate::images::device::Device;
use crate::imp::{self, NativeContext, NativeDevice, NativeState};
use std::fmt::Debug;
use std::sync::{Arc, Weak};

pub use blend::{Blend, BlendComponent, BlendDescriptor, BlendFactor, BlendOperation, BlendState};
pub use depth_stencil::{CompareFunction, DepthStencil, DepthStencilDescriptor, DepthStencilState};
pub use rasterizer::{CullMode, FillMode, Rasterizer, RasterizerDescriptor, RasterizerState};

/// One family of pipeline state.
///
/// Each kind has its own slot in [`ActiveSlots`]; binding a blend state never disturbs the
/// active rasterizer state.
pub trait StateKind: Debug + Sized + Send + Sync + 'static {
    type Descriptor: Debug + Clone + PartialEq + Send + Sync;

    /// Used in logs and [`Error::NotActive`].
    const NAME: &'static str;

    fn create(device: &dyn NativeDevice, descriptor: &Self::Descriptor) -> imp::Result<NativeState>;

    /// Applies `state` to the pipeline, or clears the pipeline slot for `None`.
    fn apply(context: &mut dyn NativeContext, state: Option<&NativeState>);

    fn slot(slots: &mut ActiveSlots) -> &mut Option<Arc<BindableState<Self>>>;
}

/// A pipeline state of kind `K`, materialized per device.
#[derive(Debug)]
pub struct BindableState<K: StateKind> {
    descriptor: K::Descriptor,
    native: DeviceScopedCache<Option<NativeState>>,
    predecessor: DeviceScopedCache<Option<Weak<BindableState<K>>>>,
}

impl<K: StateKind> BindableState<K> {
    pub fn new(descriptor: K::Descriptor) -> Self {
        BindableState {
            descriptor,
            native: DeviceScopedCache::new(None),
            predecessor: DeviceScopedCache::new(None),
        }
    }

    pub fn descriptor(&self) -> &K::Descriptor {
        &self.descriptor
    }

    /// The native state for `device`, created on first use.
    pub fn native(&self, device: &Device) -> Result<NativeState> {
        let state = self.native.get_or_try_insert_with(device, || {
            logwise::trace_sync!(
                "creating {kind} state on device {device}",
                kind = K::NAME,
                device = logwise::privacy::LogIt(&device.id())
            );
            K::create(device.native(), &self.descriptor).map(|state| (state, 0))
        })?;
        Ok(state)
    }

    /// Creates the native state on the context's device without binding it.
    ///
    /// Calling this repeatedly creates one native object.
    pub fn preload(&self, context: &DeviceContext) -> Result<()> {
        self.native(context.device()).map(drop)
    }

    /// Makes this the active state of its kind, remembering the previously active one.
    ///
    /// Rebinding the state that is already active keeps its existing predecessor; a state
    /// is never its own predecessor.
    pub fn bind(self: &Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        let state = self.native(&device)?;
        let previous = K::slot(context.active_mut()).clone();
        match previous {
            Some(active) if Arc::ptr_eq(&active, self) => {}
            previous => {
                self.predecessor
                    .set(&device, previous.as_ref().map(Arc::downgrade), 0);
            }
        }
        *K::slot(context.active_mut()) = Some(self.clone());
        K::apply(context.native_mut(), Some(&state));
        logwise::trace_sync!("bound {kind} state", kind = K::NAME);
        Ok(())
    }

    /// Reinstates the state that was active before [`bind`](Self::bind), or clears the
    /// slot if there was none.
    ///
    /// Fails with [`Error::NotActive`] if this is not the active state of its kind.
    pub fn unbind(self: &Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        self.ensure_active(context)?;
        let predecessor = self.predecessor.get(&device).and_then(|weak| weak.upgrade());
        self.predecessor.release(&device);
        match predecessor {
            Some(predecessor) => predecessor.reinstate(context)?,
            None => {
                *K::slot(context.active_mut()) = None;
                K::apply(context.native_mut(), None);
            }
        }
        logwise::trace_sync!("unbound {kind} state", kind = K::NAME);
        Ok(())
    }

    pub(crate) fn is_active(self: &Arc<Self>, context: &mut DeviceContext) -> bool {
        K::slot(context.active_mut())
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, self))
    }

    /// [`Error::NotActive`] unless this is the active state of its kind.
    pub(crate) fn ensure_active(self: &Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        if self.is_active(context) {
            Ok(())
        } else {
            Err(Error::NotActive {
                kind: K::NAME,
                device: context.device().id(),
            })
        }
    }

    /// Makes this active again without recording a predecessor.
    ///
    /// Used when unwinding: the state being restored keeps the predecessor it recorded
    /// when it was originally bound.
    pub(crate) fn reinstate(self: &Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let state = self.native(context.device())?;
        *K::slot(context.active_mut()) = Some(self.clone());
        K::apply(context.native_mut(), Some(&state));
        Ok(())
    }

    /// The recorded predecessor on `device`, if it is still alive.
    pub fn predecessor(&self, device: &Device) -> Option<Arc<Self>> {
        self.predecessor.get(device).and_then(|weak| weak.upgrade())
    }

    /// Drops the native state for `device`.
    pub fn release(&self, device: &Device) {
        self.native.release(device);
    }

    pub fn release_all(&self) {
        self.native.release_all();
    }
}
