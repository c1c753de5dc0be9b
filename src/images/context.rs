// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The per-device command context.
//!
//! # Overview
//!
//! [`DeviceContext`] is where "what is bound right now" lives. It owns the device's
//! [`NativeContext`] and one [`ActiveSlots`] record: a slot per pipeline-state kind and a
//! single slot shared by every render target and stream-output buffer.
//!
//! Every `bind`/`unbind` in the crate takes `&mut DeviceContext`. Two threads therefore
//! cannot interleave binds on the same device, which the predecessor stack would not
//! survive. Different devices have different contexts and may be driven from different
//! threads.

use crate::bindings::state::{BlendState, DepthStencilState, RasterizerState};
use crate::images::device::Device;
use crate::images::target::BindableTarget;
use crate::imp::NativeContext;
use std::sync::Arc;
use std::time::Duration;

/// How [`crate::StreamOutputBuffer`] waits for its statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryWait {
    /// Poll until the result is available, however long that takes.
    ///
    /// Results normally arrive within a few frames. On a lost device this never returns.
    #[default]
    Spin,
    /// Poll for at most this long, then fail with [`crate::Error::QueryTimeout`].
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOptions {
    pub query_wait: QueryWait,
}

/// What is currently bound on one device.
#[derive(Debug, Default)]
pub struct ActiveSlots {
    pub(crate) blend: Option<Arc<BlendState>>,
    pub(crate) rasterizer: Option<Arc<RasterizerState>>,
    pub(crate) depth_stencil: Option<Arc<DepthStencilState>>,
    pub(crate) target: Option<Arc<dyn BindableTarget>>,
}

impl ActiveSlots {
    pub fn blend_state(&self) -> Option<&Arc<BlendState>> {
        self.blend.as_ref()
    }
    pub fn rasterizer_state(&self) -> Option<&Arc<RasterizerState>> {
        self.rasterizer.as_ref()
    }
    pub fn depth_stencil_state(&self) -> Option<&Arc<DepthStencilState>> {
        self.depth_stencil.as_ref()
    }
    /// The active render target or stream-output buffer.
    pub fn target(&self) -> Option<&Arc<dyn BindableTarget>> {
        self.target.as_ref()
    }

    /// Whether `target` is the active target.
    pub fn is_target<T: BindableTarget>(&self, target: &Arc<T>) -> bool {
        self.target
            .as_ref()
            .is_some_and(|active| std::ptr::addr_eq(Arc::as_ptr(active), Arc::as_ptr(target)))
    }
}

/// Command context for one [`Device`].
#[derive(Debug)]
pub struct DeviceContext {
    device: Device,
    native: Box<dyn NativeContext>,
    options: ContextOptions,
    active: ActiveSlots,
}

impl DeviceContext {
    pub fn new(device: Device, native: impl NativeContext + 'static) -> Self {
        Self::with_options(device, native, ContextOptions::default())
    }

    pub fn with_options(
        device: Device,
        native: impl NativeContext + 'static,
        options: ContextOptions,
    ) -> Self {
        logwise::info_sync!(
            "context for device {device} with {options}",
            device = logwise::privacy::LogIt(&device.id()),
            options = logwise::privacy::LogIt(&options)
        );
        DeviceContext {
            device,
            native: Box::new(native),
            options,
            active: ActiveSlots::default(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ContextOptions) {
        self.options = options;
    }

    pub fn active(&self) -> &ActiveSlots {
        &self.active
    }

    pub fn active_target(&self) -> Option<&Arc<dyn BindableTarget>> {
        self.active.target()
    }

    pub fn active_blend_state(&self) -> Option<&Arc<BlendState>> {
        self.active.blend_state()
    }

    pub fn active_rasterizer_state(&self) -> Option<&Arc<RasterizerState>> {
        self.active.rasterizer_state()
    }

    pub fn active_depth_stencil_state(&self) -> Option<&Arc<DepthStencilState>> {
        self.active.depth_stencil_state()
    }

    /// Direct access to the native command surface, for draw calls issued by higher layers.
    ///
    /// Changing bindings through this bypasses the predecessor stack.
    pub fn native_mut(&mut self) -> &mut dyn NativeContext {
        &mut *self.native
    }

    pub(crate) fn active_mut(&mut self) -> &mut ActiveSlots {
        &mut self.active
    }

    /// Device and native context borrowed together, for materialize-then-upload paths.
    pub(crate) fn parts(&mut self) -> (&Device, &mut dyn NativeContext) {
        (&self.device, &mut *self.native)
    }
}
