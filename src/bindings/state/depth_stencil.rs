// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Depth testing, with an optional stencil test that always passes and keeps the buffer.
//!
//! The presets leave stencil off; build a [`DepthStencilDescriptor`] to turn it on.

use super::{BindableState, StateKind};
use crate::images::context::ActiveSlots;
use crate::imp::{self, NativeContext, NativeDevice, NativeState};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDescriptor {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub stencil: bool,
}

/// Marker for the depth-stencil [`StateKind`].
#[derive(Debug)]
pub enum DepthStencil {}

impl StateKind for DepthStencil {
    type Descriptor = DepthStencilDescriptor;
    const NAME: &'static str = "depth-stencil";

    fn create(
        device: &dyn NativeDevice,
        descriptor: &DepthStencilDescriptor,
    ) -> imp::Result<NativeState> {
        device.create_depth_stencil_state(descriptor)
    }

    fn apply(context: &mut dyn NativeContext, state: Option<&NativeState>) {
        context.set_depth_stencil_state(state);
    }

    fn slot(slots: &mut ActiveSlots) -> &mut Option<Arc<BindableState<Self>>> {
        &mut slots.depth_stencil
    }
}

pub type DepthStencilState = BindableState<DepthStencil>;

impl BindableState<DepthStencil> {
    /// Depth test with less-or-equal, depth writes on.
    pub fn default_state() -> Self {
        Self::configured(true, CompareFunction::LessEqual, false)
    }

    /// `read_only` keeps the depth test but disables depth writes.
    pub fn configured(depth_test: bool, compare: CompareFunction, read_only: bool) -> Self {
        Self::new(DepthStencilDescriptor {
            depth_test,
            depth_write: !read_only,
            depth_compare: compare,
            stencil: false,
        })
    }
}
