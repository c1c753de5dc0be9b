// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Rasterizer configuration.

use super::{BindableState, StateKind};
use crate::images::context::ActiveSlots;
use crate::imp::{self, NativeContext, NativeDevice, NativeState};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerDescriptor {
    pub cull: CullMode,
    pub fill: FillMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip: bool,
    pub multisample: bool,
    pub antialiased_lines: bool,
    pub scissor: bool,
}

/// Marker for the rasterizer [`StateKind`].
#[derive(Debug)]
pub enum Rasterizer {}

impl StateKind for Rasterizer {
    type Descriptor = RasterizerDescriptor;
    const NAME: &'static str = "rasterizer";

    fn create(
        device: &dyn NativeDevice,
        descriptor: &RasterizerDescriptor,
    ) -> imp::Result<NativeState> {
        device.create_rasterizer_state(descriptor)
    }

    fn apply(context: &mut dyn NativeContext, state: Option<&NativeState>) {
        context.set_rasterizer_state(state);
    }

    fn slot(slots: &mut ActiveSlots) -> &mut Option<Arc<BindableState<Self>>> {
        &mut slots.rasterizer
    }
}

pub type RasterizerState = BindableState<Rasterizer>;

impl BindableState<Rasterizer> {
    /// Solid fill, back faces culled.
    pub fn default_state() -> Self {
        Self::with_cull(CullMode::Back)
    }

    pub fn with_cull(cull: CullMode) -> Self {
        Self::configured(cull, 0.0, false)
    }

    /// Front faces wind counter-clockwise; depth clipping and multisampling are on.
    pub fn configured(cull: CullMode, slope_scaled_depth_bias: f32, wireframe: bool) -> Self {
        Self::new(RasterizerDescriptor {
            cull,
            fill: if wireframe {
                FillMode::Wireframe
            } else {
                FillMode::Solid
            },
            front_counter_clockwise: true,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias,
            depth_clip: true,
            multisample: true,
            antialiased_lines: false,
            scissor: false,
        })
    }
}
