// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Output-merger blending.

use super::{BindableState, StateKind};
use crate::images::context::ActiveSlots;
use crate::imp::{self, NativeContext, NativeDevice, NativeState};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceAlpha,
    InverseSourceAlpha,
    DestinationAlpha,
    InverseDestinationAlpha,
    SourceColor,
    InverseSourceColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// How source and destination combine for one channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub source: BlendFactor,
    pub destination: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const fn add(source: BlendFactor, destination: BlendFactor) -> Self {
        BlendComponent {
            source,
            destination,
            operation: BlendOperation::Add,
        }
    }
}

/// Blending for every color target. Write masks are always "all channels".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDescriptor {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    pub alpha_to_coverage: bool,
}

/// Marker for the blend [`StateKind`].
#[derive(Debug)]
pub enum Blend {}

impl StateKind for Blend {
    type Descriptor = BlendDescriptor;
    const NAME: &'static str = "blend";

    fn create(device: &dyn NativeDevice, descriptor: &BlendDescriptor) -> imp::Result<NativeState> {
        device.create_blend_state(descriptor)
    }

    fn apply(context: &mut dyn NativeContext, state: Option<&NativeState>) {
        context.set_blend_state(state);
    }

    fn slot(slots: &mut ActiveSlots) -> &mut Option<Arc<BindableState<Self>>> {
        &mut slots.blend
    }
}

pub type BlendState = BindableState<Blend>;

impl BindableState<Blend> {
    /// Conventional alpha blending.
    ///
    /// The alpha channel accumulates coverage (`1 - dst.a` of the source, all of the
    /// destination) so translucent layers composite onto an offscreen target correctly.
    pub fn default_alpha() -> Self {
        Self::new(BlendDescriptor {
            color: BlendComponent::add(BlendFactor::SourceAlpha, BlendFactor::InverseSourceAlpha),
            alpha: BlendComponent::add(BlendFactor::InverseDestinationAlpha, BlendFactor::One),
            alpha_to_coverage: false,
        })
    }

    /// Adds alpha-weighted source color onto the destination.
    pub fn additive() -> Self {
        Self::new(BlendDescriptor {
            color: BlendComponent::add(BlendFactor::SourceAlpha, BlendFactor::One),
            alpha: BlendComponent::add(BlendFactor::One, BlendFactor::One),
            alpha_to_coverage: false,
        })
    }

    /// Replaces the destination with the source.
    pub fn source_color(alpha_to_coverage: bool) -> Self {
        Self::new(BlendDescriptor {
            color: BlendComponent::add(BlendFactor::One, BlendFactor::Zero),
            alpha: BlendComponent::add(BlendFactor::One, BlendFactor::Zero),
            alpha_to_coverage,
        })
    }
}
