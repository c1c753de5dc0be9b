// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Things shaders read: parameter blocks, samplers, and pipeline states. */

pub mod c_repr;
pub mod constant_buffer;
pub mod dirty_tracking;
pub mod sampler;
pub mod state;
