// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Devices, their contexts, and the targets rendering writes into. */

pub mod color_buffer;
pub mod context;
pub mod depth_stencil_buffer;
pub mod device;
pub mod render_target;
pub mod stream_output;
pub mod target;
