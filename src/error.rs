// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Errors surfaced by binding, materialization and readback.

use crate::images::device::DeviceId;
use crate::imp;
use std::time::Duration;

/// Errors returned by the binding protocol.
///
/// Configuration problems (asking a device for something it can't do well) are
/// *not* errors here; they are logged and the operation proceeds, since the
/// native layer's own validation is the final authority.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The native layer failed to allocate or execute something.
    ///
    /// This is not locally recoverable and is never retried.
    #[error("native device error: {0}")]
    Native(#[from] imp::Error),
    /// `unbind` was called on an object that is not the active one in its slot.
    #[error("{kind} is not currently bound on device {device}")]
    NotActive {
        kind: &'static str,
        device: DeviceId,
    },
    /// Stream-output statistics were not ready before the configured deadline.
    #[error("stream-output statistics were not available after {0:?}")]
    QueryTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
