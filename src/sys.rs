// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims.
//!
//! `std::time::Instant` panics on `wasm32-unknown-unknown`, so query deadlines
//! read the clock through this module instead.

pub mod time {
    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::Instant;

    #[cfg(target_arch = "wasm32")]
    pub use web_time::Instant;
}
