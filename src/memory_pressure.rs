// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Process-wide accounting of GPU memory held indirectly by host objects.

Native allocations are invisible to the host allocator: a small host object can
pin many megabytes of device memory. Every [`crate::DeviceScopedCache`] entry
stored with a nonzero pressure adds to [`outstanding`], and releasing the entry
removes exactly that amount again. Hosts that run their own memory manager can
poll [`outstanding`] to decide when to reclaim aggressively.
*/

use std::sync::atomic::{AtomicU64, Ordering};

static OUTSTANDING: AtomicU64 = AtomicU64::new(0);

pub(crate) fn add(bytes: u64) {
    if bytes == 0 {
        return;
    }
    let total = OUTSTANDING.fetch_add(bytes, Ordering::Relaxed) + bytes;
    logwise::debuginternal_sync!(
        "memory pressure +{bytes} (outstanding {total})",
        bytes = bytes,
        total = total
    );
}

pub(crate) fn remove(bytes: u64) {
    if bytes == 0 {
        return;
    }
    //saturate rather than wrap; every removal is paired with an add
    let previous = OUTSTANDING
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(bytes))
        })
        .unwrap_or(0);
    logwise::debuginternal_sync!(
        "memory pressure -{bytes} (outstanding {total})",
        bytes = bytes,
        total = previous.saturating_sub(bytes)
    );
}

/// Bytes of native memory currently reported by all caches in the process.
pub fn outstanding() -> u64 {
    OUTSTANDING.load(Ordering::Relaxed)
}
