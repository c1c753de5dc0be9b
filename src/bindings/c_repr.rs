// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Values with a fixed, C-compatible byte layout.
//!
//! Parameter blocks are written, and stream-output records read back, as raw bytes. A
//! type opts in by implementing [`CRepr`]:
//!
//! ```
//! use nested_binds::bindings::c_repr::CRepr;
//!
//! #[derive(Clone, Copy)]
//! #[repr(C)]
//! struct Light {
//!     position: [f32; 4],
//!     color: [f32; 4],
//! }
//! unsafe impl CRepr for Light {}
//! ```

/// Marker for types that may be viewed as, and rebuilt from, their raw bytes.
///
/// # Safety
///
/// The type must be `#[repr(C)]` or `#[repr(transparent)]` (or a primitive), contain no
/// padding bytes and no pointers, and every bit pattern of its size must be a valid value.
pub unsafe trait CRepr: Copy + Send + Sync + 'static {}

unsafe impl CRepr for u8 {}
unsafe impl CRepr for i8 {}
unsafe impl CRepr for u16 {}
unsafe impl CRepr for i16 {}
unsafe impl CRepr for u32 {}
unsafe impl CRepr for i32 {}
unsafe impl CRepr for u64 {}
unsafe impl CRepr for i64 {}
unsafe impl CRepr for f32 {}
unsafe impl CRepr for f64 {}
unsafe impl CRepr for half::f16 {}
unsafe impl<T: CRepr, const N: usize> CRepr for [T; N] {}

pub(crate) fn bytes_of<T: CRepr>(value: &T) -> &[u8] {
    // Safety: CRepr guarantees no padding, so every byte is initialized
    unsafe {
        std::slice::from_raw_parts((value as *const T).cast::<u8>(), std::mem::size_of::<T>())
    }
}

/// Parses as many whole `T`s as fit in `bytes`. A trailing partial record is ignored.
pub(crate) fn read_records<T: CRepr>(bytes: &[u8]) -> Vec<T> {
    let size = std::mem::size_of::<T>();
    if size == 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(size)
        .map(|chunk| {
            // Safety: chunk is size_of::<T>() bytes and CRepr accepts any bit pattern
            unsafe { std::ptr::read_unaligned(chunk.as_ptr().cast::<T>()) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{bytes_of, read_records};

    #[test]
    fn partial_trailing_record_is_dropped() {
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0];
        let values: Vec<u32> = read_records(&bytes);
        assert_eq!(values, vec![u32::from_ne_bytes([1, 0, 0, 0]), u32::from_ne_bytes([2, 0, 0, 0])]);
    }

    #[test]
    fn arrays_view_as_bytes() {
        let v = [1.0f32, 2.0];
        assert_eq!(bytes_of(&v).len(), 8);
        assert_eq!(&bytes_of(&v)[..4], &1.0f32.to_ne_bytes());
    }
}
