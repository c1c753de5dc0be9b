// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel formats for color and depth-stencil buffers.
//!
//! Only what the binding layer needs: which format to ask the backend for, and how many
//! bytes a texel occupies so the allocation can be reported as memory pressure.

/// Texel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 8-bit normalized single channel.
    R8Unorm,
    R32Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    /// Common swap-chain format.
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    Depth32Float,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::R8Unorm => 1,
            PixelFormat::R32Float => 4,
            PixelFormat::Rgba8Unorm => 4,
            PixelFormat::Rgba8UnormSrgb => 4,
            PixelFormat::Bgra8UnormSrgb => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
            PixelFormat::Depth24PlusStencil8 => 4,
            PixelFormat::Depth32Float => 4,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::Depth24PlusStencil8 | PixelFormat::Depth32Float
        )
    }

    /// Whether every backend can sample this format with linear filtering, which is what
    /// mip generation needs.
    pub const fn is_filterable(self) -> bool {
        !self.is_depth() && !matches!(self, PixelFormat::R32Float | PixelFormat::Rgba32Float)
    }
}
