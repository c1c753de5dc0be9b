// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Color surfaces a [`crate::RenderTarget`] draws into.

use crate::cache::DeviceScopedCache;
use crate::error::{Error, Result};
use crate::images::context::DeviceContext;
use crate::images::device::Device;
use crate::imp::{
    self, NativeTexture, NativeView, TextureDescriptor, TextureUsage, ViewKind, full_mip_chain,
};
use crate::pixel_formats::PixelFormat;
use std::fmt::Debug;

/// A surface that can be bound as one color output of a render target.
pub trait ColorBuffer: Send + Sync + Debug {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// The view to bind as an output on `device`, created on first use.
    fn render_target_view(&self, device: &Device) -> Result<NativeView>;

    /// Called each time the buffer is bound for writing.
    ///
    /// Buffers that keep derived data (a mip chain) mark it stale here.
    fn invalidate_mips(&self, _device: &Device) {}

    /// Materializes native objects without binding.
    fn preload(&self, device: &Device) -> Result<()> {
        self.render_target_view(device).map(drop)
    }
}

/// A texture that is rendered into, then sampled.
#[derive(Debug)]
pub struct TextureColorBuffer {
    label: String,
    format: PixelFormat,
    width: u32,
    height: u32,
    sample_count: u32,
    mip_mapped: bool,
    texture: DeviceScopedCache<Option<NativeTexture>>,
    render_target_views: DeviceScopedCache<Option<NativeView>>,
    shader_resource_views: DeviceScopedCache<Option<NativeView>>,
    mips_dirty: DeviceScopedCache<bool>,
}

impl TextureColorBuffer {
    /// With `mip_mapped`, the texture carries a full mip chain that is regenerated the
    /// first time it is sampled after being drawn into.
    pub fn new(
        label: impl Into<String>,
        format: PixelFormat,
        width: u32,
        height: u32,
        sample_count: u32,
        mip_mapped: bool,
    ) -> Self {
        TextureColorBuffer {
            label: label.into(),
            format,
            width,
            height,
            sample_count: sample_count.max(1),
            mip_mapped,
            texture: DeviceScopedCache::new(None),
            render_target_views: DeviceScopedCache::new(None),
            shader_resource_views: DeviceScopedCache::new(None),
            mips_dirty: DeviceScopedCache::new(true),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn mip_level_count(&self) -> u32 {
        if self.mip_mapped {
            full_mip_chain(self.width, self.height)
        } else {
            1
        }
    }

    fn descriptor(&self) -> TextureDescriptor<'_> {
        TextureDescriptor {
            label: Some(self.label.as_str()),
            width: self.width,
            height: self.height,
            format: self.format,
            sample_count: self.sample_count,
            mip_level_count: self.mip_level_count(),
            usage: TextureUsage {
                render_target: true,
                depth_stencil: false,
                shader_resource: true,
            },
        }
    }

    /// The texture on `device`, created on first use.
    pub fn texture(&self, device: &Device) -> Result<NativeTexture> {
        let texture = self.texture.get_or_try_insert_with(device, || {
            let descriptor = self.descriptor();
            logwise::trace_sync!(
                "creating color buffer {label} {w}x{h}",
                label = self.label.as_str(),
                w = self.width,
                h = self.height
            );
            device
                .native()
                .create_texture(&descriptor)
                .map(|texture| (texture, descriptor.byte_size()))
        })?;
        Ok(texture)
    }

    /// The view for sampling the buffer.
    ///
    /// If the buffer has been drawn into since its mips were last built, they are
    /// regenerated first. A backend that cannot regenerate them for this buffer's format
    /// logs a warning and the view is returned with whatever the lower levels held.
    pub fn shader_resource_view(&self, context: &mut DeviceContext) -> Result<NativeView> {
        let device = context.device().clone();
        let texture = self.texture(&device)?;
        let view = self.shader_resource_views.get_or_try_insert_with(&device, || {
            device
                .native()
                .create_view(&texture, ViewKind::ShaderResource)
                .map(|view| (view, 0))
        })?;
        if self.mip_mapped && self.mips_dirty.get(&device) {
            logwise::trace_sync!(
                "regenerating mips for {label}",
                label = self.label.as_str()
            );
            match context.native_mut().generate_mips(&texture) {
                Ok(()) => {}
                Err(imp::Error::Unsupported(what)) => {
                    //no point retrying until the next draw
                    logwise::warn_sync!(
                        "{label} samples stale mips: {what} is unsupported",
                        label = self.label.as_str(),
                        what = what
                    );
                }
                Err(e) => return Err(Error::from(e)),
            }
            self.mips_dirty.set(&device, false, 0);
        }
        Ok(view)
    }

    /// Whether the next [`shader_resource_view`](Self::shader_resource_view) on `device`
    /// regenerates mips.
    pub fn mips_dirty(&self, device: &Device) -> bool {
        self.mip_mapped && self.mips_dirty.get(device)
    }

    pub fn clear(&self, context: &mut DeviceContext, color: [f32; 4]) -> Result<()> {
        let view = self.render_target_view(context.device())?;
        context.native_mut().clear_render_target(&view, color);
        self.mips_dirty.release(context.device());
        Ok(())
    }

    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.texture.memory_pressure(device)
    }

    /// Drops every native object on `device`.
    pub fn release(&self, device: &Device) {
        self.render_target_views.release(device);
        self.shader_resource_views.release(device);
        self.texture.release(device);
        self.mips_dirty.release(device);
    }
}

impl ColorBuffer for TextureColorBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_target_view(&self, device: &Device) -> Result<NativeView> {
        let texture = self.texture(device)?;
        let view = self.render_target_views.get_or_try_insert_with(device, || {
            device
                .native()
                .create_view(&texture, ViewKind::RenderTarget)
                .map(|view| (view, 0))
        })?;
        Ok(view)
    }

    fn invalidate_mips(&self, device: &Device) {
        //the default is dirty
        self.mips_dirty.release(device);
    }

    fn preload(&self, device: &Device) -> Result<()> {
        let texture = self.texture(device)?;
        self.render_target_view(device)?;
        self.shader_resource_views.get_or_try_insert_with(device, || {
            device
                .native()
                .create_view(&texture, ViewKind::ShaderResource)
                .map(|view| (view, 0))
        })?;
        Ok(())
    }
}
