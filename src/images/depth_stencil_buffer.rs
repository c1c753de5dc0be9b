// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The depth-stencil surface of a render target.

use crate::cache::DeviceScopedCache;
use crate::error::Result;
use crate::images::context::DeviceContext;
use crate::images::device::Device;
use crate::imp::{FeatureLevel, NativeTexture, NativeView, TextureDescriptor, TextureUsage, ViewKind};
use crate::pixel_formats::PixelFormat;

#[derive(Debug)]
pub struct DepthStencilBuffer {
    width: u32,
    height: u32,
    sample_count: u32,
    shader_resource: bool,
    texture: DeviceScopedCache<Option<NativeTexture>>,
    depth_stencil_views: DeviceScopedCache<Option<NativeView>>,
    shader_resource_views: DeviceScopedCache<Option<NativeView>>,
}

impl DepthStencilBuffer {
    /// With `shader_resource`, the buffer can also be sampled (shadow maps, soft particles).
    pub fn new(width: u32, height: u32, sample_count: u32, shader_resource: bool) -> Self {
        DepthStencilBuffer {
            width,
            height,
            sample_count: sample_count.max(1),
            shader_resource,
            texture: DeviceScopedCache::new(None),
            depth_stencil_views: DeviceScopedCache::new(None),
            shader_resource_views: DeviceScopedCache::new(None),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn is_shader_resource(&self) -> bool {
        self.shader_resource
    }

    pub fn texture(&self, device: &Device) -> Result<NativeTexture> {
        let texture = self.texture.get_or_try_insert_with(device, || {
            let feature_level = device.capabilities().feature_level;
            if self.sample_count > 1 && self.shader_resource && feature_level < FeatureLevel::Level10_1
            {
                //creation is still attempted; some drivers accept it anyway
                logwise::error_sync!(
                    "multisampled depth-stencil buffers can't be sampled at {level}",
                    level = logwise::privacy::LogIt(&feature_level)
                );
            }
            let descriptor = TextureDescriptor {
                label: Some("depth-stencil"),
                width: self.width,
                height: self.height,
                format: PixelFormat::Depth24PlusStencil8,
                sample_count: self.sample_count,
                mip_level_count: 1,
                usage: TextureUsage {
                    render_target: false,
                    depth_stencil: true,
                    shader_resource: self.shader_resource,
                },
            };
            device
                .native()
                .create_texture(&descriptor)
                .map(|texture| (texture, descriptor.byte_size()))
        })?;
        Ok(texture)
    }

    pub fn depth_stencil_view(&self, device: &Device) -> Result<NativeView> {
        let texture = self.texture(device)?;
        let view = self.depth_stencil_views.get_or_try_insert_with(device, || {
            device
                .native()
                .create_view(&texture, ViewKind::DepthStencil)
                .map(|view| (view, 0))
        })?;
        Ok(view)
    }

    /// `None` unless the buffer was created as a shader resource.
    pub fn shader_resource_view(&self, device: &Device) -> Result<Option<NativeView>> {
        if !self.shader_resource {
            return Ok(None);
        }
        let texture = self.texture(device)?;
        let view = self.shader_resource_views.get_or_try_insert_with(device, || {
            device
                .native()
                .create_view(&texture, ViewKind::ShaderResource)
                .map(|view| (view, 0))
        })?;
        Ok(Some(view))
    }

    /// Clears depth, stencil, or both. `None` leaves that aspect untouched.
    pub fn clear(
        &self,
        context: &mut DeviceContext,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) -> Result<()> {
        let view = self.depth_stencil_view(context.device())?;
        context.native_mut().clear_depth_stencil(&view, depth, stencil);
        Ok(())
    }

    pub fn preload(&self, device: &Device) -> Result<()> {
        self.depth_stencil_view(device)?;
        self.shader_resource_view(device)?;
        Ok(())
    }

    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.texture.memory_pressure(device)
    }

    pub fn release(&self, device: &Device) {
        self.depth_stencil_views.release(device);
        self.shader_resource_views.release(device);
        self.texture.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::DepthStencilBuffer;
    use crate::imp::headless::{Headless, ObjectKind};
    use crate::imp::{Capabilities, FeatureLevel};

    #[test]
    fn views_follow_usage() {
        let headless = Headless::new();
        let device = headless.device();
        let plain = DepthStencilBuffer::new(128, 128, 1, false);
        plain.preload(&device).unwrap();
        assert!(plain.shader_resource_view(&device).unwrap().is_none());
        assert_eq!(plain.memory_pressure(&device), 128 * 128 * 4);

        let sampled = DepthStencilBuffer::new(128, 128, 1, true);
        assert!(sampled.shader_resource_view(&device).unwrap().is_some());
        assert_eq!(headless.created(ObjectKind::Texture), 2);
    }

    #[test]
    fn multisampled_shader_resource_on_old_hardware_is_attempted() {
        let headless = Headless::with_capabilities(Capabilities {
            feature_level: FeatureLevel::Level10_0,
            stream_output: true,
        });
        let device = headless.device();
        let buffer = DepthStencilBuffer::new(64, 64, 4, true);
        assert!(buffer.depth_stencil_view(&device).is_ok());
        assert_eq!(headless.created(ObjectKind::Texture), 1);
    }
}
