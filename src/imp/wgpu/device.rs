// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::context::WgpuContext;
use super::{convert, object, unsupported};
use crate::bindings::sampler::SamplerDescriptor;
use crate::bindings::state::blend::BlendDescriptor;
use crate::bindings::state::depth_stencil::DepthStencilDescriptor;
use crate::bindings::state::rasterizer::RasterizerDescriptor;
use crate::imp::{
    BufferDescriptor, Capabilities, Error, FeatureLevel, NativeBuffer, NativeDevice, NativeHandle,
    NativeQuery, NativeSampler, NativeState, NativeTexture, NativeView, QueryKind, Result,
    TextureDescriptor, ViewKind,
};
use wgpu::{Limits, Trace};

/// A wgpu device and its queue.
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuDevice { device, queue }
    }

    /// Opens the default adapter with WebGL2-compatible limits.
    pub async fn request() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        let mut limits = Limits::downlevel_webgl2_defaults();
        //webGL is quite serious about enforcing these, which
        //by default are rather small
        limits.max_texture_dimension_1d = 4096;
        limits.max_texture_dimension_2d = 4096;
        let descriptor = wgpu::DeviceDescriptor {
            label: Some("nested_binds"),
            required_features: Default::default(),
            required_limits: limits,
            memory_hints: Default::default(),
            trace: Trace::Off,
        };
        let (device, queue) = adapter
            .request_device(&descriptor)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        Ok(Self::new(device, queue))
    }

    /// A command context for this device.
    pub fn context(&self) -> WgpuContext {
        WgpuContext::new(self.device.clone(), self.queue.clone())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl NativeDevice for WgpuDevice {
    fn capabilities(&self) -> Capabilities {
        //storage buffers in shaders is roughly where D3D 11 class hardware begins
        let feature_level = if self.device.limits().max_storage_buffers_per_shader_stage > 0 {
            FeatureLevel::Level11_0
        } else {
            FeatureLevel::Level10_0
        };
        Capabilities {
            feature_level,
            stream_output: false,
        }
    }

    fn create_buffer(
        &self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<NativeBuffer> {
        if desc.size > self.device.limits().max_buffer_size {
            return Err(Error::OutOfMemory { bytes: desc.size });
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.size,
            usage: convert::buffer_usages(desc.usage),
            mapped_at_creation: false,
        });
        if let Some(contents) = contents {
            self.queue.write_buffer(&buffer, 0, contents);
        }
        Ok(NativeHandle::new(buffer))
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<NativeTexture> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(Error::Backend(format!(
                "{}x{} texture exceeds the device limit of {max}",
                desc.width, desc.height
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: convert::texture_format(desc.format),
            usage: convert::texture_usages(desc.usage),
            view_formats: &[],
        });
        Ok(NativeHandle::new(texture))
    }

    fn create_view(&self, texture: &NativeTexture, kind: ViewKind) -> Result<NativeView> {
        let texture: &wgpu::Texture = object(texture, "texture")?;
        let descriptor = match kind {
            //outputs write the base level; mips are derived from it
            ViewKind::RenderTarget | ViewKind::DepthStencil => wgpu::TextureViewDescriptor {
                base_mip_level: 0,
                mip_level_count: Some(1),
                ..Default::default()
            },
            ViewKind::ShaderResource if texture.format().has_depth_aspect() => {
                wgpu::TextureViewDescriptor {
                    aspect: wgpu::TextureAspect::DepthOnly,
                    ..Default::default()
                }
            }
            ViewKind::ShaderResource => wgpu::TextureViewDescriptor::default(),
        };
        Ok(NativeHandle::new(texture.create_view(&descriptor)))
    }

    fn create_blend_state(&self, desc: &BlendDescriptor) -> Result<NativeState> {
        Ok(NativeHandle::new(convert::blend(desc)))
    }

    fn create_rasterizer_state(&self, desc: &RasterizerDescriptor) -> Result<NativeState> {
        Ok(NativeHandle::new(convert::rasterizer(desc)))
    }

    fn create_depth_stencil_state(&self, desc: &DepthStencilDescriptor) -> Result<NativeState> {
        Ok(NativeHandle::new(convert::depth_stencil(desc)))
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<NativeSampler> {
        let border = self
            .device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let sampler = self.device.create_sampler(&convert::sampler(desc, border));
        Ok(NativeHandle::new(sampler))
    }

    fn create_query(&self, kind: QueryKind) -> Result<NativeQuery> {
        match kind {
            QueryKind::StreamOutputStatistics => Err(unsupported("stream-output statistics queries")),
        }
    }
}
