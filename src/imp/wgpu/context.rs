// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::convert::{WgpuBlend, WgpuDepthStencil, WgpuRasterizer};
use super::mips::MipDownsampler;
use super::{object, unsupported};
use crate::imp::{
    Error, NativeBuffer, NativeContext, NativeQuery, NativeState, NativeTexture, NativeView,
    Result, StreamOutputStatistics, Viewport,
};
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

/// Everything bound through a [`WgpuContext`], in the form pipelines and render passes
/// are built from.
#[derive(Debug, Default)]
pub struct OutputStage {
    pub blend: Option<WgpuBlend>,
    pub rasterizer: Option<WgpuRasterizer>,
    pub depth_stencil: Option<WgpuDepthStencil>,
    pub color_targets: Vec<wgpu::TextureView>,
    pub depth_target: Option<wgpu::TextureView>,
    pub viewports: Vec<Viewport>,
    /// Storage buffer standing in for the stream-output destination.
    pub capture_buffer: Option<wgpu::Buffer>,
}

impl OutputStage {
    /// The full depth-stencil state for a pipeline targeting `format`.
    ///
    /// Combines the bound depth-stencil state with the rasterizer's depth bias.
    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> Option<wgpu::DepthStencilState> {
        let depth_stencil = self.depth_stencil?;
        Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_stencil.depth_write_enabled,
            depth_compare: depth_stencil.depth_compare,
            //always-pass and keep on both faces, with the full 8-bit masks
            stencil: if depth_stencil.stencil {
                wgpu::StencilState {
                    front: wgpu::StencilFaceState::IGNORE,
                    back: wgpu::StencilFaceState::IGNORE,
                    read_mask: 0xff,
                    write_mask: 0xff,
                }
            } else {
                wgpu::StencilState::default()
            },
            bias: self
                .rasterizer
                .map(|rasterizer| rasterizer.bias)
                .unwrap_or_default(),
        })
    }

    /// Multisample state for a pipeline rendering with `count` samples.
    pub fn multisample_state(&self, count: u32) -> wgpu::MultisampleState {
        let multisample = self.rasterizer.is_none_or(|rasterizer| rasterizer.multisample);
        wgpu::MultisampleState {
            count: if multisample { count } else { 1 },
            mask: !0,
            alpha_to_coverage_enabled: self.blend.is_some_and(|blend| blend.alpha_to_coverage),
        }
    }
}

pub type SharedOutputStage = Arc<Mutex<OutputStage>>;

/// The wgpu command surface.
///
/// Buffer writes and copies go to the queue immediately. Bindings are recorded into the
/// [`OutputStage`].
#[derive(Debug)]
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    stage: SharedOutputStage,
    //built on first mip generation
    mips: Option<MipDownsampler>,
}

impl WgpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuContext {
            device,
            queue,
            stage: Arc::new(Mutex::new(OutputStage::default())),
            mips: None,
        }
    }

    /// Shared with the draw layer; take it before handing the context to a
    /// [`crate::DeviceContext`].
    pub fn output_stage(&self) -> SharedOutputStage {
        self.stage.clone()
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(Some(encoder.finish()));
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}

/// Logs and clears the slot when `state` is not a `T`.
fn bound_state<T: Copy + 'static>(state: Option<&NativeState>, what: &'static str) -> Option<T> {
    let state = state?;
    match object::<T>(state, what) {
        Ok(state) => Some(*state),
        Err(e) => {
            logwise::error_sync!("{e}", e = logwise::privacy::LogIt(&e));
            None
        }
    }
}

fn bound_view(view: &NativeView) -> Option<wgpu::TextureView> {
    match object::<wgpu::TextureView>(view, "view") {
        Ok(view) => Some(view.clone()),
        Err(e) => {
            logwise::error_sync!("{e}", e = logwise::privacy::LogIt(&e));
            None
        }
    }
}

impl NativeContext for WgpuContext {
    fn update_buffer(&mut self, buffer: &NativeBuffer, contents: &[u8]) -> Result<()> {
        let buffer: &wgpu::Buffer = object(buffer, "buffer")?;
        if contents.len() as u64 != buffer.size() {
            return Err(Error::Backend(format!(
                "update of {} bytes into a {} byte buffer",
                contents.len(),
                buffer.size()
            )));
        }
        self.queue.write_buffer(buffer, 0, contents);
        Ok(())
    }

    fn copy_buffer(&mut self, source: &NativeBuffer, destination: &NativeBuffer) -> Result<()> {
        let source: &wgpu::Buffer = object(source, "buffer")?;
        let destination: &wgpu::Buffer = object(destination, "buffer")?;
        let size = source.size().min(destination.size());
        let mut encoder = self.encoder("copy_buffer");
        encoder.copy_buffer_to_buffer(source, 0, destination, 0, size);
        self.submit(encoder);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: &NativeBuffer, read: &mut dyn FnMut(&[u8])) -> Result<()> {
        let buffer: &wgpu::Buffer = object(buffer, "buffer")?;
        let readback = logwise::perfwarn_begin!("wgpu read_buffer");
        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            //the receiver only goes away if we already returned an error
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| Error::Backend(e.to_string()))?;
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Backend(e.to_string())),
            Err(_) => return Err(Error::DeviceLost),
        }
        {
            let mapped = slice.get_mapped_range();
            read(&mapped);
        }
        buffer.unmap();
        drop(readback);
        Ok(())
    }

    fn set_blend_state(&mut self, state: Option<&NativeState>) {
        self.stage.lock_sync().blend = bound_state::<WgpuBlend>(state, "blend state");
    }

    fn set_rasterizer_state(&mut self, state: Option<&NativeState>) {
        self.stage.lock_sync().rasterizer = bound_state::<WgpuRasterizer>(state, "rasterizer state");
    }

    fn set_depth_stencil_state(&mut self, state: Option<&NativeState>) {
        self.stage.lock_sync().depth_stencil =
            bound_state::<WgpuDepthStencil>(state, "depth-stencil state");
    }

    fn set_output_targets(&mut self, depth_stencil: Option<&NativeView>, colors: &[&NativeView]) {
        let colors = colors.iter().filter_map(|view| bound_view(view)).collect();
        let depth_target = depth_stencil.and_then(bound_view);
        let mut stage = self.stage.lock_sync();
        stage.color_targets = colors;
        stage.depth_target = depth_target;
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.stage.lock_sync().viewports = viewports.to_vec();
    }

    fn set_stream_output_target(&mut self, buffer: Option<&NativeBuffer>) {
        let buffer = buffer.and_then(|buffer| match object::<wgpu::Buffer>(buffer, "buffer") {
            Ok(buffer) => Some(buffer.clone()),
            Err(e) => {
                logwise::error_sync!("{e}", e = logwise::privacy::LogIt(&e));
                None
            }
        });
        self.stage.lock_sync().capture_buffer = buffer;
    }

    fn begin_query(&mut self, _query: &NativeQuery) {
        unsupported("stream-output statistics queries");
    }

    fn end_query(&mut self, _query: &NativeQuery) {
        unsupported("stream-output statistics queries");
    }

    fn query_data(&mut self, _query: &NativeQuery) -> Option<StreamOutputStatistics> {
        unsupported("stream-output statistics queries");
        None
    }

    fn generate_mips(&mut self, texture: &NativeTexture) -> Result<()> {
        let texture: &wgpu::Texture = object(texture, "texture")?;
        let mut encoder = self.encoder("generate_mips");
        let device = &self.device;
        let mips = self.mips.get_or_insert_with(|| MipDownsampler::new(device));
        mips.encode(device, &mut encoder, texture)?;
        self.submit(encoder);
        Ok(())
    }

    fn clear_render_target(&mut self, view: &NativeView, color: [f32; 4]) {
        let Some(view) = bound_view(view) else {
            return;
        };
        let mut encoder = self.encoder("clear_render_target");
        {
            let [r, g, b, a] = color.map(f64::from);
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_render_target"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.submit(encoder);
    }

    fn clear_depth_stencil(&mut self, view: &NativeView, depth: Option<f32>, stencil: Option<u8>) {
        let Some(view) = bound_view(view) else {
            return;
        };
        let mut encoder = self.encoder("clear_depth_stencil");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_depth_stencil"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &view,
                    depth_ops: depth.map(|depth| wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: stencil.map(|stencil| wgpu::Operations {
                        load: wgpu::LoadOp::Clear(u32::from(stencil)),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.submit(encoder);
    }
}

#[cfg(test)]
mod tests {
    use super::OutputStage;
    use crate::imp::wgpu::{WgpuDepthStencil, WgpuRasterizer};

    fn depth(stencil: bool) -> WgpuDepthStencil {
        WgpuDepthStencil {
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil,
        }
    }

    #[test]
    fn stencil_flag_reaches_the_pipeline_state() {
        let format = wgpu::TextureFormat::Depth24PlusStencil8;
        let stage = OutputStage {
            depth_stencil: Some(depth(true)),
            ..Default::default()
        };
        let state = stage.depth_stencil_state(format).unwrap();
        assert_eq!(state.stencil.front, wgpu::StencilFaceState::IGNORE);
        assert_eq!(state.stencil.back, wgpu::StencilFaceState::IGNORE);
        assert_eq!(state.stencil.read_mask, 0xff);
        assert_eq!(state.stencil.write_mask, 0xff);

        let stage = OutputStage {
            depth_stencil: Some(depth(false)),
            ..Default::default()
        };
        let state = stage.depth_stencil_state(format).unwrap();
        assert_eq!(state.stencil, wgpu::StencilState::default());
        assert!(state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Less);
    }

    #[test]
    fn depth_bias_comes_from_the_rasterizer() {
        let bias = wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 1.5,
            clamp: 0.0,
        };
        let stage = OutputStage {
            depth_stencil: Some(depth(false)),
            rasterizer: Some(WgpuRasterizer {
                primitive: wgpu::PrimitiveState::default(),
                bias,
                multisample: true,
            }),
            ..Default::default()
        };
        let state = stage.depth_stencil_state(wgpu::TextureFormat::Depth32Float).unwrap();
        assert_eq!(state.bias, bias);
        assert!(OutputStage::default().depth_stencil_state(wgpu::TextureFormat::Depth32Float).is_none());
    }
}
