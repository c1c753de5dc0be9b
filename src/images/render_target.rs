// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Render targets: color buffers, an optional depth-stencil buffer, and the pipeline states
that go with drawing into them.

Binding a [`RenderTarget`] replaces the whole output stage in one call (one viewport per
color buffer), then binds whichever rasterizer, depth-stencil, and blend states the target
carries. Unbinding reverses all of that, restoring the target and states that were active
before.

```
use nested_binds::{BindableTarget, ColorBuffer, RenderTarget, TextureColorBuffer};
use nested_binds::imp::headless::Headless;
use nested_binds::pixel_formats::PixelFormat;
use std::sync::Arc;

let headless = Headless::new();
let mut context = headless.context();
let scene: Arc<dyn ColorBuffer> =
    Arc::new(TextureColorBuffer::new("scene", PixelFormat::Rgba8Unorm, 640, 480, 1, false));
let target = Arc::new(RenderTarget::new(vec![scene], None));
target.clone().bind(&mut context).unwrap();
assert_eq!(headless.output_targets().1.len(), 1);
assert_eq!(headless.viewports()[0].width, 640.0);
target.unbind(&mut context).unwrap();
assert!(headless.output_targets().1.is_empty());
```
*/

use crate::bindings::state::{
    BindableState, BlendState, DepthStencilState, RasterizerState, StateKind,
};
use crate::cache::DeviceScopedCache;
use crate::error::Result;
use crate::images::color_buffer::ColorBuffer;
use crate::images::context::DeviceContext;
use crate::images::depth_stencil_buffer::DepthStencilBuffer;
use crate::images::device::Device;
use crate::images::target::{BindableTarget, TargetLink};
use crate::imp::{NativeView, Viewport};
use std::sync::Arc;

/// Which of a target's states its bind made active, per device.
///
/// A state that was already active (say, shared with an enclosing target) was not
/// pushed, so unbinding the target leaves it alone.
#[derive(Debug, Clone, Copy, Default)]
struct Pushed {
    rasterizer: bool,
    depth_stencil: bool,
    blend: bool,
}

fn pushed_state<K: StateKind>(
    flag: bool,
    state: &Option<Arc<BindableState<K>>>,
) -> Option<&Arc<BindableState<K>>> {
    state.as_ref().filter(|_| flag)
}

/// Materialized output stage for one device.
struct Outputs {
    colors: Vec<NativeView>,
    depth_stencil: Option<NativeView>,
    viewports: Vec<Viewport>,
}

#[derive(Debug)]
pub struct RenderTarget {
    color_buffers: Vec<Arc<dyn ColorBuffer>>,
    depth_stencil_buffer: Option<Arc<DepthStencilBuffer>>,
    rasterizer_state: Option<Arc<RasterizerState>>,
    depth_stencil_state: Option<Arc<DepthStencilState>>,
    blend_state: Option<Arc<BlendState>>,
    pushed: DeviceScopedCache<Pushed>,
    link: TargetLink,
}

impl RenderTarget {
    pub fn new(
        color_buffers: Vec<Arc<dyn ColorBuffer>>,
        depth_stencil_buffer: Option<Arc<DepthStencilBuffer>>,
    ) -> Self {
        RenderTarget {
            color_buffers,
            depth_stencil_buffer,
            rasterizer_state: None,
            depth_stencil_state: None,
            blend_state: None,
            pushed: DeviceScopedCache::new(Pushed::default()),
            link: TargetLink::new("render target"),
        }
    }

    pub fn with_rasterizer_state(mut self, state: Arc<RasterizerState>) -> Self {
        self.rasterizer_state = Some(state);
        self
    }

    pub fn with_depth_stencil_state(mut self, state: Arc<DepthStencilState>) -> Self {
        self.depth_stencil_state = Some(state);
        self
    }

    pub fn with_blend_state(mut self, state: Arc<BlendState>) -> Self {
        self.blend_state = Some(state);
        self
    }

    pub fn color_buffers(&self) -> &[Arc<dyn ColorBuffer>] {
        &self.color_buffers
    }

    pub fn depth_stencil_buffer(&self) -> Option<&Arc<DepthStencilBuffer>> {
        self.depth_stencil_buffer.as_ref()
    }

    pub fn rasterizer_state(&self) -> Option<&Arc<RasterizerState>> {
        self.rasterizer_state.as_ref()
    }

    pub fn depth_stencil_state(&self) -> Option<&Arc<DepthStencilState>> {
        self.depth_stencil_state.as_ref()
    }

    pub fn blend_state(&self) -> Option<&Arc<BlendState>> {
        self.blend_state.as_ref()
    }

    /// The target this one restores on `device` when unbound, if it is still alive.
    pub fn predecessor(&self, device: &Device) -> Option<Arc<dyn BindableTarget>> {
        self.link.predecessor(device)
    }

    fn outputs(&self, device: &Device) -> Result<Outputs> {
        let mut colors = Vec::with_capacity(self.color_buffers.len());
        let mut viewports = Vec::with_capacity(self.color_buffers.len());
        for buffer in &self.color_buffers {
            colors.push(buffer.render_target_view(device)?);
            viewports.push(Viewport::full(buffer.width(), buffer.height()));
        }
        let depth_stencil = self
            .depth_stencil_buffer
            .as_ref()
            .map(|buffer| buffer.depth_stencil_view(device))
            .transpose()?;
        Ok(Outputs {
            colors,
            depth_stencil,
            viewports,
        })
    }

    fn apply(&self, outputs: &Outputs, context: &mut DeviceContext) {
        let device = context.device().clone();
        for buffer in &self.color_buffers {
            buffer.invalidate_mips(&device);
        }
        let colors: Vec<&NativeView> = outputs.colors.iter().collect();
        let native = context.native_mut();
        native.set_output_targets(outputs.depth_stencil.as_ref(), &colors);
        native.set_viewports(&outputs.viewports);
    }
}

impl BindableTarget for RenderTarget {
    fn bind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        let outputs = self.outputs(&device)?;
        if let Some(state) = &self.rasterizer_state {
            state.preload(context)?;
        }
        if let Some(state) = &self.depth_stencil_state {
            state.preload(context)?;
        }
        if let Some(state) = &self.blend_state {
            state.preload(context)?;
        }
        //rebinding keeps what the first bind pushed
        let mut pushed = if context.active().is_target(&self) {
            self.pushed.get(&device)
        } else {
            Pushed::default()
        };
        self.link.push(self.clone(), context);
        self.apply(&outputs, context);
        if let Some(state) = &self.rasterizer_state {
            pushed.rasterizer |= !state.is_active(context);
            state.bind(context)?;
        }
        if let Some(state) = &self.depth_stencil_state {
            pushed.depth_stencil |= !state.is_active(context);
            state.bind(context)?;
        }
        if let Some(state) = &self.blend_state {
            pushed.blend |= !state.is_active(context);
            state.bind(context)?;
        }
        self.pushed.set(&device, pushed, 0);
        Ok(())
    }

    /// Also unbinds the states this target's bind made active.
    ///
    /// If one of them has since been covered by another state that is still bound, fails
    /// with [`crate::Error::NotActive`] for that state and changes nothing.
    fn unbind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        let flags = self.pushed.get(&device);
        if context.active().is_target(&self) {
            if let Some(state) = pushed_state(flags.rasterizer, &self.rasterizer_state) {
                state.ensure_active(context)?;
            }
            if let Some(state) = pushed_state(flags.depth_stencil, &self.depth_stencil_state) {
                state.ensure_active(context)?;
            }
            if let Some(state) = pushed_state(flags.blend, &self.blend_state) {
                state.ensure_active(context)?;
            }
        }
        let predecessor = self.link.pop(&self, context)?;
        self.pushed.release(&device);
        if let Some(state) = pushed_state(flags.rasterizer, &self.rasterizer_state) {
            state.unbind(context)?;
        }
        if let Some(state) = pushed_state(flags.depth_stencil, &self.depth_stencil_state) {
            state.unbind(context)?;
        }
        if let Some(state) = pushed_state(flags.blend, &self.blend_state) {
            state.unbind(context)?;
        }
        match predecessor {
            Some(predecessor) => predecessor.reinstate(context)?,
            None => {
                let native = context.native_mut();
                native.set_output_targets(None, &[]);
                native.set_viewports(&[]);
            }
        }
        Ok(())
    }

    fn preload(&self, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        for buffer in &self.color_buffers {
            buffer.preload(&device)?;
        }
        if let Some(buffer) = &self.depth_stencil_buffer {
            buffer.preload(&device)?;
        }
        if let Some(state) = &self.rasterizer_state {
            state.preload(context)?;
        }
        if let Some(state) = &self.depth_stencil_state {
            state.preload(context)?;
        }
        if let Some(state) = &self.blend_state {
            state.preload(context)?;
        }
        Ok(())
    }

    fn reinstate(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let outputs = self.outputs(context.device())?;
        self.apply(&outputs, context);
        //a nested target's states were unbound back to ours; only reapply what got lost
        if let Some(state) = &self.rasterizer_state
            && !state.is_active(context)
        {
            state.reinstate(context)?;
        }
        if let Some(state) = &self.depth_stencil_state
            && !state.is_active(context)
        {
            state.reinstate(context)?;
        }
        if let Some(state) = &self.blend_state
            && !state.is_active(context)
        {
            state.reinstate(context)?;
        }
        Ok(())
    }
}
