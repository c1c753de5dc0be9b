// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Descriptor translation into wgpu's vocabulary.

use crate::bindings::sampler::{AddressMode, FilterMode, SamplerDescriptor};
use crate::bindings::state::blend::{BlendComponent, BlendDescriptor, BlendFactor, BlendOperation};
use crate::bindings::state::depth_stencil::{CompareFunction, DepthStencilDescriptor};
use crate::bindings::state::rasterizer::{CullMode, FillMode, RasterizerDescriptor};
use crate::imp::{BufferUsage, TextureUsage};
use crate::pixel_formats::PixelFormat;

/// A blend state as stored on the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgpuBlend {
    pub state: wgpu::BlendState,
    /// Lives on `wgpu::MultisampleState`.
    pub alpha_to_coverage: bool,
}

/// A rasterizer state as stored on the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgpuRasterizer {
    pub primitive: wgpu::PrimitiveState,
    /// Lives on `wgpu::DepthStencilState`.
    pub bias: wgpu::DepthBiasState,
    pub multisample: bool,
}

/// A depth-stencil state, minus the format, which comes from the bound depth buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgpuDepthStencil {
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    /// Stencil test with always-pass, keep operations and full masks.
    pub stencil: bool,
}

pub(super) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        PixelFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub(super) fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Constant => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        //written by a vertex or compute stage standing in for stream output
        BufferUsage::StreamOutput => {
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_SRC
        }
        BufferUsage::Staging => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
    }
}

pub(super) fn texture_usages(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
    if usage.render_target || usage.depth_stencil {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.shader_resource {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    usages
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InverseSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DestinationAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InverseDestinationAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SourceColor => wgpu::BlendFactor::Src,
        BlendFactor::InverseSourceColor => wgpu::BlendFactor::OneMinusSrc,
    }
}

fn blend_operation(operation: BlendOperation) -> wgpu::BlendOperation {
    match operation {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    }
}

fn blend_component(component: &BlendComponent) -> wgpu::BlendComponent {
    let operation = blend_operation(component.operation);
    //wgpu requires One/One for min and max
    let (src_factor, dst_factor) = match operation {
        wgpu::BlendOperation::Min | wgpu::BlendOperation::Max => {
            (wgpu::BlendFactor::One, wgpu::BlendFactor::One)
        }
        _ => (
            blend_factor(component.source),
            blend_factor(component.destination),
        ),
    };
    wgpu::BlendComponent {
        src_factor,
        dst_factor,
        operation,
    }
}

pub(super) fn blend(desc: &BlendDescriptor) -> WgpuBlend {
    WgpuBlend {
        state: wgpu::BlendState {
            color: blend_component(&desc.color),
            alpha: blend_component(&desc.alpha),
        },
        alpha_to_coverage: desc.alpha_to_coverage,
    }
}

pub(super) fn rasterizer(desc: &RasterizerDescriptor) -> WgpuRasterizer {
    let cull_mode = match desc.cull {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    };
    let polygon_mode = match desc.fill {
        FillMode::Solid => wgpu::PolygonMode::Fill,
        FillMode::Wireframe => wgpu::PolygonMode::Line,
    };
    WgpuRasterizer {
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: if desc.front_counter_clockwise {
                wgpu::FrontFace::Ccw
            } else {
                wgpu::FrontFace::Cw
            },
            cull_mode,
            unclipped_depth: !desc.depth_clip,
            polygon_mode,
            conservative: false,
        },
        bias: wgpu::DepthBiasState {
            constant: desc.depth_bias,
            slope_scale: desc.slope_scaled_depth_bias,
            clamp: desc.depth_bias_clamp,
        },
        multisample: desc.multisample,
    }
}

pub(super) fn compare_function(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

pub(super) fn depth_stencil(desc: &DepthStencilDescriptor) -> WgpuDepthStencil {
    WgpuDepthStencil {
        depth_write_enabled: desc.depth_test && desc.depth_write,
        depth_compare: if desc.depth_test {
            compare_function(desc.depth_compare)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: desc.stencil,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// `border` is whether the device supports `ClampToBorder`; clamp-to-edge stands in otherwise.
pub(super) fn sampler(desc: &SamplerDescriptor, border: bool) -> wgpu::SamplerDescriptor<'static> {
    let (address_mode, border_color) = match desc.address_mode {
        AddressMode::Wrap => (wgpu::AddressMode::Repeat, None),
        AddressMode::Mirror => (wgpu::AddressMode::MirrorRepeat, None),
        AddressMode::Clamp => (wgpu::AddressMode::ClampToEdge, None),
        AddressMode::Border if border => (
            wgpu::AddressMode::ClampToBorder,
            Some(wgpu::SamplerBorderColor::TransparentBlack),
        ),
        AddressMode::Border => (wgpu::AddressMode::ClampToEdge, None),
    };
    let min_filter = filter_mode(desc.min_filter);
    let mag_filter = filter_mode(desc.mag_filter);
    let mipmap_filter = filter_mode(desc.mipmap_filter);
    //wgpu rejects anisotropy unless every filter is linear
    let all_linear = [min_filter, mag_filter, mipmap_filter]
        .iter()
        .all(|f| *f == wgpu::FilterMode::Linear);
    wgpu::SamplerDescriptor {
        label: None,
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter,
        min_filter,
        mipmap_filter,
        lod_min_clamp: desc.lod_min_clamp.max(0.0),
        lod_max_clamp: desc.lod_max_clamp.clamp(desc.lod_min_clamp.max(0.0), 32.0),
        compare: desc.compare.map(compare_function),
        anisotropy_clamp: if all_linear {
            desc.max_anisotropy.clamp(1, 16)
        } else {
            1
        },
        border_color,
    }
}
