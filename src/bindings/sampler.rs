// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture sampling state.
//!
//! A [`Sampler`] is a description plus a per-device native sampler, created on first use.
//! Samplers are not bound through the predecessor stack; materials fetch the native
//! sampler and attach it alongside their textures.

use crate::bindings::state::CompareFunction;
use crate::cache::DeviceScopedCache;
use crate::error::Result;
use crate::images::context::DeviceContext;
use crate::images::device::Device;
use crate::imp::NativeSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescriptor {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode: AddressMode,
    pub lod_min_clamp: f32,
    /// Zero restricts sampling to the base level.
    pub lod_max_clamp: f32,
    /// Comparison samplers return the result of comparing against a reference value.
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
}

#[derive(Debug)]
pub struct Sampler {
    descriptor: SamplerDescriptor,
    native: DeviceScopedCache<Option<NativeSampler>>,
}

impl Sampler {
    pub fn new(descriptor: SamplerDescriptor) -> Self {
        Sampler {
            descriptor,
            native: DeviceScopedCache::new(None),
        }
    }

    /// Trilinear filtering across the full mip chain.
    pub fn linear_mipmapped(address_mode: AddressMode) -> Self {
        Self::new(SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            compare: None,
            max_anisotropy: 16,
        })
    }

    /// Bilinear filtering of the base level only.
    pub fn linear(address_mode: AddressMode) -> Self {
        Self::new(SamplerDescriptor {
            lod_max_clamp: 0.0,
            ..Self::linear_mipmapped(address_mode).descriptor
        })
    }

    pub fn nearest(address_mode: AddressMode) -> Self {
        Self::new(SamplerDescriptor {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            address_mode,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: None,
            max_anisotropy: 16,
        })
    }

    /// Percentage-closer filtering for shadow maps.
    pub fn pcf() -> Self {
        Self::new(SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            address_mode: AddressMode::Clamp,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: Some(CompareFunction::Less),
            max_anisotropy: 1,
        })
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// The native sampler for `device`, created on first use.
    pub fn native(&self, device: &Device) -> Result<NativeSampler> {
        let sampler = self.native.get_or_try_insert_with(device, || {
            logwise::trace_sync!(
                "creating sampler on device {device}",
                device = logwise::privacy::LogIt(&device.id())
            );
            device
                .native()
                .create_sampler(&self.descriptor)
                .map(|sampler| (sampler, 0))
        })?;
        Ok(sampler)
    }

    pub fn preload(&self, context: &DeviceContext) -> Result<()> {
        self.native(context.device()).map(drop)
    }

    pub fn release(&self, device: &Device) {
        self.native.release(device);
    }
}
