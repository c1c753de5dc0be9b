// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Per-device caches, dirty tracking and the resources built on them.

use nested_binds::imp::headless::{Headless, ObjectKind};
use nested_binds::imp::{self, Capabilities, FeatureLevel};
use nested_binds::pixel_formats::PixelFormat;
use nested_binds::{
    ConstantBuffer, DepthStencilBuffer, DeviceScopedCache, DirtyByteBuffer, Error, Sampler,
    TextureColorBuffer, memory_pressure,
};
use std::cell::Cell;

#[test]
fn cache_set_get_release() {
    logwise::info_sync!("cache_set_get_release");
    let headless = Headless::new();
    let device = headless.device();
    let cache: DeviceScopedCache<Option<&str>> = DeviceScopedCache::new(None);
    cache.set(&device, Some("X"), 100);
    assert_eq!(cache.get(&device), Some("X"));
    assert_eq!(cache.memory_pressure(&device), 100);
    //other tests allocate concurrently, so only a lower bound holds globally
    assert!(memory_pressure::outstanding() >= 100);
    cache.release(&device);
    assert_eq!(cache.get(&device), None);
    assert_eq!(cache.memory_pressure(&device), 0);
}

#[test]
fn dirty_buffer_updates_only_when_bytes_change() {
    let headless = Headless::new();
    let device = headless.device();
    let buffer: DirtyByteBuffer<u32> = DirtyByteBuffer::new();
    let creates = Cell::new(0);
    let updates = Cell::new(0);
    let materialize = || {
        buffer
            .materialize(
                &device,
                |_| {
                    creates.set(creates.get() + 1);
                    Ok::<_, ()>(7)
                },
                |_, _| {
                    updates.set(updates.get() + 1);
                    Ok(())
                },
            )
            .unwrap()
    };

    buffer.write(0, &1.0f32);
    assert_eq!(materialize(), Some(7));
    assert_eq!((creates.get(), updates.get()), (1, 0));
    assert!(!buffer.is_dirty(&device));

    assert!(!buffer.write(0, &1.0f32));
    materialize();
    assert_eq!((creates.get(), updates.get()), (1, 0));

    assert!(buffer.write(0, &2.0f32));
    assert!(buffer.is_dirty(&device));
    materialize();
    assert_eq!((creates.get(), updates.get()), (1, 1));
}

#[test]
fn growth_preserves_earlier_fields() {
    let headless = Headless::new();
    let mut context = headless.context();
    let parameters = ConstantBuffer::new("material");
    parameters.update(0, &[1.0f32, 2.0, 3.0, 4.0]);
    let small = parameters.buffer(&mut context).unwrap().unwrap();
    let small_len = headless.buffer_contents(&small).unwrap().len();

    //well past the slack, forcing a new native buffer
    parameters.update(small_len + 64, &9u32);
    let grown = parameters.buffer(&mut context).unwrap().unwrap();
    assert_ne!(small, grown);
    let bytes = headless.buffer_contents(&grown).unwrap();
    assert!(bytes.len() > small_len);
    assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    assert_eq!(&bytes[12..16], &4.0f32.to_ne_bytes());
    assert_eq!(&bytes[small_len + 64..small_len + 68], &9u32.to_ne_bytes());
    drop(small);
    assert_eq!(headless.live(ObjectKind::Buffer), 1);
}

#[test]
fn constant_buffer_uploads_lazily_per_device() {
    let first = Headless::new();
    let second = Headless::new();
    let mut a = first.context();
    let mut b = second.context();
    let parameters = ConstantBuffer::new("light");
    parameters.update(0, &[0.5f32; 4]);
    parameters.buffer(&mut a).unwrap();
    parameters.buffer(&mut b).unwrap();

    parameters.update(0, &[0.25f32; 4]);
    assert!(parameters.is_dirty(a.device()));
    assert!(parameters.is_dirty(b.device()));
    parameters.buffer(&mut a).unwrap();
    assert_eq!(first.buffer_updates(), 1);
    assert_eq!(second.buffer_updates(), 0);
    assert!(parameters.is_dirty(b.device()));

    //same bytes again: nothing to upload anywhere
    parameters.update(0, &[0.25f32; 4]);
    parameters.buffer(&mut a).unwrap();
    assert_eq!(first.buffer_updates(), 1);
}

#[test]
fn invalidate_forces_reupload() {
    let headless = Headless::new();
    let mut context = headless.context();
    let parameters = ConstantBuffer::new("fog");
    parameters.update(0, &0.1f32);
    parameters.preload(&mut context).unwrap();
    parameters.invalidate();
    parameters.buffer(&mut context).unwrap();
    assert_eq!(headless.buffer_updates(), 1);
    assert_eq!(headless.created(ObjectKind::Buffer), 1);
}

#[test]
fn dropping_resources_reverses_pressure() {
    let headless = Headless::new();
    let mut context = headless.context();
    let device = context.device().clone();
    let parameters = ConstantBuffer::new("bones");
    parameters.update(0, &[0u8; 64]);
    parameters.preload(&mut context).unwrap();
    let block = parameters.memory_pressure(&device);
    assert!(block >= 64 + 128);

    let color = TextureColorBuffer::new("shadow", PixelFormat::R32Float, 512, 512, 1, false);
    nested_binds::ColorBuffer::preload(&color, &device).unwrap();
    assert_eq!(color.memory_pressure(&device), 512 * 512 * 4);

    drop(parameters);
    drop(color);
    assert_eq!(headless.live(ObjectKind::Buffer), 0);
    assert_eq!(headless.live(ObjectKind::Texture), 0);
    assert_eq!(headless.live(ObjectKind::View), 0);
}

#[test]
fn allocation_failure_propagates() {
    let headless = Headless::new();
    let mut context = headless.context();
    let parameters = ConstantBuffer::new("particles");
    parameters.update(0, &1u32);
    headless.fail_next_allocation();
    let err = parameters.buffer(&mut context).unwrap_err();
    assert!(matches!(
        err,
        Error::Native(imp::Error::OutOfMemory { .. })
    ));
    assert!(parameters.is_dirty(context.device()));
    assert_eq!(parameters.memory_pressure(context.device()), 0);

    //the failure was one-shot
    assert!(parameters.buffer(&mut context).unwrap().is_some());
}

#[test]
fn unsupported_depth_configuration_is_best_effort() {
    let headless = Headless::with_capabilities(Capabilities {
        feature_level: FeatureLevel::Level9_3,
        stream_output: false,
    });
    let device = headless.device();
    let depth = DepthStencilBuffer::new(256, 256, 4, true);
    depth.preload(&device).unwrap();
    assert!(depth.shader_resource_view(&device).unwrap().is_some());
    assert_eq!(headless.live(ObjectKind::Texture), 1);
}

#[test]
fn mips_regenerate_after_drawing() {
    use nested_binds::{BindableTarget, ColorBuffer, RenderTarget};
    use std::sync::Arc;

    let headless = Headless::new();
    let mut context = headless.context();
    let reflection = Arc::new(TextureColorBuffer::new(
        "reflection",
        PixelFormat::Rgba8UnormSrgb,
        128,
        128,
        1,
        true,
    ));
    let as_output: Arc<dyn ColorBuffer> = reflection.clone();
    let target = Arc::new(RenderTarget::new(vec![as_output], None));

    reflection.shader_resource_view(&mut context).unwrap();
    assert_eq!(headless.mip_generations(), 1);
    reflection.shader_resource_view(&mut context).unwrap();
    assert_eq!(headless.mip_generations(), 1);

    target.clone().bind(&mut context).unwrap();
    target.clone().unbind(&mut context).unwrap();
    assert!(reflection.mips_dirty(context.device()));
    reflection.shader_resource_view(&mut context).unwrap();
    assert_eq!(headless.mip_generations(), 2);
}

#[test]
fn preload_is_idempotent() {
    let headless = Headless::new();
    let mut context = headless.context();
    let sampler = Sampler::pcf();
    sampler.preload(&context).unwrap();
    sampler.preload(&context).unwrap();
    assert_eq!(headless.created(ObjectKind::Sampler), 1);

    let parameters = ConstantBuffer::new("camera");
    parameters.update(0, &[0.0f32; 16]);
    parameters.preload(&mut context).unwrap();
    parameters.preload(&mut context).unwrap();
    assert_eq!(headless.created(ObjectKind::Buffer), 1);
    assert_eq!(headless.buffer_updates(), 0);
}

#[test]
fn writes_ending_past_the_limit_change_nothing() {
    use nested_binds::bindings::dirty_tracking::MAX_LEN;

    let headless = Headless::new();
    let mut context = headless.context();
    let parameters = ConstantBuffer::new("c");
    assert!(!parameters.update(usize::MAX - 8, &1.0f32));
    assert!(parameters.buffer(&mut context).unwrap().is_none());

    parameters.update(0, &1.0f32);
    let before = parameters.buffer(&mut context).unwrap().unwrap();
    assert!(!parameters.update(MAX_LEN, &1u8));
    assert!(!parameters.is_dirty(context.device()));
    assert_eq!(parameters.buffer(&mut context).unwrap(), Some(before));

    //ending exactly at the limit is fine
    assert!(parameters.update(MAX_LEN - 4, &2.0f32));
    let grown = parameters.buffer(&mut context).unwrap().unwrap();
    let bytes = headless.buffer_contents(&grown).unwrap();
    assert_eq!(&bytes[MAX_LEN - 4..MAX_LEN], &2.0f32.to_ne_bytes());
}

#[test]
fn multisampled_mips_are_left_stale() {
    let headless = Headless::new();
    let mut context = headless.context();
    let resolve = TextureColorBuffer::new("msaa", PixelFormat::Rgba8Unorm, 64, 64, 4, true);
    assert!(resolve.shader_resource_view(&mut context).is_ok());
    assert_eq!(headless.mip_generations(), 0);
    assert!(!resolve.mips_dirty(context.device()));
}
