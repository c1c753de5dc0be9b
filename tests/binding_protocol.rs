// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The save-and-restore binding protocol for states and targets.

use nested_binds::bindings::state::{CompareFunction, CullMode};
use nested_binds::imp::headless::{Headless, ObjectKind};
use nested_binds::pixel_formats::PixelFormat;
use nested_binds::{
    BindableTarget, BlendState, ColorBuffer, DepthStencilBuffer, DepthStencilState, Error,
    RasterizerState, RenderTarget, TextureColorBuffer,
};
use std::sync::Arc;

fn color(label: &str, width: u32, height: u32) -> Arc<dyn ColorBuffer> {
    Arc::new(TextureColorBuffer::new(
        label,
        PixelFormat::Rgba8Unorm,
        width,
        height,
        1,
        false,
    ))
}

fn target(label: &str) -> Arc<RenderTarget> {
    Arc::new(RenderTarget::new(vec![color(label, 64, 64)], None))
}

#[test]
fn inner_target_restores_outer_outputs() {
    let headless = Headless::new();
    let mut context = headless.context();
    let depth = Arc::new(DepthStencilBuffer::new(64, 64, 1, false));
    let r1 = Arc::new(RenderTarget::new(vec![color("r1", 64, 64)], Some(depth)));
    let r2 = target("r2");

    r1.clone().bind(&mut context).unwrap();
    let r1_outputs = headless.output_targets();
    r2.clone().bind(&mut context).unwrap();
    let predecessor = r2.predecessor(context.device()).unwrap();
    let r1_dyn: Arc<dyn BindableTarget> = r1.clone();
    assert!(Arc::ptr_eq(&predecessor, &r1_dyn));
    drop(predecessor);
    assert_ne!(headless.output_targets(), r1_outputs);

    r2.clone().unbind(&mut context).unwrap();
    assert!(context.active().is_target(&r1));
    assert_eq!(headless.output_targets(), r1_outputs);
    assert!(r2.predecessor(context.device()).is_none());

    r1.clone().unbind(&mut context).unwrap();
    assert!(context.active_target().is_none());
    assert_eq!(headless.output_targets(), (None, Vec::new()));
}

#[test]
fn blend_states_nest() {
    let headless = Headless::new();
    let mut context = headless.context();
    let device = context.device().clone();
    let a = Arc::new(BlendState::default_alpha());
    let b = Arc::new(BlendState::additive());
    let c = Arc::new(BlendState::source_color(true));

    a.bind(&mut context).unwrap();
    b.bind(&mut context).unwrap();
    c.bind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), Some(c.native(&device).unwrap().id()));

    c.unbind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), Some(b.native(&device).unwrap().id()));
    b.unbind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), Some(a.native(&device).unwrap().id()));
    a.unbind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), None);
    assert!(context.active_blend_state().is_none());
}

#[test]
fn rasterizer_states_nest() {
    let headless = Headless::new();
    let mut context = headless.context();
    let solid = Arc::new(RasterizerState::default_state());
    let wire = Arc::new(RasterizerState::configured(CullMode::None, 0.0, true));

    solid.bind(&mut context).unwrap();
    wire.bind(&mut context).unwrap();
    assert!(Arc::ptr_eq(context.active_rasterizer_state().unwrap(), &wire));
    wire.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(context.active_rasterizer_state().unwrap(), &solid));
    solid.unbind(&mut context).unwrap();
    assert!(context.active_rasterizer_state().is_none());
    assert_eq!(headless.rasterizer_state(), None);
}

#[test]
fn depth_stencil_states_nest() {
    let headless = Headless::new();
    let mut context = headless.context();
    let test = Arc::new(DepthStencilState::default_state());
    let read_only = Arc::new(DepthStencilState::configured(
        true,
        CompareFunction::LessEqual,
        true,
    ));

    test.bind(&mut context).unwrap();
    read_only.bind(&mut context).unwrap();
    read_only.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(
        context.active_depth_stencil_state().unwrap(),
        &test
    ));
    test.unbind(&mut context).unwrap();
    assert_eq!(headless.depth_stencil_state(), None);
}

#[test]
fn kinds_do_not_disturb_each_other() {
    let headless = Headless::new();
    let mut context = headless.context();
    let blend = Arc::new(BlendState::default_alpha());
    let rasterizer = Arc::new(RasterizerState::with_cull(CullMode::Front));

    blend.bind(&mut context).unwrap();
    rasterizer.bind(&mut context).unwrap();
    blend.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(
        context.active_rasterizer_state().unwrap(),
        &rasterizer
    ));
    assert!(headless.rasterizer_state().is_some());
    rasterizer.unbind(&mut context).unwrap();
}

#[test]
fn rebinding_the_active_state_keeps_its_predecessor() {
    let headless = Headless::new();
    let mut context = headless.context();
    let device = context.device().clone();
    let outer = Arc::new(BlendState::default_alpha());
    let inner = Arc::new(BlendState::additive());

    outer.bind(&mut context).unwrap();
    inner.bind(&mut context).unwrap();
    inner.bind(&mut context).unwrap();
    assert!(Arc::ptr_eq(&inner.predecessor(&device).unwrap(), &outer));

    inner.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &outer));
}

#[test]
fn rebinding_the_active_target_keeps_its_predecessor() {
    let headless = Headless::new();
    let mut context = headless.context();
    let outer = target("outer");
    let inner = target("inner");

    outer.clone().bind(&mut context).unwrap();
    inner.clone().bind(&mut context).unwrap();
    inner.clone().bind(&mut context).unwrap();
    inner.clone().unbind(&mut context).unwrap();
    assert!(context.active().is_target(&outer));
}

#[test]
fn unbinding_what_is_not_active_fails() {
    let headless = Headless::new();
    let mut context = headless.context();
    let outer = Arc::new(BlendState::default_alpha());
    let inner = Arc::new(BlendState::additive());

    assert!(matches!(
        outer.unbind(&mut context),
        Err(Error::NotActive { kind: "blend", .. })
    ));

    outer.bind(&mut context).unwrap();
    inner.bind(&mut context).unwrap();
    //out of order: the slot is untouched
    assert!(matches!(
        outer.unbind(&mut context),
        Err(Error::NotActive { .. })
    ));
    assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &inner));

    let a = target("a");
    let b = target("b");
    a.clone().bind(&mut context).unwrap();
    b.clone().bind(&mut context).unwrap();
    assert!(matches!(
        a.clone().unbind(&mut context),
        Err(Error::NotActive { .. })
    ));
    assert!(context.active().is_target(&b));
}

#[test]
fn dropped_predecessor_restores_nothing() {
    let headless = Headless::new();
    let mut context = headless.context();
    let outer = Arc::new(BlendState::default_alpha());
    let inner = Arc::new(BlendState::additive());
    outer.bind(&mut context).unwrap();
    inner.bind(&mut context).unwrap();
    drop(outer);
    assert!(inner.predecessor(context.device()).is_none());

    inner.unbind(&mut context).unwrap();
    assert!(context.active_blend_state().is_none());
    assert_eq!(headless.blend_state(), None);

    let outer_target = target("outer");
    let inner_target = target("inner");
    outer_target.clone().bind(&mut context).unwrap();
    inner_target.clone().bind(&mut context).unwrap();
    drop(outer_target);
    inner_target.clone().unbind(&mut context).unwrap();
    assert!(context.active_target().is_none());
    assert_eq!(headless.output_targets(), (None, Vec::new()));
}

#[test]
fn one_restoration_point_per_device() {
    let headless = Headless::new();
    let mut context = headless.context();
    let x = Arc::new(BlendState::source_color(false));
    let a = Arc::new(BlendState::default_alpha());
    let b = Arc::new(BlendState::additive());

    x.bind(&mut context).unwrap();
    a.bind(&mut context).unwrap();
    b.bind(&mut context).unwrap();
    //a's restoration point moves from x to b
    a.bind(&mut context).unwrap();

    a.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &b));
    b.unbind(&mut context).unwrap();
    assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &a));
    a.unbind(&mut context).unwrap();
    //x was lost
    assert!(context.active_blend_state().is_none());
    assert!(x.predecessor(context.device()).is_none());
}

#[test]
fn preload_creates_once() {
    let headless = Headless::new();
    let mut context = headless.context();
    let blend = Arc::new(BlendState::default_alpha());
    blend.preload(&context).unwrap();
    blend.preload(&context).unwrap();
    blend.bind(&mut context).unwrap();
    assert_eq!(headless.created(ObjectKind::BlendState), 1);
    blend.unbind(&mut context).unwrap();

    let depth = Arc::new(DepthStencilBuffer::new(64, 64, 1, false));
    let scene = Arc::new(
        RenderTarget::new(vec![color("scene", 64, 64)], Some(depth))
            .with_rasterizer_state(Arc::new(RasterizerState::default_state())),
    );
    scene.preload(&mut context).unwrap();
    scene.preload(&mut context).unwrap();
    scene.clone().bind(&mut context).unwrap();
    assert_eq!(headless.created(ObjectKind::Texture), 2);
    assert_eq!(headless.created(ObjectKind::View), 2);
    assert_eq!(headless.created(ObjectKind::RasterizerState), 1);
    //preload binds nothing
    assert_eq!(headless.created(ObjectKind::BlendState), 1);
    scene.clone().unbind(&mut context).unwrap();
}

#[test]
fn target_states_unwind_with_their_targets() {
    let headless = Headless::new();
    let mut context = headless.context();
    let device = context.device().clone();
    let solid = Arc::new(RasterizerState::default_state());
    let wire = Arc::new(RasterizerState::configured(CullMode::None, 0.0, true));
    let opaque = Arc::new(DepthStencilState::default_state());

    let world = Arc::new(
        RenderTarget::new(vec![color("world", 64, 64)], None)
            .with_rasterizer_state(solid.clone())
            .with_depth_stencil_state(opaque.clone()),
    );
    let debug = Arc::new(
        RenderTarget::new(vec![color("debug", 64, 64)], None).with_rasterizer_state(wire.clone()),
    );

    world.clone().bind(&mut context).unwrap();
    debug.clone().bind(&mut context).unwrap();
    assert_eq!(
        headless.rasterizer_state(),
        Some(wire.native(&device).unwrap().id())
    );
    assert!(Arc::ptr_eq(
        context.active_depth_stencil_state().unwrap(),
        &opaque
    ));

    debug.clone().unbind(&mut context).unwrap();
    assert!(context.active().is_target(&world));
    assert_eq!(
        headless.rasterizer_state(),
        Some(solid.native(&device).unwrap().id())
    );
    assert!(Arc::ptr_eq(
        context.active_depth_stencil_state().unwrap(),
        &opaque
    ));

    world.clone().unbind(&mut context).unwrap();
    assert!(context.active_rasterizer_state().is_none());
    assert!(context.active_depth_stencil_state().is_none());
    assert_eq!(headless.rasterizer_state(), None);
    assert_eq!(headless.depth_stencil_state(), None);
}

#[test]
fn devices_are_independent_across_threads() {
    let blend = Arc::new(BlendState::default_alpha());
    let additive = Arc::new(BlendState::additive());
    let scene = target("scene");

    std::thread::scope(|scope| {
        for _ in 0..2 {
            let blend = blend.clone();
            let additive = additive.clone();
            let scene = scene.clone();
            scope.spawn(move || {
                let headless = Headless::new();
                let mut context = headless.context();
                for _ in 0..50 {
                    scene.clone().bind(&mut context).unwrap();
                    blend.bind(&mut context).unwrap();
                    additive.bind(&mut context).unwrap();
                    assert!(Arc::ptr_eq(
                        &additive.predecessor(context.device()).unwrap(),
                        &blend
                    ));
                    additive.unbind(&mut context).unwrap();
                    blend.unbind(&mut context).unwrap();
                    scene.clone().unbind(&mut context).unwrap();
                    assert!(context.active_target().is_none());
                }
                assert_eq!(headless.created(ObjectKind::BlendState), 2);
                assert_eq!(headless.created(ObjectKind::Texture), 1);
            });
        }
    });
}

#[test]
fn state_shared_by_nested_targets_restores_the_outer_state() {
    let headless = Headless::new();
    let mut context = headless.context();
    let device = context.device().clone();
    let x = Arc::new(BlendState::source_color(false));
    let shared = Arc::new(BlendState::default_alpha());
    let r1 = Arc::new(
        RenderTarget::new(vec![color("r1", 64, 64)], None).with_blend_state(shared.clone()),
    );
    let r2 = Arc::new(
        RenderTarget::new(vec![color("r2", 64, 64)], None).with_blend_state(shared.clone()),
    );

    x.bind(&mut context).unwrap();
    r1.clone().bind(&mut context).unwrap();
    r2.clone().bind(&mut context).unwrap();
    r2.clone().unbind(&mut context).unwrap();
    assert_eq!(
        headless.blend_state(),
        Some(shared.native(&device).unwrap().id())
    );
    r1.clone().unbind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), Some(x.native(&device).unwrap().id()));
    assert!(Arc::ptr_eq(context.active_blend_state().unwrap(), &x));

    x.unbind(&mut context).unwrap();
    assert_eq!(headless.blend_state(), None);
}

#[test]
fn rebinding_a_target_still_unwinds_its_states() {
    let headless = Headless::new();
    let mut context = headless.context();
    let scene = Arc::new(
        RenderTarget::new(vec![color("scene", 64, 64)], None)
            .with_rasterizer_state(Arc::new(RasterizerState::default_state())),
    );
    scene.clone().bind(&mut context).unwrap();
    scene.clone().bind(&mut context).unwrap();
    scene.clone().unbind(&mut context).unwrap();
    assert!(context.active_rasterizer_state().is_none());
    assert_eq!(headless.rasterizer_state(), None);
    assert!(context.active_target().is_none());
}
