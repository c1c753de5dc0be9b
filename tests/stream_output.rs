// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Stream-output capture: statistics, waiting, readback, and nesting with other targets.

use nested_binds::imp::headless::{Headless, ObjectKind, QueryLatency};
use nested_binds::imp::{self, Capabilities, FeatureLevel, StreamOutputStatistics};
use nested_binds::pixel_formats::PixelFormat;
use nested_binds::{
    BindableTarget, ColorBuffer, ContextOptions, Error, QueryWait, RenderTarget,
    StreamOutputBuffer, TextureColorBuffer,
};
use std::sync::Arc;
use std::time::Duration;

use test_executors::async_test;

fn statistics(primitives_written: u64) -> StreamOutputStatistics {
    StreamOutputStatistics {
        primitives_written,
        storage_needed: primitives_written,
    }
}

#[test]
fn capture_reports_primitives_and_detaches() {
    let headless = Headless::new();
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 4096));

    capture.clone().bind(&mut context).unwrap();
    let attached = headless.stream_output_target();
    assert_eq!(attached, Some(capture.capture_buffer(context.device()).unwrap().id()));
    assert!(context.active().is_target(&capture));

    headless.set_next_statistics(statistics(48));
    capture.clone().unbind(&mut context).unwrap();
    assert_eq!(capture.primitives_written(context.device()), 48);
    assert_eq!(headless.stream_output_target(), None);
    assert!(context.active_target().is_none());
    assert_eq!(headless.output_targets(), (None, Vec::new()));
}

#[test]
fn overflow_is_visible_in_storage_needed() {
    let headless = Headless::new();
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 64));
    capture.clone().bind(&mut context).unwrap();
    headless.set_next_statistics(StreamOutputStatistics {
        primitives_written: 4,
        storage_needed: 10,
    });
    capture.clone().unbind(&mut context).unwrap();
    let device = context.device();
    assert!(capture.storage_needed(device) > capture.primitives_written(device));
}

#[test]
fn slow_query_is_waited_for() {
    let headless = Headless::new();
    let mut context = headless.context_with_options(ContextOptions {
        query_wait: QueryWait::Timeout(Duration::from_secs(30)),
    });
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 256));
    headless.set_query_latency(QueryLatency::Polls(100));
    headless.set_next_statistics(statistics(7));
    capture.clone().bind(&mut context).unwrap();
    capture.clone().unbind(&mut context).unwrap();
    assert_eq!(capture.primitives_written(context.device()), 7);
}

#[test]
fn lost_query_times_out_but_still_unbinds() {
    let headless = Headless::new();
    let mut context = headless.context_with_options(ContextOptions {
        query_wait: QueryWait::Timeout(Duration::from_millis(10)),
    });
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 256));
    headless.set_query_latency(QueryLatency::Never);
    capture.clone().bind(&mut context).unwrap();

    let result = capture.clone().unbind(&mut context);
    assert!(matches!(result, Err(Error::QueryTimeout(d)) if d == Duration::from_millis(10)));
    assert_eq!(headless.stream_output_target(), None);
    assert!(context.active_target().is_none());
    assert_eq!(capture.primitives_written(context.device()), 0);

    //a second unbind is misuse, not another wait
    assert!(matches!(
        capture.clone().unbind(&mut context),
        Err(Error::NotActive { .. })
    ));
}

#[test]
fn download_reads_back_records() {
    let headless = Headless::new();
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("positions", 32));
    capture.clone().bind(&mut context).unwrap();

    let mut bytes = Vec::new();
    for value in [1.5f32, 2.5, 3.5] {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    assert!(headless.write_stream_output(&bytes));

    //still bound: download unbinds first
    let records: Vec<f32> = capture.download(&mut context).unwrap().unwrap();
    assert!(context.active_target().is_none());
    assert_eq!(records.len(), 8);
    assert_eq!(&records[..3], &[1.5, 2.5, 3.5]);
    assert_eq!(&records[3..], &[0.0; 5]);
    assert_eq!(headless.buffer_copies(), 1);
    assert_eq!(capture.memory_pressure(context.device()), 64);

    //partial trailing record is ignored
    let wide: Vec<[f32; 3]> = capture.download(&mut context).unwrap().unwrap();
    assert_eq!(wide.len(), 2);
    assert_eq!(wide[0], [1.5, 2.5, 3.5]);
}

#[test]
fn download_before_capture_is_none() {
    let headless = Headless::new();
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("positions", 32));
    let records: Option<Vec<u32>> = capture.download(&mut context).unwrap();
    assert!(records.is_none());
    assert_eq!(headless.created(ObjectKind::Buffer), 0);
}

#[async_test]
async fn async_unbind_sleeps_between_polls() {
    let headless = Headless::new();
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 128));
    headless.set_query_latency(QueryLatency::Polls(3));
    headless.set_next_statistics(statistics(5));
    capture.clone().bind(&mut context).unwrap();
    capture.clone().unbind_async(&mut context).await.unwrap();
    assert_eq!(capture.primitives_written(context.device()), 5);
    assert_eq!(headless.stream_output_target(), None);
}

#[test]
fn missing_hardware_support_fails_the_bind() {
    let headless = Headless::with_capabilities(Capabilities {
        feature_level: FeatureLevel::Level10_0,
        stream_output: false,
    });
    let mut context = headless.context();
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 128));
    let result = capture.clone().bind(&mut context);
    assert!(matches!(
        result,
        Err(Error::Native(imp::Error::Unsupported(_)))
    ));
    assert!(context.active_target().is_none());
    assert_eq!(headless.stream_output_target(), None);
}

#[test]
fn nested_capture_reattaches_the_outer_buffer() {
    let headless = Headless::new();
    let mut context = headless.context();
    let outer = Arc::new(StreamOutputBuffer::new("outer", 128));
    let inner = Arc::new(StreamOutputBuffer::new("inner", 128));
    let device = context.device().clone();

    outer.clone().bind(&mut context).unwrap();
    headless.set_next_statistics(statistics(2));
    inner.clone().bind(&mut context).unwrap();
    assert_eq!(
        headless.stream_output_target(),
        Some(inner.capture_buffer(&device).unwrap().id())
    );

    inner.clone().unbind(&mut context).unwrap();
    assert!(context.active().is_target(&outer));
    assert_eq!(
        headless.stream_output_target(),
        Some(outer.capture_buffer(&device).unwrap().id())
    );

    headless.set_next_statistics(statistics(6));
    outer.clone().unbind(&mut context).unwrap();
    assert_eq!(inner.primitives_written(&device), 2);
    assert_eq!(outer.primitives_written(&device), 6);
    assert_eq!(headless.stream_output_target(), None);
}

#[test]
fn capture_inside_a_render_target_restores_its_outputs() {
    let headless = Headless::new();
    let mut context = headless.context();
    let color: Arc<dyn ColorBuffer> = Arc::new(TextureColorBuffer::new(
        "scene",
        PixelFormat::Rgba8Unorm,
        320,
        200,
        1,
        false,
    ));
    let scene = Arc::new(RenderTarget::new(vec![color], None));
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 128));

    scene.clone().bind(&mut context).unwrap();
    let outputs = headless.output_targets();
    capture.clone().bind(&mut context).unwrap();
    assert!(context.active().is_target(&capture));
    assert!(capture.predecessor(context.device()).is_some());

    capture.clone().unbind(&mut context).unwrap();
    assert!(context.active().is_target(&scene));
    assert_eq!(headless.output_targets(), outputs);
    assert_eq!(headless.viewports().len(), 1);
    assert_eq!(headless.stream_output_target(), None);
    scene.unbind(&mut context).unwrap();
}

#[test]
fn unrepresentable_timeout_waits_like_spin() {
    let headless = Headless::new();
    let mut context = headless.context_with_options(ContextOptions {
        query_wait: QueryWait::Timeout(Duration::MAX),
    });
    let capture = Arc::new(StreamOutputBuffer::new("sparks", 64));
    headless.set_query_latency(QueryLatency::Polls(4));
    headless.set_next_statistics(statistics(11));
    capture.clone().bind(&mut context).unwrap();
    capture.clone().unbind(&mut context).unwrap();
    assert_eq!(capture.primitives_written(context.device()), 11);
    assert_eq!(headless.stream_output_target(), None);
}
