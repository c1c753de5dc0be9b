// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Capturing geometry-stage output.

A [`StreamOutputBuffer`] is a fixed-size capture buffer plus a statistics query. Binding it
starts the query and attaches the buffer as the geometry stage's write destination.
Unbinding ends the query and waits for its result, which is the one blocking point of the
binding protocol. How long it waits is set by [`crate::QueryWait`].

```
use nested_binds::{BindableTarget, StreamOutputBuffer};
use nested_binds::imp::StreamOutputStatistics;
use nested_binds::imp::headless::Headless;
use std::sync::Arc;

let headless = Headless::new();
let mut context = headless.context();
let capture = Arc::new(StreamOutputBuffer::new("particles", 1024));
capture.clone().bind(&mut context).unwrap();
headless.set_next_statistics(StreamOutputStatistics { primitives_written: 12, storage_needed: 12 });
capture.clone().unbind(&mut context).unwrap();
assert_eq!(capture.primitives_written(context.device()), 12);
assert!(headless.stream_output_target().is_none());
```
*/

use crate::bindings::c_repr::{CRepr, read_records};
use crate::cache::DeviceScopedCache;
use crate::error::{Error, Result};
use crate::images::context::{DeviceContext, QueryWait};
use crate::images::device::Device;
use crate::images::target::{BindableTarget, TargetLink};
use crate::imp::{
    BufferDescriptor, BufferUsage, NativeBuffer, NativeQuery, QueryKind, StreamOutputStatistics,
};
use crate::sys::time::Instant;
use std::sync::Arc;
use std::time::Duration;

const KIND: &str = "stream-output buffer";

/// Between polls in [`StreamOutputBuffer::unbind_async`].
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(1);

struct Deadline(Option<(Instant, Duration)>);

impl Deadline {
    fn new(wait: QueryWait) -> Self {
        match wait {
            QueryWait::Spin => Deadline(None),
            //a deadline past what the clock can represent never arrives
            QueryWait::Timeout(timeout) => {
                Deadline(Instant::now().checked_add(timeout).map(|at| (at, timeout)))
            }
        }
    }

    fn check(&self) -> Result<()> {
        match self.0 {
            Some((at, timeout)) if Instant::now() >= at => Err(Error::QueryTimeout(timeout)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct StreamOutputBuffer {
    label: String,
    size: u64,
    capture: DeviceScopedCache<Option<NativeBuffer>>,
    staging: DeviceScopedCache<Option<NativeBuffer>>,
    query: DeviceScopedCache<Option<NativeQuery>>,
    statistics: DeviceScopedCache<StreamOutputStatistics>,
    link: TargetLink,
}

impl StreamOutputBuffer {
    /// A capture buffer of `size` bytes.
    pub fn new(label: impl Into<String>, size: u64) -> Self {
        StreamOutputBuffer {
            label: label.into(),
            size,
            capture: DeviceScopedCache::new(None),
            staging: DeviceScopedCache::new(None),
            query: DeviceScopedCache::new(None),
            statistics: DeviceScopedCache::new(StreamOutputStatistics::default()),
            link: TargetLink::new(KIND),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The capture buffer on `device`, created on first use.
    pub fn capture_buffer(&self, device: &Device) -> Result<NativeBuffer> {
        let buffer = self.capture.get_or_try_insert_with(device, || {
            logwise::trace_sync!(
                "creating capture buffer {label} of {size} bytes",
                label = self.label.as_str(),
                size = self.size
            );
            device
                .native()
                .create_buffer(
                    &BufferDescriptor {
                        label: Some(self.label.as_str()),
                        size: self.size,
                        usage: BufferUsage::StreamOutput,
                    },
                    None,
                )
                .map(|buffer| (buffer, self.size))
        })?;
        Ok(buffer)
    }

    fn statistics_query(&self, device: &Device) -> Result<NativeQuery> {
        let query = self.query.get_or_try_insert_with(device, || {
            device
                .native()
                .create_query(QueryKind::StreamOutputStatistics)
                .map(|query| (query, 0))
        })?;
        Ok(query)
    }

    /// Counters from the last completed unbind on `device`; zero while bound.
    pub fn statistics(&self, device: &Device) -> StreamOutputStatistics {
        self.statistics.get(device)
    }

    pub fn primitives_written(&self, device: &Device) -> u64 {
        self.statistics(device).primitives_written
    }

    /// Primitives the stage tried to write, including those that did not fit.
    pub fn storage_needed(&self, device: &Device) -> u64 {
        self.statistics(device).storage_needed
    }

    /// The target this one restores on `device` when unbound, if it is still alive.
    pub fn predecessor(&self, device: &Device) -> Option<Arc<dyn BindableTarget>> {
        self.link.predecessor(device)
    }

    /// [`unbind`](BindableTarget::unbind), but sleeps between polls of the statistics
    /// query instead of spinning.
    pub async fn unbind_async(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let waited = match self.end_query(context)? {
            Some(query) => {
                let deadline = Deadline::new(context.options().query_wait);
                loop {
                    if let Some(statistics) = context.native_mut().query_data(&query) {
                        break Ok(Some(statistics));
                    }
                    if let Err(e) = deadline.check() {
                        break Err(e);
                    }
                    portable_async_sleep::async_sleep(ASYNC_POLL_INTERVAL).await;
                }
            }
            None => Ok(None),
        };
        self.finish_unbind(context, waited)
    }

    /// Copies the captured bytes back to the host as records of `T`.
    ///
    /// Unbinds first if this is the active target. Returns `None` if nothing has ever been
    /// captured on this device. The buffer holds `size / size_of::<T>()` whole records,
    /// however many the stage actually wrote; see
    /// [`primitives_written`](Self::primitives_written).
    pub fn download<T: CRepr>(self: &Arc<Self>, context: &mut DeviceContext) -> Result<Option<Vec<T>>> {
        if context.active().is_target(self) {
            self.clone().unbind(context)?;
        }
        let device = context.device().clone();
        let Some(capture) = self.capture.get(&device) else {
            return Ok(None);
        };
        let staging = self.staging.get_or_try_insert_with(&device, || {
            device
                .native()
                .create_buffer(
                    &BufferDescriptor {
                        label: Some(self.label.as_str()),
                        size: self.size,
                        usage: BufferUsage::Staging,
                    },
                    None,
                )
                .map(|buffer| (buffer, self.size))
        })?;
        let readback = logwise::perfwarn_begin!("stream-output download");
        let native = context.native_mut();
        native.copy_buffer(&capture, &staging)?;
        let mut records = Vec::new();
        native.read_buffer(&staging, &mut |bytes: &[u8]| records = read_records(bytes))?;
        drop(readback);
        Ok(Some(records))
    }

    /// Capture plus staging bytes on `device`.
    pub fn memory_pressure(&self, device: &Device) -> u64 {
        self.capture.memory_pressure(device) + self.staging.memory_pressure(device)
    }

    /// Drops the native buffers and query on `device`.
    pub fn release(&self, device: &Device) {
        self.capture.release(device);
        self.staging.release(device);
        self.query.release(device);
    }

    /// Checks this is active and ends its query.
    fn end_query(self: &Arc<Self>, context: &mut DeviceContext) -> Result<Option<NativeQuery>> {
        if !context.active().is_target(self) {
            return Err(Error::NotActive {
                kind: KIND,
                device: context.device().id(),
            });
        }
        let query = self.query.get(context.device());
        if let Some(query) = &query {
            context.native_mut().end_query(query);
        }
        Ok(query)
    }

    /// Records the counts, detaches, and hands the slot back. A failed wait still unbinds.
    fn finish_unbind(
        self: &Arc<Self>,
        context: &mut DeviceContext,
        waited: Result<Option<StreamOutputStatistics>>,
    ) -> Result<()> {
        let device = context.device().clone();
        match &waited {
            Ok(Some(statistics)) => self.statistics.set(&device, *statistics, 0),
            Ok(None) => {}
            Err(e) => {
                logwise::warn_sync!(
                    "stream-output statistics unavailable for {label}: {e}",
                    label = self.label.as_str(),
                    e = logwise::privacy::LogIt(e)
                );
            }
        }
        context.native_mut().set_stream_output_target(None);
        match self.link.pop(self, context)? {
            Some(predecessor) => predecessor.reinstate(context)?,
            None => context.native_mut().set_output_targets(None, &[]),
        }
        waited.map(drop)
    }
}

impl BindableTarget for StreamOutputBuffer {
    fn bind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        let capture = self.capture_buffer(&device)?;
        let query = self.statistics_query(&device)?;
        self.link.push(self.clone(), context);
        self.statistics.release(&device);
        let native = context.native_mut();
        native.begin_query(&query);
        native.set_stream_output_target(Some(&capture));
        Ok(())
    }

    /// Blocks until the statistics query completes, subject to the context's
    /// [`QueryWait`].
    fn unbind(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let waited = match self.end_query(context)? {
            Some(query) => {
                let deadline = Deadline::new(context.options().query_wait);
                let wait = logwise::perfwarn_begin!("stream-output statistics wait");
                let result = loop {
                    if let Some(statistics) = context.native_mut().query_data(&query) {
                        break Ok(Some(statistics));
                    }
                    if let Err(e) = deadline.check() {
                        break Err(e);
                    }
                    std::hint::spin_loop();
                };
                drop(wait);
                result
            }
            None => Ok(None),
        };
        self.finish_unbind(context, waited)
    }

    fn preload(&self, context: &mut DeviceContext) -> Result<()> {
        let device = context.device().clone();
        self.capture_buffer(&device)?;
        self.statistics_query(&device)?;
        Ok(())
    }

    /// Reattaches the capture buffer. The query has been running throughout.
    fn reinstate(self: Arc<Self>, context: &mut DeviceContext) -> Result<()> {
        let capture = self.capture_buffer(context.device())?;
        context.native_mut().set_stream_output_target(Some(&capture));
        Ok(())
    }
}
