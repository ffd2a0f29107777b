// Render scheduling
//
// Decouples bursty message arrival from chart redraws. Each tick evicts
// expired readings, takes a snapshot, and hands it to the chart sink along
// with the remove predicate and the current container size. A sink failure is
// logged and the next tick proceeds; one bad frame never stops the stream.

use crate::parser::TimeOrigin;
use crate::types::{PanelSize, Reading, StreamResult};
use crate::window::SlidingWindowBuffer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// How redraws are driven
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "interval_ms")]
pub enum RedrawCadence {
    /// Redraw whenever the ingestion path signals a new reading.
    /// Fine for low-rate streams (a probe reporting every few seconds).
    #[serde(rename = "on-arrival")]
    OnArrival,

    /// Redraw on a fixed timer tick, draining whatever accumulated since the
    /// last one. The right choice when arrival rate outpaces redraw cost.
    #[serde(rename = "interval")]
    Interval(u64),
}

impl Default for RedrawCadence {
    fn default() -> Self {
        Self::Interval(50)
    }
}

/// One frame handed to the chart: the visible rows plus the remove predicate
/// (`time < drop_before`) that mirrors the buffer's own eviction rule, so the
/// chart and the buffer never disagree on the window.
#[derive(Debug, Clone)]
pub struct ChartUpdate {
    pub rows: Vec<Reading>,
    pub drop_before: f64,
    pub size: Option<PanelSize>,
}

/// External collaborator that draws a frame
pub trait ChartSink: Send {
    fn render(&mut self, update: ChartUpdate) -> StreamResult<()>;
}

/// Drives chart redraws for one panel
pub struct RenderScheduler {
    buffer: Arc<SlidingWindowBuffer>,
    origin: TimeOrigin,
    cadence: RedrawCadence,
    ready: Arc<Notify>,
    arrival: Arc<Notify>,
    size_rx: Option<watch::Receiver<PanelSize>>,
    cancel: CancellationToken,
    frames_rendered: Arc<AtomicU64>,
    render_failures: Arc<AtomicU64>,
}

impl RenderScheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        buffer: Arc<SlidingWindowBuffer>,
        origin: TimeOrigin,
        cadence: RedrawCadence,
        ready: Arc<Notify>,
        arrival: Arc<Notify>,
        size_rx: Option<watch::Receiver<PanelSize>>,
        cancel: CancellationToken,
        frames_rendered: Arc<AtomicU64>,
        render_failures: Arc<AtomicU64>,
    ) -> Self {
        Self {
            buffer,
            origin,
            cadence,
            ready,
            arrival,
            size_rx,
            cancel,
            frames_rendered,
            render_failures,
        }
    }

    /// Run until cancelled. The first frame waits for the ingestion path to
    /// signal readiness (minimum sample count reached); after cancellation no
    /// further tick starts, and an in-flight tick completes before return.
    pub async fn run(self, mut sink: Box<dyn ChartSink>) {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                log::info!("Render scheduler cancelled before first frame");
                return;
            }

            _ = self.ready.notified() => {}
        }

        match self.cadence {
            RedrawCadence::Interval(ms) => {
                let mut tick = interval(Duration::from_millis(ms));

                loop {
                    tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => break,

                        _ = tick.tick() => self.render_frame(sink.as_mut()),
                    }
                }
            }
            RedrawCadence::OnArrival => loop {
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => break,

                    _ = self.arrival.notified() => self.render_frame(sink.as_mut()),
                }
            },
        }

        log::info!("Render scheduler stopped");
    }

    fn render_frame(&self, sink: &mut dyn ChartSink) {
        let now = self.origin.now();

        // Evict before snapshotting so the frame never carries expired rows
        self.buffer.evict(now);
        let rows = self.buffer.snapshot();

        let update = ChartUpdate {
            rows,
            drop_before: now - self.buffer.horizon_secs(),
            size: self.size_rx.as_ref().map(|rx| *rx.borrow()),
        };

        match sink.render(update) {
            Ok(()) => {
                self.frames_rendered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.render_failures.fetch_add(1, Ordering::Relaxed);
                log::error!("Chart render failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Reading, StreamError};
    use crate::window::WindowConfig;
    use parking_lot::Mutex;

    struct RecordingSink {
        frames: Arc<Mutex<Vec<ChartUpdate>>>,
        fail_on: Option<usize>,
        calls: usize,
    }

    impl ChartSink for RecordingSink {
        fn render(&mut self, update: ChartUpdate) -> StreamResult<()> {
            self.calls += 1;
            if self.fail_on == Some(self.calls) {
                return Err(StreamError::Render("sink exploded".into()));
            }
            self.frames.lock().push(update);
            Ok(())
        }
    }

    fn scheduler_parts(
        horizon_secs: f64,
        cadence: RedrawCadence,
    ) -> (
        Arc<SlidingWindowBuffer>,
        Arc<Notify>,
        Arc<Notify>,
        CancellationToken,
        Arc<AtomicU64>,
        Arc<AtomicU64>,
        RenderScheduler,
    ) {
        let buffer = Arc::new(SlidingWindowBuffer::new(WindowConfig {
            horizon_secs,
            reorder_tolerance: 0.0,
        }));
        let ready = Arc::new(Notify::new());
        let arrival = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let frames = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));

        let scheduler = RenderScheduler::new(
            Arc::clone(&buffer),
            TimeOrigin::Epoch,
            cadence,
            Arc::clone(&ready),
            Arc::clone(&arrival),
            None,
            cancel.clone(),
            Arc::clone(&frames),
            Arc::clone(&failures),
        );

        (buffer, ready, arrival, cancel, frames, failures, scheduler)
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_ticking() {
        let (buffer, ready, _arrival, cancel, frames, failures, scheduler) =
            scheduler_parts(3600.0, RedrawCadence::Interval(10));

        buffer.insert(Reading::new(crate::types::epoch_secs(), "adc0", 0.5));

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            frames: Arc::clone(&rendered),
            fail_on: Some(2),
            calls: 0,
        };

        let handle = tokio::spawn(scheduler.run(Box::new(sink)));
        ready.notify_one();

        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(failures.load(Ordering::Relaxed), 1);
        assert!(frames.load(Ordering::Relaxed) >= 3);
        assert!(rendered.lock().len() >= 3);
    }

    #[tokio::test]
    async fn test_evicts_before_snapshot() {
        let (buffer, ready, _arrival, cancel, _frames, _failures, scheduler) =
            scheduler_parts(30.0, RedrawCadence::Interval(10));

        let now = crate::types::epoch_secs();
        buffer.insert(Reading::new(now - 120.0, "adc0", 0.1)); // expired
        buffer.insert(Reading::new(now, "adc0", 0.2));

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            frames: Arc::clone(&rendered),
            fail_on: None,
            calls: 0,
        };

        let handle = tokio::spawn(scheduler.run(Box::new(sink)));
        ready.notify_one();

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        let frames = rendered.lock();
        assert!(!frames.is_empty());
        for frame in frames.iter() {
            assert_eq!(frame.rows.len(), 1);
            assert_eq!(frame.rows[0].value, 0.2);
        }
    }

    #[tokio::test]
    async fn test_no_frame_before_ready_or_after_cancel() {
        let (_buffer, ready, _arrival, cancel, frames, _failures, scheduler) =
            scheduler_parts(30.0, RedrawCadence::Interval(5));

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            frames: Arc::clone(&rendered),
            fail_on: None,
            calls: 0,
        };

        let handle = tokio::spawn(scheduler.run(Box::new(sink)));

        // Never signaled ready: no frames no matter how long we wait
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(frames.load(Ordering::Relaxed), 0);

        cancel.cancel();
        handle.await.unwrap();

        // Readiness after cancellation must not start the loop
        ready.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(frames.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_on_arrival_renders_per_signal() {
        let (buffer, ready, arrival, cancel, frames, _failures, scheduler) =
            scheduler_parts(3600.0, RedrawCadence::OnArrival);

        buffer.insert(Reading::new(crate::types::epoch_secs(), "adc0", 1.0));

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            frames: Arc::clone(&rendered),
            fail_on: None,
            calls: 0,
        };

        let handle = tokio::spawn(scheduler.run(Box::new(sink)));
        ready.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;

        arrival.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(frames.load(Ordering::Relaxed), 1);

        arrival.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(frames.load(Ordering::Relaxed), 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}
