// Dashboard panel - wires one stream into one chart
//
// The panel owns the whole pipeline for a single chart target: stream source,
// parser, sliding window, and render scheduler. It manages:
// - Source lifecycle and the ingestion channel
// - Readiness signaling (first redraw waits for a minimum sample count)
// - State and counters
// - Cooperative cancellation via CancellationToken on stop and drop
//
// Ordering: the single ingestion task serializes all inserts for its buffer,
// preserving transport delivery order end to end. Panels are independent; no
// ordering holds across panels.

use crate::config::PanelConfig;
use crate::parser::SampleParser;
use crate::scheduler::{ChartSink, RenderScheduler};
use crate::source::create_source;
use crate::types::{PanelSize, PanelState, PanelStats, StreamError, StreamResult};
use crate::window::SlidingWindowBuffer;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INGEST_CHANNEL_CAPACITY: usize = 256;

pub struct DashboardPanel {
    config: PanelConfig,

    // Pipeline components
    buffer: Arc<SlidingWindowBuffer>,
    parser: Arc<SampleParser>,

    // Coordination
    cancel: CancellationToken,
    ready: Arc<Notify>,
    arrival: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,

    // State
    state: Arc<RwLock<PanelState>>,
    is_running: Arc<AtomicBool>,

    // Counters
    readings_received: Arc<AtomicU64>,
    frames_rendered: Arc<AtomicU64>,
    render_failures: Arc<AtomicU64>,
}

impl DashboardPanel {
    /// Create a panel with an empty window. Fails fast on invalid
    /// configuration; no stream is opened until `start`.
    pub fn new(config: PanelConfig) -> StreamResult<Self> {
        config.validate()?;

        let buffer = Arc::new(SlidingWindowBuffer::new(config.window));
        let parser = Arc::new(SampleParser::new(config.origin));

        Ok(Self {
            config,
            buffer,
            parser,
            cancel: CancellationToken::new(),
            ready: Arc::new(Notify::new()),
            arrival: Arc::new(Notify::new()),
            tasks: Vec::new(),
            state: Arc::new(RwLock::new(PanelState::Idle)),
            is_running: Arc::new(AtomicBool::new(false)),
            readings_received: Arc::new(AtomicU64::new(0)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
            render_failures: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Start the pipeline: source task, ingestion task, render scheduler.
    ///
    /// `size_rx`, when supplied, feeds the current container dimensions into
    /// each frame so the sink can resize the chart.
    pub fn start(
        &mut self,
        sink: Box<dyn ChartSink>,
        size_rx: Option<watch::Receiver<PanelSize>>,
    ) -> StreamResult<()> {
        if self.is_running.load(Ordering::Relaxed) {
            return Err(StreamError::AlreadyRunning);
        }

        let mut source = create_source(&self.config.source)?;
        log::info!(
            "Starting panel {} against {}",
            self.config.panel_id,
            source.describe()
        );

        self.cancel = CancellationToken::new();
        self.set_state(PanelState::Connecting);

        let (tx, rx) = mpsc::channel::<String>(INGEST_CHANNEL_CAPACITY);

        // Source task: owns the connection, retries internally, stops when
        // cancelled or when the ingestion side hangs up
        let cancel = self.cancel.clone();
        let state = Arc::clone(&self.state);
        let panel_id = self.config.panel_id.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                result = source.run(tx) => {
                    if let Err(e) = result {
                        log::error!("Panel {} source failed: {}", panel_id, e);
                        *state.write() = PanelState::Error {
                            message: e.to_string(),
                        };
                    }
                }
                _ = cancel.cancelled() => {
                    log::info!("Panel {} source cancelled", panel_id);
                }
            }
        }));

        // Ingestion task: the single consumer of the channel and the single
        // writer of the buffer
        let ingestion = self.spawn_ingestion(rx);
        self.tasks.push(ingestion);

        // Render scheduler
        let scheduler = RenderScheduler::new(
            Arc::clone(&self.buffer),
            self.config.origin,
            self.config.cadence,
            Arc::clone(&self.ready),
            Arc::clone(&self.arrival),
            size_rx,
            self.cancel.clone(),
            Arc::clone(&self.frames_rendered),
            Arc::clone(&self.render_failures),
        );
        self.tasks.push(tokio::spawn(scheduler.run(sink)));

        if self.config.min_ready_samples == 0 {
            self.ready.notify_one();
        }

        self.is_running.store(true, Ordering::Relaxed);
        self.set_state(PanelState::Running {
            started_at: chrono::Utc::now().timestamp() as f64,
        });

        Ok(())
    }

    fn spawn_ingestion(&self, mut rx: mpsc::Receiver<String>) -> JoinHandle<()> {
        let buffer = Arc::clone(&self.buffer);
        let parser = Arc::clone(&self.parser);
        let ready = Arc::clone(&self.ready);
        let arrival = Arc::clone(&self.arrival);
        let readings_received = Arc::clone(&self.readings_received);
        let min_ready = self.config.min_ready_samples as u64;
        let cancel = self.cancel.clone();
        let panel_id = self.config.panel_id.clone();

        tokio::spawn(async move {
            let mut ready_signaled = false;

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        log::info!("Panel {} ingestion cancelled", panel_id);
                        break;
                    }

                    message = rx.recv() => {
                        let Some(raw) = message else {
                            log::info!("Panel {} source channel closed", panel_id);
                            break;
                        };

                        let mut inserted = false;
                        for reading in parser.parse(&raw) {
                            if buffer.insert(reading) {
                                readings_received.fetch_add(1, Ordering::Relaxed);
                                inserted = true;
                            }
                        }

                        if !inserted {
                            continue;
                        }

                        if !ready_signaled
                            && readings_received.load(Ordering::Relaxed) >= min_ready
                        {
                            ready.notify_one();
                            ready_signaled = true;
                        }

                        arrival.notify_one();
                    }
                }
            }
        })
    }

    /// Stop the panel: cancel all tasks and wait for them to finish.
    /// Idempotent.
    pub async fn stop(&mut self) {
        if !self.is_running.swap(false, Ordering::Relaxed) {
            return;
        }

        log::info!("Stopping panel {}", self.config.panel_id);
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log::warn!("Panel {} task join failed: {}", self.config.panel_id, e);
            }
        }

        self.set_state(PanelState::Stopped);
        log::info!("Panel {} stopped", self.config.panel_id);
    }

    pub fn id(&self) -> &str {
        &self.config.panel_id
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> PanelState {
        self.state.read().clone()
    }

    /// The panel's window. Exposed read-only in practice: consumers take
    /// snapshots, only the ingestion task inserts.
    pub fn buffer(&self) -> &Arc<SlidingWindowBuffer> {
        &self.buffer
    }

    pub fn stats(&self) -> PanelStats {
        PanelStats {
            readings_received: self.readings_received.load(Ordering::Relaxed),
            messages_dropped: self.parser.messages_dropped(),
            readings_rejected: self.buffer.rejected(),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            buffered_readings: self.buffer.len(),
        }
    }

    fn set_state(&self, state: PanelState) {
        *self.state.write() = state;
    }
}

impl Drop for DashboardPanel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceConfig;

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = PanelConfig::default();
        config.source = SourceConfig::WebSocket {
            url: "ws://localhost:6565/sensors/stream/adc0".into(),
        };
        config.window.horizon_secs = -1.0;

        assert!(matches!(
            DashboardPanel::new(config),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_before_start_is_a_noop() {
        let mut config = PanelConfig::default();
        config.source = SourceConfig::WebSocket {
            url: "ws://localhost:6565/sensors/stream/adc0".into(),
        };

        let mut panel = DashboardPanel::new(config).unwrap();
        assert_eq!(panel.state(), PanelState::Idle);
        panel.stop().await;
        assert_eq!(panel.state(), PanelState::Idle);
    }
}
