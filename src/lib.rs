// Streaming core for a live sensor telemetry dashboard
//
// Consumes timestamped readings over a persistent socket connection and feeds
// a scrolling time-series chart, with memory and chart density bounded by a
// fixed trailing time window per panel.
//
// Architecture:
// - `source`: trait-based stream sources with reconnect (WebSocket, TCP)
// - `parser`: wire-message decoding and identifier/time normalization
// - `window`: sliding time-window buffer with horizon-based eviction
// - `scheduler`: redraw cadence decoupled from arrival rate
// - `panel`: lifecycle, wiring, and cancellation for one chart target

pub mod config;
pub mod panel;
pub mod parser;
pub mod scheduler;
pub mod source;
pub mod types;
pub mod window;

pub use config::PanelConfig;
pub use panel::DashboardPanel;
pub use parser::{normalize_series, SampleParser, TimeOrigin};
pub use scheduler::{ChartSink, ChartUpdate, RedrawCadence};
pub use source::{create_source, SourceConfig, StreamSource};
pub use types::{PanelSize, PanelState, PanelStats, Reading, StreamError, StreamResult};
pub use window::{SlidingWindowBuffer, WindowConfig, WindowStats};
