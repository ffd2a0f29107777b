// Common types for the dashboard streaming core

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur in the streaming path
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Panel already running")]
    AlreadyRunning,
}

/// One telemetry sample: a timestamped value on a named series.
///
/// `series` is always a normalized identifier (see `parser::normalize_series`);
/// readings carry it ready for use as a chart field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub time: f64,
    pub series: String,
    pub value: f64,
}

impl Reading {
    pub fn new(time: f64, series: impl Into<String>, value: f64) -> Self {
        Self {
            time,
            series: series.into(),
            value,
        }
    }
}

/// Chart container dimensions in pixels, supplied by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSize {
    pub width: u32,
    pub height: u32,
}

/// Current state of a dashboard panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum PanelState {
    /// Panel constructed but not started
    Idle,

    /// Panel is bringing up its stream source
    Connecting,

    /// Panel is ingesting and rendering
    Running { started_at: f64 },

    /// Panel hit an unrecoverable source error
    Error { message: String },

    /// Panel has been stopped
    Stopped,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Counters for a panel's ingestion and render paths
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PanelStats {
    pub readings_received: u64,
    pub messages_dropped: u64,
    pub readings_rejected: u64,
    pub frames_rendered: u64,
    pub render_failures: u64,
    pub buffered_readings: usize,
}

/// Current wall-clock time as seconds since the Unix epoch
pub fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
