// Panel configuration
//
// Invalid configuration is the only fatal error class: it is caught here,
// before any stream is opened. Everything after steady-state startup recovers
// locally.

use crate::parser::TimeOrigin;
use crate::scheduler::RedrawCadence;
use crate::source::SourceConfig;
use crate::types::{StreamError, StreamResult};
use crate::window::WindowConfig;
use serde::{Deserialize, Serialize};

/// Configuration for one dashboard panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Identifier used in logs and events
    pub panel_id: String,

    pub source: SourceConfig,

    pub window: WindowConfig,

    pub cadence: RedrawCadence,

    /// Readings to buffer before the first redraw
    pub min_ready_samples: usize,

    /// Time base for incoming timestamps
    pub origin: TimeOrigin,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            panel_id: uuid::Uuid::new_v4().to_string(),
            source: SourceConfig::WebSocket {
                url: String::new(),
            },
            window: WindowConfig::default(),
            cadence: RedrawCadence::default(),
            min_ready_samples: 1,
            origin: TimeOrigin::Epoch,
        }
    }
}

impl PanelConfig {
    /// Check the configuration before any stream is opened
    pub fn validate(&self) -> StreamResult<()> {
        if !self.window.horizon_secs.is_finite() || self.window.horizon_secs <= 0.0 {
            return Err(StreamError::InvalidConfig(format!(
                "Window horizon must be a positive number of seconds, got {}",
                self.window.horizon_secs
            )));
        }

        if !self.window.reorder_tolerance.is_finite() || self.window.reorder_tolerance < 0.0 {
            return Err(StreamError::InvalidConfig(format!(
                "Reorder tolerance must be non-negative, got {}",
                self.window.reorder_tolerance
            )));
        }

        if let RedrawCadence::Interval(0) = self.cadence {
            return Err(StreamError::InvalidConfig(
                "Redraw interval must be at least 1 ms".into(),
            ));
        }

        self.source.validate()
    }
}
