// Pluggable stream sources
//
// A `StreamSource` owns one persistent connection to a sensor stream and
// delivers each raw text payload exactly once, in arrival order, into an
// async channel. Sources recover from connection drops themselves with a
// bounded exponential backoff; they return only when the receiving side of
// the channel hangs up (panel teardown).
//
// Current implementations:
// - WebSocket: `ws://<host>/sensors/stream/<device-id>` text frames
// - TCP: newline-delimited JSON, the sensor server's raw broadcast socket

mod tcp;
mod websocket;

use crate::types::{StreamError, StreamResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

pub use tcp::TcpSource;
pub use websocket::WebSocketSource;

/// Configuration for the available source types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// WebSocket connection, one text frame per message
    #[serde(rename = "websocket")]
    WebSocket { url: String },

    /// TCP connection carrying newline-delimited JSON
    #[serde(rename = "tcp")]
    Tcp { host: String, port: u16 },
}

impl SourceConfig {
    pub(crate) fn validate(&self) -> StreamResult<()> {
        match self {
            Self::WebSocket { url } => {
                if !url.starts_with("ws://") && !url.starts_with("wss://") {
                    return Err(StreamError::InvalidConfig(format!(
                        "WebSocket URL must start with ws:// or wss://, got '{}'",
                        url
                    )));
                }
            }
            Self::Tcp { host, port } => {
                if host.is_empty() {
                    return Err(StreamError::InvalidConfig("TCP host is empty".into()));
                }
                if *port == 0 {
                    return Err(StreamError::InvalidConfig("TCP port is 0".into()));
                }
            }
        }
        Ok(())
    }
}

/// Trait for stream sources
///
/// `run` should only return when the receiver side of `sender` is dropped;
/// transport failures are handled internally by reconnecting.
#[async_trait]
pub trait StreamSource: Send {
    /// Connect and deliver raw messages until the receiver hangs up
    async fn run(&mut self, sender: mpsc::Sender<String>) -> StreamResult<()>;

    /// Human-readable endpoint description for logging
    fn describe(&self) -> String;
}

/// Create a source from configuration.
///
/// New source types are registered here, mirroring the config enum.
pub fn create_source(config: &SourceConfig) -> StreamResult<Box<dyn StreamSource>> {
    config.validate()?;

    match config {
        SourceConfig::WebSocket { url } => Ok(Box::new(WebSocketSource::new(url.clone()))),
        SourceConfig::Tcp { host, port } => Ok(Box::new(TcpSource::new(host.clone(), *port))),
    }
}

/// Bounded exponential reconnect backoff, reset after a successful connect
pub(crate) struct Backoff {
    delay: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_millis(250);
    const MAX: Duration = Duration::from_secs(10);

    pub(crate) fn new() -> Self {
        Self {
            delay: Self::INITIAL,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.delay = Self::INITIAL;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(Self::MAX);
        delay
    }

    pub(crate) async fn wait(&mut self) {
        let delay = self.next_delay();
        log::debug!("Reconnect backoff: sleeping {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(SourceConfig::WebSocket {
            url: "ws://localhost:6565/sensors/stream/adc0".into()
        }
        .validate()
        .is_ok());

        assert!(SourceConfig::WebSocket {
            url: "http://localhost/nope".into()
        }
        .validate()
        .is_err());

        assert!(SourceConfig::Tcp {
            host: "".into(),
            port: 5454
        }
        .validate()
        .is_err());

        assert!(SourceConfig::Tcp {
            host: "localhost".into(),
            port: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_config_round_trips_as_tagged_json() {
        let config = SourceConfig::Tcp {
            host: "localhost".into(),
            port: 5454,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""type":"tcp""#));
        assert_eq!(serde_json::from_str::<SourceConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_backoff_doubles_to_cap_and_resets() {
        let mut backoff = Backoff::new();

        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));

        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Backoff::MAX);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Backoff::INITIAL);
    }
}
