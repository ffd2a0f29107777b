// Wire-message parsing for sensor streams
//
// Two message shapes are accepted:
// - envelope: {"device": "adc0", "data": {"time": 1709.2, "value": 0.42}}
//   (one reading; the sensor server's per-device broadcast format)
// - batch: [[5.0, "A", 0.3], [5.0, "B", 0.7]]
//   (one reading per [time, series, value] triple)
//
// Malformed input is dropped and counted, never surfaced as an error to the
// ingestion loop. Series identifiers and timestamps are normalized here, once,
// so everything downstream operates on clean field names and a single time base.

use crate::types::{epoch_secs, Reading, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Time base applied to incoming timestamps.
///
/// Fixed when the parser is built and never recomputed per message: buffers,
/// eviction, and the chart all see one consistent clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "start")]
pub enum TimeOrigin {
    /// Keep timestamps as seconds since the Unix epoch
    #[serde(rename = "epoch")]
    Epoch,

    /// Rebase timestamps to seconds since dashboard start
    #[serde(rename = "dashboard-start")]
    DashboardStart(f64),
}

impl Default for TimeOrigin {
    fn default() -> Self {
        Self::Epoch
    }
}

impl TimeOrigin {
    /// Capture a dashboard-start origin at the current instant
    pub fn captured_now() -> Self {
        Self::DashboardStart(epoch_secs())
    }

    /// Map an incoming wall-clock timestamp into this time base
    pub fn rebase(&self, time: f64) -> f64 {
        match self {
            Self::Epoch => time,
            Self::DashboardStart(start) => time - start,
        }
    }

    /// Current time in this time base
    pub fn now(&self) -> f64 {
        self.rebase(epoch_secs())
    }
}

/// Map a raw sensor identifier to a safe chart field name.
///
/// Device names arrive with characters that are illegal in downstream field
/// names (one-wire IDs like `28-0300a279f4d9` carry `-`); every character
/// outside `[A-Za-z0-9_]` becomes `_`. Idempotent.
pub fn normalize_series(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct Sample {
    time: f64,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    device: String,
    data: Sample,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Envelope(Envelope),
    Batch(Vec<serde_json::Value>),
}

/// Converts raw transport payloads into readings
pub struct SampleParser {
    origin: TimeOrigin,
    messages_dropped: AtomicU64,
}

impl SampleParser {
    pub fn new(origin: TimeOrigin) -> Self {
        Self {
            origin,
            messages_dropped: AtomicU64::new(0),
        }
    }

    pub fn origin(&self) -> TimeOrigin {
        self.origin
    }

    /// Messages (or batch entries) dropped as malformed so far
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Parse one raw message into zero or more readings.
    ///
    /// Returns an empty vector on malformed JSON, missing fields, or
    /// non-numeric time/value; the offense is logged and counted, never
    /// surfaced to the caller. A malformed triple inside a batch drops that
    /// triple only.
    pub fn parse(&self, raw: &str) -> Vec<Reading> {
        match self.decode(raw) {
            Ok(readings) => readings,
            Err(e) => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Dropping malformed message: {}", e);
                Vec::new()
            }
        }
    }

    fn decode(&self, raw: &str) -> StreamResult<Vec<Reading>> {
        let message = serde_json::from_str::<WireMessage>(raw)
            .map_err(|e| StreamError::Parse(format!("Unrecognized message shape: {}", e)))?;

        match message {
            WireMessage::Envelope(envelope) => Ok(vec![Reading {
                time: self.origin.rebase(envelope.data.time),
                series: normalize_series(&envelope.device),
                value: envelope.data.value,
            }]),
            WireMessage::Batch(entries) => Ok(entries
                .into_iter()
                .filter_map(|entry| {
                    match serde_json::from_value::<(f64, String, f64)>(entry) {
                        Ok((time, series, value)) => Some(Reading {
                            time: self.origin.rebase(time),
                            series: normalize_series(&series),
                            value,
                        }),
                        Err(e) => {
                            self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                            log::warn!("Dropping malformed batch entry: {}", e);
                            None
                        }
                    }
                })
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_message() {
        let parser = SampleParser::new(TimeOrigin::Epoch);
        let readings =
            parser.parse(r#"{"device": "28-0300a279f4d9", "data": {"time": 1709.2, "value": 21.5}}"#);

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].series, "28_0300a279f4d9");
        assert_eq!(readings[0].time, 1709.2);
        assert_eq!(readings[0].value, 21.5);
    }

    #[test]
    fn test_batch_message() {
        let parser = SampleParser::new(TimeOrigin::Epoch);
        let readings = parser.parse(r#"[[5, "A", 0.3], [5, "B", 0.7]]"#);

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0], Reading::new(5.0, "A", 0.3));
        assert_eq!(readings[1], Reading::new(5.0, "B", 0.7));
    }

    #[test]
    fn test_envelope_missing_data_yields_nothing() {
        let parser = SampleParser::new(TimeOrigin::Epoch);
        assert!(parser.parse(r#"{"device": "X"}"#).is_empty());
        assert_eq!(parser.messages_dropped(), 1);
    }

    #[test]
    fn test_malformed_json_yields_nothing() {
        let parser = SampleParser::new(TimeOrigin::Epoch);
        assert!(parser.parse("not json at all {").is_empty());
        assert!(parser.parse(r#"{"device": "X", "data": {"time": "later", "value": 1}}"#).is_empty());
        assert_eq!(parser.messages_dropped(), 2);
    }

    #[test]
    fn test_bad_batch_entry_drops_that_entry_only() {
        let parser = SampleParser::new(TimeOrigin::Epoch);
        let readings = parser.parse(r#"[[1, "A", 0.1], ["oops", "B"], [2, "C", 0.2]]"#);

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].series, "A");
        assert_eq!(readings[1].series, "C");
        assert_eq!(parser.messages_dropped(), 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_series("28-0300a2:79/f4d9");
        let twice = normalize_series(&once);
        assert_eq!(once, "28_0300a2_79_f4d9");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dashboard_start_origin_rebases_once() {
        let parser = SampleParser::new(TimeOrigin::DashboardStart(100.0));
        let readings = parser.parse(r#"{"device": "adc0", "data": {"time": 130.5, "value": 0.5}}"#);
        assert_eq!(readings[0].time, 30.5);
    }
}
