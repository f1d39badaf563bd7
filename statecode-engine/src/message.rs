//! Resolved send messages and delay parsing.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A fully resolved `<send>`: every dynamic attribute evaluated, the
/// payload assembled. This is what the event-delivery collaborator
/// receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Event name.
    pub event: String,

    /// Send id for cancellation correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_id: Option<String>,

    /// Destination, when the document addresses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Event I/O processor type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Literal content payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Payload assembled from the namelist and the param array.
    /// `Value::Null` when neither contributed anything.
    #[serde(default)]
    pub payload: Value,
}

impl SendMessage {
    /// A bare message carrying only an event name.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            send_id: None,
            target: None,
            event_type: None,
            content: None,
            payload: Value::Null,
        }
    }
}

/// The assembled value of a final state's `<donedata>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DoneDataPayload {
    /// Data-model location receiving the value, when the document names
    /// one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Literal contents or the evaluated expression value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    /// Name/value entries from the param array. `Value::Null` when empty.
    #[serde(default)]
    pub params: Value,
}

/// Parses a delay attribute value into a duration.
///
/// Accepts `"1.5s"`, `"200ms"` and bare numbers (milliseconds). An empty
/// string means no delay.
pub fn parse_delay(value: &str) -> Result<Duration, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Duration::ZERO);
    }

    let (number, millis_per_unit) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1000.0)
    } else {
        (value, 1.0)
    };

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidDelay {
            value: value.to_string(),
            reason: "not a number".to_string(),
        })?;
    if !number.is_finite() || number < 0.0 {
        return Err(EngineError::InvalidDelay {
            value: value.to_string(),
            reason: "negative or non-finite".to_string(),
        });
    }

    Ok(Duration::from_secs_f64(number * millis_per_unit / 1000.0))
}
