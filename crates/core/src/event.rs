// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log records.
//!
//! Wire format is one JSON object per line:
//! `{"seq":N, "type":"dotted.name", "timestamp":"…", "data":{…}}`.
//! Event types are dotted strings (`runtime.started`, `task.completed`,
//! `coder.transcript`, …); `data` is a free-form JSON map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single entry in the append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Build an event with the current timestamp.
    ///
    /// `data` must serialize to a JSON object; anything else is recorded
    /// under an `"data"` key so the record stays well-formed.
    pub fn new(seq: u64, kind: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self {
            seq,
            kind: kind.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Fetch a string field from the event data.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
