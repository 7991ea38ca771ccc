// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event channel from background workers to the runtime.
//!
//! Sequence numbers are owned by the single-threaded runtime, so workers
//! never write the event log directly. They send `(type, data)` pairs
//! through this sink; the runtime drains the channel at tick boundaries,
//! assigns `seq` and timestamps, and appends to the log in arrival order.

use serde_json::Value;
use tokio::sync::mpsc;

/// An event payload emitted by a worker, before sequencing.
pub type WorkerEvent = (String, Value);

/// Cloneable sender handed to every component worker.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventSink {
    /// Create a sink and the runtime-side receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event for the runtime to sequence and append.
    ///
    /// Send failures mean the runtime is gone; the worker is about to be
    /// cancelled anyway, so they are ignored.
    pub fn emit(&self, kind: &str, data: Value) {
        let _ = self.tx.send((kind.to_string(), data));
    }
}
