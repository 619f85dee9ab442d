//! Domain event system: progress reporting out of the tuning loop.
//!
//! The loop publishes events as a run progresses. Front ends (the CLI)
//! subscribe to render progress without the loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::phase::Phase;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A step of the loop began
    StepStarted {
        step: u32,
        phase: Phase,
        timestamp: DateTime<Utc>,
    },

    /// The model answered a think request
    ResponseGenerated {
        model: String,
        tool_calls: usize,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A performance sample was extracted from tool output
    SampleMeasured {
        step: u32,
        seconds: f64,
        /// `None` for the baseline sample
        improvement_ratio: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// The tuning phase advanced
    PhaseChanged {
        from: Phase,
        to: Phase,
        timestamp: DateTime<Utc>,
    },

    /// The run left the Running state
    RunFinished {
        steps: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
