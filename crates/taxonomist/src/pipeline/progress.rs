use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted by the orchestrator during a run.
/// Feedback text is never included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        run_id: String,
        stages: Vec<String>,
        texts: usize,
    },
    StageStarted {
        stage: String,
        index: usize,
        total: usize,
    },
    StageCompleted {
        stage: String,
        outputs: usize,
        elapsed_ms: u64,
    },
    RunCompleted {
        run_id: String,
        elapsed_ms: u64,
    },
    Failed {
        stage: String,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter, the default.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// A progress event stamped with the time it was reported.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

/// Fans progress out to any number of subscribers over a tokio broadcast
/// channel. Events sent while nobody is subscribed are dropped.
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(ProgressUpdate {
            timestamp: Utc::now(),
            event,
        });
    }
}
