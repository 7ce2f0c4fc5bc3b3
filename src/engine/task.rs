//! Generation task records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::TierKind;

use super::device::Device;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }
}

/// Category of a terminal task error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The caller pinned a device that is not usable.
    DeviceUnavailable,
    /// Every backend tier failed, or the input was rejected.
    Backend,
    /// Audio was produced but could not be saved.
    Storage,
    /// The worker itself crashed.
    Internal,
}

/// Snapshot of one generation task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<TaskErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<TierKind>,
    pub text_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    /// When the task left `pending`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A fresh `pending` task.
    pub fn new(id: impl Into<String>, text_length: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            output: None,
            error: None,
            error_kind: None,
            device: None,
            device_fallback: None,
            backend: None,
            text_length,
            generation_time_ms: None,
            created_at: now,
            started_at: None,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `pending -> running`. Returns false if the task already left `pending`.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.touch();
        true
    }

    /// Raise progress; never lowers it and ignores terminal tasks.
    pub fn advance(&mut self, progress: u8) {
        if self.status.is_terminal() {
            return;
        }
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.touch();
        }
    }

    /// Record the device a running task resolved to.
    pub fn set_device(&mut self, device: Device, fallback: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.device = Some(device);
        self.device_fallback = fallback;
        self.touch();
    }

    /// Terminal success.
    pub fn complete(&mut self, output: String, backend: TierKind) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Complete;
        self.progress = 100;
        self.output = Some(output);
        self.backend = Some(backend);
        self.generation_time_ms = Some(self.elapsed_ms());
        self.touch();
        true
    }

    /// Terminal failure; progress keeps its last value.
    pub fn fail(&mut self, kind: TaskErrorKind, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Error;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.touch();
        true
    }

    fn elapsed_ms(&self) -> u64 {
        let elapsed = Utc::now() - self.started_at.unwrap_or(self.created_at);
        u64::try_from(elapsed.num_milliseconds()).unwrap_or(0)
    }
}
