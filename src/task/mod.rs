//! Task records: one row per capability invocation and its outcome.

pub mod memory;
pub mod postgres;
pub mod recorder;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, StoreKind};

pub use memory::InMemoryTaskStore;
pub use postgres::PostgresTaskStore;
pub use recorder::{TaskHandle, TaskRecorder};

/// Storage-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(StoreError::persistence(UnknownStatus(other.to_string()))),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown task status '{0}'")]
pub struct UnknownStatus(String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub service_name: String,
    pub status: TaskStatus,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task about to be inserted; the store assigns id, status and timestamps.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub service_name: String,
    pub input_data: Value,
}

impl NewTask {
    pub fn new(service_name: impl Into<String>, input_data: Value) -> Self {
        Self {
            service_name: service_name.into(),
            input_data,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TaskId,
        from: &'static str,
        to: &'static str,
    },

    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for task records.
///
/// A task is created in `processing` and moves exactly once to `completed`
/// or `failed`; implementations reject any other transition with
/// [`StoreError::InvalidTransition`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a new task in `processing` state.
    async fn create(&self, task: NewTask) -> StoreResult<Task>;

    /// Moves a `processing` task to a terminal status and records its output.
    async fn finish(&self, id: TaskId, status: TaskStatus, output: Value) -> StoreResult<Task>;

    async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>>;

    /// All tasks, newest first.
    async fn list(&self) -> StoreResult<Vec<Task>>;
}

/// Opens the store selected by `TASK_STORE`.
pub async fn open_store(config: &Config) -> StoreResult<Arc<dyn TaskStore>> {
    match config.store {
        StoreKind::Postgres => Ok(Arc::new(PostgresTaskStore::connect(&config.database).await?)),
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory task store; tasks are lost on restart");
            Ok(Arc::new(InMemoryTaskStore::new()))
        }
    }
}

/// Shared guard for the terminal transition, used by every store.
pub(crate) fn check_transition(id: TaskId, from: TaskStatus, to: TaskStatus) -> StoreResult<()> {
    if from == TaskStatus::Processing && to.is_terminal() {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id,
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}
