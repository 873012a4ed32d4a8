//! Best-effort task bookkeeping around capability calls.
//!
//! Recording never changes the outcome of the call it describes: store
//! failures are logged and dropped here, and nothing is returned to the caller.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::{NewTask, TaskId, TaskStatus, TaskStore};

#[derive(Clone)]
pub struct TaskRecorder {
    store: Arc<dyn TaskStore>,
}

impl TaskRecorder {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Opens a `processing` task for `service`. A failed insert yields a
    /// detached handle whose completion does nothing.
    pub async fn begin(&self, service: &'static str, input: Value) -> TaskHandle {
        let id = match self.store.create(NewTask::new(service, input)).await {
            Ok(task) => {
                tracing::debug!("Task {} opened for {}", task.id, service);
                Some(task.id)
            }
            Err(e) => {
                tracing::warn!("Failed to create task record for {}: {}", service, e);
                None
            }
        };

        TaskHandle {
            store: Arc::clone(&self.store),
            service,
            id,
        }
    }

    /// Runs `call` between `begin` and `complete`/`fail`, handing its result
    /// back untouched.
    pub async fn track<T, E, Fut>(&self, service: &'static str, input: Value, call: Fut) -> Result<T, E>
    where
        T: Serialize,
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let handle = self.begin(service, input).await;
        let result = call.await;
        match &result {
            Ok(output) => {
                let output = serde_json::to_value(output)
                    .unwrap_or_else(|e| json!({ "unserializable_output": e.to_string() }));
                handle.complete(output).await;
            }
            Err(e) => handle.fail(e).await,
        }
        result
    }
}

/// An open task. Dropping it before `complete` or `fail` (for instance when
/// the request future is cancelled) marks the task failed in the background.
#[must_use = "a task handle should be completed or failed"]
pub struct TaskHandle {
    store: Arc<dyn TaskStore>,
    service: &'static str,
    id: Option<TaskId>,
}

impl TaskHandle {
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub async fn complete(self, output: Value) {
        self.finish(TaskStatus::Completed, output).await;
    }

    pub async fn fail(self, reason: impl std::fmt::Display) {
        let output = json!({ "error": reason.to_string() });
        self.finish(TaskStatus::Failed, output).await;
    }

    async fn finish(mut self, status: TaskStatus, output: Value) {
        let Some(id) = self.id.take() else {
            return;
        };
        finish_or_warn(self.store.as_ref(), self.service, id, status, output).await;
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("{} task {} abandoned outside a runtime", self.service, id);
            return;
        };

        tracing::warn!("{} task {} dropped before finishing", self.service, id);
        let store = Arc::clone(&self.store);
        let service = self.service;
        runtime.spawn(async move {
            let output = json!({ "error": "cancelled" });
            finish_or_warn(store.as_ref(), service, id, TaskStatus::Failed, output).await;
        });
    }
}

async fn finish_or_warn(
    store: &dyn TaskStore,
    service: &'static str,
    id: TaskId,
    status: TaskStatus,
    output: Value,
) {
    if let Err(e) = store.finish(id, status, output).await {
        tracing::warn!(
            "Failed to mark {} task {} as {}: {}",
            service,
            id,
            status.as_str(),
            e
        );
    }
}
