//! In-memory task store for tests and database-less runs.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{
    check_transition, NewTask, StoreError, StoreResult, Task, TaskId, TaskStatus, TaskStore,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i32,
    tasks: BTreeMap<TaskId, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: TaskId(state.next_id),
            service_name: task.service_name,
            status: TaskStatus::Processing,
            input_data: task.input_data,
            output_data: None,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn finish(&self, id: TaskId, status: TaskStatus, output: Value) -> StoreResult<Task> {
        let mut state = self.state.write().map_err(poisoned)?;
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        check_transition(id, task.status, status)?;
        task.status = status;
        task.output_data = Some(output);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        // Ids are monotonic, so reverse id order is newest first.
        Ok(state.tasks.values().rev().cloned().collect())
    }
}
