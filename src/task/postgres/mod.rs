//! `PostgreSQL` task store backed by a diesel r2d2 pool.

mod models;
mod schema;

use async_trait::async_trait;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use serde_json::Value;

use self::models::{NewTaskRow, TaskRow};
use self::schema::tasks;
use super::{
    check_transition, NewTask, StoreError, StoreResult, Task, TaskId, TaskStatus, TaskStore,
};
use crate::config::DatabaseConfig;

pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const CREATE_TASKS_TABLE: &str =
    include_str!("../../../migrations/2024-11-01-000000_create_tasks/up.sql");

/// Process-wide store; clones share the same pool.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    pub fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    /// Builds the pool and makes sure the `tasks` table exists.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        tracing::info!(
            "Connecting to database {} at {}:{}",
            config.name,
            config.host,
            config.port
        );
        Self::connect_url(config.url(), config.pool_size).await
    }

    /// Same as [`connect`](Self::connect) for an already assembled URL.
    pub async fn connect_url(url: String, max_size: u32) -> StoreResult<Self> {
        let pool = tokio::task::spawn_blocking(move || {
            let pool = Pool::builder()
                .max_size(max_size)
                .build(ConnectionManager::<PgConnection>::new(url))
                .map_err(StoreError::persistence)?;
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            connection
                .batch_execute(CREATE_TASKS_TABLE)
                .map_err(StoreError::persistence)?;
            Ok::<_, StoreError>(pool)
        })
        .await
        .map_err(StoreError::persistence)??;

        Ok(Self::new(pool))
    }

    async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(StoreError::persistence)?
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        let row = NewTaskRow {
            service_name: task.service_name,
            status: TaskStatus::Processing.as_str().to_string(),
            input_data: task.input_data,
        };

        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(tasks::table)
                .values(&row)
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            row_to_task(inserted)
        })
        .await
    }

    async fn finish(&self, id: TaskId, status: TaskStatus, output: Value) -> StoreResult<Task> {
        check_transition(id, TaskStatus::Processing, status)?;

        self.run_blocking(move |connection| {
            // The status filter makes the terminal transition a single atomic statement.
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(id.0))
                    .filter(tasks::status.eq(TaskStatus::Processing.as_str())),
            )
            .set((
                tasks::status.eq(status.as_str()),
                tasks::output_data.eq(Some(output)),
                tasks::updated_at.eq(Utc::now()),
            ))
            .returning(TaskRow::as_returning())
            .get_result::<TaskRow>(connection)
            .optional()
            .map_err(StoreError::persistence)?;

            match updated {
                Some(row) => row_to_task(row),
                None => match find_row(connection, id)? {
                    Some(current) => {
                        let from = TaskStatus::try_from(current.status.as_str())?;
                        Err(StoreError::InvalidTransition {
                            id,
                            from: from.as_str(),
                            to: status.as_str(),
                        })
                    }
                    None => Err(StoreError::NotFound(id)),
                },
            }
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.run_blocking(move |connection| find_row(connection, id)?.map(row_to_task).transpose())
            .await
    }

    async fn list(&self) -> StoreResult<Vec<Task>> {
        self.run_blocking(|connection| {
            tasks::table
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }
}

fn find_row(connection: &mut PgConnection, id: TaskId) -> StoreResult<Option<TaskRow>> {
    tasks::table
        .filter(tasks::id.eq(id.0))
        .select(TaskRow::as_select())
        .first::<TaskRow>(connection)
        .optional()
        .map_err(StoreError::persistence)
}

fn row_to_task(row: TaskRow) -> StoreResult<Task> {
    Ok(Task {
        id: TaskId(row.id),
        service_name: row.service_name,
        status: TaskStatus::try_from(row.status.as_str())?,
        input_data: row.input_data,
        output_data: row.output_data,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: 3,
            service_name: "text-to-voice".into(),
            status: status.into(),
            input_data: json!({"text": "hello"}),
            output_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_to_task_maps_fields() {
        let source = row("processing");
        let task = row_to_task(source.clone()).unwrap();
        assert_eq!(task.id, TaskId(3));
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.input_data, source.input_data);
        assert_eq!(task.created_at, source.created_at);
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        assert!(matches!(
            row_to_task(row("archived")),
            Err(StoreError::Persistence(_))
        ));
    }

    #[test]
    fn test_schema_sql_creates_tasks_table() {
        assert!(CREATE_TASKS_TABLE.contains("CREATE TABLE IF NOT EXISTS tasks"));
    }
}
