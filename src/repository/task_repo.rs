// ==========================================
// 场站过磅管理 - 作业任务数据仓储
// ==========================================

use crate::domain::yard::Task;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 作业任务仓储（过磅核心只读 weighing 标记）
pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, name: &str, yard_id: Option<i64>, weighing: bool) -> RepositoryResult<Task> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO tasks (name, yard_id, weighing) VALUES (?1, ?2, ?3)",
            params![name, yard_id, weighing],
        )?;
        Ok(Task {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            yard_id,
            weighing,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Task>> {
        let conn = self.get_conn()?;
        let task = conn
            .query_row(
                "SELECT id, name, yard_id, weighing FROM tasks WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Task {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        yard_id: row.get(2)?,
                        weighing: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(task)
    }
}
