// ==========================================
// 场站过磅管理 - 访客数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::VisitorStatus;
use crate::domain::yard::Visitor;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{fmt_datetime, get_datetime, get_enum, get_opt_datetime};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const VISITOR_COLUMNS: &str =
    "id, plate_number, yard_id, truck_id, task_id, entry_date, exit_date, status, confidence";

/// 访客仓储
pub struct VisitorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VisitorRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Visitor> {
        Ok(Visitor {
            id: row.get(0)?,
            plate_number: row.get(1)?,
            yard_id: row.get(2)?,
            truck_id: row.get(3)?,
            task_id: row.get(4)?,
            entry_date: get_datetime(row, 5)?,
            exit_date: get_opt_datetime(row, 6)?,
            status: get_enum(row, 7, VisitorStatus::from_db_str)?,
            confidence: row.get(8)?,
        })
    }

    /// 登记到访（忽略传入的 id）
    pub fn create(&self, visitor: &Visitor) -> RepositoryResult<Visitor> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO visitors (
                plate_number, yard_id, truck_id, task_id,
                entry_date, exit_date, status, confidence
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                visitor.plate_number,
                visitor.yard_id,
                visitor.truck_id,
                visitor.task_id,
                fmt_datetime(&visitor.entry_date),
                visitor.exit_date.as_ref().map(fmt_datetime),
                visitor.status.to_db_str(),
                visitor.confidence,
            ],
        )?;

        let mut created = visitor.clone();
        created.id = conn.last_insert_rowid();
        Ok(created)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Visitor>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM visitors WHERE id = ?1", VISITOR_COLUMNS);
        let visitor = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(visitor)
    }

    /// 更新识别确认状态
    pub fn update_status(&self, id: i64, status: VisitorStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE visitors SET status = ?1 WHERE id = ?2",
            params![status.to_db_str(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Visitor", id));
        }
        Ok(())
    }

    /// 记录离场时间
    pub fn record_exit(&self, id: i64, at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE visitors SET exit_date = ?1 WHERE id = ?2",
            params![fmt_datetime(&at), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Visitor", id));
        }
        Ok(())
    }
}
