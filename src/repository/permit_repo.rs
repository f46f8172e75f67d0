// ==========================================
// 场站过磅管理 - 入场许可数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 有效期/一次性判定在 domain::yard::EntryPermit
// ==========================================

use crate::domain::yard::EntryPermit;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{fmt_date, fmt_datetime, get_date, get_opt_date, get_opt_datetime};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const PERMIT_COLUMNS: &str = "id, yard_id, truck_id, plate_number, begin_date, end_date, \
     one_permission, is_active, used_at, weighing_required";

/// 入场许可仓储
pub struct EntryPermitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EntryPermitRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<EntryPermit> {
        Ok(EntryPermit {
            id: row.get(0)?,
            yard_id: row.get(1)?,
            truck_id: row.get(2)?,
            plate_number: row.get(3)?,
            begin_date: get_date(row, 4)?,
            end_date: get_opt_date(row, 5)?,
            one_permission: row.get(6)?,
            is_active: row.get(7)?,
            used_at: get_opt_datetime(row, 8)?,
            weighing_required: row.get(9)?,
        })
    }

    /// 新建许可（忽略传入的 id）
    pub fn create(&self, permit: &EntryPermit) -> RepositoryResult<EntryPermit> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO entry_permits (
                yard_id, truck_id, plate_number, begin_date, end_date,
                one_permission, is_active, used_at, weighing_required
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                permit.yard_id,
                permit.truck_id,
                permit.plate_number,
                fmt_date(&permit.begin_date),
                permit.end_date.as_ref().map(fmt_date),
                permit.one_permission,
                permit.is_active,
                permit.used_at.as_ref().map(fmt_datetime),
                permit.weighing_required,
            ],
        )?;

        let mut created = permit.clone();
        created.id = conn.last_insert_rowid();
        Ok(created)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<EntryPermit>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM entry_permits WHERE id = ?1", PERMIT_COLUMNS);
        let permit = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(permit)
    }

    /// 查询场站内与车辆或车牌相关的启用许可（最新优先）
    ///
    /// 只做粗筛，有效期判定由调用方完成
    pub fn find_candidates(
        &self,
        yard_id: i64,
        truck_id: Option<i64>,
        plate_number: &str,
    ) -> RepositoryResult<Vec<EntryPermit>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM entry_permits
            WHERE yard_id = ?1
              AND is_active = 1
              AND ((?2 IS NOT NULL AND truck_id = ?2) OR plate_number = ?3 COLLATE NOCASE)
            ORDER BY id DESC
            "#,
            PERMIT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let permits = stmt
            .query_map(params![yard_id, truck_id, plate_number], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(permits)
    }

    /// 标记一次性许可已使用
    ///
    /// 许可已被使用过时返回 OptimisticLockFailure
    pub fn mark_used(&self, id: i64, at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        mark_used_on(&conn, id, at)
    }
}

/// 在给定连接（或事务）上占用许可，仅对尚未使用的许可生效
pub(crate) fn mark_used_on(conn: &Connection, id: i64, at: NaiveDateTime) -> RepositoryResult<()> {
    let rows = conn.execute(
        "UPDATE entry_permits SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
        params![fmt_datetime(&at), id],
    )?;
    if rows == 0 {
        let exists = conn
            .query_row("SELECT 1 FROM entry_permits WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(RepositoryError::not_found("EntryPermit", id));
        }
        return Err(RepositoryError::OptimisticLockFailure {
            entity: "EntryPermit".to_string(),
            id,
            expected_status: "unused".to_string(),
        });
    }
    Ok(())
}
