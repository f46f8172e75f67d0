// ==========================================
// 场站过磅管理 - 过磅要求数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 状态迁移由 domain::requirement 计算，这里只做
// 带期望状态的条件更新（compare-and-swap）
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::requirement::{NewWeighingRequirement, RequirementSummary, WeighingRequirement};
use crate::domain::types::{RequiredType, RequirementReason, RequirementStatus};
use crate::repository::action_log_repo::insert_log_on;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{fmt_date, fmt_datetime, get_datetime, get_decimal, get_enum, get_opt_datetime};
use crate::repository::permit_repo::mark_used_on;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

const REQUIREMENT_COLUMNS: &str = "id, yard_id, visitor_id, truck_id, task_id, plate_number, \
     required_type, reason, status, entry_weighing_id, exit_weighing_id, \
     skipped_reason, skipped_by_user_id, skipped_at, created_at";

/// 过磅要求仓储
pub struct WeighingRequirementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WeighingRequirementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<WeighingRequirement> {
        Ok(WeighingRequirement {
            id: row.get(0)?,
            yard_id: row.get(1)?,
            visitor_id: row.get(2)?,
            truck_id: row.get(3)?,
            task_id: row.get(4)?,
            plate_number: row.get(5)?,
            required_type: get_enum(row, 6, RequiredType::from_db_str)?,
            reason: get_enum(row, 7, RequirementReason::from_db_str)?,
            status: get_enum(row, 8, RequirementStatus::from_db_str)?,
            entry_weighing_id: row.get(9)?,
            exit_weighing_id: row.get(10)?,
            skipped_reason: row.get(11)?,
            skipped_by_user_id: row.get(12)?,
            skipped_at: get_opt_datetime(row, 13)?,
            created_at: get_datetime(row, 14)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 新建过磅要求（初始状态 pending）
    pub fn insert(&self, new: &NewWeighingRequirement) -> RepositoryResult<WeighingRequirement> {
        let conn = self.get_conn()?;
        insert_on(&conn, new)
    }

    /// 在同一事务内新建过磅要求、占用一次性许可并写入操作日志
    ///
    /// # 参数
    /// - `new`: 待新建的过磅要求
    /// - `consumed_permit`: 本次被占用的一次性许可 id
    /// - `audit`: 由已落库的过磅要求生成操作日志
    ///
    /// # 返回
    /// 任一步失败整体回滚；许可已被占用时返回 OptimisticLockFailure
    pub fn insert_with_audit<G>(
        &self,
        new: &NewWeighingRequirement,
        consumed_permit: Option<i64>,
        audit: G,
    ) -> RepositoryResult<WeighingRequirement>
    where
        G: FnOnce(&WeighingRequirement) -> ActionLog,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if let Some(permit_id) = consumed_permit {
            mark_used_on(&tx, permit_id, new.created_at)?;
        }
        let requirement = insert_on(&tx, new)?;
        insert_log_on(&tx, &audit(&requirement))?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(requirement)
    }

    /// 条件更新状态及附带字段
    ///
    /// 仅当库中状态仍为 `expected` 时生效，否则返回 OptimisticLockFailure
    pub fn update_state(
        &self,
        requirement: &WeighingRequirement,
        expected: RequirementStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        update_state_on(&conn, requirement, expected)
    }

    /// 条件更新状态，并在同一事务内写入操作日志
    pub fn update_state_with_audit(
        &self,
        requirement: &WeighingRequirement,
        expected: RequirementStatus,
        log: &ActionLog,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        update_state_on(&tx, requirement, expected)?;
        insert_log_on(&tx, log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<WeighingRequirement>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM weighing_requirements WHERE id = ?1",
            REQUIREMENT_COLUMNS
        );
        let requirement = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(requirement)
    }

    /// 查询访客最新的过磅要求
    pub fn find_by_visitor(&self, visitor_id: i64) -> RepositoryResult<Option<WeighingRequirement>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM weighing_requirements
            WHERE visitor_id = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
            REQUIREMENT_COLUMNS
        );
        let requirement = conn
            .query_row(&sql, params![visitor_id], Self::map_row)
            .optional()?;
        Ok(requirement)
    }

    /// 查询场站内未结束的过磅要求（pending / entry_done）
    pub fn list_open_by_yard(&self, yard_id: i64) -> RepositoryResult<Vec<WeighingRequirement>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM weighing_requirements
            WHERE yard_id = ?1 AND status IN ('pending', 'entry_done')
            ORDER BY created_at ASC, id ASC
            "#,
            REQUIREMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let requirements = stmt
            .query_map(params![yard_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requirements)
    }

    /// 按状态统计场站过磅要求数量
    pub fn count_by_status(&self, yard_id: i64) -> RepositoryResult<RequirementSummary> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT status, COUNT(*)
            FROM weighing_requirements
            WHERE yard_id = ?1
            GROUP BY status
            "#,
        )?;

        let rows = stmt
            .query_map(params![yard_id], |row| {
                Ok((get_enum(row, 0, RequirementStatus::from_db_str)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = RequirementSummary::default();
        for (status, count) in rows {
            summary.add(status, count);
        }
        Ok(summary)
    }

    /// 查询出场日期落在区间内、两条称重均已记录的要求的进/出场重量
    ///
    /// # 返回
    /// (进场重量, 出场重量) 列表
    pub fn find_leg_weights_in_range(
        &self,
        yard_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<(Decimal, Decimal)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT e.weight, x.weight
            FROM weighing_requirements r
            JOIN weighings e ON e.id = r.entry_weighing_id
            JOIN weighings x ON x.id = r.exit_weighing_id
            WHERE r.yard_id = ?1
              AND date(x.weighed_at) BETWEEN ?2 AND ?3
            ORDER BY r.id
            "#,
        )?;
        let pairs = stmt
            .query_map(params![yard_id, fmt_date(&from), fmt_date(&to)], |row| {
                Ok((get_decimal(row, 0)?, get_decimal(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }
}

fn insert_on(conn: &Connection, new: &NewWeighingRequirement) -> RepositoryResult<WeighingRequirement> {
    conn.execute(
        r#"
        INSERT INTO weighing_requirements (
            yard_id, visitor_id, truck_id, task_id, plate_number,
            required_type, reason, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
        params![
            new.yard_id,
            new.visitor_id,
            new.truck_id,
            new.task_id,
            new.plate_number,
            new.required_type.to_db_str(),
            new.reason.to_db_str(),
            RequirementStatus::Pending.to_db_str(),
            fmt_datetime(&new.created_at),
        ],
    )?;

    Ok(new.clone().into_requirement(conn.last_insert_rowid()))
}

/// 在给定连接（或事务）上执行条件更新
pub(crate) fn update_state_on(
    conn: &Connection,
    requirement: &WeighingRequirement,
    expected: RequirementStatus,
) -> RepositoryResult<()> {
    let now = fmt_datetime(&chrono::Local::now().naive_local());
    let rows = conn.execute(
        r#"
        UPDATE weighing_requirements
        SET status = ?1,
            entry_weighing_id = ?2,
            exit_weighing_id = ?3,
            skipped_reason = ?4,
            skipped_by_user_id = ?5,
            skipped_at = ?6,
            updated_at = ?7
        WHERE id = ?8 AND status = ?9
        "#,
        params![
            requirement.status.to_db_str(),
            requirement.entry_weighing_id,
            requirement.exit_weighing_id,
            requirement.skipped_reason,
            requirement.skipped_by_user_id,
            requirement.skipped_at.as_ref().map(fmt_datetime),
            now,
            requirement.id,
            expected.to_db_str(),
        ],
    )?;

    if rows == 0 {
        return Err(RepositoryError::OptimisticLockFailure {
            entity: "WeighingRequirement".to_string(),
            id: requirement.id,
            expected_status: expected.to_string(),
        });
    }
    Ok(())
}
