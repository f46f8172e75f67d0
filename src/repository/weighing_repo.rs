// ==========================================
// 场站过磅管理 - 过磅记录数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 过磅记录只增不改
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::requirement::WeighingRequirement;
use crate::domain::types::{RequirementStatus, WeighingType};
use crate::domain::weighing::{normalize_weight, NewWeighing, Weighing};
use crate::engine::pairing::{PairingKey, WeighingLookup};
use crate::repository::action_log_repo::insert_log_on;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{fmt_date, fmt_datetime, get_datetime, get_decimal, get_enum};
use crate::repository::requirement_repo::update_state_on;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::sync::{Arc, Mutex};

const WEIGHING_COLUMNS: &str = "id, yard_id, plate_number, weighing_type, weight, weighed_at, \
     visitor_id, truck_id, task_id, requirement_id, operator_user_id, notes";

/// 过磅记录仓储
pub struct WeighingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WeighingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Weighing> {
        Ok(Weighing {
            id: row.get(0)?,
            yard_id: row.get(1)?,
            plate_number: row.get(2)?,
            weighing_type: get_enum(row, 3, WeighingType::from_db_str)?,
            weight: get_decimal(row, 4)?,
            weighed_at: get_datetime(row, 5)?,
            visitor_id: row.get(6)?,
            truck_id: row.get(7)?,
            task_id: row.get(8)?,
            requirement_id: row.get(9)?,
            operator_user_id: row.get(10)?,
            notes: row.get(11)?,
        })
    }

    fn insert_on(conn: &Connection, new: &NewWeighing) -> RepositoryResult<Weighing> {
        conn.execute(
            r#"
            INSERT INTO weighings (
                yard_id, plate_number, weighing_type, weight, weighed_at,
                visitor_id, truck_id, task_id, requirement_id, operator_user_id, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                new.yard_id,
                new.plate_number,
                new.weighing_type.to_db_str(),
                normalize_weight(new.weight).to_string(),
                fmt_datetime(&new.weighed_at),
                new.visitor_id,
                new.truck_id,
                new.task_id,
                new.requirement_id,
                new.operator_user_id,
                new.notes,
            ],
        )?;
        Ok(new.clone().into_weighing(conn.last_insert_rowid()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 写入一条不关联过磅要求的称重
    pub fn insert(&self, new: &NewWeighing) -> RepositoryResult<Weighing> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, new)
    }

    /// 在同一事务内写入称重及其操作日志
    pub fn insert_with_audit<G>(&self, new: &NewWeighing, audit: G) -> RepositoryResult<Weighing>
    where
        G: FnOnce(&Weighing) -> ActionLog,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let weighing = Self::insert_on(&tx, new)?;
        insert_log_on(&tx, &audit(&weighing))?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(weighing)
    }

    /// 在同一事务内写入称重、推进过磅要求并写入操作日志
    ///
    /// # 参数
    /// - `new`: 待写入称重
    /// - `expected`: 过磅要求当前应处的状态
    /// - `advance`: 由已落库称重计算推进后的过磅要求
    /// - `audit`: 由已落库称重生成操作日志
    ///
    /// # 返回
    /// 任一步失败整体回滚；状态已被并发修改时返回 OptimisticLockFailure
    pub fn insert_and_advance<F, G>(
        &self,
        new: &NewWeighing,
        expected: RequirementStatus,
        advance: F,
        audit: G,
    ) -> RepositoryResult<(Weighing, WeighingRequirement)>
    where
        F: FnOnce(&Weighing) -> RepositoryResult<WeighingRequirement>,
        G: FnOnce(&Weighing) -> ActionLog,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let weighing = Self::insert_on(&tx, new)?;
        let requirement = advance(&weighing)?;
        update_state_on(&tx, &requirement, expected)?;
        insert_log_on(&tx, &audit(&weighing))?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok((weighing, requirement))
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Weighing>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM weighings WHERE id = ?1", WEIGHING_COLUMNS);
        let weighing = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(weighing)
    }

    /// 场站过磅历史（最新在前）
    pub fn find_history_by_yard(&self, yard_id: i64, limit: usize) -> RepositoryResult<Vec<Weighing>> {
        self.query_list(
            "yard_id = ?1 ORDER BY weighed_at DESC, id DESC LIMIT ?2",
            &[&yard_id, &(limit as i64)],
        )
    }

    /// 车辆过磅历史（最新在前）
    pub fn find_history_by_truck(&self, truck_id: i64, limit: usize) -> RepositoryResult<Vec<Weighing>> {
        self.query_list(
            "truck_id = ?1 ORDER BY weighed_at DESC, id DESC LIMIT ?2",
            &[&truck_id, &(limit as i64)],
        )
    }

    /// 场站在日期区间内（含两端）的全部称重，按时间正序
    pub fn find_in_range(
        &self,
        yard_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<Weighing>> {
        let from = fmt_date(&from);
        let to = fmt_date(&to);
        self.query_list(
            "yard_id = ?1 AND date(weighed_at) BETWEEN ?2 AND ?3 ORDER BY weighed_at ASC, id ASC",
            &[&yard_id, &from, &to],
        )
    }

    fn query_list(&self, condition: &str, args: &[&dyn ToSql]) -> RepositoryResult<Vec<Weighing>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM weighings WHERE {}", WEIGHING_COLUMNS, condition);
        let mut stmt = conn.prepare(&sql)?;
        let weighings = stmt
            .query_map(args, Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(weighings)
    }
}

// ==========================================
// 配对查找
// ==========================================
// 同一键下有多条候选时取时间上最接近的一条
impl WeighingLookup for WeighingRepository {
    fn find_opposite(
        &self,
        weighing: &Weighing,
        key: &PairingKey,
        opposite: WeighingType,
    ) -> RepositoryResult<Option<Weighing>> {
        let conn = self.get_conn()?;
        let opposite = opposite.to_db_str();
        let anchor = fmt_datetime(&weighing.weighed_at);

        let (condition, key_args): (&str, Vec<Box<dyn ToSql>>) = match key {
            PairingKey::Requirement(requirement_id) => {
                ("requirement_id = ?3", vec![Box::new(*requirement_id) as Box<dyn ToSql>])
            }
            PairingKey::Visitor(visitor_id) => ("visitor_id = ?3", vec![Box::new(*visitor_id) as Box<dyn ToSql>]),
            PairingKey::TruckAndDay { truck_id, yard_id, day } => (
                "truck_id = ?3 AND yard_id = ?4 AND date(weighed_at) = ?5",
                vec![
                    Box::new(*truck_id) as Box<dyn ToSql>,
                    Box::new(*yard_id),
                    Box::new(fmt_date(day)),
                ],
            ),
            PairingKey::PlateAndDay {
                plate_number,
                yard_id,
                day,
            } => (
                "plate_number = ?3 COLLATE NOCASE AND yard_id = ?4 AND date(weighed_at) = ?5",
                vec![
                    Box::new(plate_number.clone()) as Box<dyn ToSql>,
                    Box::new(*yard_id),
                    Box::new(fmt_date(day)),
                ],
            ),
        };

        let sql = format!(
            r#"
            SELECT {}
            FROM weighings
            WHERE id != ?1 AND weighing_type = ?2 AND {}
            ORDER BY ABS(julianday(weighed_at) - julianday(?{})) ASC, id ASC
            LIMIT 1
            "#,
            WEIGHING_COLUMNS,
            condition,
            key_args.len() + 3
        );

        let mut args: Vec<&dyn ToSql> = vec![&weighing.id as &dyn ToSql, &opposite];
        args.extend(key_args.iter().map(|a| &**a));
        args.push(&anchor);

        let paired = conn
            .query_row(&sql, args.as_slice(), Self::map_row)
            .optional()?;
        Ok(paired)
    }
}
