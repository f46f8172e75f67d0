// ==========================================
// 场站过磅管理 - 场站数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::WeighingPolicy;
use crate::domain::yard::Yard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::get_enum;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const YARD_COLUMNS: &str = "id, name, strict_mode, weighing_policy, weighing_required";

/// 场站仓储
/// 职责: 管理 yards 表
pub struct YardRepository {
    conn: Arc<Mutex<Connection>>,
}

impl YardRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Yard> {
        Ok(Yard {
            id: row.get(0)?,
            name: row.get(1)?,
            strict_mode: row.get(2)?,
            weighing_policy: get_enum(row, 3, WeighingPolicy::from_db_str)?,
            weighing_required: row.get(4)?,
        })
    }

    /// 新建场站，返回带主键的实体
    pub fn create(&self, yard: &Yard) -> RepositoryResult<Yard> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO yards (name, strict_mode, weighing_policy, weighing_required)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                yard.name,
                yard.strict_mode,
                yard.weighing_policy.to_db_str(),
                yard.weighing_required,
            ],
        )?;

        let mut created = yard.clone();
        created.id = conn.last_insert_rowid();
        Ok(created)
    }

    /// 按主键查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Yard>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM yards WHERE id = ?1", YARD_COLUMNS);
        let yard = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(yard)
    }

    /// 查询全部场站
    pub fn list(&self) -> RepositoryResult<Vec<Yard>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM yards ORDER BY id", YARD_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let yards = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(yards)
    }

    /// 更新场站过磅策略
    pub fn update_weighing_settings(
        &self,
        id: i64,
        weighing_policy: WeighingPolicy,
        weighing_required: bool,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE yards SET weighing_policy = ?1, weighing_required = ?2 WHERE id = ?3",
            params![weighing_policy.to_db_str(), weighing_required, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Yard", id));
        }
        Ok(())
    }
}
