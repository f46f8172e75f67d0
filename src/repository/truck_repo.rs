// ==========================================
// 场站过磅管理 - 车辆/车辆类别数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// trucks.weighing_required 为可空整数，映射为三态 WeighingOverride
// ==========================================

use crate::domain::types::WeighingOverride;
use crate::domain::yard::{Truck, TruckCategory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// 车辆仓储
/// 职责: 管理 trucks / truck_categories 表
pub struct TruckRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TruckRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_truck(row: &Row<'_>) -> rusqlite::Result<Truck> {
        Ok(Truck {
            id: row.get(0)?,
            plate_number: row.get(1)?,
            category_id: row.get(2)?,
            weighing_required: WeighingOverride::from_flag(row.get::<_, Option<bool>>(3)?),
        })
    }

    // ==========================================
    // 车辆类别
    // ==========================================

    pub fn create_category(&self, name: &str, weighing_required: bool) -> RepositoryResult<TruckCategory> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO truck_categories (name, weighing_required) VALUES (?1, ?2)",
            params![name, weighing_required],
        )?;
        Ok(TruckCategory {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            weighing_required,
        })
    }

    pub fn find_category_by_id(&self, id: i64) -> RepositoryResult<Option<TruckCategory>> {
        let conn = self.get_conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, weighing_required FROM truck_categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(TruckCategory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        weighing_required: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    // ==========================================
    // 车辆
    // ==========================================

    pub fn create(
        &self,
        plate_number: &str,
        category_id: Option<i64>,
        weighing_required: WeighingOverride,
    ) -> RepositoryResult<Truck> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO trucks (plate_number, category_id, weighing_required) VALUES (?1, ?2, ?3)",
            params![plate_number, category_id, weighing_required.to_flag()],
        )?;
        Ok(Truck {
            id: conn.last_insert_rowid(),
            plate_number: plate_number.to_string(),
            category_id,
            weighing_required,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Truck>> {
        let conn = self.get_conn()?;
        let truck = conn
            .query_row(
                "SELECT id, plate_number, category_id, weighing_required FROM trucks WHERE id = ?1",
                params![id],
                Self::map_truck,
            )
            .optional()?;
        Ok(truck)
    }

    /// 按车牌查询（车牌不唯一，取最新登记的车辆）
    pub fn find_by_plate(&self, plate_number: &str) -> RepositoryResult<Option<Truck>> {
        let conn = self.get_conn()?;
        let truck = conn
            .query_row(
                r#"
                SELECT id, plate_number, category_id, weighing_required
                FROM trucks
                WHERE plate_number = ?1 COLLATE NOCASE
                ORDER BY id DESC
                LIMIT 1
                "#,
                params![plate_number],
                Self::map_truck,
            )
            .optional()?;
        Ok(truck)
    }

    /// 设置车辆单独过磅标记
    pub fn set_weighing_override(&self, id: i64, value: WeighingOverride) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE trucks SET weighing_required = ?1 WHERE id = ?2",
            params![value.to_flag(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Truck", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> TruckRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        TruckRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_tri_state_round_trip() {
        let repo = setup();
        let category = repo.create_category("重型货车", true).unwrap();

        for value in [
            WeighingOverride::Required,
            WeighingOverride::NotRequired,
            WeighingOverride::Inherit,
        ] {
            let truck = repo.create("B9001XY", Some(category.id), value).unwrap();
            let found = repo.find_by_id(truck.id).unwrap().unwrap();
            assert_eq!(found.weighing_required, value);
        }
    }

    #[test]
    fn test_find_by_plate_latest() {
        let repo = setup();
        repo.create("B9001XY", None, WeighingOverride::Inherit).unwrap();
        let newer = repo.create("B9001XY", None, WeighingOverride::Required).unwrap();

        let found = repo.find_by_plate("b9001xy").unwrap().unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[test]
    fn test_set_override_missing_truck() {
        let repo = setup();
        let err = repo.set_weighing_override(1, WeighingOverride::Required).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
