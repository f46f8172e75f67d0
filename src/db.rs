// ==========================================
// 场站过磅管理 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 统一建表入口，保证测试库与生产库 schema 一致
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部表结构（幂等）
///
/// weighings 与 weighing_requirements 互相引用，SQLite 允许前向外键
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    yard_id INTEGER,
    target_type TEXT,
    target_id INTEGER,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
CREATE INDEX IF NOT EXISTS idx_action_log_target ON action_log(target_type, target_id);

CREATE TABLE IF NOT EXISTS yards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    strict_mode INTEGER NOT NULL DEFAULT 0,
    weighing_policy TEXT NOT NULL DEFAULT 'none',
    weighing_required INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS truck_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    weighing_required INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS trucks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate_number TEXT NOT NULL,
    category_id INTEGER REFERENCES truck_categories(id),
    -- NULL 表示沿用类别默认
    weighing_required INTEGER
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    yard_id INTEGER REFERENCES yards(id),
    weighing INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS entry_permits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    yard_id INTEGER NOT NULL REFERENCES yards(id),
    truck_id INTEGER REFERENCES trucks(id),
    plate_number TEXT NOT NULL,
    begin_date TEXT NOT NULL,
    end_date TEXT,
    one_permission INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    used_at TEXT,
    weighing_required INTEGER
);

CREATE INDEX IF NOT EXISTS idx_entry_permits_yard ON entry_permits(yard_id, plate_number);

CREATE TABLE IF NOT EXISTS visitors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate_number TEXT NOT NULL,
    yard_id INTEGER REFERENCES yards(id),
    truck_id INTEGER REFERENCES trucks(id),
    task_id INTEGER REFERENCES tasks(id),
    entry_date TEXT NOT NULL,
    exit_date TEXT,
    status TEXT NOT NULL DEFAULT 'confirmed',
    confidence REAL
);

CREATE TABLE IF NOT EXISTS weighing_requirements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    yard_id INTEGER NOT NULL REFERENCES yards(id),
    visitor_id INTEGER REFERENCES visitors(id),
    truck_id INTEGER REFERENCES trucks(id),
    task_id INTEGER REFERENCES tasks(id),
    plate_number TEXT NOT NULL,
    required_type TEXT NOT NULL CHECK (required_type IN ('entry', 'exit', 'both')),
    reason TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    entry_weighing_id INTEGER REFERENCES weighings(id),
    exit_weighing_id INTEGER REFERENCES weighings(id),
    skipped_reason TEXT,
    skipped_by_user_id INTEGER,
    skipped_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requirements_visitor ON weighing_requirements(visitor_id);
CREATE INDEX IF NOT EXISTS idx_requirements_yard_status ON weighing_requirements(yard_id, status);

CREATE TABLE IF NOT EXISTS weighings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    yard_id INTEGER NOT NULL REFERENCES yards(id),
    plate_number TEXT NOT NULL,
    weighing_type TEXT NOT NULL CHECK (weighing_type IN ('entry', 'exit', 'intermediate')),
    -- decimal(10,2)，以文本保存保证精度
    weight TEXT NOT NULL,
    weighed_at TEXT NOT NULL,
    visitor_id INTEGER REFERENCES visitors(id),
    truck_id INTEGER REFERENCES trucks(id),
    task_id INTEGER REFERENCES tasks(id),
    requirement_id INTEGER REFERENCES weighing_requirements(id),
    operator_user_id INTEGER,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_weighings_requirement ON weighings(requirement_id);
CREATE INDEX IF NOT EXISTS idx_weighings_visitor ON weighings(visitor_id);
CREATE INDEX IF NOT EXISTS idx_weighings_truck_day ON weighings(truck_id, yard_id, weighed_at);
CREATE INDEX IF NOT EXISTS idx_weighings_plate_day ON weighings(plate_number, yard_id, weighed_at);
CREATE INDEX IF NOT EXISTS idx_weighings_yard_ts ON weighings(yard_id, weighed_at);

-- 同一过磅要求的进场/出场各只能有一条
CREATE UNIQUE INDEX IF NOT EXISTS uq_weighings_requirement_leg
    ON weighings(requirement_id, weighing_type)
    WHERE requirement_id IS NOT NULL AND weighing_type IN ('entry', 'exit');
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
