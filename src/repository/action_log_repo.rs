// ==========================================
// 场站过磅管理 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 所有写入必须记录
// ==========================================

mod core;
mod queries;


pub use self::core::ActionLogRepository;
pub(crate) use self::core::insert_log_on;
