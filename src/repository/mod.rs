// ==========================================
// 场站过磅管理 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod mapping;
pub mod permit_repo;
pub mod requirement_repo;
pub mod task_repo;
pub mod truck_repo;
pub mod visitor_repo;
pub mod weighing_repo;
pub mod yard_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use permit_repo::EntryPermitRepository;
pub use requirement_repo::WeighingRequirementRepository;
pub use task_repo::TaskRepository;
pub use truck_repo::TruckRepository;
pub use visitor_repo::VisitorRepository;
pub use weighing_repo::WeighingRepository;
pub use yard_repo::YardRepository;
