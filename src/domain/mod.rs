// ==========================================
// 场站过磅管理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态迁移
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod requirement;
pub mod types;
pub mod weighing;
pub mod yard;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use requirement::{
    InvalidTransition, NewWeighingRequirement, RequirementDecision, RequirementEvent,
    RequirementSummary, WeighingRequirement,
};
pub use types::{
    RequiredType, RequirementReason, RequirementStatus, VisitorStatus, WeighingOverride,
    WeighingPolicy, WeighingType,
};
pub use weighing::{NewWeighing, Weighing, WeighingStatistics, WeighingTypeStatistics};
pub use yard::{EntryPermit, Task, Truck, TruckCategory, Visitor, Yard};
