// ==========================================
// 场站过磅管理 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供上层控制器/命令行调用
// ==========================================

pub mod config_api;
pub mod error;
pub mod weighing_api;

// 重导出核心类型
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use weighing_api::{ManualRequirementRequest, RecordWeighingRequest, WeighingApi};
