// ==========================================
// 场站过磅管理 - 核心库
// ==========================================
// 职责: 过磅要求判定、称重记录、进出场配对与净重核算
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型与状态机
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 判定规则与配对策略
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    RequiredType, RequirementReason, RequirementStatus, VisitorStatus, WeighingOverride,
    WeighingPolicy, WeighingType,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, EntryPermit, RequirementDecision, Task, Truck, TruckCategory, Visitor,
    Weighing, WeighingRequirement, WeighingStatistics, Yard,
};

// 引擎
pub use engine::{PairingEngine, RequirementRuleEngine};

// API
pub use api::{ApiError, ApiResult, ConfigApi, WeighingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "场站过磅管理";
