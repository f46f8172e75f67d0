// ==========================================
// 场站过磅管理 - 引擎层
// ==========================================
// 职责: 过磅要求判定、进出场配对
// 红线: Engine 不拼 SQL, 判定结果必须带 reason
// ==========================================

pub mod pairing;
pub mod requirement_rules;

// 重导出核心引擎
pub use pairing::{PairingEngine, PairingKey, PairingStrategy, WeighingLookup};
pub use requirement_rules::{
    RequirementContext, RequirementRule, RequirementRuleEngine, RuleOutcome,
};
