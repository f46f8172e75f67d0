// ==========================================
// 场站过磅管理 - 过磅要求判定规则引擎
// ==========================================
// 规则表按优先级排列，首个命中即停止:
//   1. 许可显式要求过磅      → both / permit
//   2. 许可显式豁免          → 无要求（截断后续规则）
//   3. 作业任务要求过磅      → both / task
//   4. 场站要求过磅          → both / yard_policy
//   5. 车辆显式要求过磅      → both / truck_flag
//   6. 车辆未设置且类别要求  → both / truck_category
//   7. 其余                  → 无要求
// 红线: 纯逻辑，无 I/O；输入实体由调用方预先加载
// ==========================================

use crate::domain::requirement::RequirementDecision;
use crate::domain::types::{RequiredType, RequirementReason, WeighingOverride};
use crate::domain::yard::{EntryPermit, Task, Truck, TruckCategory, Yard};

/// 判定上下文
#[derive(Debug, Clone, Default)]
pub struct RequirementContext {
    pub permit: Option<EntryPermit>, // 本次到访可用的许可
    pub task: Option<Task>,
    pub yard: Option<Yard>,
    pub truck: Option<Truck>,
    pub category: Option<TruckCategory>,
}

/// 规则结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Require(RequirementDecision),
    Exempt,
}

impl RuleOutcome {
    const fn both(reason: RequirementReason) -> Self {
        RuleOutcome::Require(RequirementDecision {
            required_type: RequiredType::Both,
            reason,
        })
    }
}

/// 单条规则
#[derive(Debug, Clone, Copy)]
pub struct RequirementRule {
    pub name: &'static str,
    pub predicate: fn(&RequirementContext) -> bool,
    pub outcome: RuleOutcome,
}

// ==========================================
// 规则谓词
// ==========================================

fn permit_requires(ctx: &RequirementContext) -> bool {
    ctx.permit.as_ref().and_then(|p| p.weighing_required) == Some(true)
}

fn permit_exempts(ctx: &RequirementContext) -> bool {
    ctx.permit.as_ref().and_then(|p| p.weighing_required) == Some(false)
}

fn task_requires(ctx: &RequirementContext) -> bool {
    ctx.task.as_ref().map_or(false, |t| t.weighing)
}

fn yard_requires(ctx: &RequirementContext) -> bool {
    ctx.yard.as_ref().map_or(false, |y| y.weighing_required)
}

fn truck_requires(ctx: &RequirementContext) -> bool {
    ctx.truck
        .as_ref()
        .map_or(false, |t| t.weighing_required == WeighingOverride::Required)
}

// 车辆显式 NotRequired 时不回落到类别
fn category_requires(ctx: &RequirementContext) -> bool {
    let inherits = ctx
        .truck
        .as_ref()
        .map_or(false, |t| t.weighing_required == WeighingOverride::Inherit);
    inherits && ctx.category.as_ref().map_or(false, |c| c.weighing_required)
}

// ==========================================
// RequirementRuleEngine
// ==========================================
pub struct RequirementRuleEngine {
    rules: Vec<RequirementRule>,
}

impl RequirementRuleEngine {
    pub fn new(rules: Vec<RequirementRule>) -> Self {
        Self { rules }
    }

    /// 默认规则表（优先级从高到低）
    pub fn default_rules() -> Vec<RequirementRule> {
        vec![
            RequirementRule {
                name: "permit_required",
                predicate: permit_requires,
                outcome: RuleOutcome::both(RequirementReason::Permit),
            },
            RequirementRule {
                name: "permit_exempt",
                predicate: permit_exempts,
                outcome: RuleOutcome::Exempt,
            },
            RequirementRule {
                name: "task",
                predicate: task_requires,
                outcome: RuleOutcome::both(RequirementReason::Task),
            },
            RequirementRule {
                name: "yard_policy",
                predicate: yard_requires,
                outcome: RuleOutcome::both(RequirementReason::YardPolicy),
            },
            RequirementRule {
                name: "truck_flag",
                predicate: truck_requires,
                outcome: RuleOutcome::both(RequirementReason::TruckFlag),
            },
            RequirementRule {
                name: "truck_category",
                predicate: category_requires,
                outcome: RuleOutcome::both(RequirementReason::TruckCategory),
            },
        ]
    }

    pub fn rules(&self) -> &[RequirementRule] {
        &self.rules
    }

    /// 首个命中的规则
    pub fn first_match(&self, ctx: &RequirementContext) -> Option<&RequirementRule> {
        self.rules.iter().find(|rule| (rule.predicate)(ctx))
    }

    /// 判定过磅要求
    ///
    /// # 返回
    /// - `Some(decision)`: 需要过磅
    /// - `None`: 命中豁免规则或没有规则命中
    pub fn evaluate(&self, ctx: &RequirementContext) -> Option<RequirementDecision> {
        let rule = self.first_match(ctx)?;
        tracing::debug!(rule = rule.name, "过磅规则命中");
        match rule.outcome {
            RuleOutcome::Require(decision) => Some(decision),
            RuleOutcome::Exempt => None,
        }
    }
}

impl Default for RequirementRuleEngine {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
