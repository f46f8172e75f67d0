// ==========================================
// 场站过磅管理 - 过磅要求领域模型
// ==========================================
// 状态机: pending → entry_done → completed
//         pending / entry_done → skipped
// completed / skipped 为终态，不接受任何事件
// ==========================================

use crate::domain::types::{RequiredType, RequirementReason, RequirementStatus};
use crate::domain::weighing::Weighing;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// RequirementDecision - 规则判定结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDecision {
    pub required_type: RequiredType,
    pub reason: RequirementReason,
}

// ==========================================
// RequirementEvent - 驱动状态迁移的事件
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RequirementEvent {
    /// 记录了进场称重
    EntryRecorded { weighing_id: i64 },
    /// 记录了出场称重
    ExitRecorded { weighing_id: i64 },
    /// 人工跳过
    Skipped {
        by_user_id: i64,
        reason: String,
        at: NaiveDateTime,
    },
}

impl RequirementEvent {
    fn name(&self) -> &'static str {
        match self {
            RequirementEvent::EntryRecorded { .. } => "entry_recorded",
            RequirementEvent::ExitRecorded { .. } => "exit_recorded",
            RequirementEvent::Skipped { .. } => "skipped",
        }
    }
}

/// 非法状态迁移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: RequirementStatus,
    pub event: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "状态 {} 不接受事件 {}", self.from, self.event)
    }
}

impl std::error::Error for InvalidTransition {}

impl RequirementStatus {
    /// 状态迁移函数
    ///
    /// # 规则
    /// - Pending + 进场 → Completed (仅要求进场) / EntryDone (其余)
    /// - Pending | EntryDone + 出场 → Completed
    /// - Pending | EntryDone + 跳过 → Skipped
    /// - 其余组合均非法（包括重复记录进场）
    pub fn advance(
        self,
        required_type: RequiredType,
        event: &RequirementEvent,
    ) -> Result<RequirementStatus, InvalidTransition> {
        use RequirementStatus::*;

        let next = match (self, event) {
            (Pending, RequirementEvent::EntryRecorded { .. }) => {
                if required_type == RequiredType::Entry {
                    Some(Completed)
                } else {
                    Some(EntryDone)
                }
            }
            (Pending | EntryDone, RequirementEvent::ExitRecorded { .. }) => Some(Completed),
            (Pending | EntryDone, RequirementEvent::Skipped { .. }) => Some(Skipped),
            _ => None,
        };

        next.ok_or(InvalidTransition {
            from: self,
            event: event.name(),
        })
    }
}

// ==========================================
// WeighingRequirement - 过磅要求
// ==========================================
// 对齐: weighing_requirements 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingRequirement {
    pub id: i64,
    pub yard_id: i64,
    pub visitor_id: Option<i64>, // 可脱离访客存在（人工创建）
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub plate_number: String,

    pub required_type: RequiredType,
    pub reason: RequirementReason,
    pub status: RequirementStatus,

    // ===== 已完成的称重环节 =====
    pub entry_weighing_id: Option<i64>,
    pub exit_weighing_id: Option<i64>,

    // ===== 跳过审计 =====
    pub skipped_reason: Option<String>,
    pub skipped_by_user_id: Option<i64>,
    pub skipped_at: Option<NaiveDateTime>,

    pub created_at: NaiveDateTime,
}

impl WeighingRequirement {
    /// 应用事件，迁移状态并写入附带字段
    ///
    /// 迁移非法时实体保持不变
    pub fn apply(&mut self, event: RequirementEvent) -> Result<RequirementStatus, InvalidTransition> {
        let next = self.status.advance(self.required_type, &event)?;

        match event {
            RequirementEvent::EntryRecorded { weighing_id } => {
                self.entry_weighing_id = Some(weighing_id);
            }
            RequirementEvent::ExitRecorded { weighing_id } => {
                self.exit_weighing_id = Some(weighing_id);
            }
            RequirementEvent::Skipped {
                by_user_id,
                reason,
                at,
            } => {
                self.skipped_by_user_id = Some(by_user_id);
                self.skipped_reason = Some(reason);
                self.skipped_at = Some(at);
            }
        }

        self.status = next;
        Ok(next)
    }

    /// 是否还需要进场称重
    pub fn needs_entry_weighing(&self) -> bool {
        self.status == RequirementStatus::Pending && self.required_type.includes_entry()
    }

    /// 是否还需要出场称重
    ///
    /// 要求进出场时，需先完成进场
    pub fn needs_exit_weighing(&self) -> bool {
        match self.required_type {
            RequiredType::Entry => false,
            RequiredType::Exit => self.status == RequirementStatus::Pending,
            RequiredType::Both => self.status == RequirementStatus::EntryDone,
        }
    }

    /// 是否已结束（完成或跳过）
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// 由自身两条称重计算净重差（出场 - 进场）
    ///
    /// 传入的称重必须与本要求记录的 id 一致，否则返回 None
    pub fn weight_difference(&self, entry: &Weighing, exit: &Weighing) -> Option<Decimal> {
        if self.entry_weighing_id != Some(entry.id) || self.exit_weighing_id != Some(exit.id) {
            return None;
        }
        Some(exit.weight - entry.weight)
    }
}

// ==========================================
// NewWeighingRequirement - 待写入的过磅要求
// ==========================================
#[derive(Debug, Clone)]
pub struct NewWeighingRequirement {
    pub yard_id: i64,
    pub visitor_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub plate_number: String,
    pub required_type: RequiredType,
    pub reason: RequirementReason,
    pub created_at: NaiveDateTime,
}

impl NewWeighingRequirement {
    /// 落库后补齐主键，初始状态固定为 pending
    pub fn into_requirement(self, id: i64) -> WeighingRequirement {
        WeighingRequirement {
            id,
            yard_id: self.yard_id,
            visitor_id: self.visitor_id,
            truck_id: self.truck_id,
            task_id: self.task_id,
            plate_number: self.plate_number,
            required_type: self.required_type,
            reason: self.reason,
            status: RequirementStatus::Pending,
            entry_weighing_id: None,
            exit_weighing_id: None,
            skipped_reason: None,
            skipped_by_user_id: None,
            skipped_at: None,
            created_at: self.created_at,
        }
    }
}

/// 各状态的过磅要求数量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub pending: i64,
    pub entry_done: i64,
    pub completed: i64,
    pub skipped: i64,
}

impl RequirementSummary {
    pub fn add(&mut self, status: RequirementStatus, count: i64) {
        match status {
            RequirementStatus::Pending => self.pending += count,
            RequirementStatus::EntryDone => self.entry_done += count,
            RequirementStatus::Completed => self.completed += count,
            RequirementStatus::Skipped => self.skipped += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.entry_done + self.completed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn requirement(required_type: RequiredType) -> WeighingRequirement {
        NewWeighingRequirement {
            yard_id: 1,
            visitor_id: Some(1),
            truck_id: None,
            task_id: None,
            plate_number: "B1234CD".to_string(),
            required_type,
            reason: RequirementReason::YardPolicy,
            created_at: ts(),
        }
        .into_requirement(1)
    }

    fn skip() -> RequirementEvent {
        RequirementEvent::Skipped {
            by_user_id: 7,
            reason: "磅秤故障".to_string(),
            at: ts(),
        }
    }

    #[test]
    fn test_entry_only_completes_on_entry() {
        let mut req = requirement(RequiredType::Entry);
        assert!(req.needs_entry_weighing());
        assert!(!req.needs_exit_weighing());

        let status = req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();
        assert_eq!(status, RequirementStatus::Completed);
        assert_eq!(req.entry_weighing_id, Some(10));
        assert!(req.is_finished());
    }

    #[test]
    fn test_both_goes_through_entry_done() {
        let mut req = requirement(RequiredType::Both);
        req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();
        assert_eq!(req.status, RequirementStatus::EntryDone);
        assert!(req.needs_exit_weighing());

        req.apply(RequirementEvent::ExitRecorded { weighing_id: 11 }).unwrap();
        assert_eq!(req.status, RequirementStatus::Completed);
        assert_eq!(req.exit_weighing_id, Some(11));
    }

    #[test]
    fn test_exit_always_completes() {
        for required_type in [RequiredType::Entry, RequiredType::Exit, RequiredType::Both] {
            let mut req = requirement(required_type);
            let status = req.apply(RequirementEvent::ExitRecorded { weighing_id: 11 }).unwrap();
            assert_eq!(status, RequirementStatus::Completed);
        }
    }

    #[test]
    fn test_exit_only_entry_moves_to_entry_done() {
        let mut req = requirement(RequiredType::Exit);
        assert!(!req.needs_entry_weighing());
        assert!(req.needs_exit_weighing());

        req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();
        assert_eq!(req.status, RequirementStatus::EntryDone);
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut req = requirement(RequiredType::Both);
        req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();

        let err = req
            .apply(RequirementEvent::EntryRecorded { weighing_id: 12 })
            .unwrap_err();
        assert_eq!(err.from, RequirementStatus::EntryDone);
        // 非法迁移不改变实体
        assert_eq!(req.entry_weighing_id, Some(10));
    }

    #[test]
    fn test_skip_from_pending_and_entry_done() {
        let mut req = requirement(RequiredType::Both);
        req.apply(skip()).unwrap();
        assert_eq!(req.status, RequirementStatus::Skipped);
        assert_eq!(req.skipped_by_user_id, Some(7));
        assert_eq!(req.skipped_reason.as_deref(), Some("磅秤故障"));
        assert_eq!(req.skipped_at, Some(ts()));

        let mut req = requirement(RequiredType::Both);
        req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();
        req.apply(skip()).unwrap();
        assert_eq!(req.status, RequirementStatus::Skipped);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        let mut req = requirement(RequiredType::Entry);
        req.apply(RequirementEvent::EntryRecorded { weighing_id: 10 }).unwrap();
        assert!(req.apply(skip()).is_err());
        assert!(req.apply(RequirementEvent::ExitRecorded { weighing_id: 11 }).is_err());

        let mut req = requirement(RequiredType::Both);
        req.apply(skip()).unwrap();
        let err = req.apply(skip()).unwrap_err();
        assert_eq!(err.from, RequirementStatus::Skipped);
        assert_eq!(err.event, "skipped");
    }
}
