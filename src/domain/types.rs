// ==========================================
// 场站过磅管理 - 领域类型定义
// ==========================================
// 所有枚举统一提供 Display / to_db_str / from_db_str
// 数据库存储格式: snake_case 字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 过磅类型 (Weighing Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeighingType {
    Entry,        // 进场称重
    Exit,         // 出场称重
    Intermediate, // 中途称重（无配对）
}

impl fmt::Display for WeighingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl WeighingType {
    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(WeighingType::Entry),
            "exit" => Some(WeighingType::Exit),
            "intermediate" => Some(WeighingType::Intermediate),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WeighingType::Entry => "entry",
            WeighingType::Exit => "exit",
            WeighingType::Intermediate => "intermediate",
        }
    }

    /// 配对时要查找的对侧类型
    ///
    /// 中途称重没有对侧
    pub fn opposite(&self) -> Option<Self> {
        match self {
            WeighingType::Entry => Some(WeighingType::Exit),
            WeighingType::Exit => Some(WeighingType::Entry),
            WeighingType::Intermediate => None,
        }
    }

    /// 全部类型（统计时按此顺序输出）
    pub fn all() -> [WeighingType; 3] {
        [WeighingType::Entry, WeighingType::Exit, WeighingType::Intermediate]
    }
}

// ==========================================
// 要求称重环节 (Required Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredType {
    Entry, // 仅进场
    Exit,  // 仅出场
    Both,  // 进出场均需
}

impl fmt::Display for RequiredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RequiredType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(RequiredType::Entry),
            "exit" => Some(RequiredType::Exit),
            "both" => Some(RequiredType::Both),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequiredType::Entry => "entry",
            RequiredType::Exit => "exit",
            RequiredType::Both => "both",
        }
    }

    /// 是否包含进场环节
    pub fn includes_entry(&self) -> bool {
        matches!(self, RequiredType::Entry | RequiredType::Both)
    }

    /// 是否包含出场环节
    pub fn includes_exit(&self) -> bool {
        matches!(self, RequiredType::Exit | RequiredType::Both)
    }
}

// ==========================================
// 过磅要求来源 (Requirement Reason)
// ==========================================
// 规则引擎输出的触发层级，人工创建固定为 Manual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementReason {
    YardPolicy,    // 场站策略
    TruckCategory, // 车辆类别默认
    TruckFlag,     // 车辆单独标记
    Permit,        // 入场许可
    Task,          // 作业任务
    Manual,        // 人工创建
}

impl fmt::Display for RequirementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RequirementReason {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "yard_policy" => Some(RequirementReason::YardPolicy),
            "truck_category" => Some(RequirementReason::TruckCategory),
            "truck_flag" => Some(RequirementReason::TruckFlag),
            "permit" => Some(RequirementReason::Permit),
            "task" => Some(RequirementReason::Task),
            "manual" => Some(RequirementReason::Manual),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequirementReason::YardPolicy => "yard_policy",
            RequirementReason::TruckCategory => "truck_category",
            RequirementReason::TruckFlag => "truck_flag",
            RequirementReason::Permit => "permit",
            RequirementReason::Task => "task",
            RequirementReason::Manual => "manual",
        }
    }
}

// ==========================================
// 过磅要求状态 (Requirement Status)
// ==========================================
// 状态只前进: pending → entry_done → completed
// pending / entry_done → skipped (终态)
// 迁移函数见 domain::requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Pending,   // 待称重
    EntryDone, // 进场已称
    Completed, // 已完成
    Skipped,   // 已跳过
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RequirementStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequirementStatus::Pending),
            "entry_done" => Some(RequirementStatus::EntryDone),
            "completed" => Some(RequirementStatus::Completed),
            "skipped" => Some(RequirementStatus::Skipped),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequirementStatus::Pending => "pending",
            RequirementStatus::EntryDone => "entry_done",
            RequirementStatus::Completed => "completed",
            RequirementStatus::Skipped => "skipped",
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequirementStatus::Completed | RequirementStatus::Skipped)
    }

    pub fn all() -> [RequirementStatus; 4] {
        [
            RequirementStatus::Pending,
            RequirementStatus::EntryDone,
            RequirementStatus::Completed,
            RequirementStatus::Skipped,
        ]
    }
}

// ==========================================
// 场站过磅策略 (Weighing Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeighingPolicy {
    None,
    EntryOnly,
    ExitOnly,
    Both,
}

impl fmt::Display for WeighingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl WeighingPolicy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(WeighingPolicy::None),
            "entry_only" => Some(WeighingPolicy::EntryOnly),
            "exit_only" => Some(WeighingPolicy::ExitOnly),
            "both" => Some(WeighingPolicy::Both),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            WeighingPolicy::None => "none",
            WeighingPolicy::EntryOnly => "entry_only",
            WeighingPolicy::ExitOnly => "exit_only",
            WeighingPolicy::Both => "both",
        }
    }
}

// ==========================================
// 访客确认状态 (Visitor Status)
// ==========================================
// 摄像头识别入场的记录需要人工确认
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for VisitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl VisitorStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VisitorStatus::Pending),
            "confirmed" => Some(VisitorStatus::Confirmed),
            "rejected" => Some(VisitorStatus::Rejected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            VisitorStatus::Pending => "pending",
            VisitorStatus::Confirmed => "confirmed",
            VisitorStatus::Rejected => "rejected",
        }
    }
}

// ==========================================
// 三态覆写标记 (Weighing Override)
// ==========================================
// 对应数据库可空布尔: 1 / 0 / NULL
// Inherit 表示交由上一级（车辆类别）决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeighingOverride {
    Required,
    NotRequired,
    #[default]
    Inherit,
}

impl WeighingOverride {
    /// 从可空布尔转换
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => WeighingOverride::Required,
            Some(false) => WeighingOverride::NotRequired,
            None => WeighingOverride::Inherit,
        }
    }

    /// 转换为可空布尔（数据库存储）
    pub fn to_flag(&self) -> Option<bool> {
        match self {
            WeighingOverride::Required => Some(true),
            WeighingOverride::NotRequired => Some(false),
            WeighingOverride::Inherit => None,
        }
    }
}

impl fmt::Display for WeighingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeighingOverride::Required => write!(f, "required"),
            WeighingOverride::NotRequired => write!(f, "not_required"),
            WeighingOverride::Inherit => write!(f, "inherit"),
        }
    }
}
