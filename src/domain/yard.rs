// ==========================================
// 场站过磅管理 - 场站/车辆/访客领域模型
// ==========================================
// 这些实体由外部 CRUD 维护，过磅核心只读取其中
// 与过磅判定相关的字段
// ==========================================

use crate::domain::types::{VisitorStatus, WeighingOverride, WeighingPolicy};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Yard - 场站
// ==========================================
// 对齐: yards 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Yard {
    pub id: i64,
    pub name: String,
    pub strict_mode: bool,               // 严格模式: 无许可禁止入场
    pub weighing_policy: WeighingPolicy, // 过磅策略
    pub weighing_required: bool,         // 场站级过磅开关
}

impl Yard {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            strict_mode: false,
            weighing_policy: WeighingPolicy::None,
            weighing_required: false,
        }
    }
}

// ==========================================
// TruckCategory - 车辆类别
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckCategory {
    pub id: i64,
    pub name: String,
    pub weighing_required: bool, // 类别默认
}

// ==========================================
// Truck - 车辆
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truck {
    pub id: i64,
    pub plate_number: String,
    pub category_id: Option<i64>,
    pub weighing_required: WeighingOverride, // 三态: Inherit 交由类别决定
}

// ==========================================
// Task - 作业任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub yard_id: Option<i64>,
    pub weighing: bool,
}

// ==========================================
// EntryPermit - 入场许可
// ==========================================
// weighing_required 为显式覆写，优先级最高
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPermit {
    pub id: i64,
    pub yard_id: i64,
    pub truck_id: Option<i64>,
    pub plate_number: String,
    pub begin_date: NaiveDate,
    pub end_date: Option<NaiveDate>,     // None 表示长期有效
    pub one_permission: bool,            // 一次性许可
    pub is_active: bool,
    pub used_at: Option<NaiveDateTime>,  // 一次性许可的使用时间
    pub weighing_required: Option<bool>, // 显式覆写 (true 强制 / false 豁免)
}

impl EntryPermit {
    /// 许可在指定日期是否有效
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        if date < self.begin_date {
            return false;
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        // 一次性许可用过即失效
        !(self.one_permission && self.used_at.is_some())
    }
}

// ==========================================
// Visitor - 一次到访
// ==========================================
// 对齐: visitors 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
    pub id: i64,
    pub plate_number: String,
    pub yard_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub entry_date: NaiveDateTime,
    pub exit_date: Option<NaiveDateTime>,
    pub status: VisitorStatus,
    pub confidence: Option<f64>, // 车牌识别置信度
}

impl Visitor {
    /// 从候选许可中挑出本次到访可用的许可
    ///
    /// 候选需已按 id 倒序排列（最新许可优先）
    pub fn pick_active_permit<'a>(&self, candidates: &'a [EntryPermit]) -> Option<&'a EntryPermit> {
        let yard_id = self.yard_id?;
        let visit_date = self.entry_date.date();

        candidates.iter().find(|p| {
            if p.yard_id != yard_id || !p.is_valid_on(visit_date) {
                return false;
            }
            match (self.truck_id, p.truck_id) {
                (Some(visitor_truck), Some(permit_truck)) => visitor_truck == permit_truck,
                _ => p.plate_number.eq_ignore_ascii_case(&self.plate_number),
            }
        })
    }
}
