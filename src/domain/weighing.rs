// ==========================================
// 场站过磅管理 - 过磅记录领域模型
// ==========================================
// 红线: 过磅记录创建后不可修改（重量永不回写）
// 对齐: weighings 表
// ==========================================

use crate::domain::types::WeighingType;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 重量精度（小数位）
pub const WEIGHT_SCALE: u32 = 2;

/// 统一重量精度为 2 位小数（四舍五入，与 decimal(10,2) 列一致）
pub fn normalize_weight(weight: Decimal) -> Decimal {
    let mut normalized =
        weight.round_dp_with_strategy(WEIGHT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    normalized.rescale(WEIGHT_SCALE);
    normalized
}

// ==========================================
// Weighing - 一次称重
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weighing {
    pub id: i64,
    pub yard_id: i64,
    pub plate_number: String, // 始终记录，即使车辆/访客未知
    pub weighing_type: WeighingType,
    pub weight: Decimal, // kg, 2 位小数
    pub weighed_at: NaiveDateTime,

    // ===== 可选关联 =====
    pub visitor_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub requirement_id: Option<i64>,
    pub operator_user_id: Option<i64>,
    pub notes: Option<String>,
}

impl Weighing {
    /// 称重所在日历日
    pub fn weighed_on(&self) -> NaiveDate {
        self.weighed_at.date()
    }

    /// 与对侧记录的净重差
    ///
    /// 统一为 出场 - 进场，无论调用方持有哪一侧
    /// 类型不构成进/出配对时返回 None
    pub fn weight_difference(&self, paired: &Weighing) -> Option<Decimal> {
        match (self.weighing_type, paired.weighing_type) {
            (WeighingType::Exit, WeighingType::Entry) => Some(self.weight - paired.weight),
            (WeighingType::Entry, WeighingType::Exit) => Some(paired.weight - self.weight),
            _ => None,
        }
    }
}

// ==========================================
// NewWeighing - 待写入的称重
// ==========================================
#[derive(Debug, Clone)]
pub struct NewWeighing {
    pub yard_id: i64,
    pub plate_number: String,
    pub weighing_type: WeighingType,
    pub weight: Decimal,
    pub weighed_at: NaiveDateTime,
    pub visitor_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub requirement_id: Option<i64>,
    pub operator_user_id: Option<i64>,
    pub notes: Option<String>,
}

impl NewWeighing {
    /// 落库后补齐主键
    pub fn into_weighing(self, id: i64) -> Weighing {
        Weighing {
            id,
            yard_id: self.yard_id,
            plate_number: self.plate_number,
            weighing_type: self.weighing_type,
            weight: normalize_weight(self.weight),
            weighed_at: self.weighed_at,
            visitor_id: self.visitor_id,
            truck_id: self.truck_id,
            task_id: self.task_id,
            requirement_id: self.requirement_id,
            operator_user_id: self.operator_user_id,
            notes: self.notes,
        }
    }
}

// ==========================================
// 统计结果
// ==========================================

/// 单一过磅类型的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingTypeStatistics {
    pub weighing_type: WeighingType,
    pub count: i64,
    pub total_weight: Decimal,
    pub avg_weight: Option<Decimal>, // count = 0 时为 None
}

/// 场站在时间区间内的过磅统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingStatistics {
    pub yard_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_count: i64,
    pub by_type: Vec<WeighingTypeStatistics>,
    pub paired_count: i64,        // 已完成进出配对的过磅要求数
    pub net_weight_total: Decimal, // 配对净重合计（出场 - 进场）
}

impl WeighingStatistics {
    /// 由区间内的称重与已配对的 (进场, 出场) 重量汇总
    ///
    /// 三种过磅类型总是全部列出，没有记录的类型 count = 0
    pub fn aggregate(
        yard_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        weighings: &[Weighing],
        paired_legs: &[(Decimal, Decimal)],
    ) -> Self {
        let by_type: Vec<WeighingTypeStatistics> = WeighingType::all()
            .into_iter()
            .map(|weighing_type| {
                let (count, total_weight) = weighings
                    .iter()
                    .filter(|w| w.weighing_type == weighing_type)
                    .fold((0i64, Decimal::ZERO), |(n, sum), w| (n + 1, sum + w.weight));
                let avg_weight =
                    (count > 0).then(|| normalize_weight(total_weight / Decimal::from(count)));
                WeighingTypeStatistics {
                    weighing_type,
                    count,
                    total_weight: normalize_weight(total_weight),
                    avg_weight,
                }
            })
            .collect();

        let net_weight_total = paired_legs
            .iter()
            .fold(Decimal::ZERO, |sum, (entry, exit)| sum + (*exit - *entry));

        Self {
            yard_id,
            from,
            to,
            total_count: weighings.len() as i64,
            by_type,
            paired_count: paired_legs.len() as i64,
            net_weight_total: normalize_weight(net_weight_total),
        }
    }

    /// 指定类型的统计
    pub fn for_type(&self, weighing_type: WeighingType) -> Option<&WeighingTypeStatistics> {
        self.by_type.iter().find(|s| s.weighing_type == weighing_type)
    }
}
