// ==========================================
// 场站过磅管理 - 进出场配对引擎
// ==========================================
// 规则: 按关联强度依次尝试，首个命中即返回
//   1. 同一过磅要求
//   2. 同一访客
//   3. 同一车辆 + 同场站 + 同日
//   4. 同车牌 + 同场站 + 同日（兜底，可关闭）
// 红线: 引擎不含 SQL，查找委托给 WeighingLookup
// ==========================================

use crate::domain::types::WeighingType;
use crate::domain::weighing::Weighing;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// 配对查找键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingKey {
    Requirement(i64),
    Visitor(i64),
    TruckAndDay {
        truck_id: i64,
        yard_id: i64,
        day: NaiveDate,
    },
    PlateAndDay {
        plate_number: String,
        yard_id: i64,
        day: NaiveDate,
    },
}

/// 对侧称重查找
///
/// 实现方需排除 `weighing` 自身；同一键下有多条候选时取时间最近的一条
pub trait WeighingLookup {
    fn find_opposite(
        &self,
        weighing: &Weighing,
        key: &PairingKey,
        opposite: WeighingType,
    ) -> RepositoryResult<Option<Weighing>>;
}

/// 配对策略: 由称重构造查找键，缺少关联字段时直接跳过
pub type PairingStrategy = fn(&Weighing, WeighingType, &dyn WeighingLookup) -> RepositoryResult<Option<Weighing>>;

pub fn by_requirement(
    weighing: &Weighing,
    opposite: WeighingType,
    lookup: &dyn WeighingLookup,
) -> RepositoryResult<Option<Weighing>> {
    match weighing.requirement_id {
        Some(id) => lookup.find_opposite(weighing, &PairingKey::Requirement(id), opposite),
        None => Ok(None),
    }
}

pub fn by_visitor(
    weighing: &Weighing,
    opposite: WeighingType,
    lookup: &dyn WeighingLookup,
) -> RepositoryResult<Option<Weighing>> {
    match weighing.visitor_id {
        Some(id) => lookup.find_opposite(weighing, &PairingKey::Visitor(id), opposite),
        None => Ok(None),
    }
}

pub fn by_truck_and_day(
    weighing: &Weighing,
    opposite: WeighingType,
    lookup: &dyn WeighingLookup,
) -> RepositoryResult<Option<Weighing>> {
    match weighing.truck_id {
        Some(truck_id) => {
            let key = PairingKey::TruckAndDay {
                truck_id,
                yard_id: weighing.yard_id,
                day: weighing.weighed_on(),
            };
            lookup.find_opposite(weighing, &key, opposite)
        }
        None => Ok(None),
    }
}

pub fn by_plate_and_day(
    weighing: &Weighing,
    opposite: WeighingType,
    lookup: &dyn WeighingLookup,
) -> RepositoryResult<Option<Weighing>> {
    if weighing.plate_number.trim().is_empty() {
        return Ok(None);
    }
    let key = PairingKey::PlateAndDay {
        plate_number: weighing.plate_number.clone(),
        yard_id: weighing.yard_id,
        day: weighing.weighed_on(),
    };
    lookup.find_opposite(weighing, &key, opposite)
}

// ==========================================
// PairingEngine
// ==========================================
pub struct PairingEngine {
    strategies: Vec<(&'static str, PairingStrategy)>,
}

impl PairingEngine {
    /// # 参数
    /// - `plate_fallback`: 是否启用车牌 + 同日兜底
    pub fn new(plate_fallback: bool) -> Self {
        let mut strategies: Vec<(&'static str, PairingStrategy)> = vec![
            ("requirement", by_requirement as PairingStrategy),
            ("visitor", by_visitor as PairingStrategy),
            ("truck_and_day", by_truck_and_day as PairingStrategy),
        ];
        if plate_fallback {
            strategies.push(("plate_and_day", by_plate_and_day as PairingStrategy));
        }
        Self { strategies }
    }

    /// 策略名称（按尝试顺序）
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    /// 查找对侧称重
    ///
    /// # 返回
    /// 中间称重或所有策略均未命中时返回 None
    pub fn find_pair(
        &self,
        weighing: &Weighing,
        lookup: &dyn WeighingLookup,
    ) -> RepositoryResult<Option<Weighing>> {
        let opposite = match weighing.weighing_type.opposite() {
            Some(t) => t,
            None => return Ok(None),
        };

        for (name, strategy) in &self.strategies {
            if let Some(paired) = strategy(weighing, opposite, lookup)? {
                tracing::debug!(
                    weighing_id = weighing.id,
                    paired_id = paired.id,
                    strategy = *name,
                    "配对命中"
                );
                return Ok(Some(paired));
            }
        }
        Ok(None)
    }

    /// 查找对侧并计算净重差（出场 - 进场）
    pub fn weight_difference(
        &self,
        weighing: &Weighing,
        lookup: &dyn WeighingLookup,
    ) -> RepositoryResult<Option<Decimal>> {
        Ok(self
            .find_pair(weighing, lookup)?
            .and_then(|paired| weighing.weight_difference(&paired)))
    }
}

impl Default for PairingEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;

    /// 内存查找: 按键的判定规则在候选中线性匹配
    struct MemoryLookup {
        weighings: Vec<Weighing>,
        keys_tried: RefCell<Vec<PairingKey>>,
    }

    impl MemoryLookup {
        fn new(weighings: Vec<Weighing>) -> Self {
            Self {
                weighings,
                keys_tried: RefCell::new(Vec::new()),
            }
        }
    }

    impl WeighingLookup for MemoryLookup {
        fn find_opposite(
            &self,
            weighing: &Weighing,
            key: &PairingKey,
            opposite: WeighingType,
        ) -> RepositoryResult<Option<Weighing>> {
            self.keys_tried.borrow_mut().push(key.clone());
            let found = self.weighings.iter().find(|w| {
                w.id != weighing.id
                    && w.weighing_type == opposite
                    && match key {
                        PairingKey::Requirement(id) => w.requirement_id == Some(*id),
                        PairingKey::Visitor(id) => w.visitor_id == Some(*id),
                        PairingKey::TruckAndDay { truck_id, yard_id, day } => {
                            w.truck_id == Some(*truck_id) && w.yard_id == *yard_id && w.weighed_on() == *day
                        }
                        PairingKey::PlateAndDay {
                            plate_number,
                            yard_id,
                            day,
                        } => {
                            w.plate_number.eq_ignore_ascii_case(plate_number)
                                && w.yard_id == *yard_id
                                && w.weighed_on() == *day
                        }
                    }
            });
            Ok(found.cloned())
        }
    }

    fn weighing(id: i64, weighing_type: WeighingType, weight: Decimal) -> Weighing {
        Weighing {
            id,
            yard_id: 1,
            plate_number: "B1234CD".to_string(),
            weighing_type,
            weight,
            weighed_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            visitor_id: None,
            truck_id: None,
            task_id: None,
            requirement_id: None,
            operator_user_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_requirement_wins_over_visitor() {
        let mut entry = weighing(1, WeighingType::Entry, dec!(10000));
        entry.requirement_id = Some(7);
        entry.visitor_id = Some(3);
        entry.truck_id = Some(11);

        // 同访客但不同要求
        let mut by_visitor = weighing(2, WeighingType::Exit, dec!(15000));
        by_visitor.visitor_id = Some(3);
        by_visitor.truck_id = Some(11);

        let mut by_requirement = weighing(3, WeighingType::Exit, dec!(12000));
        by_requirement.requirement_id = Some(7);
        by_requirement.visitor_id = Some(3);
        by_requirement.truck_id = Some(12);

        let lookup = MemoryLookup::new(vec![entry.clone(), by_visitor, by_requirement]);
        let engine = PairingEngine::default();

        let paired = engine.find_pair(&entry, &lookup).unwrap().unwrap();
        assert_eq!(paired.id, 3);
        assert_eq!(lookup.keys_tried.borrow().len(), 1);
    }

    #[test]
    fn test_falls_through_to_plate() {
        let entry = weighing(1, WeighingType::Entry, dec!(10000));
        let exit = weighing(2, WeighingType::Exit, dec!(12000));
        let lookup = MemoryLookup::new(vec![entry.clone(), exit]);

        let engine = PairingEngine::new(true);
        let paired = engine.find_pair(&entry, &lookup).unwrap();
        assert_eq!(paired.map(|w| w.id), Some(2));

        // 无关联字段时前三个策略不发起查找
        let tried = lookup.keys_tried.borrow();
        assert_eq!(tried.len(), 1);
        assert!(matches!(tried[0], PairingKey::PlateAndDay { .. }));
    }

    #[test]
    fn test_plate_fallback_disabled() {
        let entry = weighing(1, WeighingType::Entry, dec!(10000));
        let exit = weighing(2, WeighingType::Exit, dec!(12000));
        let lookup = MemoryLookup::new(vec![entry.clone(), exit]);

        let engine = PairingEngine::new(false);
        assert_eq!(engine.strategy_names(), vec!["requirement", "visitor", "truck_and_day"]);
        assert!(engine.find_pair(&entry, &lookup).unwrap().is_none());
    }

    #[test]
    fn test_intermediate_has_no_pair() {
        let mid = weighing(1, WeighingType::Intermediate, dec!(10000));
        let other = weighing(2, WeighingType::Exit, dec!(12000));
        let lookup = MemoryLookup::new(vec![mid.clone(), other]);

        let engine = PairingEngine::default();
        assert!(engine.find_pair(&mid, &lookup).unwrap().is_none());
        assert!(lookup.keys_tried.borrow().is_empty());
    }

    #[test]
    fn test_weight_difference_sign_from_either_leg() {
        let mut entry = weighing(1, WeighingType::Entry, dec!(10000));
        let mut exit = weighing(2, WeighingType::Exit, dec!(12000));
        entry.visitor_id = Some(5);
        exit.visitor_id = Some(5);
        let lookup = MemoryLookup::new(vec![entry.clone(), exit.clone()]);
        let engine = PairingEngine::default();

        assert_eq!(engine.weight_difference(&entry, &lookup).unwrap(), Some(dec!(2000)));
        assert_eq!(engine.weight_difference(&exit, &lookup).unwrap(), Some(dec!(2000)));
    }

    #[test]
    fn test_no_pair_yields_none() {
        let entry = weighing(1, WeighingType::Entry, dec!(10000));
        let lookup = MemoryLookup::new(vec![entry.clone()]);
        let engine = PairingEngine::default();
        assert_eq!(engine.weight_difference(&entry, &lookup).unwrap(), None);
    }
}
