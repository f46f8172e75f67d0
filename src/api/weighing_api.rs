// ==========================================
// 场站过磅管理 - 过磅业务 API
// ==========================================
// 职责: 过磅要求判定与创建、称重记录、跳过、
//       配对/净重查询、统计与历史、CSV 导出
// 红线: 所有写入必须记录 ActionLog
// ==========================================

use std::io::Write;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::requirement::{
    NewWeighingRequirement, RequirementDecision, RequirementEvent, RequirementSummary,
    WeighingRequirement,
};
use crate::domain::types::{RequiredType, RequirementReason, WeighingType};
use crate::domain::weighing::{normalize_weight, NewWeighing, Weighing, WeighingStatistics};
use crate::domain::yard::{Visitor, Yard};
use crate::engine::{PairingEngine, RequirementContext, RequirementRuleEngine};
use crate::repository::{
    EntryPermitRepository, TaskRepository, TruckRepository,
    VisitorRepository, WeighingRepository, WeighingRequirementRepository, YardRepository,
};

// ==========================================
// 请求 DTO
// ==========================================

/// 称重请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWeighingRequest {
    pub yard_id: i64,
    pub plate_number: String,
    pub weighing_type: WeighingType,
    pub weight: Decimal, // kg
    pub visitor_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
    pub requirement_id: Option<i64>,
    pub operator_user_id: Option<i64>,
    pub notes: Option<String>,
}

/// 人工创建过磅要求请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualRequirementRequest {
    pub yard_id: i64,
    pub plate_number: String,
    pub required_type: RequiredType,
    pub visitor_id: Option<i64>,
    pub truck_id: Option<i64>,
    pub task_id: Option<i64>,
}

/// CSV 导出行
#[derive(Debug, Serialize)]
struct WeighingCsvRow<'a> {
    id: i64,
    weighed_at: String,
    plate_number: &'a str,
    weighing_type: &'static str,
    weight: String,
    visitor_id: Option<i64>,
    truck_id: Option<i64>,
    requirement_id: Option<i64>,
    operator_user_id: Option<i64>,
    notes: Option<&'a str>,
}

impl<'a> From<&'a Weighing> for WeighingCsvRow<'a> {
    fn from(w: &'a Weighing) -> Self {
        Self {
            id: w.id,
            weighed_at: w.weighed_at.format(crate::db::DATETIME_FORMAT).to_string(),
            plate_number: &w.plate_number,
            weighing_type: w.weighing_type.to_db_str(),
            weight: w.weight.to_string(),
            visitor_id: w.visitor_id,
            truck_id: w.truck_id,
            requirement_id: w.requirement_id,
            operator_user_id: w.operator_user_id,
            notes: w.notes.as_deref(),
        }
    }
}

// ==========================================
// WeighingApi - 过磅业务 API
// ==========================================

/// 过磅业务API
///
/// 职责：
/// 1. 按规则表判定并创建过磅要求
/// 2. 记录称重并推进过磅要求（同一事务、条件更新）
/// 3. 进出场配对与净重计算
/// 4. 统计、历史、导出
/// 5. ActionLog记录
pub struct WeighingApi {
    yard_repo: Arc<YardRepository>,
    truck_repo: Arc<TruckRepository>,
    task_repo: Arc<TaskRepository>,
    permit_repo: Arc<EntryPermitRepository>,
    visitor_repo: Arc<VisitorRepository>,
    requirement_repo: Arc<WeighingRequirementRepository>,
    weighing_repo: Arc<WeighingRepository>,
    config_manager: Arc<ConfigManager>,
    rule_engine: RequirementRuleEngine,
}

impl WeighingApi {
    /// 创建新的WeighingApi实例（使用默认规则表）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        yard_repo: Arc<YardRepository>,
        truck_repo: Arc<TruckRepository>,
        task_repo: Arc<TaskRepository>,
        permit_repo: Arc<EntryPermitRepository>,
        visitor_repo: Arc<VisitorRepository>,
        requirement_repo: Arc<WeighingRequirementRepository>,
        weighing_repo: Arc<WeighingRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            yard_repo,
            truck_repo,
            task_repo,
            permit_repo,
            visitor_repo,
            requirement_repo,
            weighing_repo,
            config_manager,
            rule_engine: RequirementRuleEngine::default(),
        }
    }

    // ==========================================
    // 过磅要求判定
    // ==========================================

    /// 判定访客是否需要过磅
    ///
    /// # 返回
    /// - Ok(Some(decision)): 需要过磅
    /// - Ok(None): 无需过磅（豁免或无规则命中）
    /// - Err(ApiError::NotFound): 访客不存在
    pub fn determine_requirement(&self, visitor_id: i64) -> ApiResult<Option<RequirementDecision>> {
        let visitor = self.load_visitor(visitor_id)?;
        let ctx = self.load_context(&visitor)?;
        Ok(self.rule_engine.evaluate(&ctx))
    }

    /// 为访客创建过磅要求
    ///
    /// 访客已有未结束的过磅要求时直接返回该要求，不重复创建
    ///
    /// # 返回
    /// - Ok(Some(requirement)): 新建或已存在的过磅要求
    /// - Ok(None): 无需过磅
    pub fn create_requirement(
        &self,
        visitor_id: i64,
        actor: &str,
    ) -> ApiResult<Option<WeighingRequirement>> {
        let visitor = self.load_visitor(visitor_id)?;

        // 已有未结束的要求优先返回，一次性许可此时可能已被占用
        if let Some(existing) = self.requirement_repo.find_by_visitor(visitor_id)? {
            if !existing.is_finished() {
                tracing::debug!(visitor_id, requirement_id = existing.id, "访客已有未结束的过磅要求");
                return Ok(Some(existing));
            }
        }

        let ctx = self.load_context(&visitor)?;
        let decision = match self.rule_engine.evaluate(&ctx) {
            Some(d) => d,
            None => {
                tracing::debug!(visitor_id, "访客无需过磅");
                return Ok(None);
            }
        };

        let yard_id = visitor
            .yard_id
            .ok_or_else(|| ApiError::ValidationError(format!("访客(id={})未关联场站", visitor_id)))?;

        // 由一次性许可触发的要求同时占用该许可
        let consumed_permit = match (&ctx.permit, decision.reason) {
            (Some(permit), RequirementReason::Permit) if permit.one_permission => Some(permit.id),
            _ => None,
        };

        let new = NewWeighingRequirement {
            yard_id,
            visitor_id: Some(visitor.id),
            truck_id: visitor.truck_id,
            task_id: visitor.task_id,
            plate_number: visitor.plate_number.clone(),
            required_type: decision.required_type,
            reason: decision.reason,
            created_at: now(),
        };
        let requirement = self.requirement_repo.insert_with_audit(&new, consumed_permit, |r| {
            ActionLog::new(ActionType::CreateRequirement, actor)
                .with_target(yard_id, "requirement", r.id)
                .with_payload(serde_json::json!({
                    "visitor_id": visitor.id,
                    "plate_number": visitor.plate_number,
                    "required_type": decision.required_type.to_db_str(),
                    "reason": decision.reason.to_db_str(),
                    "consumed_permit_id": consumed_permit,
                }))
                .with_detail(format!(
                    "创建过磅要求: 车牌{} 原因{}",
                    visitor.plate_number, decision.reason
                ))
        })?;

        tracing::info!(
            requirement_id = requirement.id,
            visitor_id,
            reason = %decision.reason,
            "已创建过磅要求"
        );
        Ok(Some(requirement))
    }

    /// 人工创建过磅要求（不经过规则判定，原因固定为 manual）
    pub fn create_manual_requirement(
        &self,
        request: ManualRequirementRequest,
        actor: &str,
    ) -> ApiResult<WeighingRequirement> {
        let plate_number = request.plate_number.trim();
        if plate_number.is_empty() {
            return Err(ApiError::InvalidInput("车牌号不能为空".to_string()));
        }
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        self.load_yard(request.yard_id)?;

        if let Some(visitor_id) = request.visitor_id {
            let visitor = self.load_visitor(visitor_id)?;
            if visitor.yard_id != Some(request.yard_id) {
                return Err(ApiError::ValidationError(format!(
                    "访客(id={})不属于场站(id={})",
                    visitor_id, request.yard_id
                )));
            }
        }

        let new = NewWeighingRequirement {
            yard_id: request.yard_id,
            visitor_id: request.visitor_id,
            truck_id: request.truck_id,
            task_id: request.task_id,
            plate_number: plate_number.to_string(),
            required_type: request.required_type,
            reason: RequirementReason::Manual,
            created_at: now(),
        };
        let payload = serde_json::to_value(&request).unwrap_or_default();
        let requirement = self.requirement_repo.insert_with_audit(&new, None, |r| {
            ActionLog::new(ActionType::CreateManualRequirement, actor)
                .with_target(request.yard_id, "requirement", r.id)
                .with_payload(payload)
                .with_detail(format!(
                    "人工创建过磅要求: 车牌{} 类型{}",
                    plate_number, request.required_type
                ))
        })?;

        tracing::info!(requirement_id = requirement.id, actor, "已人工创建过磅要求");
        Ok(requirement)
    }

    // ==========================================
    // 称重记录
    // ==========================================

    /// 记录一次称重
    ///
    /// 关联过磅要求时，称重写入与要求状态推进在同一事务内完成；
    /// 要求状态已被并发修改或同一称重段已存在时整体回滚
    ///
    /// # 返回
    /// - Ok(Weighing): 已落库的称重（weighed_at 为当前时间）
    /// - Err(ApiError::InvalidInput): 参数校验失败
    /// - Err(ApiError::InvalidStateTransition): 要求当前状态不接受该称重
    /// - Err(ApiError::ConcurrencyConflict): 并发冲突
    pub fn record_weighing(&self, request: RecordWeighingRequest, actor: &str) -> ApiResult<Weighing> {
        let plate_number = request.plate_number.trim().to_string();
        if plate_number.is_empty() {
            return Err(ApiError::InvalidInput("车牌号不能为空".to_string()));
        }
        // 按入库精度校验，避免舍入后越界
        let weight = normalize_weight(request.weight);
        self.validate_weight(weight)?;
        self.load_yard(request.yard_id)?;

        let mut new = NewWeighing {
            yard_id: request.yard_id,
            plate_number,
            weighing_type: request.weighing_type,
            weight,
            weighed_at: now(),
            visitor_id: request.visitor_id,
            truck_id: request.truck_id,
            task_id: request.task_id,
            requirement_id: request.requirement_id,
            operator_user_id: request.operator_user_id,
            notes: request.notes.clone(),
        };

        let weighing = match request.requirement_id {
            Some(requirement_id) => {
                let requirement = self.load_requirement(requirement_id)?;
                if requirement.yard_id != request.yard_id {
                    return Err(ApiError::ValidationError(format!(
                        "过磅要求(id={})不属于场站(id={})",
                        requirement_id, request.yard_id
                    )));
                }

                // 未显式传入的关联沿用过磅要求上的
                new.visitor_id = new.visitor_id.or(requirement.visitor_id);
                new.truck_id = new.truck_id.or(requirement.truck_id);
                new.task_id = new.task_id.or(requirement.task_id);

                self.record_against_requirement(new, requirement, actor)?
            }
            None => self
                .weighing_repo
                .insert_with_audit(&new, |w| weighing_log(w, actor))?,
        };

        tracing::info!(
            weighing_id = weighing.id,
            yard_id = weighing.yard_id,
            weighing_type = %weighing.weighing_type,
            weight = %weighing.weight,
            "已记录称重"
        );
        Ok(weighing)
    }

    fn record_against_requirement(
        &self,
        new: NewWeighing,
        requirement: WeighingRequirement,
        actor: &str,
    ) -> ApiResult<Weighing> {
        let make_event: fn(i64) -> RequirementEvent = match new.weighing_type {
            WeighingType::Entry => |id| RequirementEvent::EntryRecorded { weighing_id: id },
            WeighingType::Exit => |id| RequirementEvent::ExitRecorded { weighing_id: id },
            // 中间称重不推进要求
            WeighingType::Intermediate => {
                return Ok(self
                    .weighing_repo
                    .insert_with_audit(&new, |w| weighing_log(w, actor))?)
            }
        };

        // 先校验迁移，避免写入注定回滚的称重
        let expected = requirement.status;
        expected.advance(requirement.required_type, &make_event(0))?;

        let (weighing, advanced) = self.weighing_repo.insert_and_advance(
            &new,
            expected,
            |w| {
                let mut next = requirement.clone();
                next.apply(make_event(w.id))?;
                Ok(next)
            },
            |w| weighing_log(w, actor),
        )?;

        tracing::debug!(
            requirement_id = advanced.id,
            from = %expected,
            to = %advanced.status,
            "过磅要求状态推进"
        );
        Ok(weighing)
    }

    /// 跳过过磅要求
    ///
    /// 仅 pending / entry_done 可跳过；已完成或已跳过的要求返回 InvalidStateTransition
    pub fn skip_requirement(
        &self,
        requirement_id: i64,
        user_id: i64,
        reason: &str,
    ) -> ApiResult<WeighingRequirement> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::InvalidInput("跳过原因不能为空".to_string()));
        }

        let mut requirement = self.load_requirement(requirement_id)?;
        let expected = requirement.status;
        requirement.apply(RequirementEvent::Skipped {
            by_user_id: user_id,
            reason: reason.to_string(),
            at: now(),
        })?;
        let log = ActionLog::new(ActionType::SkipRequirement, &user_id.to_string())
            .with_target(requirement.yard_id, "requirement", requirement.id)
            .with_payload(serde_json::json!({
                "from_status": expected.to_db_str(),
                "reason": reason,
            }))
            .with_detail(format!("跳过过磅要求: 车牌{} 原因{}", requirement.plate_number, reason));
        self.requirement_repo
            .update_state_with_audit(&requirement, expected, &log)?;

        tracing::info!(requirement_id, user_id, from = %expected, "已跳过过磅要求");
        Ok(requirement)
    }

    // ==========================================
    // 配对与净重
    // ==========================================

    /// 查找称重的对侧记录（进场↔出场）
    pub fn get_paired_weighing(&self, weighing_id: i64) -> ApiResult<Option<Weighing>> {
        let weighing = self.load_weighing(weighing_id)?;
        let engine = self.pairing_engine()?;
        Ok(engine.find_pair(&weighing, self.weighing_repo.as_ref())?)
    }

    /// 称重与其对侧的净重差（出场 - 进场）
    pub fn get_weight_difference(&self, weighing_id: i64) -> ApiResult<Option<Decimal>> {
        let weighing = self.load_weighing(weighing_id)?;
        let engine = self.pairing_engine()?;
        Ok(engine.weight_difference(&weighing, self.weighing_repo.as_ref())?)
    }

    /// 过磅要求自身两条称重的净重差，不经过配对查找
    pub fn get_requirement_weight_difference(&self, requirement_id: i64) -> ApiResult<Option<Decimal>> {
        let requirement = self.load_requirement(requirement_id)?;
        let (entry_id, exit_id) = match (requirement.entry_weighing_id, requirement.exit_weighing_id) {
            (Some(entry), Some(exit)) => (entry, exit),
            _ => return Ok(None),
        };

        let entry = self.weighing_repo.find_by_id(entry_id)?;
        let exit = self.weighing_repo.find_by_id(exit_id)?;
        Ok(match (entry, exit) {
            (Some(entry), Some(exit)) => requirement.weight_difference(&entry, &exit),
            _ => None,
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_requirement(&self, requirement_id: i64) -> ApiResult<WeighingRequirement> {
        self.load_requirement(requirement_id)
    }

    pub fn get_weighing(&self, weighing_id: i64) -> ApiResult<Weighing> {
        self.load_weighing(weighing_id)
    }

    /// 场站在日期区间（含两端）内的过磅统计
    pub fn get_statistics(
        &self,
        yard_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<WeighingStatistics> {
        validate_range(from, to)?;
        self.load_yard(yard_id)?;

        let weighings = self.weighing_repo.find_in_range(yard_id, from, to)?;
        let paired_legs = self.requirement_repo.find_leg_weights_in_range(yard_id, from, to)?;
        Ok(WeighingStatistics::aggregate(yard_id, from, to, &weighings, &paired_legs))
    }

    /// 场站过磅历史（最新在前）
    ///
    /// # 参数
    /// - limit: None 时使用配置的默认条数
    pub fn get_history_by_yard(&self, yard_id: i64, limit: Option<usize>) -> ApiResult<Vec<Weighing>> {
        let limit = self.resolve_limit(limit)?;
        Ok(self.weighing_repo.find_history_by_yard(yard_id, limit)?)
    }

    /// 车辆过磅历史（最新在前）
    pub fn get_truck_history(&self, truck_id: i64, limit: Option<usize>) -> ApiResult<Vec<Weighing>> {
        let limit = self.resolve_limit(limit)?;
        Ok(self.weighing_repo.find_history_by_truck(truck_id, limit)?)
    }

    /// 场站内未结束的过磅要求
    pub fn list_pending_requirements(&self, yard_id: i64) -> ApiResult<Vec<WeighingRequirement>> {
        Ok(self.requirement_repo.list_open_by_yard(yard_id)?)
    }

    /// 场站过磅要求各状态数量
    pub fn get_requirement_summary(&self, yard_id: i64) -> ApiResult<RequirementSummary> {
        Ok(self.requirement_repo.count_by_status(yard_id)?)
    }

    /// 导出场站区间内的称重记录为 CSV
    ///
    /// # 返回
    /// - Ok(usize): 导出的行数（不含表头）
    pub fn export_history_csv<W: Write>(
        &self,
        yard_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        writer: W,
    ) -> ApiResult<usize> {
        validate_range(from, to)?;
        let weighings = self.weighing_repo.find_in_range(yard_id, from, to)?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        for weighing in &weighings {
            csv_writer
                .serialize(WeighingCsvRow::from(weighing))
                .map_err(|e| ApiError::ExportError(e.to_string()))?;
        }
        csv_writer
            .flush()
            .map_err(|e| ApiError::ExportError(e.to_string()))?;

        tracing::info!(yard_id, %from, %to, rows = weighings.len(), "已导出过磅记录");
        Ok(weighings.len())
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 加载判定所需的许可/任务/场站/车辆/类别
    fn load_context(&self, visitor: &Visitor) -> ApiResult<RequirementContext> {
        let yard = match visitor.yard_id {
            Some(id) => self.yard_repo.find_by_id(id)?,
            None => None,
        };

        let permit = match visitor.yard_id {
            Some(yard_id) => {
                let candidates =
                    self.permit_repo
                        .find_candidates(yard_id, visitor.truck_id, &visitor.plate_number)?;
                visitor.pick_active_permit(&candidates).cloned()
            }
            None => None,
        };

        let task = match visitor.task_id {
            Some(id) => self.task_repo.find_by_id(id)?,
            None => None,
        };

        let truck = match visitor.truck_id {
            Some(id) => self.truck_repo.find_by_id(id)?,
            None => None,
        };

        let category = match truck.as_ref().and_then(|t| t.category_id) {
            Some(id) => self.truck_repo.find_category_by_id(id)?,
            None => None,
        };

        Ok(RequirementContext {
            permit,
            task,
            yard,
            truck,
            category,
        })
    }

    fn pairing_engine(&self) -> ApiResult<PairingEngine> {
        let plate_fallback = self
            .config_manager
            .get_pairing_plate_fallback()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(PairingEngine::new(plate_fallback))
    }

    fn validate_weight(&self, weight: Decimal) -> ApiResult<()> {
        if weight <= Decimal::ZERO {
            return Err(ApiError::InvalidInput(format!("重量必须大于0: {}", weight)));
        }
        let max = self
            .config_manager
            .get_max_weight_kg()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        if weight > max {
            return Err(ApiError::InvalidInput(format!(
                "重量超过上限: {} > {}",
                weight, max
            )));
        }
        Ok(())
    }

    fn resolve_limit(&self, limit: Option<usize>) -> ApiResult<usize> {
        match limit {
            Some(0) => Err(ApiError::InvalidInput("查询条数必须大于0".to_string())),
            Some(n) => Ok(n),
            None => self
                .config_manager
                .get_history_default_limit()
                .map_err(|e| ApiError::ConfigError(e.to_string())),
        }
    }

    fn load_yard(&self, yard_id: i64) -> ApiResult<Yard> {
        self.yard_repo
            .find_by_id(yard_id)?
            .ok_or_else(|| ApiError::NotFound(format!("场站(id={})不存在", yard_id)))
    }

    fn load_visitor(&self, visitor_id: i64) -> ApiResult<Visitor> {
        self.visitor_repo
            .find_by_id(visitor_id)?
            .ok_or_else(|| ApiError::NotFound(format!("访客(id={})不存在", visitor_id)))
    }

    fn load_requirement(&self, requirement_id: i64) -> ApiResult<WeighingRequirement> {
        self.requirement_repo
            .find_by_id(requirement_id)?
            .ok_or_else(|| ApiError::NotFound(format!("过磅要求(id={})不存在", requirement_id)))
    }

    fn load_weighing(&self, weighing_id: i64) -> ApiResult<Weighing> {
        self.weighing_repo
            .find_by_id(weighing_id)?
            .ok_or_else(|| ApiError::NotFound(format!("称重记录(id={})不存在", weighing_id)))
    }
}

/// 称重操作日志
fn weighing_log(weighing: &Weighing, actor: &str) -> ActionLog {
    ActionLog::new(ActionType::RecordWeighing, actor)
        .with_target(weighing.yard_id, "weighing", weighing.id)
        .with_payload(serde_json::json!({
            "plate_number": weighing.plate_number,
            "weighing_type": weighing.weighing_type.to_db_str(),
            "weight": weighing.weight.to_string(),
            "requirement_id": weighing.requirement_id,
            "visitor_id": weighing.visitor_id,
        }))
        .with_detail(format!(
            "记录称重: 车牌{} {} {}kg",
            weighing.plate_number, weighing.weighing_type, weighing.weight
        ))
}

/// 当前本地时间（秒级，与库中存储精度一致）
fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> ApiResult<()> {
    if from > to {
        return Err(ApiError::InvalidInput(format!(
            "日期区间无效: {} > {}",
            from, to
        )));
    }
    Ok(())
}
