// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用辅助函数
// ==========================================

#![allow(dead_code)]

#[path = "../test_helpers.rs"]
mod test_helpers;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use tempfile::NamedTempFile;

use yard_weighing::api::{
    ConfigApi, ManualRequirementRequest, RecordWeighingRequest, WeighingApi,
};
use yard_weighing::app::AppState;
use yard_weighing::domain::requirement::WeighingRequirement;
use yard_weighing::domain::types::{
    RequiredType, VisitorStatus, WeighingOverride, WeighingPolicy, WeighingType,
};
use yard_weighing::domain::weighing::Weighing;
use yard_weighing::domain::yard::{EntryPermit, Task, Truck, TruckCategory, Visitor, Yard};
use yard_weighing::repository::{
    ActionLogRepository, EntryPermitRepository, TaskRepository, TruckRepository,
    VisitorRepository, YardRepository,
};

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 通过 AppState 组装，与正式启动路径一致
pub struct ApiTestEnv {
    pub db_path: String,
    pub weighing_api: Arc<WeighingApi>,
    pub config_api: Arc<ConfigApi>,

    // Repository层（用于测试数据准备）
    pub yard_repo: Arc<YardRepository>,
    pub truck_repo: Arc<TruckRepository>,
    pub task_repo: Arc<TaskRepository>,
    pub permit_repo: Arc<EntryPermitRepository>,
    pub visitor_repo: Arc<VisitorRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的API测试环境
    pub fn new() -> Result<Self, String> {
        yard_weighing::logging::init_test();

        let (temp_file, db_path) =
            test_helpers::create_test_db().map_err(|e| format!("创建测试数据库失败: {}", e))?;

        let state = AppState::new(db_path.clone())?;

        Ok(Self {
            db_path,
            weighing_api: state.weighing_api,
            config_api: state.config_api,
            yard_repo: state.yard_repo,
            truck_repo: state.truck_repo,
            task_repo: state.task_repo,
            permit_repo: state.permit_repo,
            visitor_repo: state.visitor_repo,
            action_log_repo: state.action_log_repo,
            _temp_file: temp_file,
        })
    }

    // ==========================================
    // 主数据准备
    // ==========================================

    pub fn create_yard(&self, name: &str, weighing_required: bool) -> Yard {
        let mut yard = Yard::new(name);
        yard.weighing_required = weighing_required;
        if weighing_required {
            yard.weighing_policy = WeighingPolicy::Both;
        }
        self.yard_repo.create(&yard).expect("创建场站失败")
    }

    pub fn create_category(&self, name: &str, weighing_required: bool) -> TruckCategory {
        self.truck_repo
            .create_category(name, weighing_required)
            .expect("创建车辆类别失败")
    }

    pub fn create_truck(
        &self,
        plate_number: &str,
        category_id: Option<i64>,
        weighing_required: WeighingOverride,
    ) -> Truck {
        self.truck_repo
            .create(plate_number, category_id, weighing_required)
            .expect("创建车辆失败")
    }

    pub fn create_task(&self, yard_id: i64, weighing: bool) -> Task {
        self.task_repo
            .create("卸货", Some(yard_id), weighing)
            .expect("创建任务失败")
    }

    /// 创建长期有效的许可（从昨天开始）
    pub fn create_permit(
        &self,
        yard_id: i64,
        truck_id: Option<i64>,
        plate_number: &str,
        weighing_required: Option<bool>,
    ) -> EntryPermit {
        let permit = EntryPermit {
            id: 0,
            yard_id,
            truck_id,
            plate_number: plate_number.to_string(),
            begin_date: today().pred_opt().expect("日期越界"),
            end_date: None,
            one_permission: false,
            is_active: true,
            used_at: None,
            weighing_required,
        };
        self.permit_repo.create(&permit).expect("创建许可失败")
    }

    /// 登记当前在场的访客
    pub fn create_visitor(
        &self,
        yard_id: i64,
        plate_number: &str,
        truck_id: Option<i64>,
        task_id: Option<i64>,
    ) -> Visitor {
        let visitor = Visitor {
            id: 0,
            plate_number: plate_number.to_string(),
            yard_id: Some(yard_id),
            truck_id,
            task_id,
            entry_date: now(),
            exit_date: None,
            status: VisitorStatus::Confirmed,
            confidence: Some(0.98),
        };
        self.visitor_repo.create(&visitor).expect("创建访客失败")
    }

    /// 创建一条人工过磅要求
    pub fn create_manual(&self, yard_id: i64, plate_number: &str, required_type: RequiredType) -> WeighingRequirement {
        self.weighing_api
            .create_manual_requirement(
                ManualRequirementRequest {
                    yard_id,
                    plate_number: plate_number.to_string(),
                    required_type,
                    visitor_id: None,
                    truck_id: None,
                    task_id: None,
                },
                "admin",
            )
            .expect("创建人工过磅要求失败")
    }

    // ==========================================
    // 称重
    // ==========================================

    pub fn record(
        &self,
        yard_id: i64,
        plate_number: &str,
        weighing_type: WeighingType,
        weight: &str,
        requirement_id: Option<i64>,
    ) -> Weighing {
        self.weighing_api
            .record_weighing(
                weighing_request(yard_id, plate_number, weighing_type, weight, requirement_id),
                "operator",
            )
            .expect("记录称重失败")
    }

    pub fn requirement(&self, id: i64) -> WeighingRequirement {
        self.weighing_api.get_requirement(id).expect("查询过磅要求失败")
    }
}

/// 构造称重请求
pub fn weighing_request(
    yard_id: i64,
    plate_number: &str,
    weighing_type: WeighingType,
    weight: &str,
    requirement_id: Option<i64>,
) -> RecordWeighingRequest {
    RecordWeighingRequest {
        yard_id,
        plate_number: plate_number.to_string(),
        weighing_type,
        weight: dec(weight),
        visitor_id: None,
        truck_id: None,
        task_id: None,
        requirement_id,
        operator_user_id: Some(1),
        notes: None,
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("无效的重量")
}

pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
