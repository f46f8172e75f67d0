// ==========================================
// 过磅要求判定 集成测试
// ==========================================
// 测试范围:
// 1. 规则优先级: 许可 > 任务 > 场站 > 车辆 > 类别
// 2. 许可有效性: 过期 / 一次性已使用 / 停用
// 3. 创建过磅要求: 持久化、ActionLog、去重
// 4. 人工创建过磅要求
// ==========================================

mod helpers;

use helpers::api_test_helper::*;
use yard_weighing::api::{ApiError, ManualRequirementRequest};
use yard_weighing::domain::types::{
    RequiredType, RequirementReason, RequirementStatus, WeighingOverride,
};
use yard_weighing::domain::yard::EntryPermit;

// ==========================================
// 规则优先级
// ==========================================

#[test]
fn test_许可豁免_覆盖场站要求() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    env.create_permit(yard.id, None, "B1234CD", Some(false));
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);

    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败");
    assert!(decision.is_none(), "许可显式豁免应截断后续规则");
}

#[test]
fn test_许可要求_在不要求过磅的场站() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("二号场", false);
    env.create_permit(yard.id, None, "B1234CD", Some(true));
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);

    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败")
        .expect("应需要过磅");
    assert_eq!(decision.required_type, RequiredType::Both);
    assert_eq!(decision.reason, RequirementReason::Permit);
}

#[test]
fn test_任务优先于场站() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let task = env.create_task(yard.id, true);
    let visitor = env.create_visitor(yard.id, "B1234CD", None, Some(task.id));

    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败")
        .expect("应需要过磅");
    assert_eq!(decision.reason, RequirementReason::Task);
}

#[test]
fn test_车辆类别_仅在车辆未设置时生效() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let category = env.create_category("自卸车", true);

    let inherit = env.create_truck("B1111AA", Some(category.id), WeighingOverride::Inherit);
    let visitor = env.create_visitor(yard.id, "B1111AA", Some(inherit.id), None);
    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败")
        .expect("应需要过磅");
    assert_eq!(decision.reason, RequirementReason::TruckCategory);

    let opted_out = env.create_truck("B2222BB", Some(category.id), WeighingOverride::NotRequired);
    let visitor = env.create_visitor(yard.id, "B2222BB", Some(opted_out.id), None);
    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败");
    assert!(decision.is_none(), "车辆显式不要求时不回落到类别");
}

#[test]
fn test_车辆显式要求() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let truck = env.create_truck("B3333CC", None, WeighingOverride::Required);
    let visitor = env.create_visitor(yard.id, "B3333CC", Some(truck.id), None);

    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败")
        .expect("应需要过磅");
    assert_eq!(decision.reason, RequirementReason::TruckFlag);
}

// ==========================================
// 许可有效性
// ==========================================

#[test]
fn test_过期或已使用的许可不参与判定() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let yesterday = today().pred_opt().expect("日期越界");

    // 昨天到期
    env.permit_repo
        .create(&EntryPermit {
            id: 0,
            yard_id: yard.id,
            truck_id: None,
            plate_number: "B1234CD".to_string(),
            begin_date: yesterday.pred_opt().expect("日期越界"),
            end_date: Some(yesterday),
            one_permission: false,
            is_active: true,
            used_at: None,
            weighing_required: Some(false),
        })
        .expect("创建许可失败");

    // 一次性许可已使用
    env.permit_repo
        .create(&EntryPermit {
            id: 0,
            yard_id: yard.id,
            truck_id: None,
            plate_number: "B1234CD".to_string(),
            begin_date: yesterday,
            end_date: None,
            one_permission: true,
            is_active: true,
            used_at: Some(now()),
            weighing_required: Some(false),
        })
        .expect("创建许可失败");

    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);
    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败")
        .expect("无有效许可时应按场站要求过磅");
    assert_eq!(decision.reason, RequirementReason::YardPolicy);
}

#[test]
fn test_许可按车辆匹配优先于车牌() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let truck = env.create_truck("B1234CD", None, WeighingOverride::Inherit);
    let other = env.create_truck("B9999ZZ", None, WeighingOverride::Inherit);

    // 车牌相同但绑定的是其他车辆
    env.create_permit(yard.id, Some(other.id), "B1234CD", Some(false));
    let visitor = env.create_visitor(yard.id, "B1234CD", Some(truck.id), None);

    let decision = env
        .weighing_api
        .determine_requirement(visitor.id)
        .expect("判定失败");
    assert_eq!(decision.map(|d| d.reason), Some(RequirementReason::YardPolicy));
}

// ==========================================
// 创建过磅要求
// ==========================================

#[test]
fn test_create_requirement_持久化并记录日志() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);

    let requirement = env
        .weighing_api
        .create_requirement(visitor.id, "gate")
        .expect("创建失败")
        .expect("应创建过磅要求");

    assert_eq!(requirement.status, RequirementStatus::Pending);
    assert_eq!(requirement.reason, RequirementReason::YardPolicy);
    assert_eq!(requirement.visitor_id, Some(visitor.id));
    assert_eq!(requirement.plate_number, "B1234CD");

    let stored = env.requirement(requirement.id);
    assert_eq!(stored, requirement);

    let logs = env
        .action_log_repo
        .find_by_target("requirement", requirement.id)
        .expect("查询日志失败");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, "CREATE_REQUIREMENT");
    assert_eq!(logs[0].actor, "gate");
}

#[test]
fn test_create_requirement_无需过磅返回None() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);

    let result = env
        .weighing_api
        .create_requirement(visitor.id, "gate")
        .expect("创建失败");
    assert!(result.is_none());

    let summary = env.weighing_api.get_requirement_summary(yard.id).expect("查询失败");
    assert_eq!(summary.total(), 0);
}

#[test]
fn test_create_requirement_重复调用返回已有要求() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);

    let first = env
        .weighing_api
        .create_requirement(visitor.id, "gate")
        .expect("创建失败")
        .expect("应创建过磅要求");
    let second = env
        .weighing_api
        .create_requirement(visitor.id, "gate")
        .expect("创建失败")
        .expect("应返回已有要求");

    assert_eq!(first.id, second.id);
    let summary = env.weighing_api.get_requirement_summary(yard.id).expect("查询失败");
    assert_eq!(summary.pending, 1);
}

#[test]
fn test_一次性许可_创建要求时被占用() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("二号场", false);
    let permit = env
        .permit_repo
        .create(&EntryPermit {
            id: 0,
            yard_id: yard.id,
            truck_id: None,
            plate_number: "B1234CD".to_string(),
            begin_date: today().pred_opt().expect("日期越界"),
            end_date: None,
            one_permission: true,
            is_active: true,
            used_at: None,
            weighing_required: Some(true),
        })
        .expect("创建许可失败");

    let first_visit = env.create_visitor(yard.id, "B1234CD", None, None);
    let requirement = env
        .weighing_api
        .create_requirement(first_visit.id, "gate")
        .expect("创建失败")
        .expect("许可应触发过磅");
    assert_eq!(requirement.reason, RequirementReason::Permit);

    let used = env
        .permit_repo
        .find_by_id(permit.id)
        .expect("查询许可失败")
        .expect("许可应存在");
    assert_eq!(used.used_at, Some(requirement.created_at));

    // 同一到访重复调用仍返回已有要求
    let again = env
        .weighing_api
        .create_requirement(first_visit.id, "gate")
        .expect("创建失败")
        .expect("应返回已有要求");
    assert_eq!(again.id, requirement.id);

    // 下一次到访许可已失效，场站不要求过磅
    let second_visit = env.create_visitor(yard.id, "B1234CD", None, None);
    let decision = env
        .weighing_api
        .determine_requirement(second_visit.id)
        .expect("判定失败");
    assert_eq!(decision, None);

    let logs = env
        .action_log_repo
        .find_by_target("requirement", requirement.id)
        .expect("查询日志失败");
    let payload = logs[0].payload_json.as_ref().expect("应有参数");
    assert_eq!(payload["consumed_permit_id"], permit.id);
}

#[test]
fn test_访客不存在() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");

    let err = env.weighing_api.determine_requirement(999).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = env.weighing_api.create_requirement(999, "gate").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ==========================================
// 人工创建
// ==========================================

#[test]
fn test_create_manual_requirement() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);

    let requirement = env.create_manual(yard.id, " B1234CD ", RequiredType::Entry);
    assert_eq!(requirement.reason, RequirementReason::Manual);
    assert_eq!(requirement.required_type, RequiredType::Entry);
    assert_eq!(requirement.plate_number, "B1234CD");
    assert_eq!(requirement.visitor_id, None);

    let logs = env
        .action_log_repo
        .find_by_target("requirement", requirement.id)
        .expect("查询日志失败");
    assert_eq!(logs[0].action_type, "CREATE_MANUAL_REQUIREMENT");
}

#[test]
fn test_create_manual_requirement_校验() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let other_yard = env.create_yard("二号场", false);
    let visitor = env.create_visitor(other_yard.id, "B1234CD", None, None);

    let request = |plate: &str, yard_id: i64, visitor_id: Option<i64>| ManualRequirementRequest {
        yard_id,
        plate_number: plate.to_string(),
        required_type: RequiredType::Both,
        visitor_id,
        truck_id: None,
        task_id: None,
    };

    let err = env
        .weighing_api
        .create_manual_requirement(request("  ", yard.id, None), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = env
        .weighing_api
        .create_manual_requirement(request("B1234CD", 999, None), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = env
        .weighing_api
        .create_manual_requirement(request("B1234CD", yard.id, Some(visitor.id)), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}
