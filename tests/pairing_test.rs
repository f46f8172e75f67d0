// ==========================================
// 进出场配对 集成测试
// ==========================================
// 测试范围:
// 1. 配对优先级: 过磅要求 > 访客 > 车辆同日 > 车牌同日
// 2. 净重差符号（出场 - 进场）与查询方向无关
// 3. 车牌兜底开关
// 4. 过磅要求净重差
// ==========================================

mod helpers;

use helpers::api_test_helper::*;
use yard_weighing::api::ApiError;
use yard_weighing::config::config_keys;
use yard_weighing::domain::types::{RequiredType, WeighingOverride, WeighingType};

#[test]
fn test_过磅要求优先于访客() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", true);
    let visitor = env.create_visitor(yard.id, "B1234CD", None, None);
    let requirement = env
        .weighing_api
        .create_requirement(visitor.id, "gate")
        .expect("创建失败")
        .expect("应创建过磅要求");

    let entry = env.record(yard.id, "B1234CD", WeighingType::Entry, "10000", Some(requirement.id));

    // 同访客、未关联要求的出场称重
    let mut stray = weighing_request(yard.id, "B1234CD", WeighingType::Exit, "15000", None);
    stray.visitor_id = Some(visitor.id);
    let stray = env
        .weighing_api
        .record_weighing(stray, "operator")
        .expect("记录称重失败");

    let exit = env.record(yard.id, "B1234CD", WeighingType::Exit, "12000", Some(requirement.id));

    let paired = env
        .weighing_api
        .get_paired_weighing(entry.id)
        .expect("配对失败")
        .expect("应找到出场称重");
    assert_eq!(paired.id, exit.id);
    assert_eq!(
        env.weighing_api.get_weight_difference(entry.id).expect("查询失败"),
        Some(dec("2000"))
    );

    // 未关联要求的出场按访客配对到同一进场
    let paired = env
        .weighing_api
        .get_paired_weighing(stray.id)
        .expect("配对失败")
        .expect("应找到进场称重");
    assert_eq!(paired.id, entry.id);
    assert_eq!(
        env.weighing_api.get_weight_difference(stray.id).expect("查询失败"),
        Some(dec("5000"))
    );
}

#[test]
fn test_净重差_两侧查询符号一致() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let requirement = env.create_manual(yard.id, "B1234CD", RequiredType::Both);

    let entry = env.record(yard.id, "B1234CD", WeighingType::Entry, "15000", Some(requirement.id));
    let exit = env.record(yard.id, "B1234CD", WeighingType::Exit, "13000", Some(requirement.id));

    let from_entry = env.weighing_api.get_weight_difference(entry.id).expect("查询失败");
    let from_exit = env.weighing_api.get_weight_difference(exit.id).expect("查询失败");
    assert_eq!(from_entry, Some(dec("-2000")));
    assert_eq!(from_entry, from_exit);
}

#[test]
fn test_车辆同日配对() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let truck = env.create_truck("B1234CD", None, WeighingOverride::Inherit);

    // 车牌识别有误，仅车辆一致
    let mut entry = weighing_request(yard.id, "B1234CO", WeighingType::Entry, "10000", None);
    entry.truck_id = Some(truck.id);
    let entry = env.weighing_api.record_weighing(entry, "operator").expect("记录称重失败");

    let mut exit = weighing_request(yard.id, "B1234CD", WeighingType::Exit, "11000", None);
    exit.truck_id = Some(truck.id);
    let exit = env.weighing_api.record_weighing(exit, "operator").expect("记录称重失败");

    let paired = env.weighing_api.get_paired_weighing(exit.id).expect("配对失败");
    assert_eq!(paired.map(|w| w.id), Some(entry.id));
}

#[test]
fn test_车牌兜底_可关闭() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);

    let entry = env.record(yard.id, "B1234CD", WeighingType::Entry, "10000", None);
    let exit = env.record(yard.id, "b1234cd", WeighingType::Exit, "12500", None);

    let paired = env.weighing_api.get_paired_weighing(entry.id).expect("配对失败");
    assert_eq!(paired.map(|w| w.id), Some(exit.id), "车牌不区分大小写");

    env.config_api
        .update_config(config_keys::PAIRING_PLATE_FALLBACK, "false", "admin", "关闭车牌兜底")
        .expect("更新配置失败");

    assert!(env
        .weighing_api
        .get_paired_weighing(entry.id)
        .expect("配对失败")
        .is_none());
    assert_eq!(env.weighing_api.get_weight_difference(entry.id).expect("查询失败"), None);
}

#[test]
fn test_不同场站不配对() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let other = env.create_yard("二号场", false);

    let entry = env.record(yard.id, "B1234CD", WeighingType::Entry, "10000", None);
    env.record(other.id, "B1234CD", WeighingType::Exit, "12000", None);

    assert!(env
        .weighing_api
        .get_paired_weighing(entry.id)
        .expect("配对失败")
        .is_none());
}

#[test]
fn test_中途称重无配对() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);

    let mid = env.record(yard.id, "B1234CD", WeighingType::Intermediate, "10000", None);
    env.record(yard.id, "B1234CD", WeighingType::Exit, "12000", None);

    assert!(env.weighing_api.get_paired_weighing(mid.id).expect("配对失败").is_none());
    assert_eq!(env.weighing_api.get_weight_difference(mid.id).expect("查询失败"), None);
}

#[test]
fn test_过磅要求净重差() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let yard = env.create_yard("一号场", false);
    let requirement = env.create_manual(yard.id, "B1234CD", RequiredType::Both);

    env.record(yard.id, "B1234CD", WeighingType::Entry, "10000.25", Some(requirement.id));
    assert_eq!(
        env.weighing_api
            .get_requirement_weight_difference(requirement.id)
            .expect("查询失败"),
        None,
        "出场未记录时无净重"
    );

    env.record(yard.id, "B1234CD", WeighingType::Exit, "32000.75", Some(requirement.id));
    assert_eq!(
        env.weighing_api
            .get_requirement_weight_difference(requirement.id)
            .expect("查询失败"),
        Some(dec("22000.50"))
    );
}

#[test]
fn test_称重不存在() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let err = env.weighing_api.get_paired_weighing(404).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
