// ==========================================
// 场站过磅管理 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪（谁在何时跳过/创建/记录了什么）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID (uuid)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    // ===== 操作对象 =====
    pub yard_id: Option<i64>,
    pub target_type: Option<String>, // "weighing" / "requirement"
    pub target_id: Option<i64>,

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

impl ActionLog {
    /// 以当前时间创建一条日志
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.to_db_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            yard_id: None,
            target_type: None,
            target_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_target(mut self, yard_id: i64, target_type: &str, target_id: i64) -> Self {
        self.yard_id = Some(yard_id);
        self.target_type = Some(target_type.to_string());
        self.target_id = Some(target_id);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateRequirement,       // 规则判定生成过磅要求
    CreateManualRequirement, // 人工创建过磅要求
    SkipRequirement,         // 跳过过磅要求
    RecordWeighing,          // 记录称重
    UpdateConfig,            // 修改配置
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::CreateRequirement => "CREATE_REQUIREMENT",
            ActionType::CreateManualRequirement => "CREATE_MANUAL_REQUIREMENT",
            ActionType::SkipRequirement => "SKIP_REQUIREMENT",
            ActionType::RecordWeighing => "RECORD_WEIGHING",
            ActionType::UpdateConfig => "UPDATE_CONFIG",
        }
    }
}
