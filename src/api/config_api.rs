// ==========================================
// 场站过磅管理 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新、快照管理
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::action_log_repo::ActionLogRepository;

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================

/// 配置管理API
///
/// 职责：
/// 1. 配置查询
/// 2. 配置更新（带取值校验）
/// 3. 配置快照管理
/// 4. ActionLog记录
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ConfigApi {
    /// 创建新的ConfigApi实例
    pub fn new(config_manager: Arc<ConfigManager>, action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self {
            config_manager,
            action_log_repo,
        }
    }

    /// 查询单个 global 配置
    pub fn get_config(&self, key: &str) -> ApiResult<Option<ConfigItem>> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }

        let value = self
            .config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        Ok(value.map(|value| ConfigItem {
            key: key.to_string(),
            value,
        }))
    }

    /// 更新单个配置
    ///
    /// # 参数
    /// - key: 配置键
    /// - value: 配置值
    /// - operator: 操作人
    /// - reason: 修改原因
    pub fn update_config(&self, key: &str, value: &str, operator: &str, reason: &str) -> ApiResult<()> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("修改原因不能为空".to_string()));
        }
        validate_config_value(key, value)?;

        let old_value = self
            .config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        self.config_manager
            .set_config_value(key, value)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let action_log = ActionLog::new(ActionType::UpdateConfig, operator)
            .with_payload(serde_json::json!({
                "key": key,
                "old_value": old_value,
                "new_value": value,
                "reason": reason,
            }))
            .with_detail(format!("修改配置: {}", key));
        self.action_log_repo.insert(&action_log)?;

        tracing::info!(key, value, operator, "配置已更新");
        Ok(())
    }

    /// 获取配置快照（JSON）
    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        self.config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 从快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_from_snapshot(&self, snapshot_json: &str, operator: &str, reason: &str) -> ApiResult<usize> {
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("恢复原因不能为空".to_string()));
        }

        let count = self
            .config_manager
            .restore_config_from_snapshot(snapshot_json)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let action_log = ActionLog::new(ActionType::UpdateConfig, operator)
            .with_payload(serde_json::json!({
                "restored": count,
                "reason": reason,
            }))
            .with_detail(format!("从快照恢复配置: {}项", count));
        self.action_log_repo.insert(&action_log)?;

        Ok(count)
    }
}

/// 已知配置键的取值校验，未知键不校验
fn validate_config_value(key: &str, value: &str) -> ApiResult<()> {
    let value = value.trim();
    let valid = match key {
        config_keys::MAX_WEIGHT_KG => value
            .parse::<rust_decimal::Decimal>()
            .map(|d| d > rust_decimal::Decimal::ZERO)
            .unwrap_or(false),
        config_keys::HISTORY_DEFAULT_LIMIT => value.parse::<usize>().map(|n| n > 0).unwrap_or(false),
        config_keys::PAIRING_PLATE_FALLBACK => {
            matches!(value.to_lowercase().as_str(), "true" | "false" | "1" | "0")
        }
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(ApiError::ValidationError(format!("配置{}取值无效: {}", key, value)))
    }
}

// ==========================================
// DTO
// ==========================================

/// 配置项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}
