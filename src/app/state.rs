// ==========================================
// 场站过磅管理 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ConfigApi, WeighingApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version};
use crate::repository::{
    ActionLogRepository, EntryPermitRepository, TaskRepository, TruckRepository,
    VisitorRepository, WeighingRepository, WeighingRequirementRepository, YardRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源，所有仓储共享同一连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 过磅业务API
    pub weighing_api: Arc<WeighingApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,

    // ===== 主数据仓储（场站/车辆/任务/许可/访客由外部维护）=====
    pub yard_repo: Arc<YardRepository>,
    pub truck_repo: Arc<TruckRepository>,
    pub task_repo: Arc<TaskRepository>,
    pub permit_repo: Arc<EntryPermitRepository>,
    pub visitor_repo: Arc<VisitorRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并建表（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let schema_version = read_schema_version(&conn).map_err(|e| format!("读取schema版本失败: {}", e))?;
        tracing::debug!(?schema_version, "数据库schema就绪");
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let yard_repo = Arc::new(YardRepository::new(conn.clone()));
        let truck_repo = Arc::new(TruckRepository::new(conn.clone()));
        let task_repo = Arc::new(TaskRepository::new(conn.clone()));
        let permit_repo = Arc::new(EntryPermitRepository::new(conn.clone()));
        let visitor_repo = Arc::new(VisitorRepository::new(conn.clone()));
        let requirement_repo = Arc::new(WeighingRequirementRepository::new(conn.clone()));
        let weighing_repo = Arc::new(WeighingRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let weighing_api = Arc::new(WeighingApi::new(
            yard_repo.clone(),
            truck_repo.clone(),
            task_repo.clone(),
            permit_repo.clone(),
            visitor_repo.clone(),
            requirement_repo,
            weighing_repo,
            config_manager.clone(),
        ));
        let config_api = Arc::new(ConfigApi::new(config_manager, action_log_repo.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            weighing_api,
            config_api,
            yard_repo,
            truck_repo,
            task_repo,
            permit_repo,
            visitor_repo,
            action_log_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 YARD_WEIGHING_DB_PATH（非空时）
/// - 开发环境: 用户数据目录/yard-weighing-dev/yard_weighing.db
/// - 生产环境: 用户数据目录/yard-weighing/yard_weighing.db
/// - 拿不到用户数据目录时: ./yard_weighing.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("YARD_WEIGHING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./yard_weighing.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("yard-weighing-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("yard-weighing");

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("yard_weighing.db");
        }
    }

    path.to_string_lossy().to_string()
}
