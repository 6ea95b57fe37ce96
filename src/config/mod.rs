// ==========================================
// 合购后台系统 - 配置层
// ==========================================
// 职责: 导入/佣金模块的可调参数
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportConfigReader, ImportSettings};
