// ==========================================
// 合购后台系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 合购（consórcio）销售表格导入 + 佣金排期
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 佣金规则
pub mod engine;

// 导入层 - 外部表格
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::types::{
    BeneficiaryType, CommissionStatus, ImportPhase, LayoutType, ReferenceKind, SaleStatus,
};
pub use domain::{Competence, ImportResult, ImportStats, ReceivableCommission};
pub use engine::CommissionRuleEngine;
pub use importer::SaleImporter;
pub use api::{ApiError, CommissionApi, ImportApi};

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Consórcio Backoffice";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
