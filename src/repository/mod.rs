// ==========================================
// 合购后台系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod commission_repo;
pub mod commission_repo_impl;
pub mod error;
pub mod sale_import_repo;
pub mod sale_import_repo_impl;

pub use commission_repo::{CommissionRepository, CompetenceCommissionRow};
pub use commission_repo_impl::CommissionRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use sale_import_repo::{SaleImportRepository, Upserted};
pub use sale_import_repo_impl::SaleImportRepositoryImpl;
