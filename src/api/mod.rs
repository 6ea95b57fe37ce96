// ==========================================
// 合购后台系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行及上层调用
// ==========================================

pub mod commission_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use commission_api::CommissionApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{CommissionBatchSummary, ImportApi, ImportFileResponse};
