// ==========================================
// 合购后台系统 - 引擎层
// ==========================================
// 职责: 实现佣金业务规则,不拼 SQL
// ==========================================

pub mod commission_engine;

// 重导出核心引擎
pub use commission_engine::{CommissionRuleEngine, BLOCK_REASON_DELINQUENCY};
