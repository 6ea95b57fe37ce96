// ==========================================
// 合购后台系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod commission;
pub mod competence;
pub mod import;
pub mod sale;
pub mod types;

// 重导出核心类型
pub use commission::{
    CommissionGenerationResult, CommissionRule, CommissionSummary, CommissionTier,
    ReceivableCommission,
};
pub use competence::Competence;
pub use import::{
    BatchValidation, ImportProgress, ImportResult, ImportStats, ParsedSaleData, ParsedSheet,
    RawRow, RawValue, RowValidation, ValidationSummary,
};
pub use sale::{ImportLog, NewSale, Quota, Sale};
pub use types::{
    BeneficiaryType, CommissionStatus, DelinquencyStatus, ImportPhase, LayoutType, ReferenceKind,
    SaleStatus,
};
