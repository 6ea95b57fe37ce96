// ==========================================
// 合购后台系统 - 佣金 Repository Trait
// ==========================================
// 职责: 佣金规则读取 + 应收佣金写入 + 批量条件更新
// 红线: 状态条件写在 SQL 的 WHERE 中，单条语句内原子完成
// ==========================================

use crate::domain::commission::{CommissionRule, ReceivableCommission};
use crate::domain::competence::Competence;
use crate::domain::sale::{Delinquency, Sale};
use crate::domain::types::{BeneficiaryType, SaleStatus};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

// ==========================================
// CompetenceCommissionRow - 账期汇总用的应收佣金行
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct CompetenceCommissionRow {
    pub commission: ReceivableCommission,
    pub salesperson_name: Option<String>,
    pub representative_name: Option<String>,
}

// ==========================================
// CommissionRepository Trait
// ==========================================
// 实现者: CommissionRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    // ===== 销售 =====

    /// 读取销售及其份额作用域（组号/管理公司）
    async fn load_sale(&self, sale_id: &str) -> RepositoryResult<Option<Sale>>;

    async fn update_sale_status(&self, sale_id: &str, status: SaleStatus) -> RepositoryResult<usize>;

    // ===== 逾期 =====

    async fn has_open_delinquency(&self, sale_id: &str) -> RepositoryResult<bool>;

    async fn insert_delinquency(&self, delinquency: &Delinquency) -> RepositoryResult<String>;

    /// 将销售的未结逾期记录标记为已解决
    ///
    /// # 返回
    /// - Ok(rows): 被更新的记录数
    async fn resolve_open_delinquencies(&self, sale_id: &str) -> RepositoryResult<usize>;

    // ===== 规则 =====

    /// 读取某受益人类型的启用规则（含档位），按创建时间倒序
    async fn load_active_rules(&self, beneficiary: BeneficiaryType) -> RepositoryResult<Vec<CommissionRule>>;

    /// 写入规则及其档位（单事务）
    async fn insert_rule(&self, rule: &CommissionRule) -> RepositoryResult<()>;

    // ===== 应收佣金 =====

    async fn insert_receivable(&self, commission: &ReceivableCommission) -> RepositoryResult<String>;

    async fn get_receivable(&self, commission_id: &str) -> RepositoryResult<Option<ReceivableCommission>>;

    async fn list_receivables_by_sale(&self, sale_id: &str) -> RepositoryResult<Vec<ReceivableCommission>>;

    /// 按付款账期列出应收佣金（附受益人名称）
    async fn list_by_payment_competence(
        &self,
        competence: Competence,
    ) -> RepositoryResult<Vec<CompetenceCommissionRow>>;

    // ===== 批量条件更新 =====

    /// PENDENTE → BLOQUEADO
    async fn block_pending(&self, sale_id: &str, reason: &str) -> RepositoryResult<usize>;

    /// BLOQUEADO → PENDENTE，清空原因并记录释放时间
    async fn unblock(&self, sale_id: &str, released_at: NaiveDateTime) -> RepositoryResult<usize>;

    /// PENDENTE|BLOQUEADO → CANCELADO，仅限付款账期 ≥ from
    async fn cancel_from_competence(&self, sale_id: &str, from: Competence) -> RepositoryResult<usize>;

    /// PENDENTE|BLOQUEADO → PAGO（单条）
    ///
    /// # 返回
    /// - Ok(0): 当前状态不允许付款
    /// - Ok(1): 已更新
    async fn mark_paid(
        &self,
        commission_id: &str,
        paid_value: f64,
        paid_at: NaiveDateTime,
    ) -> RepositoryResult<usize>;
}
