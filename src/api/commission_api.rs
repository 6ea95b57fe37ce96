// ==========================================
// 合购后台系统 - 佣金API
// ==========================================
// 职责: 佣金生成与生命周期操作的对外入口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::db::open_and_init;
use crate::domain::commission::{CommissionGenerationResult, CommissionSummary, ReceivableCommission};
use crate::domain::competence::Competence;
use crate::engine::CommissionRuleEngine;
use crate::repository::{CommissionRepository, CommissionRepositoryImpl};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 佣金API
pub struct CommissionApi {
    engine: CommissionRuleEngine<CommissionRepositoryImpl>,
}

impl CommissionApi {
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            engine: CommissionRuleEngine::new(CommissionRepositoryImpl::from_connection(conn)),
        }
    }

    pub async fn generate_commissions(&self, sale_id: &str) -> ApiResult<CommissionGenerationResult> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.generate_commissions(sale_id).await?)
    }

    pub async fn block_by_delinquency(&self, sale_id: &str) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.block_by_delinquency(sale_id).await?)
    }

    pub async fn unblock(&self, sale_id: &str) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.unblock(sale_id).await?)
    }

    pub async fn cancel_future(&self, sale_id: &str) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.cancel_future(sale_id).await?)
    }

    /// 确认付款
    ///
    /// # 参数
    /// - paid_value: 实付金额（None 时取预计金额；不允许负数）
    pub async fn confirm_payment(
        &self,
        commission_id: &str,
        paid_value: Option<f64>,
    ) -> ApiResult<ReceivableCommission> {
        let commission_id = require_id(commission_id, "commission_id")?;
        if let Some(v) = paid_value {
            if !v.is_finite() || v < 0.0 {
                return Err(ApiError::InvalidInput(format!("valor pago inválido: {}", v)));
            }
        }
        Ok(self.engine.confirm_payment(commission_id, paid_value).await?)
    }

    pub async fn register_delinquency(&self, sale_id: &str, value: f64, note: &str) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.register_delinquency(sale_id, value, note).await?)
    }

    pub async fn resolve_delinquencies(&self, sale_id: &str) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.resolve_delinquencies(sale_id).await?)
    }

    pub async fn cancel_sale(&self, sale_id: &str, reversal: bool) -> ApiResult<usize> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.cancel_sale(sale_id, reversal).await?)
    }

    pub async fn settle_sale(&self, sale_id: &str) -> ApiResult<()> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.settle_sale(sale_id).await?)
    }

    /// 某销售的全部应收佣金
    pub async fn list_by_sale(&self, sale_id: &str) -> ApiResult<Vec<ReceivableCommission>> {
        let sale_id = require_id(sale_id, "sale_id")?;
        Ok(self.engine.repository().list_receivables_by_sale(sale_id).await?)
    }

    /// 账期汇总
    ///
    /// # 参数
    /// - competence: YYYY-MM
    pub async fn summary_by_competence(&self, competence: &str) -> ApiResult<CommissionSummary> {
        let competence: Competence = competence.parse().map_err(ApiError::InvalidInput)?;
        Ok(self.engine.summary_by_competence(competence).await?)
    }
}

fn require_id<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("  V1 ", "sale_id").unwrap(), "V1");
        assert!(matches!(
            require_id("   ", "sale_id"),
            Err(ApiError::InvalidInput(_))
        ));
    }
}
