// ==========================================
// 合购后台系统 - 佣金规则引擎
// ==========================================
// 职责: 按规则/档位为销售生成应收佣金，并维护其生命周期
// 状态机: PENDENTE ⇄ BLOQUEADO, PENDENTE|BLOQUEADO → PAGO / CANCELADO
// 红线: Engine 不拼 SQL；批量状态变更由仓储层单语句条件更新完成
// ==========================================

use crate::domain::commission::{
    CommissionGenerationResult, CommissionRule, CommissionSummary, ReceivableCommission,
};
use crate::domain::competence::Competence;
use crate::domain::sale::{Delinquency, Sale};
use crate::domain::types::{BeneficiaryType, CommissionStatus, DelinquencyStatus, SaleStatus};
use crate::repository::commission_repo::CommissionRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Local;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const BLOCK_REASON_DELINQUENCY: &str = "Inadimplência detectada";
pub const MSG_SALE_NOT_FOUND: &str = "Venda não encontrada";
pub const MSG_SALE_VOID: &str = "Venda cancelada/estornada";

// ==========================================
// CommissionRuleEngine
// ==========================================
pub struct CommissionRuleEngine<R>
where
    R: CommissionRepository,
{
    repo: R,
}

impl<R> CommissionRuleEngine<R>
where
    R: CommissionRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    // ==========================================
    // 生成
    // ==========================================

    /// 为销售生成应收佣金
    ///
    /// # 返回
    /// - 销售不存在: success=false, errors=["Venda não encontrada"]
    /// - 销售已取消/冲销: success=true, 0 条, skipped_reason 说明原因
    /// - 其余: 每条写入失败计入 errors，不影响其他条目
    #[instrument(skip(self))]
    pub async fn generate_commissions(&self, sale_id: &str) -> RepositoryResult<CommissionGenerationResult> {
        let Some(sale) = self.repo.load_sale(sale_id).await? else {
            return Ok(CommissionGenerationResult {
                success: false,
                comissoes: 0,
                errors: vec![MSG_SALE_NOT_FOUND.to_string()],
                skipped_reason: None,
            });
        };

        if sale.status.is_void() {
            debug!(status = %sale.status, "销售已作废，跳过佣金生成");
            return Ok(CommissionGenerationResult {
                success: true,
                comissoes: 0,
                errors: Vec::new(),
                skipped_reason: Some(MSG_SALE_VOID.to_string()),
            });
        }

        let blocked = self.repo.has_open_delinquency(sale_id).await?;
        let origin = Competence::of_date(sale.sale_date);

        let mut created = 0;
        let mut errors = Vec::new();

        let beneficiaries = [
            (BeneficiaryType::Salesperson, sale.salesperson_id.is_some()),
            (BeneficiaryType::Representative, sale.representative_id.is_some()),
        ];

        for (beneficiary, linked) in beneficiaries {
            if !linked {
                continue;
            }

            let rules = self.applicable_rules(&sale, beneficiary).await?;
            for rule in &rules {
                for commission in build_receivables(&sale, rule, origin, blocked) {
                    match self.repo.insert_receivable(&commission).await {
                        Ok(_) => created += 1,
                        Err(e) => {
                            let label = match beneficiary {
                                BeneficiaryType::Salesperson => "vendedor",
                                BeneficiaryType::Representative => "representante",
                            };
                            warn!(rule_id = %rule.id, error = %e, "应收佣金写入失败");
                            errors.push(format!("Erro ao criar comissão {}: {}", label, e));
                        }
                    }
                }
            }
        }

        info!(created, blocked, errors = errors.len(), "佣金生成完成");

        Ok(CommissionGenerationResult {
            success: errors.is_empty(),
            comissoes: created,
            errors,
            skipped_reason: None,
        })
    }

    /// 读取某受益人类型的启用规则，并按份额作用域过滤
    async fn applicable_rules(
        &self,
        sale: &Sale,
        beneficiary: BeneficiaryType,
    ) -> RepositoryResult<Vec<CommissionRule>> {
        let rules = self.repo.load_active_rules(beneficiary).await?;
        Ok(rules
            .into_iter()
            .filter(|r| {
                r.applies_to(
                    sale.quota_administrator_id.as_deref(),
                    sale.quota_group.as_deref(),
                )
            })
            .collect())
    }

    // ==========================================
    // 生命周期（按销售批量）
    // ==========================================

    /// PENDENTE → BLOQUEADO
    pub async fn block_by_delinquency(&self, sale_id: &str) -> RepositoryResult<usize> {
        let rows = self.repo.block_pending(sale_id, BLOCK_REASON_DELINQUENCY).await?;
        debug!(sale_id, rows, "佣金已冻结");
        Ok(rows)
    }

    /// BLOQUEADO → PENDENTE
    pub async fn unblock(&self, sale_id: &str) -> RepositoryResult<usize> {
        let rows = self.repo.unblock(sale_id, Local::now().naive_local()).await?;
        debug!(sale_id, rows, "佣金已解冻");
        Ok(rows)
    }

    /// 取消当前账期及以后的未付佣金
    pub async fn cancel_future(&self, sale_id: &str) -> RepositoryResult<usize> {
        self.cancel_future_from(sale_id, Competence::current()).await
    }

    /// 取消付款账期 ≥ from 的未付佣金；更早的保持不变
    pub async fn cancel_future_from(&self, sale_id: &str, from: Competence) -> RepositoryResult<usize> {
        let rows = self.repo.cancel_from_competence(sale_id, from).await?;
        debug!(sale_id, from = %from, rows, "未来佣金已取消");
        Ok(rows)
    }

    // ==========================================
    // 单条付款确认
    // ==========================================

    /// PENDENTE|BLOQUEADO → PAGO
    ///
    /// # 参数
    /// - paid_value: 实付金额（None 时取预计金额）
    pub async fn confirm_payment(
        &self,
        commission_id: &str,
        paid_value: Option<f64>,
    ) -> RepositoryResult<ReceivableCommission> {
        let current = self
            .repo
            .get_receivable(commission_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "comissoes_receber".to_string(),
                id: commission_id.to_string(),
            })?;

        let invalid = || RepositoryError::InvalidStateTransition {
            from: current.status.to_string(),
            to: CommissionStatus::Paid.to_string(),
        };

        if !current.status.can_transition_to(CommissionStatus::Paid) {
            return Err(invalid());
        }

        let value = paid_value.unwrap_or(current.predicted_value);
        let rows = self
            .repo
            .mark_paid(commission_id, value, Local::now().naive_local())
            .await?;
        if rows == 0 {
            // 并发下已被其他调用改为终态
            return Err(invalid());
        }

        self.repo
            .get_receivable(commission_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "comissoes_receber".to_string(),
                id: commission_id.to_string(),
            })
    }

    // ==========================================
    // 逾期与销售状态
    // ==========================================

    /// 登记逾期并冻结该销售的待付佣金
    ///
    /// # 返回
    /// - Ok(rows): 被冻结的佣金条数
    pub async fn register_delinquency(&self, sale_id: &str, value: f64, note: &str) -> RepositoryResult<usize> {
        self.repo
            .insert_delinquency(&Delinquency {
                sale_id: sale_id.to_string(),
                overdue_value: value.abs(),
                note: note.to_string(),
                status: DelinquencyStatus::Open,
            })
            .await?;
        self.block_by_delinquency(sale_id).await
    }

    /// 解决全部未结逾期并解冻佣金
    ///
    /// # 返回
    /// - Ok(rows): 被解冻的佣金条数
    pub async fn resolve_delinquencies(&self, sale_id: &str) -> RepositoryResult<usize> {
        let resolved = self.repo.resolve_open_delinquencies(sale_id).await?;
        debug!(sale_id, resolved, "逾期已解决");
        self.unblock(sale_id).await
    }

    /// 取消（或冲销）销售并取消未来佣金
    pub async fn cancel_sale(&self, sale_id: &str, reversal: bool) -> RepositoryResult<usize> {
        let status = if reversal {
            SaleStatus::Reversed
        } else {
            SaleStatus::Cancelled
        };
        self.set_sale_status(sale_id, status).await?;
        self.cancel_future(sale_id).await
    }

    /// 标记销售结清
    pub async fn settle_sale(&self, sale_id: &str) -> RepositoryResult<()> {
        self.set_sale_status(sale_id, SaleStatus::Settled).await
    }

    async fn set_sale_status(&self, sale_id: &str, status: SaleStatus) -> RepositoryResult<()> {
        let rows = self.repo.update_sale_status(sale_id, status).await?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "vendas".to_string(),
                id: sale_id.to_string(),
            });
        }
        info!(sale_id, status = %status, "销售状态已更新");
        Ok(())
    }

    // ==========================================
    // 汇总
    // ==========================================

    /// 按付款账期汇总
    pub async fn summary_by_competence(&self, competence: Competence) -> RepositoryResult<CommissionSummary> {
        let rows = self.repo.list_by_payment_competence(competence).await?;

        let mut summary = CommissionSummary {
            competencia: competence.to_string(),
            ..Default::default()
        };

        for row in rows {
            let c = &row.commission;
            match c.status {
                CommissionStatus::Pending => summary.total_pendente += c.predicted_value,
                CommissionStatus::Blocked => summary.total_bloqueado += c.predicted_value,
                CommissionStatus::Paid => {
                    summary.total_pago += c.paid_value.filter(|v| *v != 0.0).unwrap_or(c.predicted_value)
                }
                CommissionStatus::Cancelled => {}
            }

            if let (Some(_), Some(name)) = (&c.salesperson_id, &row.salesperson_name) {
                *summary.por_vendedor.entry(name.clone()).or_insert(0.0) += c.predicted_value;
            }
            if let (Some(_), Some(name)) = (&c.representative_id, &row.representative_name) {
                *summary.por_representante.entry(name.clone()).or_insert(0.0) += c.predicted_value;
            }
        }

        Ok(summary)
    }
}

/// 展开 规则 × 档位 × 期数 的应收佣金
fn build_receivables(
    sale: &Sale,
    rule: &CommissionRule,
    origin: Competence,
    blocked: bool,
) -> Vec<ReceivableCommission> {
    let (status, block_reason) = if blocked {
        (CommissionStatus::Blocked, Some(BLOCK_REASON_DELINQUENCY.to_string()))
    } else {
        (CommissionStatus::Pending, None)
    };

    let (salesperson_id, representative_id) = match rule.beneficiary {
        BeneficiaryType::Salesperson => (sale.salesperson_id.clone(), None),
        BeneficiaryType::Representative => (None, sale.representative_id.clone()),
    };

    let mut out = Vec::new();
    for tier in rule.ordered_tiers() {
        let value = tier.installment_value(sale.credit_value);
        for installment in 1..=tier.installments {
            out.push(ReceivableCommission {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                salesperson_id: salesperson_id.clone(),
                representative_id: representative_id.clone(),
                rule_id: rule.id.clone(),
                tier_id: tier.id.clone(),
                beneficiary: rule.beneficiary,
                installment,
                total_installments: tier.installments,
                calculation_base: sale.credit_value,
                percentage: tier.percentage,
                predicted_value: value,
                paid_value: None,
                origin_competence: origin,
                payment_competence: tier.payment_competence(origin, installment),
                status,
                block_reason: block_reason.clone(),
                released_at: None,
                paid_at: None,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commission::CommissionTier;
    use chrono::NaiveDate;

    fn sale() -> Sale {
        Sale {
            id: "V1".to_string(),
            quota_id: Some("Q1".to_string()),
            client_id: None,
            salesperson_id: Some("S1".to_string()),
            representative_id: Some("R1".to_string()),
            sale_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            credit_value: 100_000.0,
            total_value: 0.0,
            status: SaleStatus::Active,
            note: None,
            quota_group: Some("1010".to_string()),
            quota_administrator_id: None,
        }
    }

    fn rule(beneficiary: BeneficiaryType) -> CommissionRule {
        CommissionRule {
            id: "REGRA".to_string(),
            name: "Padrão".to_string(),
            beneficiary,
            administrator_id: None,
            group_filter: None,
            active: true,
            tiers: vec![
                CommissionTier {
                    id: "F2".to_string(),
                    rule_id: "REGRA".to_string(),
                    order: 2,
                    percentage: 2.0,
                    installments: 2,
                    grace_months: 0,
                },
                CommissionTier {
                    id: "F1".to_string(),
                    rule_id: "REGRA".to_string(),
                    order: 1,
                    percentage: 3.0,
                    installments: 10,
                    grace_months: 1,
                },
            ],
        }
    }

    #[test]
    fn test_build_receivables_expands_tiers_in_order() {
        let s = sale();
        let origin = Competence::of_date(s.sale_date);
        let list = build_receivables(&s, &rule(BeneficiaryType::Salesperson), origin, false);

        assert_eq!(list.len(), 12);
        assert_eq!(list[0].tier_id, "F1");
        assert!((list[0].predicted_value - 300.0).abs() < 1e-9);
        assert_eq!(list[0].payment_competence.to_string(), "2024-03");
        assert_eq!(list[0].status, CommissionStatus::Pending);
        assert_eq!(list[0].representative_id, None);

        assert_eq!(list[10].tier_id, "F2");
        assert!((list[10].predicted_value - 1000.0).abs() < 1e-9);
        assert_eq!(list[10].payment_competence.to_string(), "2024-02");
        assert_eq!(list[11].payment_competence.to_string(), "2024-03");
    }

    #[test]
    fn test_build_receivables_blocked_for_representative() {
        let s = sale();
        let origin = Competence::of_date(s.sale_date);
        let list = build_receivables(&s, &rule(BeneficiaryType::Representative), origin, true);

        assert!(list.iter().all(|c| c.status == CommissionStatus::Blocked));
        assert!(list
            .iter()
            .all(|c| c.block_reason.as_deref() == Some(BLOCK_REASON_DELINQUENCY)));
        assert!(list.iter().all(|c| c.salesperson_id.is_none()));
        assert_eq!(list[0].representative_id.as_deref(), Some("R1"));
    }
}
