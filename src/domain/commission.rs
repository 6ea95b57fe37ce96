// ==========================================
// 合购后台系统 - 佣金规则与应收佣金
// ==========================================
// 对齐: regras_comissao / faixas_comissao / comissoes_receber
// 说明: 规则为配置数据，引擎只读
// ==========================================

use crate::domain::competence::Competence;
use crate::domain::types::{BeneficiaryType, CommissionStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// CommissionTier - 佣金档位 (faixa)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionTier {
    pub id: String,
    pub rule_id: String,
    pub order: i32,
    pub percentage: f64,
    pub installments: u32,
    pub grace_months: u32, // carência
}

impl CommissionTier {
    /// 档位佣金总额 = 信用额 × 百分比 / 100
    pub fn total_for(&self, credit_value: f64) -> f64 {
        credit_value * self.percentage / 100.0
    }

    /// 每期预计金额；期数为 0 时返回 0
    pub fn installment_value(&self, credit_value: f64) -> f64 {
        if self.installments == 0 {
            return 0.0;
        }
        self.total_for(credit_value) / self.installments as f64
    }

    /// 第 k 期（1 起）的付款账期 = 起始账期 + 1 + (k-1) + 宽限月数
    pub fn payment_competence(&self, origin: Competence, installment: u32) -> Competence {
        origin.add_months(1 + installment.saturating_sub(1) + self.grace_months)
    }
}

// ==========================================
// CommissionRule - 佣金规则
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: String,
    pub name: String,
    pub beneficiary: BeneficiaryType,
    pub administrator_id: Option<String>, // 作用域: 管理公司
    pub group_filter: Option<String>,     // 作用域: 组号
    pub active: bool,
    pub tiers: Vec<CommissionTier>,
}

impl CommissionRule {
    /// 作用域匹配：未设置的过滤条件视为通配
    pub fn applies_to(&self, administrator_id: Option<&str>, group: Option<&str>) -> bool {
        if let Some(required) = self.administrator_id.as_deref() {
            if administrator_id != Some(required) {
                return false;
            }
        }

        if let Some(required) = self.group_filter.as_deref() {
            let required = required.trim();
            if !required.is_empty() {
                match group {
                    Some(g) if g.trim().eq_ignore_ascii_case(required) => {}
                    _ => return false,
                }
            }
        }

        true
    }

    /// 按 order 升序的档位
    pub fn ordered_tiers(&self) -> Vec<&CommissionTier> {
        let mut tiers: Vec<&CommissionTier> = self.tiers.iter().collect();
        tiers.sort_by_key(|t| t.order);
        tiers
    }
}

// ==========================================
// ReceivableCommission - 应收佣金（单期）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivableCommission {
    pub id: String,
    pub sale_id: String,
    pub salesperson_id: Option<String>,
    pub representative_id: Option<String>,
    pub rule_id: String,
    pub tier_id: String,
    pub beneficiary: BeneficiaryType,
    pub installment: u32,
    pub total_installments: u32,
    pub calculation_base: f64,
    pub percentage: f64,
    pub predicted_value: f64,
    pub paid_value: Option<f64>,
    pub origin_competence: Competence,
    pub payment_competence: Competence,
    pub status: CommissionStatus,
    pub block_reason: Option<String>,
    pub released_at: Option<NaiveDateTime>, // data_liberacao
    pub paid_at: Option<NaiveDateTime>,     // data_pagamento
}

// ==========================================
// CommissionGenerationResult - 佣金生成结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionGenerationResult {
    pub success: bool,
    pub comissoes: usize,
    pub errors: Vec<String>,
    /// 未生成的原因（例如销售已取消），不视为错误
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

// ==========================================
// CommissionSummary - 账期佣金汇总
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub competencia: String,
    pub total_pendente: f64,
    pub total_bloqueado: f64,
    pub total_pago: f64,
    pub por_vendedor: BTreeMap<String, f64>,
    pub por_representante: BTreeMap<String, f64>,
}
