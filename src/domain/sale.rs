// ==========================================
// 合购后台系统 - 销售及其从属记录
// ==========================================
// 对齐: vendas / cotas / recebimentos / inadimplencias /
//       ajustes_conciliacao / comissoes_regras /
//       comissoes_representantes / import_logs
// ==========================================

use crate::domain::types::{DelinquencyStatus, LayoutType, SaleStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Quota - 份额（组号 + 份额编码）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub id: String,
    pub group: String,
    pub code: String,
    pub segment: String,                  // 份额类型（IMÓVEL / AUTO ...）
    pub administrator_id: Option<String>, // 所属管理公司
}

/// 参照实体的规范化名称（去首尾空白 + 大写）
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

impl Quota {
    /// 份额身份键: GRUPO-CODIGO（大写）
    pub fn identity_key(group: &str, code: &str) -> String {
        format!("{}-{}", group.trim(), code.trim()).to_uppercase()
    }
}

// ==========================================
// NewSale - 待写入的销售
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub quota_id: String,
    pub client_id: Option<String>,
    pub salesperson_id: Option<String>,
    pub representative_id: Option<String>,
    pub sale_date: NaiveDate,
    pub credit_value: f64,
    pub total_value: f64,
    pub status: SaleStatus,
    pub note: Option<String>,
}

// ==========================================
// Sale - 已落库的销售（带份额作用域字段）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub quota_id: Option<String>,
    pub client_id: Option<String>,
    pub salesperson_id: Option<String>,
    pub representative_id: Option<String>,
    pub sale_date: NaiveDate,
    pub credit_value: f64,
    pub total_value: f64,
    pub status: SaleStatus,
    pub note: Option<String>,

    // 关联份额（佣金规则作用域匹配用）
    pub quota_group: Option<String>,
    pub quota_administrator_id: Option<String>,
}

// ==========================================
// Receipt - 回款分期
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub sale_id: String,
    pub installment: u32,
    pub received_value: f64,
    pub credit_date: NaiveDate,
}

// ==========================================
// Delinquency - 逾期记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delinquency {
    pub sale_id: String,
    pub overdue_value: f64, // 绝对值
    pub note: String,
    pub status: DelinquencyStatus,
}

// ==========================================
// ReconciliationAdjustment - 对账差异调整
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationAdjustment {
    pub sale_id: String,
    pub kind: String,
    pub expected_value: f64,
    pub real_value: f64,
    pub difference: f64, // 有符号: real - expected
    pub note: String,
}

// ==========================================
// SalespersonCommission - 导入时的销售员佣金实例
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalespersonCommission {
    pub sale_id: String,
    pub salesperson_id: String,
    pub percentage: f64,
    pub predicted_value: f64,
    pub installments: u32,
}

// ==========================================
// RepresentativeCommission - 导入时的代理商佣金记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentativeCommission {
    pub sale_id: String,
    pub representative_id: String,
    pub percentage: f64,
    pub additional_percentage: Option<f64>,
    pub value: f64,
}

// ==========================================
// ImportLog - 导入日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLog {
    pub layout: LayoutType,
    pub file_name: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: usize,
    pub total_received: f64,
    pub total_divergences: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
