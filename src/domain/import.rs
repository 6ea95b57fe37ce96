// ==========================================
// 合购后台系统 - 导入领域模型
// ==========================================
// 职责: 原始单元格 / 解析后的销售行 / 校验结果 / 导入结果
// ==========================================

use crate::domain::types::ImportPhase;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RawValue - 原始单元格值
// ==========================================
// 表格单元格只有三种形态：空 / 文本 / 数字（Excel 日期保留序列号）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Empty,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// 空白判定：空、空白字符串
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    /// 真值判定：空白与数字 0 均为假
    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Number(n) => *n != 0.0 && !n.is_nan(),
            other => !other.is_blank(),
        }
    }

    /// 转为去首尾空白的文本
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::from(value.as_str())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// 一行原始数据（表头 → 单元格）
pub type RawRow = HashMap<String, RawValue>;

// ==========================================
// ParsedSheet - 解析后的工作表
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub file_name: String,
    pub columns: Vec<String>, // 表头（保持原顺序）
    pub rows: Vec<RawRow>,
}

// ==========================================
// InstallmentEntry - 单期回款
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentEntry {
    pub number: u32,
    pub received_value: f64,
    pub credit_date: Option<NaiveDate>,
}

// ==========================================
// ParsedSaleData - 规范化后的销售行
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSaleData {
    pub sale_date: Option<NaiveDate>,
    pub administrator: String,
    pub representative: String,
    pub segment: String,
    pub group: String,
    pub quota_code: String,
    pub credit_value: f64,
    pub total_value: f64,
    pub status_text: String,
    pub note: String,
    pub salesperson1: String,
    pub salesperson1_percentage: f64,
    pub salesperson2: String,
    pub salesperson2_percentage: f64,
    pub representative_commission1: f64,
    pub representative_commission2: f64,
    pub client: String,
    pub installments: Vec<InstallmentEntry>,

    // 派生标志
    pub is_cancellation: bool,
    pub is_reversal: bool,
    pub is_negative: bool,
    pub divergence_value: f64,
}

impl ParsedSaleData {
    /// 各期回款合计
    pub fn received_total(&self) -> f64 {
        self.installments.iter().map(|p| p.received_value).sum()
    }

    /// 负数回款的绝对值合计（逾期金额）
    pub fn negative_total(&self) -> f64 {
        self.installments
            .iter()
            .filter(|p| p.received_value < 0.0)
            .map(|p| p.received_value.abs())
            .sum()
    }
}

// ==========================================
// RowValidation - 单行校验结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowValidation {
    pub row: usize, // 1 起
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub data: ParsedSaleData,
}

// ==========================================
// ValidationIssue - 全局错误/警告条目
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Required,
    Tolerance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: usize,
    pub message: String,
    pub kind: IssueKind,
}

// ==========================================
// ValidationSummary - 批量校验汇总
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub total_credit_value: f64,
    pub total_received_value: f64,
    pub total_commission_percentage: f64,
    pub divergences: usize,
    pub delinquencies: usize,
    pub cancellations: usize,
    pub reversals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
    pub rows: Vec<RowValidation>,
}

// ==========================================
// ImportStats / ImportResult - 导入结果（对外契约，字段名沿用前端口径）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub vendas_criadas: usize,
    pub cotas_criadas: usize,
    pub clientes_criados: usize,
    pub vendedores_criados: usize,
    pub administradoras_criadas: usize,
    pub representantes_criados: usize,
    pub recebimentos_criados: usize,
    pub comissoes_criadas: usize,
    pub inadimplencias_criadas: usize,
    pub ajustes_criados: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub import_log_id: Option<String>,
    pub stats: ImportStats,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 本次新建销售的 ID（按文件顺序），供佣金引擎使用
    pub created_sale_ids: Vec<String>,
}

// ==========================================
// ImportProgress - 进度通知（仅观测用）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub current_row: usize,
    pub total_rows: usize,
    pub percentage: u8,
    pub message: String,
}
