// ==========================================
// 合购后台系统 - 单行校验
// ==========================================
// 职责: 原始行 → 规范化销售数据 + 行级错误/警告 + 派生标志
// 错误（阻断）: 份额编码缺失 / 组号缺失
// 警告（不阻断）: 管理公司缺失 / 信用额无效（仅历史版式）/ 回款差异
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import::{InstallmentEntry, ParsedSaleData, RawRow, RowValidation};
use crate::domain::types::LayoutType;
use crate::importer::field_mapper::{ColumnMap, SaleField};
use crate::importer::value_parser::{parse_date, parse_number, parse_percentage, ParsedNumber};

pub const MSG_QUOTA_REQUIRED: &str = "Código da cota é obrigatório";
pub const MSG_GROUP_REQUIRED: &str = "Grupo é obrigatório";
pub const MSG_ADMINISTRATOR_MISSING: &str = "Administradora não informada";
pub const MSG_INVALID_CREDIT: &str = "Valor de crédito inválido ou não informado";

const DEFAULT_STATUS_TEXT: &str = "ATIVO";

/// 取消: 含 CANCELAMENTO 或等于 CANCELADO
pub fn is_cancellation(status_text: &str) -> bool {
    let normalized = status_text.trim().to_uppercase();
    normalized.contains("CANCELAMENTO") || normalized == "CANCELADO"
}

/// 冲销: 含 ESTORNO
pub fn is_reversal(status_text: &str) -> bool {
    status_text.trim().to_uppercase().contains("ESTORNO")
}

// ==========================================
// 回款对账
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationCheck {
    pub within_tolerance: bool,
    pub difference: f64,          // |实收合计 - 应收总额|
    pub relative_difference: f64, // difference / 应收总额
}

/// 实收合计与应收总额比对: 相对差 <= 相对容差 或 绝对差 <= 绝对容差 即视为一致
pub fn check_received_total(
    installments: &[InstallmentEntry],
    total_value: f64,
    tolerance_percentage: f64,
    tolerance_absolute: f64,
) -> ReconciliationCheck {
    let received: f64 = installments.iter().map(|p| p.received_value).sum();
    let difference = (received - total_value).abs();
    let relative_difference = if total_value > 0.0 {
        difference / total_value
    } else {
        0.0
    };

    ReconciliationCheck {
        within_tolerance: relative_difference <= tolerance_percentage
            || difference <= tolerance_absolute,
        difference,
        relative_difference,
    }
}

// ==========================================
// RowValidator - 绑定版式与列映射的行校验器
// ==========================================
pub struct RowValidator {
    layout: LayoutType,
    columns: ColumnMap,
    settings: ImportSettings,
}

impl RowValidator {
    /// 编译列映射并创建校验器
    pub fn new(columns: &[String], layout: LayoutType, settings: ImportSettings) -> Self {
        let column_map = ColumnMap::compile(columns, settings.max_installment_columns);
        Self {
            layout,
            columns: column_map,
            settings,
        }
    }

    pub fn layout(&self) -> LayoutType {
        self.layout
    }

    pub fn column_map(&self) -> &ColumnMap {
        &self.columns
    }

    /// 校验单行（row_number 从 1 开始）
    pub fn validate(&self, row: &RawRow, row_number: usize) -> RowValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut data = self.extract(row, row_number);

        // ===== 必填校验 =====
        if data.quota_code.is_empty() {
            errors.push(MSG_QUOTA_REQUIRED.to_string());
        }
        if data.group.is_empty() {
            errors.push(MSG_GROUP_REQUIRED.to_string());
        }

        if self.layout == LayoutType::Historico {
            if data.administrator.is_empty() {
                warnings.push(MSG_ADMINISTRATOR_MISSING.to_string());
            }
            if data.credit_value <= 0.0 {
                warnings.push(MSG_INVALID_CREDIT.to_string());
            }
        }

        // ===== 派生标志 =====
        data.is_cancellation = is_cancellation(&data.status_text);
        data.is_reversal = is_reversal(&data.status_text);
        data.is_negative =
            data.total_value < 0.0 || data.installments.iter().any(|p| p.received_value < 0.0);

        if !data.installments.is_empty() && data.total_value > 0.0 {
            let check = check_received_total(
                &data.installments,
                data.total_value,
                self.settings.tolerance_percentage,
                self.settings.tolerance_absolute,
            );
            if !check.within_tolerance {
                warnings.push(format!(
                    "Divergência de {:.2}% entre valor total e soma das parcelas",
                    check.relative_difference * 100.0
                ));
                data.divergence_value = check.difference;
            }
        }

        RowValidation {
            row: row_number,
            is_valid: errors.is_empty(),
            errors,
            warnings,
            data,
        }
    }

    fn extract(&self, row: &RawRow, row_number: usize) -> ParsedSaleData {
        let map = &self.columns;

        let credit = self.number(row, SaleField::CreditValue, row_number);
        let total = self.number(row, SaleField::TotalValue, row_number);

        let status_text = match map.text(row, SaleField::Status) {
            s if s.is_empty() => DEFAULT_STATUS_TEXT.to_string(),
            s => s,
        };

        ParsedSaleData {
            sale_date: map.value(row, SaleField::SaleDate).and_then(parse_date),
            administrator: map.text(row, SaleField::Administrator),
            representative: map.text(row, SaleField::Representative),
            segment: map.text(row, SaleField::Segment),
            group: map.text(row, SaleField::Group),
            quota_code: map.text(row, SaleField::QuotaCode),
            credit_value: credit,
            total_value: total,
            status_text,
            note: map.text(row, SaleField::Note),
            salesperson1: map.text(row, SaleField::Salesperson1),
            salesperson1_percentage: self.percentage(row, SaleField::Salesperson1Percentage),
            salesperson2: map.text(row, SaleField::Salesperson2),
            salesperson2_percentage: self.percentage(row, SaleField::Salesperson2Percentage),
            representative_commission1: self.percentage(row, SaleField::RepresentativeCommission1),
            representative_commission2: self.percentage(row, SaleField::RepresentativeCommission2),
            client: map.text(row, SaleField::Client),
            installments: self.installments(row),
            ..Default::default()
        }
    }

    fn number(&self, row: &RawRow, field: SaleField, row_number: usize) -> f64 {
        let Some(raw) = self.columns.value(row, field) else {
            return 0.0;
        };
        let parsed = parse_number(raw);
        if let ParsedNumber::Defaulted { reason } = &parsed {
            tracing::debug!(row = row_number, field = ?field, %reason, "数值回落为 0");
        }
        parsed.value()
    }

    fn percentage(&self, row: &RawRow, field: SaleField) -> f64 {
        self.columns
            .value(row, field)
            .map(parse_percentage)
            .unwrap_or(0.0)
    }

    /// 逐组扫描分期列，仅保留非零实收
    fn installments(&self, row: &RawRow) -> Vec<InstallmentEntry> {
        self.columns
            .installments()
            .iter()
            .filter_map(|cols| {
                let raw = row.get(&cols.value_column).filter(|v| v.is_truthy())?;
                let received_value = parse_number(raw).value();
                if received_value == 0.0 {
                    return None;
                }
                let credit_date = cols
                    .date_column
                    .as_ref()
                    .and_then(|c| row.get(c))
                    .and_then(parse_date);
                Some(InstallmentEntry {
                    number: cols.number,
                    received_value,
                    credit_date,
                })
            })
            .collect()
    }
}

/// 便捷入口: 使用默认配置校验单行
pub fn validate_row(
    row: &RawRow,
    row_number: usize,
    columns: &[String],
    layout: LayoutType,
) -> RowValidation {
    RowValidator::new(columns, layout, ImportSettings::default()).validate(row, row_number)
}
