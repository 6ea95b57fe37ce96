// ==========================================
// 合购后台系统 - 批量校验
// ==========================================
// 职责: 全表逐行校验 + 汇总统计 + 全局错误/警告列表
// 约定: 不在首个错误处中止，始终完成整表校验
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import::{
    BatchValidation, IssueKind, ParsedSheet, RawRow, ValidationIssue, ValidationSummary,
};
use crate::domain::types::LayoutType;
use crate::importer::layout_detector::{detect_layout_type, DetectedLayout};
use crate::importer::row_validator::RowValidator;
use serde::Serialize;

pub const MSG_LAYOUT_NOT_DETECTED: &str = "Não foi possível identificar o tipo de planilha";
pub const MSG_EMPTY_SHEET: &str = "A planilha está vazia";

/// 校验全部行
pub fn validate_all_rows_with(
    rows: &[RawRow],
    columns: &[String],
    layout: LayoutType,
    settings: &ImportSettings,
) -> BatchValidation {
    let validator = RowValidator::new(columns, layout, settings.clone());

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut summary = ValidationSummary {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut validations = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let v = validator.validate(row, row_number);

        if v.is_valid {
            summary.valid_rows += 1;
        } else {
            summary.invalid_rows += 1;
            errors.extend(v.errors.iter().map(|message| ValidationIssue {
                row: row_number,
                message: message.clone(),
                kind: IssueKind::Required,
            }));
        }

        warnings.extend(v.warnings.iter().map(|message| ValidationIssue {
            row: row_number,
            message: message.clone(),
            kind: IssueKind::Tolerance,
        }));

        let d = &v.data;
        summary.total_credit_value += d.credit_value;
        summary.total_received_value += d.received_total();
        summary.total_commission_percentage +=
            d.representative_commission1 + d.representative_commission2;

        if d.divergence_value > 0.0 {
            summary.divergences += 1;
        }
        if d.is_negative {
            summary.delinquencies += 1;
        }
        if d.is_cancellation {
            summary.cancellations += 1;
        }
        if d.is_reversal {
            summary.reversals += 1;
        }

        validations.push(v);
    }

    tracing::info!(
        layout = %layout,
        total = summary.total_rows,
        valid = summary.valid_rows,
        invalid = summary.invalid_rows,
        divergences = summary.divergences,
        "批量校验完成"
    );

    BatchValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        summary,
        rows: validations,
    }
}

/// 校验全部行（默认配置）
pub fn validate_all_rows(rows: &[RawRow], columns: &[String], layout: LayoutType) -> BatchValidation {
    validate_all_rows_with(rows, columns, layout, &ImportSettings::default())
}

// ==========================================
// FileValidationReport - 文件级校验报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct FileValidationReport {
    pub is_valid: bool,
    pub layout: Option<DetectedLayout>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validation: Option<BatchValidation>,
}

impl FileValidationReport {
    pub fn layout_type(&self) -> Option<LayoutType> {
        self.layout.as_ref().map(|l| l.layout_type)
    }
}

/// 文件级校验: 版式识别 → 空表 → 大文件提示 → 逐行校验
///
/// 版式未识别或空表时不做逐行校验
pub fn validate_file(sheet: &ParsedSheet, settings: &ImportSettings) -> FileValidationReport {
    let layout = detect_layout_type(&sheet.columns);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if layout.is_none() {
        errors.push(MSG_LAYOUT_NOT_DETECTED.to_string());
    }

    if sheet.rows.is_empty() {
        errors.push(MSG_EMPTY_SHEET.to_string());
    }

    if sheet.rows.len() > settings.large_file_row_threshold {
        warnings.push(format!(
            "Planilha grande ({} linhas) - processamento pode levar alguns minutos",
            sheet.rows.len()
        ));
    }

    let validation = match &layout {
        Some(detected) if !sheet.rows.is_empty() => Some(validate_all_rows_with(
            &sheet.rows,
            &sheet.columns,
            detected.layout_type,
            settings,
        )),
        _ => None,
    };

    FileValidationReport {
        is_valid: errors.is_empty(),
        layout,
        errors,
        warnings,
        validation,
    }
}
