// ==========================================
// 合购后台系统 - 列映射（编译一次，逐行复用）
// ==========================================
// 职责: 逻辑字段 → 按优先级排列的候选列
// 规则: 每个别名模式取一列（优先完全相等，其次首个包含该模式的列），
//       取值时按候选顺序返回第一个非空单元格
// ==========================================

use crate::domain::import::{RawRow, RawValue};
use crate::importer::layout_detector::normalize_header;
use regex::Regex;
use std::collections::HashMap;

// ==========================================
// SaleField - 行内逻辑字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaleField {
    SaleDate,
    Administrator,
    Representative,
    Segment,
    Group,
    QuotaCode,
    CreditValue,
    TotalValue,
    Status,
    Note,
    Salesperson1,
    Salesperson1Percentage,
    Salesperson2,
    Salesperson2Percentage,
    RepresentativeCommission1,
    RepresentativeCommission2,
    Client,
}

impl SaleField {
    pub const ALL: [SaleField; 17] = [
        SaleField::SaleDate,
        SaleField::Administrator,
        SaleField::Representative,
        SaleField::Segment,
        SaleField::Group,
        SaleField::QuotaCode,
        SaleField::CreditValue,
        SaleField::TotalValue,
        SaleField::Status,
        SaleField::Note,
        SaleField::Salesperson1,
        SaleField::Salesperson1Percentage,
        SaleField::Salesperson2,
        SaleField::Salesperson2Percentage,
        SaleField::RepresentativeCommission1,
        SaleField::RepresentativeCommission2,
        SaleField::Client,
    ];

    /// 列名别名（按优先级）
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            SaleField::SaleDate => &["DATA DA VENDA", "DATA  VENDA", "DATA VENDA"],
            SaleField::Administrator => &["ADM"],
            SaleField::Representative => &["REPRES"],
            SaleField::Segment => &["SEGMENTO"],
            SaleField::Group => &["GRUPO"],
            SaleField::QuotaCode => &["COTA"],
            SaleField::CreditValue => &["CRÉDITO ATUAL", "CRÉDITO", "CREDITO"],
            SaleField::TotalValue => &["VALOR TOTAL A RECEBER", "VALOR TOTAL"],
            SaleField::Status => &["SITUAÇÃO", "SITUACAO", "STATUS"],
            SaleField::Note => &["OBSERVAÇÃO", "OBSERVACAO", "OBS"],
            SaleField::Salesperson1 => &["VENDEDOR 1"],
            SaleField::Salesperson1Percentage => &["VENDEDOR 1 % COMISSÃO", "VENDEDOR 1 %"],
            SaleField::Salesperson2 => &["VENDEDOR 2"],
            SaleField::Salesperson2Percentage => &["VENDEDOR 2 % COMISSÃO", "VENDEDOR 2 %"],
            SaleField::RepresentativeCommission1 => &["COMISSÃO1 ANATOTE", "COMISSÃO1"],
            SaleField::RepresentativeCommission2 => &["COMISSÃO2 ANATOTE", "COMISSÃO2"],
            SaleField::Client => &["CLIENTE"],
        }
    }
}

// ==========================================
// InstallmentColumns - 第 N 期的列
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentColumns {
    pub number: u32,
    pub value_column: String,
    pub date_column: Option<String>,
}

// ==========================================
// ColumnMap - 编译后的列映射
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    candidates: HashMap<SaleField, Vec<String>>,
    installments: Vec<InstallmentColumns>,
}

impl ColumnMap {
    /// 根据表头编译映射
    ///
    /// # 参数
    /// - columns: 原始表头（保持文件顺序）
    /// - max_installments: 扫描的分期列组数上限
    pub fn compile(columns: &[String], max_installments: u32) -> Self {
        let normalized: Vec<(String, &String)> = columns
            .iter()
            .map(|c| (normalize_header(c), c))
            .filter(|(n, _)| !n.is_empty())
            .collect();

        let mut candidates = HashMap::new();
        for field in SaleField::ALL {
            let mut found: Vec<String> = Vec::new();
            for alias in field.aliases() {
                let exact = normalized.iter().find(|(n, _)| n.as_str() == *alias);
                let partial = || normalized.iter().find(|(n, _)| n.contains(alias));
                if let Some((_, original)) = exact.or_else(partial) {
                    if !found.contains(*original) {
                        found.push((*original).clone());
                    }
                }
            }
            candidates.insert(field, found);
        }

        let installments = (1..=max_installments)
            .filter_map(|number| {
                let value_column = find_numbered_column(columns, r"VALOR\s+RECEBIDO\s*", number)?;
                let date_column = find_numbered_column(columns, r"DATA\s+DO\s+", number);
                Some(InstallmentColumns {
                    number,
                    value_column,
                    date_column,
                })
            })
            .collect();

        Self {
            candidates,
            installments,
        }
    }

    /// 取字段值: 按候选顺序返回第一个非空单元格
    pub fn value<'a>(&self, row: &'a RawRow, field: SaleField) -> Option<&'a RawValue> {
        self.candidates
            .get(&field)?
            .iter()
            .filter_map(|col| row.get(col))
            .find(|v| !v.is_blank())
    }

    /// 取字段文本（去首尾空白，缺失为空串）
    pub fn text(&self, row: &RawRow, field: SaleField) -> String {
        self.value(row, field).map(RawValue::as_text).unwrap_or_default()
    }

    /// 字段映射到的候选列（调试/预览用）
    pub fn columns_for(&self, field: SaleField) -> &[String] {
        self.candidates
            .get(&field)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn installments(&self) -> &[InstallmentColumns] {
        &self.installments
    }
}

/// 匹配带编号的列，编号后不得紧跟数字（避免 1 命中 10）
fn find_numbered_column(columns: &[String], prefix: &str, number: u32) -> Option<String> {
    let pattern = format!(r"(?i){}{}(?:\D|$)", prefix, number);
    let re = Regex::new(&pattern).ok()?;
    columns.iter().find(|c| re.is_match(c)).cloned()
}
