// ==========================================
// 合购后台系统 - 单元格值解析
// ==========================================
// 职责: 原始单元格 → 数值 / 百分比 / 日期
// 约定: 数值解析失败不报错，返回带原因的 0（软失败）
//       日期解析失败返回 None，从不 panic
// ==========================================

use crate::domain::import::RawValue;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Excel 序列日期起点（沿用 1900 闰年缺陷的偏移）
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

// ==========================================
// ParsedNumber - 带标记的数值结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNumber {
    Parsed(f64),
    Defaulted { reason: DefaultReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    Blank,
    Unparseable(String),
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::Blank => write!(f, "空值"),
            DefaultReason::Unparseable(raw) => write!(f, "无法解析: {}", raw),
        }
    }
}

impl ParsedNumber {
    /// 数值（软失败时为 0）
    pub fn value(&self) -> f64 {
        match self {
            ParsedNumber::Parsed(v) => *v,
            ParsedNumber::Defaulted { .. } => 0.0,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ParsedNumber::Defaulted { .. })
    }
}

fn float_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("invalid float prefix regex")
    })
}

fn br_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})").expect("invalid dd/mm/yyyy regex")
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").expect("invalid yyyy-mm-dd regex")
    })
}

// ==========================================
// 数值
// ==========================================

/// 解析金额/数值
///
/// 文本处理顺序: 去货币符号与空白 → 去掉全部点（千分位） → 逗号转小数点 → 取最长合法前缀。
/// 文本中的点一律视为千分位；数字单元格（RawValue::Number）原样返回。
pub fn parse_number(value: &RawValue) -> ParsedNumber {
    match value {
        RawValue::Number(n) if n.is_nan() => ParsedNumber::Defaulted {
            reason: DefaultReason::Unparseable("NaN".to_string()),
        },
        RawValue::Number(n) => ParsedNumber::Parsed(*n),
        RawValue::Empty => ParsedNumber::Defaulted {
            reason: DefaultReason::Blank,
        },
        RawValue::Text(raw) => parse_number_text(raw),
    }
}

fn parse_number_text(raw: &str) -> ParsedNumber {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != 'R' && *c != '$')
        .collect();

    if stripped.is_empty() {
        return ParsedNumber::Defaulted {
            reason: DefaultReason::Blank,
        };
    }

    let normalized = stripped.replace('.', "").replacen(',', ".", 1);

    match float_prefix_re()
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        Some(v) => ParsedNumber::Parsed(v),
        None => ParsedNumber::Defaulted {
            reason: DefaultReason::Unparseable(raw.trim().to_string()),
        },
    }
}

// ==========================================
// 百分比
// ==========================================

/// 解析百分比；不大于 1 的值视为小数形式的比例
pub fn parse_percentage(value: &RawValue) -> f64 {
    fraction_to_percentage(parse_number(value).value())
}

/// 比例 → 百分比换算
///
/// 已知歧义: 真实的 "0.5%" 会被当作 0.5 → 50%
pub fn fraction_to_percentage(value: f64) -> f64 {
    if value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

// ==========================================
// 日期
// ==========================================

/// Excel 序列号 → 日期（1 = 1899-12-31，2 = 1900-01-01）
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// 解析日期: 数字按 Excel 序列号；文本依次尝试 DD/MM/YYYY、YYYY-MM-DD、通用格式
pub fn parse_date(value: &RawValue) -> Option<NaiveDate> {
    match value {
        RawValue::Empty => None,
        RawValue::Number(n) => excel_serial_to_date(*n),
        RawValue::Text(raw) => parse_date_text(raw.trim()),
    }
}

fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }

    if let Some(caps) = br_date_re().captures(raw) {
        let day = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let year = caps[3].parse().ok();
        if let (Some(d), Some(m), Some(y)) = (day, month, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }

    if let Some(caps) = iso_date_re().captures(raw) {
        let year = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let day = caps[3].parse().ok();
        if let (Some(y), Some(m), Some(d)) = (year, month, day) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }

    // 纯数字文本（CSV 导出的序列号）
    if let Ok(serial) = raw.parse::<f64>() {
        return excel_serial_to_date(serial);
    }

    parse_date_generic(raw)
}

fn parse_date_generic(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    ["%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_parse_number_brazilian_currency() {
        assert_eq!(parse_number(&text("R$ 1.234,56")).value(), 1234.56);
        assert_eq!(parse_number(&text("R$ 100.000,00")).value(), 100000.0);
        assert_eq!(parse_number(&text("-350,50")).value(), -350.5);
        assert_eq!(parse_number(&text("1.234.567")).value(), 1234567.0);
        assert_eq!(parse_number(&RawValue::Number(42.5)).value(), 42.5);
    }

    #[test]
    fn test_parse_number_single_thousands_group() {
        assert_eq!(parse_number(&text("100.000")).value(), 100000.0);
        assert_eq!(parse_number(&text("R$ 1.500")).value(), 1500.0);
        assert_eq!(parse_number(&text("R$ 150.000")).value(), 150000.0);
        assert_eq!(parse_number(&text("1.500,75")).value(), 1500.75);
    }

    #[test]
    fn test_parse_number_soft_failure() {
        let blank = parse_number(&RawValue::Empty);
        assert!(blank.is_defaulted());
        assert_eq!(blank.value(), 0.0);

        let junk = parse_number(&text("abc"));
        assert_eq!(
            junk,
            ParsedNumber::Defaulted {
                reason: DefaultReason::Unparseable("abc".to_string())
            }
        );

        // 取最长合法前缀
        assert_eq!(parse_number(&text("12abc")).value(), 12.0);
    }

    #[test]
    fn test_parse_number_idempotent_on_normalized_strings() {
        for raw in ["R$ 1.234,56", "0,5", "-12,3", "1.234.567,89", "99", "3,14159", "abc", ""] {
            let first = parse_number(&RawValue::from(raw)).value();
            // 以巴西格式（逗号小数）回写后再解析
            let second = parse_number(&text(&first.to_string().replace('.', ","))).value();
            assert_eq!(first, second, "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_percentage_fraction_heuristic() {
        assert_eq!(parse_percentage(&RawValue::Number(0.03)), 3.0);
        assert_eq!(parse_percentage(&text("3")), 3.0);
        assert_eq!(parse_percentage(&text("2,5")), 2.5);
        assert_eq!(parse_percentage(&RawValue::Empty), 0.0);
        // 已知歧义
        assert_eq!(parse_percentage(&text("0,5")), 50.0);
    }

    #[test]
    fn test_parse_date_excel_serial() {
        assert_eq!(
            parse_date(&RawValue::Number(1.0)),
            NaiveDate::from_ymd_opt(1899, 12, 31)
        );
        assert_eq!(
            parse_date(&RawValue::Number(2.0)),
            NaiveDate::from_ymd_opt(1900, 1, 1)
        );
        let d = parse_date(&RawValue::Number(45000.0)).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
        assert_eq!(parse_date(&RawValue::Number(0.0)), None);
        assert_eq!(parse_date(&RawValue::Number(-3.0)), None);
    }

    #[test]
    fn test_parse_date_text_formats() {
        assert_eq!(parse_date(&text("15/03/2024")), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date(&text("2024-03-15")), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(
            parse_date(&text("2024-03-15 10:20:00")),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(parse_date(&text("45000")), NaiveDate::from_ymd_opt(2023, 3, 15));
        assert_eq!(parse_date(&text("15.03.2024")), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date(&text("sem data")), None);
        assert_eq!(parse_date(&text("")), None);
    }
}
