// ==========================================
// 合购后台系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls/.ods) / CSV (.csv)
// 输出: ParsedSheet（首行为表头，其余为表头 → 单元格映射）
// 约定: Excel 日期单元格保留序列号，由 parse_date 统一换算
// ==========================================

use crate::domain::import::{ParsedSheet, RawRow, RawValue};
use crate::importer::error::{ImportError, ImporterResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser {
    /// 解析文件为 ParsedSheet
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<ParsedSheet>;
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImporterResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 按表头组装一行；全空行返回 None
fn build_row<I>(headers: &[String], cells: I) -> Option<RawRow>
where
    I: IntoIterator<Item = RawValue>,
{
    let mut row = RawRow::new();
    for (header, value) in headers.iter().zip(cells) {
        if header.is_empty() {
            continue;
        }
        row.insert(header.clone(), value);
    }

    if row.values().all(|v| v.is_blank()) {
        return None;
    }
    Some(row)
}

fn distinct_headers(headers: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for h in headers {
        if !h.is_empty() && !columns.contains(h) {
            columns.push(h.clone());
        }
    }
    columns
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 由表头行推断分隔符（分号多于逗号时用分号）
    pub fn sniff_delimiter(header_line: &str) -> u8 {
        let semicolons = header_line.matches(';').count();
        let commas = header_line.matches(',').count();
        if semicolons > commas {
            b';'
        } else {
            b','
        }
    }

    /// 从文本内容解析（供文件解析与测试复用）
    pub fn parse_text(&self, content: &str, file_name: &str) -> ImporterResult<ParsedSheet> {
        let content = content.trim_start_matches('\u{feff}');
        let header_line = content.lines().next().unwrap_or("");
        let delimiter = Self::sniff_delimiter(header_line);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells = record.iter().map(|v| RawValue::from(v.trim()));
            if let Some(row) = build_row(&headers, cells) {
                rows.push(row);
            }
        }

        tracing::debug!(
            file_name,
            delimiter = %(delimiter as char),
            columns = headers.len(),
            rows = rows.len(),
            "CSV 解析完成"
        );

        Ok(ParsedSheet {
            file_name: file_name.to_string(),
            columns: distinct_headers(&headers),
            rows,
        })
    }
}

impl FileParser for CsvParser {
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<ParsedSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        // 兼容 Latin-1 导出：非法字节按替换字符处理
        let bytes = std::fs::read(file_path)?;
        let content = String::from_utf8_lossy(&bytes);
        self.parse_text(&content, &file_name_of(file_path))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    fn cell_to_raw(cell: &Data) -> RawValue {
        match cell {
            Data::Empty | Data::Error(_) => RawValue::Empty,
            Data::Int(i) => RawValue::Number(*i as f64),
            Data::Float(f) => RawValue::Number(*f),
            Data::DateTime(dt) => RawValue::Number(dt.as_f64()),
            Data::Bool(b) => RawValue::Text(b.to_string()),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::from(s.trim()),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<ParsedSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if !matches!(ext.as_str(), "xlsx" | "xls" | "xlsm" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("arquivo sem planilhas".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let mut raw_rows = range.rows();
        let headers: Vec<String> = match raw_rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for data_row in raw_rows {
            let cells = data_row.iter().map(Self::cell_to_raw);
            if let Some(row) = build_row(&headers, cells) {
                rows.push(row);
            }
        }

        tracing::debug!(
            sheet = %sheet_name,
            columns = headers.len(),
            rows = rows.len(),
            "Excel 解析完成"
        );

        Ok(ParsedSheet {
            file_name: file_name_of(file_path),
            columns: distinct_headers(&headers),
            rows,
        })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImporterResult<ParsedSheet> {
        let path = file_path.as_ref();

        match extension_of(path).as_str() {
            "csv" => CsvParser.parse_sheet(path),
            "xlsx" | "xls" | "xlsm" | "ods" => ExcelParser.parse_sheet(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_csv_semicolon_with_blank_row() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "\u{feff}GRUPO;COTA;CRÉDITO ATUAL").unwrap();
        writeln!(temp_file, "1010; 12 ;R$ 1.234,56").unwrap();
        writeln!(temp_file, ";;").unwrap();
        writeln!(temp_file, "2020;7").unwrap();

        let sheet = UniversalFileParser.parse(temp_file.path()).unwrap();
        assert_eq!(sheet.columns, vec!["GRUPO", "COTA", "CRÉDITO ATUAL"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0]["COTA"], RawValue::Text("12".to_string()));
        assert_eq!(sheet.rows[0]["CRÉDITO ATUAL"].as_text(), "R$ 1.234,56");
        assert!(sheet.rows[1].get("CRÉDITO ATUAL").is_none());
        assert!(sheet.file_name.ends_with(".csv"));
    }

    #[test]
    fn test_csv_comma_delimiter() {
        let sheet = CsvParser
            .parse_text("DATA DA VENDA,ADM\n01/02/2024,Porto\n", "x.csv")
            .unwrap();
        assert_eq!(sheet.columns.len(), 2);
        assert_eq!(sheet.rows[0]["ADM"].as_text(), "Porto");
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(CsvParser::sniff_delimiter("A;B;C"), b';');
        assert_eq!(CsvParser::sniff_delimiter("A,B;C,D"), b',');
    }

    #[test]
    fn test_unsupported_and_missing() {
        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            UniversalFileParser.parse(temp_file.path()),
            Err(ImportError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            UniversalFileParser.parse("/nao/existe/planilha.csv"),
            Err(ImportError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_excel_cells_keep_serial_dates() {
        assert_eq!(ExcelParser::cell_to_raw(&Data::Int(3)), RawValue::Number(3.0));
        assert_eq!(ExcelParser::cell_to_raw(&Data::Empty), RawValue::Empty);
        assert_eq!(
            ExcelParser::cell_to_raw(&Data::String(" X ".to_string())).as_text(),
            "X"
        );
    }
}
