// ==========================================
// 合购后台系统 - 导入层
// ==========================================
// 职责: 表格文件 → 版式识别 → 行校验 → 落库
// 支持: Excel, ODS, CSV
// ==========================================

// 模块声明
pub mod batch_validator;
pub mod entity_cache;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod layout_detector;
pub mod progress;
pub mod row_validator;
pub mod sale_importer;
pub mod value_parser;

// 重导出核心类型
pub use batch_validator::{validate_all_rows, validate_all_rows_with, validate_file, FileValidationReport};
pub use entity_cache::{EntityResolutionCache, Resolved};
pub use error::ImportError;
pub use field_mapper::{ColumnMap, SaleField};
pub use file_parser::{CsvParser, ExcelParser, FileParser, UniversalFileParser};
pub use layout_detector::{detect_layout_type, DetectedLayout, LayoutSpec};
pub use progress::{NoOpProgressSink, ProgressSink, RecordingProgressSink};
pub use row_validator::{validate_row, RowValidator};
pub use sale_importer::SaleImporter;
pub use value_parser::{parse_date, parse_number, parse_percentage, ParsedNumber};
