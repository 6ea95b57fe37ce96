// ==========================================
// 合购后台系统 - 导入API
// ==========================================
// 职责: 文件 → 解析 → 文件级校验 → 导入 → 佣金生成
// 说明: 文件级错误（版式未识别/空表）直接中止；行级错误计入导入结果
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::open_and_init;
use crate::domain::import::{ImportResult, ParsedSheet};
use crate::engine::CommissionRuleEngine;
use crate::importer::{
    validate_file, FileValidationReport, NoOpProgressSink, ProgressSink, SaleImporter,
    UniversalFileParser,
};
use crate::repository::{CommissionRepositoryImpl, SaleImportRepositoryImpl};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// 导入后佣金生成的汇总
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionBatchSummary {
    /// 参与佣金生成的销售数
    pub sales_processed: usize,
    /// 生成的应收佣金条数
    pub commissions_created: usize,
    /// 因取消/冲销被跳过的销售数
    pub sales_skipped: usize,
    pub errors: Vec<String>,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileResponse {
    pub file_name: String,
    /// 文件级 + 逐行校验报告
    pub validation: FileValidationReport,
    pub import: ImportResult,
    pub commissions: CommissionBatchSummary,
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl ImportApi {
    /// 打开（必要时创建）数据库并初始化表结构
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已初始化的连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            cancel_flag: None,
        }
    }

    /// 设置导入中断标志
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// 导入表格文件
    ///
    /// # 参数
    /// - file_path: 文件路径（.csv / .xlsx / .xls / .ods）
    ///
    /// # 返回
    /// - Ok(ImportFileResponse): 校验报告 + 导入结果 + 佣金汇总
    /// - Err(ApiError::FileValidationFailed): 文件级校验未通过，未写入任何数据
    pub async fn import_file<P: AsRef<Path>>(&self, file_path: P) -> ApiResult<ImportFileResponse> {
        self.import_file_with_progress(file_path, &NoOpProgressSink).await
    }

    pub async fn import_file_with_progress<P: AsRef<Path>>(
        &self,
        file_path: P,
        progress: &dyn ProgressSink,
    ) -> ApiResult<ImportFileResponse> {
        let sheet = UniversalFileParser.parse(file_path.as_ref())?;
        self.import_sheet(&sheet, progress).await
    }

    /// 导入已解析的工作表
    #[instrument(skip_all, fields(file_name = %sheet.file_name, rows = sheet.rows.len()))]
    pub async fn import_sheet(
        &self,
        sheet: &ParsedSheet,
        progress: &dyn ProgressSink,
    ) -> ApiResult<ImportFileResponse> {
        let start = Instant::now();

        let config = ConfigManager::from_connection(self.conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let repo = SaleImportRepositoryImpl::from_connection(self.conn.clone());
        let mut importer = SaleImporter::from_config(repo, &config).await?;
        if let Some(flag) = &self.cancel_flag {
            importer = importer.with_cancel_flag(flag.clone());
        }

        // 1. 文件级校验
        let validation = validate_file(sheet, importer.settings());
        let layout = match validation.layout_type() {
            Some(layout) if validation.is_valid => layout,
            _ => {
                warn!(errors = ?validation.errors, "文件级校验未通过");
                return Err(ApiError::FileValidationFailed(validation.errors));
            }
        };
        info!(layout = %layout, warnings = validation.warnings.len(), "版式识别完成");

        // 2. 导入
        let import = importer
            .process_import(&sheet.rows, &sheet.columns, layout, &sheet.file_name, progress)
            .await?;

        // 3. 佣金生成
        let commissions = self.generate_for_sales(&import.created_sale_ids).await;

        let elapsed_ms = start.elapsed().as_millis() as i64;
        info!(
            sales = import.stats.vendas_criadas,
            commissions = commissions.commissions_created,
            elapsed_ms,
            "文件导入完成"
        );

        Ok(ImportFileResponse {
            file_name: sheet.file_name.clone(),
            validation,
            import,
            commissions,
            elapsed_ms,
        })
    }

    /// 逐个销售生成佣金；单个销售失败不影响其他销售
    async fn generate_for_sales(&self, sale_ids: &[String]) -> CommissionBatchSummary {
        let engine = CommissionRuleEngine::new(CommissionRepositoryImpl::from_connection(
            self.conn.clone(),
        ));
        let mut summary = CommissionBatchSummary::default();

        for sale_id in sale_ids {
            summary.sales_processed += 1;
            match engine.generate_commissions(sale_id).await {
                Ok(result) => {
                    summary.commissions_created += result.comissoes;
                    if result.skipped_reason.is_some() {
                        summary.sales_skipped += 1;
                    }
                    summary.errors.extend(result.errors);
                }
                Err(e) => {
                    warn!(sale_id = %sale_id, error = %e, "佣金生成失败");
                    summary.errors.push(format!("Venda {}: {}", sale_id, e));
                }
            }
        }

        summary
    }
}
