// ==========================================
// 合购后台系统 - 销售导入器
// ==========================================
// 流程:
// 1. 清空缓存 + 并发预加载五类参照数据
// 2. 按文件顺序逐行: 校验 → 解析实体 → 销售 → 从属记录
// 3. 写导入日志
// 约定:
// - 行级失败只记录错误，不中止整批
// - 行处理严格串行（缓存无锁）
// - 进度通知仅供观测
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::import::{ImportProgress, ImportResult, ImportStats, ParsedSaleData, RawRow};
use crate::domain::sale::{
    Delinquency, ImportLog, NewSale, Receipt, ReconciliationAdjustment, RepresentativeCommission,
    SalespersonCommission,
};
use crate::domain::types::{DelinquencyStatus, LayoutType, ReferenceKind, SaleStatus};
use crate::importer::entity_cache::{EntityResolutionCache, Resolved};
use crate::importer::error::ImportError;
use crate::importer::progress::ProgressSink;
use crate::importer::row_validator::RowValidator;
use crate::repository::sale_import_repo::SaleImportRepository;
use chrono::{Local, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub const DELINQUENCY_IMPORT_NOTE: &str = "Importado automaticamente - valor negativo detectado";
pub const ADJUSTMENT_KIND: &str = "DIVERGENCIA_IMPORTACAO";

// ==========================================
// RunState - 单次导入的累计状态
// ==========================================
#[derive(Debug, Default)]
struct RunState {
    stats: ImportStats,
    errors: Vec<String>,
    warnings: Vec<String>,
    created_sale_ids: Vec<String>,
    total_received: f64,
}

impl RunState {
    fn row_error(&mut self, row: usize, message: impl AsRef<str>) {
        self.errors.push(format!("Linha {}: {}", row, message.as_ref()));
    }

    fn row_warning(&mut self, row: usize, message: impl AsRef<str>) {
        self.warnings.push(format!("Linha {}: {}", row, message.as_ref()));
    }

    fn count_reference(&mut self, kind: ReferenceKind, resolved: &Option<Resolved>) {
        if !matches!(resolved, Some(r) if r.created) {
            return;
        }
        match kind {
            ReferenceKind::Administrator => self.stats.administradoras_criadas += 1,
            ReferenceKind::Representative => self.stats.representantes_criados += 1,
            ReferenceKind::Salesperson => self.stats.vendedores_criados += 1,
            ReferenceKind::Client => self.stats.clientes_criados += 1,
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn resolved_id(resolved: &Option<Resolved>) -> Option<String> {
    resolved.as_ref().map(|r| r.id.clone())
}

// ==========================================
// SaleImporter - 销售导入器
// ==========================================
pub struct SaleImporter<R>
where
    R: SaleImportRepository,
{
    // 数据访问层
    import_repo: R,

    // 本次导入的配置快照
    settings: ImportSettings,

    // 外部中断标志（行间检查）
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<R> SaleImporter<R>
where
    R: SaleImportRepository,
{
    /// 创建新的 SaleImporter 实例
    ///
    /// # 参数
    /// - import_repo: 导入数据仓储
    /// - settings: 配置快照
    pub fn new(import_repo: R, settings: ImportSettings) -> Self {
        Self {
            import_repo,
            settings,
            cancel_flag: None,
        }
    }

    /// 从配置读取器加载配置后创建
    pub async fn from_config<C>(import_repo: R, config: &C) -> Result<Self, ImportError>
    where
        C: ImportConfigReader + ?Sized,
    {
        let settings = ImportSettings::load(config)
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_settings".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(import_repo, settings))
    }

    /// 设置中断标志；置位后在下一行开始前停止
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// 预加载参照数据到缓存
    async fn preload(&self, cache: &mut EntityResolutionCache) -> Result<(), ImportError> {
        let repo = &self.import_repo;
        let (administrators, representatives, salespeople, clients, quotas) = futures::try_join!(
            repo.load_references(ReferenceKind::Administrator),
            repo.load_references(ReferenceKind::Representative),
            repo.load_references(ReferenceKind::Salesperson),
            repo.load_references(ReferenceKind::Client),
            repo.load_quotas(),
        )?;

        cache.clear();
        cache.seed(ReferenceKind::Administrator, administrators);
        cache.seed(ReferenceKind::Representative, representatives);
        cache.seed(ReferenceKind::Salesperson, salespeople);
        cache.seed(ReferenceKind::Client, clients);
        cache.seed_quotas(quotas);

        debug!(
            administrators = cache.len(ReferenceKind::Administrator),
            representatives = cache.len(ReferenceKind::Representative),
            salespeople = cache.len(ReferenceKind::Salesperson),
            clients = cache.len(ReferenceKind::Client),
            quotas = cache.quota_count(),
            "参照数据预加载完成"
        );
        Ok(())
    }

    /// 执行导入
    ///
    /// # 参数
    /// - rows: 数据行（表头 → 单元格）
    /// - columns: 表头列表
    /// - layout: 已识别的版式
    /// - file_name: 文件名（写入导入日志）
    /// - progress: 进度接收者
    ///
    /// # 返回
    /// - Ok(ImportResult): 导入结果（行级失败体现在 errors 中）
    /// - Err: 预加载参照数据失败（未处理任何行）
    #[instrument(skip_all, fields(file_name = %file_name, layout = %layout, total_rows = rows.len()))]
    pub async fn process_import(
        &self,
        rows: &[RawRow],
        columns: &[String],
        layout: LayoutType,
        file_name: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ImportResult, ImportError> {
        let total_rows = rows.len();
        progress.report(ImportProgress::preparing(total_rows));

        let mut cache = EntityResolutionCache::new();
        if let Err(e) = self.preload(&mut cache).await {
            error!(error = %e, "参照数据预加载失败");
            progress.report(ImportProgress::error(0, total_rows, e.to_string()));
            return Err(e);
        }

        let validator = RowValidator::new(columns, layout, self.settings.clone());
        let mut state = RunState::default();
        let mut interrupted = false;

        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;

            if self.is_cancelled() {
                warn!(row = row_number, "导入被中断");
                state
                    .errors
                    .push(format!("Importação interrompida na linha {}", row_number));
                interrupted = true;
                break;
            }

            progress.report(ImportProgress::processing(row_number, total_rows));

            let validation = validator.validate(row, row_number);
            if !validation.is_valid {
                for message in &validation.errors {
                    state.row_error(row_number, message);
                }
                continue;
            }

            for message in &validation.warnings {
                state.row_warning(row_number, message);
            }

            if let Err(e) = self
                .import_row(&mut cache, &validation.data, layout, row_number, &mut state)
                .await
            {
                error!(row = row_number, error = %e, "行导入异常");
                state.row_error(row_number, format!("Erro inesperado - {}", e));
            }
        }

        progress.report(ImportProgress::saving(total_rows));

        let log = ImportLog {
            layout,
            file_name: file_name.to_string(),
            total_rows,
            valid_rows: state.stats.vendas_criadas,
            rejected_rows: state.errors.len(),
            total_received: state.total_received,
            total_divergences: state.stats.ajustes_criados,
            errors: state.errors.clone(),
            warnings: state.warnings.clone(),
        };

        let import_log_id = match self.import_repo.insert_import_log(&log).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "导入日志写入失败");
                state
                    .errors
                    .push(format!("Erro ao salvar log de importação - {}", e));
                None
            }
        };

        if interrupted || import_log_id.is_none() {
            let message = state.errors.last().cloned().unwrap_or_default();
            progress.report(ImportProgress::error(total_rows, total_rows, message));
        } else {
            progress.report(ImportProgress::complete(total_rows));
        }

        info!(
            sales = state.stats.vendas_criadas,
            receipts = state.stats.recebimentos_criados,
            errors = state.errors.len(),
            warnings = state.warnings.len(),
            "导入完成"
        );

        Ok(ImportResult {
            success: state.errors.is_empty(),
            import_log_id,
            stats: state.stats,
            errors: state.errors,
            warnings: state.warnings,
            created_sale_ids: state.created_sale_ids,
        })
    }

    /// 导入单个有效行
    ///
    /// 已知的业务失败（份额无法解析、销售写入失败）直接记录；
    /// 其余存储错误向上返回，由调用方记为“Erro inesperado”
    async fn import_row(
        &self,
        cache: &mut EntityResolutionCache,
        data: &ParsedSaleData,
        layout: LayoutType,
        row: usize,
        state: &mut RunState,
    ) -> Result<(), ImportError> {
        let repo = &self.import_repo;

        // ===== 参照实体 =====
        let administrator = cache
            .resolve_reference(repo, ReferenceKind::Administrator, &data.administrator)
            .await?;
        state.count_reference(ReferenceKind::Administrator, &administrator);

        let representative = cache
            .resolve_reference(repo, ReferenceKind::Representative, &data.representative)
            .await?;
        state.count_reference(ReferenceKind::Representative, &representative);

        let salesperson1 = cache
            .resolve_reference(repo, ReferenceKind::Salesperson, &data.salesperson1)
            .await?;
        state.count_reference(ReferenceKind::Salesperson, &salesperson1);

        let salesperson2 = cache
            .resolve_reference(repo, ReferenceKind::Salesperson, &data.salesperson2)
            .await?;
        state.count_reference(ReferenceKind::Salesperson, &salesperson2);

        let client = cache
            .resolve_reference(repo, ReferenceKind::Client, &data.client)
            .await?;
        state.count_reference(ReferenceKind::Client, &client);

        // ===== 份额 =====
        let segment = if data.segment.trim().is_empty() {
            self.settings.default_quota_segment.as_str()
        } else {
            data.segment.as_str()
        };
        let administrator_id = resolved_id(&administrator);

        let quota = match cache
            .resolve_quota(repo, &data.group, &data.quota_code, segment, administrator_id.as_deref())
            .await
        {
            Ok(Some(q)) => q,
            other => {
                if let Err(e) = other {
                    warn!(row, error = %e, "份额解析失败");
                }
                state.row_warning(
                    row,
                    format!(
                        "Não foi possível criar/encontrar a cota {}-{}",
                        data.group, data.quota_code
                    ),
                );
                return Ok(());
            }
        };
        if quota.created {
            state.stats.cotas_criadas += 1;
        }

        // 历史总表: 份额已有销售则跳过，不覆盖
        if layout == LayoutType::Historico && repo.find_sale_by_quota(&quota.id).await?.is_some() {
            state.row_warning(
                row,
                format!(
                    "Venda já existe para cota {}-{}, ignorando",
                    data.group, data.quota_code
                ),
            );
            return Ok(());
        }

        // ===== 销售 =====
        let salesperson_id = resolved_id(&salesperson1).or_else(|| resolved_id(&salesperson2));
        let new_sale = NewSale {
            quota_id: quota.id.clone(),
            client_id: resolved_id(&client),
            salesperson_id,
            representative_id: resolved_id(&representative),
            sale_date: data.sale_date.unwrap_or_else(today),
            credit_value: data.credit_value,
            total_value: data.total_value,
            status: SaleStatus::from_import(&data.status_text, data.is_cancellation, data.is_reversal),
            note: Some(data.note.trim().to_string()).filter(|n| !n.is_empty()),
        };

        let sale_id = match repo.insert_sale(&new_sale).await {
            Ok(id) => id,
            Err(e) => {
                state.row_error(row, format!("Erro ao criar venda - {}", e));
                return Ok(());
            }
        };
        state.stats.vendas_criadas += 1;
        state.created_sale_ids.push(sale_id.clone());
        debug!(row, sale_id = %sale_id, quota_key = %format!("{}-{}", data.group, data.quota_code), "销售已创建");

        // ===== 销售员佣金 =====
        let salespeople = [
            (salesperson1.as_ref(), data.salesperson1_percentage),
            (salesperson2.as_ref(), data.salesperson2_percentage),
        ];
        for (resolved, percentage) in salespeople {
            if let Some(s) = resolved {
                if percentage > 0.0 {
                    repo.insert_salesperson_commission(&SalespersonCommission {
                        sale_id: sale_id.clone(),
                        salesperson_id: s.id.clone(),
                        percentage,
                        predicted_value: data.credit_value * percentage / 100.0,
                        installments: 1,
                    })
                    .await?;
                    state.stats.comissoes_criadas += 1;
                }
            }
        }

        // ===== 代理商佣金 =====
        if let Some(rep) = &representative {
            if !self.settings.is_no_commission_representative(&data.representative) {
                let c1 = data.representative_commission1;
                let c2 = data.representative_commission2;
                repo.insert_representative_commission(&RepresentativeCommission {
                    sale_id: sale_id.clone(),
                    representative_id: rep.id.clone(),
                    percentage: c1,
                    additional_percentage: if c2 != 0.0 { Some(c2) } else { None },
                    value: data.credit_value * c1 / 100.0,
                })
                .await?;
            }
        }

        // ===== 回款 =====
        for installment in data.installments.iter().filter(|p| p.received_value != 0.0) {
            repo.insert_receipt(&Receipt {
                sale_id: sale_id.clone(),
                installment: installment.number,
                received_value: installment.received_value,
                credit_date: installment.credit_date.unwrap_or_else(today),
            })
            .await?;
            state.stats.recebimentos_criados += 1;
            state.total_received += installment.received_value;
        }

        // ===== 逾期 =====
        if data.is_negative {
            let overdue = data.negative_total();
            if overdue > 0.0 {
                repo.insert_delinquency(&Delinquency {
                    sale_id: sale_id.clone(),
                    overdue_value: overdue,
                    note: DELINQUENCY_IMPORT_NOTE.to_string(),
                    status: DelinquencyStatus::Open,
                })
                .await?;
                state.stats.inadimplencias_criadas += 1;
            }
        }

        // ===== 对账差异 =====
        if data.divergence_value > 0.0 {
            let expected = data.total_value;
            let real = data.received_total();
            repo.insert_adjustment(&ReconciliationAdjustment {
                sale_id: sale_id.clone(),
                kind: ADJUSTMENT_KIND.to_string(),
                expected_value: expected,
                real_value: real,
                difference: real - expected,
                note: format!(
                    "Divergência detectada na importação. Esperado: R$ {:.2}, Real: R$ {:.2}",
                    expected, real
                ),
            })
            .await?;
            state.stats.ajustes_criados += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::import::RawValue;
    use crate::importer::progress::{NoOpProgressSink, RecordingProgressSink};
    use crate::domain::types::ImportPhase;
    use crate::repository::sale_import_repo_impl::SaleImportRepositoryImpl;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn importer() -> (Arc<Mutex<Connection>>, SaleImporter<SaleImportRepositoryImpl>) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let shared = Arc::new(Mutex::new(conn));
        let repo = SaleImportRepositoryImpl::from_connection(shared.clone());
        (shared, SaleImporter::new(repo, ImportSettings::default()))
    }

    fn columns() -> Vec<String> {
        [
            "DATA DA VENDA",
            "ADM",
            "REPRES",
            "GRUPO",
            "COTA",
            "CRÉDITO ATUAL",
            "VALOR TOTAL A RECEBER",
            "SITUAÇÃO",
            "VENDEDOR 1",
            "VENDEDOR 1 %",
            "COMISSÃO1 ANATOTE",
            "CLIENTE",
            "VALOR RECEBIDO 1",
            "VALOR RECEBIDO 2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(pairs: &[(&str, RawValue)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn count(conn: &Arc<Mutex<Connection>>, table: &str) -> i64 {
        conn.lock()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_row_errors_are_prefixed_and_batch_continues() {
        let (conn, importer) = importer();
        let rows = vec![
            row(&[("ADM", RawValue::from("Porto"))]),
            row(&[
                ("GRUPO", RawValue::from("1010")),
                ("COTA", RawValue::from("5")),
                ("ADM", RawValue::from("Porto")),
                ("CRÉDITO ATUAL", RawValue::Number(1000.0)),
            ]),
        ];

        let result = importer
            .process_import(&rows, &columns(), LayoutType::Historico, "t.csv", &NoOpProgressSink)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.starts_with("Linha 1: ")));
        assert_eq!(result.stats.vendas_criadas, 1);
        assert_eq!(result.stats.administradoras_criadas, 1);
        assert_eq!(result.stats.cotas_criadas, 1);
        assert!(result.import_log_id.is_some());
        assert_eq!(count(&conn, "import_logs"), 1);
    }

    #[tokio::test]
    async fn test_sentinel_representative_gets_no_commission_record() {
        let (conn, importer) = importer();
        let rows = vec![
            row(&[
                ("GRUPO", RawValue::from("1")),
                ("COTA", RawValue::from("1")),
                ("REPRES", RawValue::from("anatote")),
                ("COMISSÃO1 ANATOTE", RawValue::Number(2.0)),
            ]),
            row(&[
                ("GRUPO", RawValue::from("1")),
                ("COTA", RawValue::from("2")),
                ("REPRES", RawValue::from("Rep Sul")),
                ("CRÉDITO ATUAL", RawValue::Number(50_000.0)),
                ("COMISSÃO1 ANATOTE", RawValue::Number(2.0)),
            ]),
        ];

        let result = importer
            .process_import(&rows, &columns(), LayoutType::Historico, "t.csv", &NoOpProgressSink)
            .await
            .unwrap();

        assert_eq!(result.stats.representantes_criados, 2);
        assert_eq!(result.stats.comissoes_criadas, 0);
        assert_eq!(count(&conn, "comissoes_representantes"), 1);
        let valor: f64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT valor FROM comissoes_representantes", [], |r| r.get(0))
            .unwrap();
        assert!((valor - 1000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_before_first_row() {
        let (conn, importer) = importer();
        let flag = Arc::new(AtomicBool::new(true));
        let importer = importer.with_cancel_flag(flag);
        let sink = RecordingProgressSink::new();

        let rows = vec![row(&[("GRUPO", RawValue::from("1")), ("COTA", RawValue::from("1"))])];
        let result = importer
            .process_import(&rows, &columns(), LayoutType::Pagamento, "t.csv", &sink)
            .await
            .unwrap();

        assert_eq!(result.errors, vec!["Importação interrompida na linha 1".to_string()]);
        assert_eq!(result.stats.vendas_criadas, 0);
        assert_eq!(count(&conn, "import_logs"), 1);

        let phases: Vec<ImportPhase> = sink.events().iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![ImportPhase::Preparing, ImportPhase::Saving, ImportPhase::Error]
        );
    }
}
