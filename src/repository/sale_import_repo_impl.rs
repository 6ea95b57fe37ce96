// ==========================================
// 合购后台系统 - 销售导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 去重: 参照实体/份额依赖唯一键 + ON CONFLICT DO NOTHING，
//       并发导入同名实体时只会产生一条记录
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::sale::{
    normalize_name, Delinquency, ImportLog, NewSale, Quota, Receipt, ReconciliationAdjustment,
    RepresentativeCommission, SalespersonCommission,
};
use crate::domain::types::ReferenceKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sale_import_repo::{SaleImportRepository, Upserted};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn to_json(field: &str, values: &[String]) -> RepositoryResult<String> {
    serde_json::to_string(values).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: e.to_string(),
    })
}

// ==========================================
// SaleImportRepositoryImpl
// ==========================================
pub struct SaleImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SaleImportRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与其他仓储共享同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn load_pairs(&self, sql: &str) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }
}

#[async_trait]
impl SaleImportRepository for SaleImportRepositoryImpl {
    async fn load_references(&self, kind: ReferenceKind) -> RepositoryResult<Vec<(String, String)>> {
        self.load_pairs(&format!(
            "SELECT nome_normalizado, id FROM {}",
            kind.table()
        ))
    }

    async fn load_quotas(&self) -> RepositoryResult<Vec<(String, String)>> {
        self.load_pairs("SELECT chave, id FROM cotas")
    }

    async fn upsert_reference(&self, kind: ReferenceKind, name: &str) -> RepositoryResult<Upserted> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "nome".to_string(),
                message: format!("{} sem nome", kind.table()),
            });
        }

        let conn = self.get_conn()?;
        let id = new_id();
        let inserted = conn.execute(
            &format!(
                "INSERT INTO {} (id, nome, nome_normalizado) VALUES (?1, ?2, ?3)
                 ON CONFLICT(nome_normalizado) DO NOTHING",
                kind.table()
            ),
            params![id, name.trim(), normalized],
        )?;

        if inserted > 0 {
            return Ok((id, true));
        }

        let existing: String = conn.query_row(
            &format!("SELECT id FROM {} WHERE nome_normalizado = ?1", kind.table()),
            params![normalized],
            |row| row.get(0),
        )?;
        Ok((existing, false))
    }

    async fn upsert_quota(
        &self,
        group: &str,
        code: &str,
        segment: &str,
        administrator_id: Option<&str>,
    ) -> RepositoryResult<Upserted> {
        if code.trim().is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "codigo".to_string(),
                message: "cota sem código".to_string(),
            });
        }

        let key = Quota::identity_key(group, code);
        let conn = self.get_conn()?;
        let id = new_id();
        let inserted = conn.execute(
            r#"
            INSERT INTO cotas (id, codigo, grupo, tipo, administradora_id, chave)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(chave) DO NOTHING
            "#,
            params![id, code.trim(), group.trim(), segment.trim(), administrator_id, key],
        )?;

        if inserted > 0 {
            return Ok((id, true));
        }

        let existing: String = conn.query_row(
            "SELECT id FROM cotas WHERE chave = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok((existing, false))
    }

    async fn find_sale_by_quota(&self, quota_id: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM vendas WHERE cota_id = ?1 LIMIT 1",
                params![quota_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn insert_sale(&self, sale: &NewSale) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO vendas (
                id, cota_id, cliente_id, vendedor_id, representante_id,
                data_venda, valor_credito, valor_total, situacao, observacao
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                sale.quota_id,
                sale.client_id,
                sale.salesperson_id,
                sale.representative_id,
                sale.sale_date.format(DATE_FORMAT).to_string(),
                sale.credit_value,
                sale.total_value,
                sale.status.as_db(),
                sale.note,
            ],
        )?;
        Ok(id)
    }

    async fn insert_salesperson_commission(
        &self,
        commission: &SalespersonCommission,
    ) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO comissoes_regras (
                id, venda_id, vendedor_id, percentual_vendedor, valor_previsto, parcelas
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                commission.sale_id,
                commission.salesperson_id,
                commission.percentage,
                commission.predicted_value,
                commission.installments,
            ],
        )?;
        Ok(id)
    }

    async fn insert_representative_commission(
        &self,
        commission: &RepresentativeCommission,
    ) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO comissoes_representantes (
                id, venda_id, representante_id, percentual, percentual_adicional, valor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                commission.sale_id,
                commission.representative_id,
                commission.percentage,
                commission.additional_percentage,
                commission.value,
            ],
        )?;
        Ok(id)
    }

    async fn insert_receipt(&self, receipt: &Receipt) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO recebimentos (id, venda_id, parcela, valor_recebido, data_credito)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                receipt.sale_id,
                receipt.installment,
                receipt.received_value,
                receipt.credit_date.format(DATE_FORMAT).to_string(),
            ],
        )?;
        Ok(id)
    }

    async fn insert_delinquency(&self, delinquency: &Delinquency) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO inadimplencias (id, venda_id, valor, observacao, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                delinquency.sale_id,
                delinquency.overdue_value,
                delinquency.note,
                delinquency.status.as_db(),
            ],
        )?;
        Ok(id)
    }

    async fn insert_adjustment(&self, adjustment: &ReconciliationAdjustment) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO ajustes_conciliacao (
                id, venda_id, tipo, diferenca, valor_esperado, valor_real, observacao
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                id,
                adjustment.sale_id,
                adjustment.kind,
                adjustment.difference,
                adjustment.expected_value,
                adjustment.real_value,
                adjustment.note,
            ],
        )?;
        Ok(id)
    }

    async fn insert_import_log(&self, log: &ImportLog) -> RepositoryResult<String> {
        let errors = to_json("erros", &log.errors)?;
        let warnings = to_json("warnings", &log.warnings)?;

        let conn = self.get_conn()?;
        let id = new_id();
        conn.execute(
            r#"
            INSERT INTO import_logs (
                id, tipo_importacao, nome_arquivo, total_linhas, linhas_validas,
                linhas_rejeitadas, valor_total_recebido, total_divergencias, erros, warnings
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                log.layout.as_str(),
                log.file_name,
                log.total_rows as i64,
                log.valid_rows as i64,
                log.rejected_rows as i64,
                log.total_received,
                log.total_divergences as i64,
                errors,
                warnings,
            ],
        )?;
        Ok(id)
    }
}
