// ==========================================
// 合购后台系统 - 佣金 Repository 实现
// ==========================================
// 职责: 实现佣金相关数据访问（使用 rusqlite）
// 账期以 TEXT(YYYY-MM) 存储，字典序比较即时间序比较
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::commission::{CommissionRule, CommissionTier, ReceivableCommission};
use crate::domain::competence::Competence;
use crate::domain::sale::{Delinquency, Sale};
use crate::domain::types::{BeneficiaryType, CommissionStatus, DelinquencyStatus, SaleStatus};
use crate::repository::commission_repo::{CommissionRepository, CompetenceCommissionRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RECEIVABLE_COLUMNS: &str = r#"
    cr.id, cr.venda_id, cr.vendedor_id, cr.representante_id, cr.regra_id, cr.faixa_id,
    cr.tipo, cr.parcela, cr.total_parcelas, cr.base_calculo, cr.percentual,
    cr.valor_previsto, cr.valor_pago, cr.competencia_origem, cr.competencia_pagamento,
    cr.status, cr.motivo_bloqueio, cr.data_liberacao, cr.data_pagamento
"#;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn competence_at(row: &Row, idx: usize) -> rusqlite::Result<Competence> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn datetime_at(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()))
}

fn map_receivable(row: &Row) -> rusqlite::Result<ReceivableCommission> {
    let beneficiary_raw: String = row.get(6)?;
    let beneficiary = BeneficiaryType::from_db(&beneficiary_raw)
        .ok_or_else(|| conversion_error(6, format!("tipo desconhecido: {}", beneficiary_raw)))?;

    let status_raw: String = row.get(15)?;
    let status = CommissionStatus::from_db(&status_raw)
        .ok_or_else(|| conversion_error(15, format!("status desconhecido: {}", status_raw)))?;

    Ok(ReceivableCommission {
        id: row.get(0)?,
        sale_id: row.get(1)?,
        salesperson_id: row.get(2)?,
        representative_id: row.get(3)?,
        rule_id: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        tier_id: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        beneficiary,
        installment: row.get(7)?,
        total_installments: row.get(8)?,
        calculation_base: row.get(9)?,
        percentage: row.get(10)?,
        predicted_value: row.get(11)?,
        paid_value: row.get(12)?,
        origin_competence: competence_at(row, 13)?,
        payment_competence: competence_at(row, 14)?,
        status,
        block_reason: row.get(16)?,
        released_at: datetime_at(row, 17)?,
        paid_at: datetime_at(row, 18)?,
    })
}

// ==========================================
// CommissionRepositoryImpl
// ==========================================
pub struct CommissionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CommissionRepositoryImpl {
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

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn load_tiers(conn: &Connection, rule_id: &str) -> RepositoryResult<Vec<CommissionTier>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, regra_id, ordem, percentual, parcelas, meses_carencia
            FROM faixas_comissao
            WHERE regra_id = ?1
            ORDER BY ordem ASC
            "#,
        )?;
        let rows = stmt.query_map(params![rule_id], |row| {
            Ok(CommissionTier {
                id: row.get(0)?,
                rule_id: row.get(1)?,
                order: row.get(2)?,
                percentage: row.get(3)?,
                installments: row.get(4)?,
                grace_months: row.get(5)?,
            })
        })?;

        let mut tiers = Vec::new();
        for row in rows {
            tiers.push(row?);
        }
        Ok(tiers)
    }
}

#[async_trait]
impl CommissionRepository for CommissionRepositoryImpl {
    async fn load_sale(&self, sale_id: &str) -> RepositoryResult<Option<Sale>> {
        let conn = self.get_conn()?;
        let sale = conn
            .query_row(
                r#"
                SELECT v.id, v.cota_id, v.cliente_id, v.vendedor_id, v.representante_id,
                       v.data_venda, v.valor_credito, v.valor_total, v.situacao, v.observacao,
                       c.grupo, c.administradora_id
                FROM vendas v
                LEFT JOIN cotas c ON c.id = v.cota_id
                WHERE v.id = ?1
                "#,
                params![sale_id],
                |row| {
                    let date_raw: String = row.get(5)?;
                    let sale_date = NaiveDate::parse_from_str(date_raw.get(..10).unwrap_or(date_raw.as_str()), "%Y-%m-%d")
                        .map_err(|e| conversion_error(5, e.to_string()))?;
                    let status_raw: String = row.get(8)?;

                    Ok(Sale {
                        id: row.get(0)?,
                        quota_id: row.get(1)?,
                        client_id: row.get(2)?,
                        salesperson_id: row.get(3)?,
                        representative_id: row.get(4)?,
                        sale_date,
                        credit_value: row.get(6)?,
                        total_value: row.get(7)?,
                        status: SaleStatus::from_db(&status_raw),
                        note: row.get(9)?,
                        quota_group: row.get(10)?,
                        quota_administrator_id: row.get(11)?,
                    })
                },
            )
            .optional()?;
        Ok(sale)
    }

    async fn update_sale_status(&self, sale_id: &str, status: SaleStatus) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE vendas SET situacao = ?2 WHERE id = ?1",
            params![sale_id, status.as_db()],
        )?;
        Ok(rows)
    }

    async fn has_open_delinquency(&self, sale_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM inadimplencias WHERE venda_id = ?1 AND status = ?2 LIMIT 1",
                params![sale_id, DelinquencyStatus::Open.as_db()],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    async fn insert_delinquency(&self, delinquency: &Delinquency) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = Uuid::new_v4().to_string();
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

    async fn resolve_open_delinquencies(&self, sale_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE inadimplencias SET status = ?3 WHERE venda_id = ?1 AND status = ?2",
            params![
                sale_id,
                DelinquencyStatus::Open.as_db(),
                DelinquencyStatus::Resolved.as_db()
            ],
        )?;
        Ok(rows)
    }

    async fn load_active_rules(&self, beneficiary: BeneficiaryType) -> RepositoryResult<Vec<CommissionRule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, nome, administradora_id, grupo_filtro, ativo
            FROM regras_comissao
            WHERE tipo = ?1 AND ativo = 1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![beneficiary.as_db()], |row| {
            Ok(CommissionRule {
                id: row.get(0)?,
                name: row.get(1)?,
                beneficiary,
                administrator_id: row.get(2)?,
                group_filter: row.get(3)?,
                active: row.get::<_, i64>(4)? != 0,
                tiers: Vec::new(),
            })
        })?;

        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        drop(stmt);

        for rule in rules.iter_mut() {
            rule.tiers = Self::load_tiers(&conn, &rule.id)?;
        }
        Ok(rules)
    }

    async fn insert_rule(&self, rule: &CommissionRule) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO regras_comissao (id, nome, tipo, administradora_id, grupo_filtro, ativo)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                rule.id,
                rule.name,
                rule.beneficiary.as_db(),
                rule.administrator_id,
                rule.group_filter,
                rule.active as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO faixas_comissao (id, regra_id, ordem, percentual, parcelas, meses_carencia)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for tier in &rule.tiers {
                stmt.execute(params![
                    tier.id,
                    rule.id,
                    tier.order,
                    tier.percentage,
                    tier.installments,
                    tier.grace_months,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    async fn insert_receivable(&self, c: &ReceivableCommission) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO comissoes_receber (
                id, venda_id, vendedor_id, representante_id, regra_id, faixa_id, tipo,
                parcela, total_parcelas, base_calculo, percentual, valor_previsto, valor_pago,
                competencia_origem, competencia_pagamento, status, motivo_bloqueio
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                c.id,
                c.sale_id,
                c.salesperson_id,
                c.representative_id,
                c.rule_id,
                c.tier_id,
                c.beneficiary.as_db(),
                c.installment,
                c.total_installments,
                c.calculation_base,
                c.percentage,
                c.predicted_value,
                c.paid_value,
                c.origin_competence.to_string(),
                c.payment_competence.to_string(),
                c.status.as_db(),
                c.block_reason,
            ],
        )?;
        Ok(c.id.clone())
    }

    async fn get_receivable(&self, commission_id: &str) -> RepositoryResult<Option<ReceivableCommission>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {} FROM comissoes_receber cr WHERE cr.id = ?1", RECEIVABLE_COLUMNS),
                params![commission_id],
                map_receivable,
            )
            .optional()?;
        Ok(found)
    }

    async fn list_receivables_by_sale(&self, sale_id: &str) -> RepositoryResult<Vec<ReceivableCommission>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM comissoes_receber cr
            WHERE cr.venda_id = ?1
            ORDER BY cr.tipo, cr.regra_id, cr.competencia_pagamento, cr.parcela
            "#,
            RECEIVABLE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![sale_id], map_receivable)?;

        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    async fn list_by_payment_competence(
        &self,
        competence: Competence,
    ) -> RepositoryResult<Vec<CompetenceCommissionRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}, vd.nome, rp.nome
            FROM comissoes_receber cr
            LEFT JOIN vendedores vd ON vd.id = cr.vendedor_id
            LEFT JOIN representantes rp ON rp.id = cr.representante_id
            WHERE cr.competencia_pagamento = ?1
            ORDER BY cr.created_at, cr.rowid
            "#,
            RECEIVABLE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![competence.to_string()], |row| {
            Ok(CompetenceCommissionRow {
                commission: map_receivable(row)?,
                salesperson_name: row.get(19)?,
                representative_name: row.get(20)?,
            })
        })?;

        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    async fn block_pending(&self, sale_id: &str, reason: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE comissoes_receber
            SET status = ?3, motivo_bloqueio = ?4
            WHERE venda_id = ?1 AND status = ?2
            "#,
            params![
                sale_id,
                CommissionStatus::Pending.as_db(),
                CommissionStatus::Blocked.as_db(),
                reason
            ],
        )?;
        Ok(rows)
    }

    async fn unblock(&self, sale_id: &str, released_at: NaiveDateTime) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE comissoes_receber
            SET status = ?3, motivo_bloqueio = NULL, data_liberacao = ?4
            WHERE venda_id = ?1 AND status = ?2
            "#,
            params![
                sale_id,
                CommissionStatus::Blocked.as_db(),
                CommissionStatus::Pending.as_db(),
                released_at.format(DATETIME_FORMAT).to_string()
            ],
        )?;
        Ok(rows)
    }

    async fn cancel_from_competence(&self, sale_id: &str, from: Competence) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE comissoes_receber
            SET status = ?4
            WHERE venda_id = ?1
              AND status IN (?2, ?3)
              AND competencia_pagamento >= ?5
            "#,
            params![
                sale_id,
                CommissionStatus::Pending.as_db(),
                CommissionStatus::Blocked.as_db(),
                CommissionStatus::Cancelled.as_db(),
                from.to_string()
            ],
        )?;
        Ok(rows)
    }

    async fn mark_paid(
        &self,
        commission_id: &str,
        paid_value: f64,
        paid_at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE comissoes_receber
            SET status = ?4, valor_pago = ?5, data_pagamento = ?6, motivo_bloqueio = NULL
            WHERE id = ?1 AND status IN (?2, ?3)
            "#,
            params![
                commission_id,
                CommissionStatus::Pending.as_db(),
                CommissionStatus::Blocked.as_db(),
                CommissionStatus::Paid.as_db(),
                paid_value,
                paid_at.format(DATETIME_FORMAT).to_string()
            ],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> (Arc<Mutex<Connection>>, CommissionRepositoryImpl) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO vendas (id, data_venda, valor_credito) VALUES ('V1', '2024-01-15', 100000);",
        )
        .unwrap();
        let shared = Arc::new(Mutex::new(conn));
        (shared.clone(), CommissionRepositoryImpl::from_connection(shared))
    }

    fn rule(id: &str, beneficiary: BeneficiaryType, active: bool) -> CommissionRule {
        CommissionRule {
            id: id.to_string(),
            name: format!("Regra {}", id),
            beneficiary,
            administrator_id: None,
            group_filter: None,
            active,
            tiers: vec![
                CommissionTier {
                    id: format!("{}-F2", id),
                    rule_id: id.to_string(),
                    order: 2,
                    percentage: 2.0,
                    installments: 10,
                    grace_months: 0,
                },
                CommissionTier {
                    id: format!("{}-F1", id),
                    rule_id: id.to_string(),
                    order: 1,
                    percentage: 3.0,
                    installments: 10,
                    grace_months: 1,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_active_rules_filtered_by_type_and_tiers_ordered() {
        let (_conn, repo) = setup();
        repo.insert_rule(&rule("R1", BeneficiaryType::Salesperson, true)).await.unwrap();
        repo.insert_rule(&rule("R2", BeneficiaryType::Salesperson, false)).await.unwrap();
        repo.insert_rule(&rule("R3", BeneficiaryType::Representative, true)).await.unwrap();
        repo.insert_rule(&rule("R4", BeneficiaryType::Salesperson, true)).await.unwrap();

        let rules = repo.load_active_rules(BeneficiaryType::Salesperson).await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R4", "R1"]);

        let orders: Vec<i32> = rules[0].tiers.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delinquency_open_and_resolve() {
        let (_conn, repo) = setup();
        assert!(!repo.has_open_delinquency("V1").await.unwrap());

        repo.insert_delinquency(&Delinquency {
            sale_id: "V1".to_string(),
            overdue_value: 50.0,
            note: "teste".to_string(),
            status: DelinquencyStatus::Open,
        })
        .await
        .unwrap();
        assert!(repo.has_open_delinquency("V1").await.unwrap());

        assert_eq!(repo.resolve_open_delinquencies("V1").await.unwrap(), 1);
        assert!(!repo.has_open_delinquency("V1").await.unwrap());
    }

    #[tokio::test]
    async fn test_load_sale_without_quota() {
        let (_conn, repo) = setup();
        let sale = repo.load_sale("V1").await.unwrap().unwrap();
        assert_eq!(sale.credit_value, 100000.0);
        assert_eq!(sale.status, SaleStatus::Active);
        assert!(sale.quota_group.is_none());
        assert!(repo.load_sale("V404").await.unwrap().is_none());
    }
}
