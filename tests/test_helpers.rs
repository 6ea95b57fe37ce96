// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、示例规则/销售、CSV 临时文件
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use consorcio_backoffice::db::{init_schema, open_sqlite_connection};
use consorcio_backoffice::domain::commission::{CommissionRule, CommissionTier};
use consorcio_backoffice::domain::sale::NewSale;
use consorcio_backoffice::domain::types::{BeneficiaryType, ReferenceKind, SaleStatus};
use consorcio_backoffice::repository::{
    CommissionRepository, CommissionRepositoryImpl, SaleImportRepository, SaleImportRepositoryImpl,
};
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（供多个仓储共用）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

pub fn count(conn: &Arc<Mutex<Connection>>, table: &str) -> i64 {
    conn.lock()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

/// 写入临时 CSV 文件（保留 .csv 扩展名）
pub fn write_csv(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("vendas_")
        .suffix(".csv")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn tier(rule_id: &str, order: i32, percentage: f64, installments: u32, grace_months: u32) -> CommissionTier {
    CommissionTier {
        id: format!("{}-F{}", rule_id, order),
        rule_id: rule_id.to_string(),
        order,
        percentage,
        installments,
        grace_months,
    }
}

pub fn rule(id: &str, beneficiary: BeneficiaryType, tiers: Vec<CommissionTier>) -> CommissionRule {
    CommissionRule {
        id: id.to_string(),
        name: format!("Regra {}", id),
        beneficiary,
        administrator_id: None,
        group_filter: None,
        active: true,
        tiers,
    }
}

pub async fn seed_rule(conn: &Arc<Mutex<Connection>>, rule: &CommissionRule) {
    CommissionRepositoryImpl::from_connection(conn.clone())
        .insert_rule(rule)
        .await
        .unwrap();
}

/// 已创建销售的各实体 ID
pub struct SeededSale {
    pub sale_id: String,
    pub salesperson_id: String,
    pub representative_id: String,
}

/// 经导入仓储创建一笔销售（含销售员、代理商、份额）
pub async fn seed_sale(
    conn: &Arc<Mutex<Connection>>,
    quota_code: &str,
    sale_date: NaiveDate,
    credit_value: f64,
) -> SeededSale {
    let repo = SaleImportRepositoryImpl::from_connection(conn.clone());
    let (salesperson_id, _) = repo
        .upsert_reference(ReferenceKind::Salesperson, "Ana Souza")
        .await
        .unwrap();
    let (representative_id, _) = repo
        .upsert_reference(ReferenceKind::Representative, "Rep Sul")
        .await
        .unwrap();
    let (quota_id, _) = repo
        .upsert_quota("1010", quota_code, "IMÓVEL", None)
        .await
        .unwrap();

    let sale_id = repo
        .insert_sale(&NewSale {
            quota_id,
            client_id: None,
            salesperson_id: Some(salesperson_id.clone()),
            representative_id: Some(representative_id.clone()),
            sale_date,
            credit_value,
            total_value: 0.0,
            status: SaleStatus::Active,
            note: None,
        })
        .await
        .unwrap();

    SeededSale {
        sale_id,
        salesperson_id,
        representative_id,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
