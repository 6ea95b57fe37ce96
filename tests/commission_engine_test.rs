// ==========================================
// 佣金规则引擎集成测试
// ==========================================
// 覆盖: 档位展开 / 逾期冻结 / 未来取消 / 付款确认 / 账期汇总
// ==========================================

mod test_helpers;

use consorcio_backoffice::domain::competence::Competence;
use consorcio_backoffice::domain::types::{BeneficiaryType, CommissionStatus};
use consorcio_backoffice::engine::{CommissionRuleEngine, BLOCK_REASON_DELINQUENCY};
use consorcio_backoffice::repository::{
    CommissionRepository, CommissionRepositoryImpl, RepositoryError,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, date, open_shared, rule, seed_rule, seed_sale, tier};

fn engine(conn: &Arc<Mutex<Connection>>) -> CommissionRuleEngine<CommissionRepositoryImpl> {
    CommissionRuleEngine::new(CommissionRepositoryImpl::from_connection(conn.clone()))
}

fn competence(raw: &str) -> Competence {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_tier_schedule_for_salesperson() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RV", BeneficiaryType::Salesperson, vec![tier("RV", 1, 3.0, 10, 1)]),
    )
    .await;
    let sale = seed_sale(&conn, "7", date(2024, 1, 20), 100_000.0).await;

    let engine = engine(&conn);
    let result = engine.generate_commissions(&sale.sale_id).await.unwrap();
    assert!(result.success);
    assert_eq!(result.comissoes, 10);

    let list = engine
        .repository()
        .list_receivables_by_sale(&sale.sale_id)
        .await
        .unwrap();
    assert_eq!(list.len(), 10);

    let first = list.iter().find(|c| c.installment == 1).unwrap();
    assert!((first.predicted_value - 300.0).abs() < 1e-9);
    assert_eq!(first.origin_competence, competence("2024-01"));
    assert_eq!(first.payment_competence, competence("2024-03"));
    assert_eq!(first.status, CommissionStatus::Pending);
    assert_eq!(first.salesperson_id.as_deref(), Some(sale.salesperson_id.as_str()));
    assert_eq!(first.calculation_base, 100_000.0);

    let last = list.iter().find(|c| c.installment == 10).unwrap();
    assert_eq!(last.payment_competence, competence("2024-12"));
}

#[tokio::test]
async fn test_generation_blocked_when_delinquent() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RR", BeneficiaryType::Representative, vec![tier("RR", 1, 1.0, 2, 0)]),
    )
    .await;
    let sale = seed_sale(&conn, "8", date(2024, 5, 2), 40_000.0).await;

    let engine = engine(&conn);
    engine
        .repository()
        .insert_delinquency(&consorcio_backoffice::domain::sale::Delinquency {
            sale_id: sale.sale_id.clone(),
            overdue_value: 250.0,
            note: "Parcela em atraso".to_string(),
            status: consorcio_backoffice::domain::types::DelinquencyStatus::Open,
        })
        .await
        .unwrap();

    let result = engine.generate_commissions(&sale.sale_id).await.unwrap();
    assert_eq!(result.comissoes, 2);

    let list = engine
        .repository()
        .list_receivables_by_sale(&sale.sale_id)
        .await
        .unwrap();
    assert!(list.iter().all(|c| c.status == CommissionStatus::Blocked));
    assert!(list
        .iter()
        .all(|c| c.block_reason.as_deref() == Some(BLOCK_REASON_DELINQUENCY)));
    assert!(list
        .iter()
        .all(|c| c.representative_id.as_deref() == Some(sale.representative_id.as_str())));

    // 解决逾期 → 全部解冻
    let unblocked = engine.resolve_delinquencies(&sale.sale_id).await.unwrap();
    assert_eq!(unblocked, 2);
    let list = engine
        .repository()
        .list_receivables_by_sale(&sale.sale_id)
        .await
        .unwrap();
    assert!(list.iter().all(|c| c.status == CommissionStatus::Pending));
    assert!(list.iter().all(|c| c.block_reason.is_none()));
    assert!(list.iter().all(|c| c.released_at.is_some()));
}

#[tokio::test]
async fn test_missing_and_void_sales() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RV", BeneficiaryType::Salesperson, vec![tier("RV", 1, 3.0, 10, 0)]),
    )
    .await;
    let engine = engine(&conn);

    let missing = engine.generate_commissions("nao-existe").await.unwrap();
    assert!(!missing.success);
    assert_eq!(missing.comissoes, 0);
    assert_eq!(missing.errors, vec!["Venda não encontrada".to_string()]);

    let sale = seed_sale(&conn, "9", date(2024, 1, 10), 10_000.0).await;
    engine.cancel_sale(&sale.sale_id, true).await.unwrap();

    let skipped = engine.generate_commissions(&sale.sale_id).await.unwrap();
    assert!(skipped.success);
    assert_eq!(skipped.comissoes, 0);
    assert!(skipped.errors.is_empty());
    assert!(skipped.skipped_reason.is_some());
}

#[tokio::test]
async fn test_block_then_cancel_future_keeps_past() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RV", BeneficiaryType::Salesperson, vec![tier("RV", 1, 2.0, 10, 0)]),
    )
    .await;
    let sale = seed_sale(&conn, "10", date(2024, 1, 20), 50_000.0).await;

    let engine = engine(&conn);
    engine.generate_commissions(&sale.sale_id).await.unwrap();

    // 2024-02 .. 2024-11
    assert_eq!(engine.block_by_delinquency(&sale.sale_id).await.unwrap(), 10);
    assert_eq!(engine.block_by_delinquency(&sale.sale_id).await.unwrap(), 0);

    let cancelled = engine
        .cancel_future_from(&sale.sale_id, competence("2024-06"))
        .await
        .unwrap();
    assert_eq!(cancelled, 6);

    let list = engine
        .repository()
        .list_receivables_by_sale(&sale.sale_id)
        .await
        .unwrap();
    for c in &list {
        if c.payment_competence >= competence("2024-06") {
            assert_eq!(c.status, CommissionStatus::Cancelled);
        } else {
            assert_eq!(c.status, CommissionStatus::Blocked);
        }
    }

    // 已取消的不会被解冻
    assert_eq!(engine.unblock(&sale.sale_id).await.unwrap(), 4);
}

#[tokio::test]
async fn test_confirm_payment_transitions() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RV", BeneficiaryType::Salesperson, vec![tier("RV", 1, 1.0, 3, 0)]),
    )
    .await;
    let sale = seed_sale(&conn, "11", date(2024, 3, 1), 30_000.0).await;

    let engine = engine(&conn);
    engine.generate_commissions(&sale.sale_id).await.unwrap();
    let mut list = engine
        .repository()
        .list_receivables_by_sale(&sale.sale_id)
        .await
        .unwrap();
    list.sort_by_key(|c| c.installment);

    let paid = engine.confirm_payment(&list[0].id, None).await.unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);
    assert_eq!(paid.paid_value, Some(100.0));
    assert!(paid.paid_at.is_some());

    let again = engine.confirm_payment(&list[0].id, Some(50.0)).await;
    assert!(matches!(
        again,
        Err(RepositoryError::InvalidStateTransition { .. })
    ));

    // 冻结中的也可付款
    engine.block_by_delinquency(&sale.sale_id).await.unwrap();
    let paid = engine.confirm_payment(&list[1].id, Some(80.0)).await.unwrap();
    assert_eq!(paid.paid_value, Some(80.0));

    engine
        .cancel_future_from(&sale.sale_id, competence("2000-01"))
        .await
        .unwrap();
    let cancelled = engine.confirm_payment(&list[2].id, None).await;
    assert!(matches!(
        cancelled,
        Err(RepositoryError::InvalidStateTransition { .. })
    ));

    let missing = engine.confirm_payment("nao-existe", None).await;
    assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
}

#[tokio::test]
async fn test_summary_by_competence() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_rule(
        &conn,
        &rule("RV", BeneficiaryType::Salesperson, vec![tier("RV", 1, 2.0, 1, 0)]),
    )
    .await;
    seed_rule(
        &conn,
        &rule("RR", BeneficiaryType::Representative, vec![tier("RR", 1, 1.0, 1, 0)]),
    )
    .await;

    let a = seed_sale(&conn, "20", date(2024, 2, 5), 10_000.0).await;
    let b = seed_sale(&conn, "21", date(2024, 2, 25), 20_000.0).await;

    let engine = engine(&conn);
    engine.generate_commissions(&a.sale_id).await.unwrap();
    engine.generate_commissions(&b.sale_id).await.unwrap();

    // a: vendedor 200 + representante 100; b: vendedor 400 + representante 200
    let a_list = engine
        .repository()
        .list_receivables_by_sale(&a.sale_id)
        .await
        .unwrap();
    let a_salesperson = a_list
        .iter()
        .find(|c| c.beneficiary == BeneficiaryType::Salesperson)
        .unwrap();
    engine.confirm_payment(&a_salesperson.id, Some(180.0)).await.unwrap();
    engine.block_by_delinquency(&b.sale_id).await.unwrap();

    let summary = engine
        .summary_by_competence(competence("2024-03"))
        .await
        .unwrap();

    assert_eq!(summary.competencia, "2024-03");
    assert!((summary.total_pago - 180.0).abs() < 1e-9);
    assert!((summary.total_pendente - 100.0).abs() < 1e-9);
    assert!((summary.total_bloqueado - 600.0).abs() < 1e-9);
    assert!((summary.por_vendedor["Ana Souza"] - 600.0).abs() < 1e-9);
    assert!((summary.por_representante["Rep Sul"] - 300.0).abs() < 1e-9);

    let empty = engine
        .summary_by_competence(competence("2030-01"))
        .await
        .unwrap();
    assert_eq!(empty.total_pendente, 0.0);
    assert!(empty.por_vendedor.is_empty());
}
