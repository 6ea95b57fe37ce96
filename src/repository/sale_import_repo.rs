// ==========================================
// 合购后台系统 - 销售导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::sale::{
    Delinquency, ImportLog, NewSale, Receipt, ReconciliationAdjustment,
    RepresentativeCommission, SalespersonCommission,
};
use crate::domain::types::ReferenceKind;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

/// upsert 结果: (id, 是否新建)
pub type Upserted = (String, bool);

// ==========================================
// SaleImportRepository Trait
// ==========================================
// 用途: 销售表格导入的数据访问
// 实现者: SaleImportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait SaleImportRepository: Send + Sync {
    // ===== 预加载 =====

    /// 读取某类参照实体的全部 (规范化名称, id)
    async fn load_references(&self, kind: ReferenceKind) -> RepositoryResult<Vec<(String, String)>>;

    /// 读取全部份额的 (身份键, id)
    async fn load_quotas(&self) -> RepositoryResult<Vec<(String, String)>>;

    // ===== 参照实体 upsert =====

    /// 按规范化名称查找或创建参照实体
    ///
    /// # 返回
    /// - Ok((id, true)): 新建
    /// - Ok((id, false)): 已存在（含并发导入先行写入的情况）
    async fn upsert_reference(&self, kind: ReferenceKind, name: &str) -> RepositoryResult<Upserted>;

    /// 按 GRUPO-CODIGO 查找或创建份额
    ///
    /// # 参数
    /// - segment: 份额类型（新建时写入）
    /// - administrator_id: 所属管理公司（新建时写入）
    async fn upsert_quota(
        &self,
        group: &str,
        code: &str,
        segment: &str,
        administrator_id: Option<&str>,
    ) -> RepositoryResult<Upserted>;

    // ===== 销售与从属记录 =====

    /// 查找挂在某份额上的销售 id
    async fn find_sale_by_quota(&self, quota_id: &str) -> RepositoryResult<Option<String>>;

    /// 插入销售，返回新 id
    async fn insert_sale(&self, sale: &NewSale) -> RepositoryResult<String>;

    async fn insert_salesperson_commission(
        &self,
        commission: &SalespersonCommission,
    ) -> RepositoryResult<String>;

    async fn insert_representative_commission(
        &self,
        commission: &RepresentativeCommission,
    ) -> RepositoryResult<String>;

    async fn insert_receipt(&self, receipt: &Receipt) -> RepositoryResult<String>;

    async fn insert_delinquency(&self, delinquency: &Delinquency) -> RepositoryResult<String>;

    async fn insert_adjustment(&self, adjustment: &ReconciliationAdjustment) -> RepositoryResult<String>;

    // ===== 导入日志 =====

    /// 写入导入日志，返回日志 id
    async fn insert_import_log(&self, log: &ImportLog) -> RepositoryResult<String>;
}
