// ==========================================
// 合购后台系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/佣金模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 对账容差 =====

    /// 相对容差（比例）
    ///
    /// # 默认值
    /// - 0.005（0.5%）
    async fn get_tolerance_percentage(&self) -> ConfigResult<f64>;

    /// 绝对容差（金额）
    ///
    /// # 默认值
    /// - 0.01
    async fn get_tolerance_absolute(&self) -> ConfigResult<f64>;

    // ===== 表格扫描 =====

    /// 扫描的分期列组上限
    ///
    /// # 默认值
    /// - 20
    async fn get_max_installment_columns(&self) -> ConfigResult<u32>;

    /// 大文件告警行数阈值
    ///
    /// # 默认值
    /// - 10000
    async fn get_large_file_row_threshold(&self) -> ConfigResult<usize>;

    // ===== 业务口径 =====

    /// 不产生代理商佣金记录的代理商名称
    ///
    /// # 默认值
    /// - ANATOTE
    async fn get_no_commission_representative(&self) -> ConfigResult<String>;

    /// 份额类型缺省值（分段列为空时）
    ///
    /// # 默认值
    /// - IMÓVEL
    async fn get_default_quota_segment(&self) -> ConfigResult<String>;
}

// ==========================================
// ImportSettings - 单次导入的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSettings {
    pub tolerance_percentage: f64,
    pub tolerance_absolute: f64,
    pub max_installment_columns: u32,
    pub large_file_row_threshold: usize,
    pub no_commission_representative: String,
    pub default_quota_segment: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            tolerance_percentage: 0.005,
            tolerance_absolute: 0.01,
            max_installment_columns: 20,
            large_file_row_threshold: 10_000,
            no_commission_representative: "ANATOTE".to_string(),
            default_quota_segment: "IMÓVEL".to_string(),
        }
    }
}

impl ImportSettings {
    /// 一次性读取全部配置项
    pub async fn load<R: ImportConfigReader + ?Sized>(reader: &R) -> ConfigResult<Self> {
        Ok(Self {
            tolerance_percentage: reader.get_tolerance_percentage().await?,
            tolerance_absolute: reader.get_tolerance_absolute().await?,
            max_installment_columns: reader.get_max_installment_columns().await?,
            large_file_row_threshold: reader.get_large_file_row_threshold().await?,
            no_commission_representative: reader.get_no_commission_representative().await?,
            default_quota_segment: reader.get_default_quota_segment().await?,
        })
    }

    /// 代理商是否为“不计佣”哨兵
    pub fn is_no_commission_representative(&self, name: &str) -> bool {
        name.trim().to_uppercase() == self.no_commission_representative.trim().to_uppercase()
    }
}
