// ==========================================
// 合购后台系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (scope_id + key → value)
// 约定: 缺失或无法解析的配置一律回落默认值
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取 global scope 全部配置（按 key 排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    /// 读取并解析配置值；缺失或解析失败时返回默认值
    fn get_parsed_or_default<T: FromStr>(&self, key: &str, default: T) -> ConfigResult<T> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %value, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取文本配置值；缺失或空白时返回默认值
    fn get_text_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_tolerance_percentage(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::TOLERANCE_PERCENTAGE, 0.005)
    }

    async fn get_tolerance_absolute(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::TOLERANCE_ABSOLUTE, 0.01)
    }

    async fn get_max_installment_columns(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::MAX_INSTALLMENT_COLUMNS, 20)
    }

    async fn get_large_file_row_threshold(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::LARGE_FILE_ROW_THRESHOLD, 10_000)
    }

    async fn get_no_commission_representative(&self) -> ConfigResult<String> {
        self.get_text_or_default(config_keys::NO_COMMISSION_REPRESENTATIVE, "ANATOTE")
    }

    async fn get_default_quota_segment(&self) -> ConfigResult<String> {
        self.get_text_or_default(config_keys::DEFAULT_QUOTA_SEGMENT, "IMÓVEL")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 对账容差
    pub const TOLERANCE_PERCENTAGE: &str = "tolerance_percentage";
    pub const TOLERANCE_ABSOLUTE: &str = "tolerance_absolute";

    // 表格扫描
    pub const MAX_INSTALLMENT_COLUMNS: &str = "max_installment_columns";
    pub const LARGE_FILE_ROW_THRESHOLD: &str = "large_file_row_threshold";

    // 业务口径
    pub const NO_COMMISSION_REPRESENTATIVE: &str = "no_commission_representative";
    pub const DEFAULT_QUOTA_SEGMENT: &str = "default_quota_segment";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_config_trait::ImportSettings;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let cm = manager();
        let settings = ImportSettings::load(&cm).await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_and_bad_values() {
        let cm = manager();
        cm.set_global_config_value(config_keys::TOLERANCE_PERCENTAGE, "0.01").unwrap();
        cm.set_global_config_value(config_keys::MAX_INSTALLMENT_COLUMNS, "abc").unwrap();
        cm.set_global_config_value(config_keys::NO_COMMISSION_REPRESENTATIVE, "  ").unwrap();

        let settings = ImportSettings::load(&cm).await.unwrap();
        assert_eq!(settings.tolerance_percentage, 0.01);
        assert_eq!(settings.max_installment_columns, 20);
        assert_eq!(settings.no_commission_representative, "ANATOTE");
        assert!(settings.is_no_commission_representative("anatote"));

        let snapshot = cm.get_config_snapshot().unwrap();
        assert_eq!(snapshot.len(), 3);
    }
}
