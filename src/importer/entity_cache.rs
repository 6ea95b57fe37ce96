// ==========================================
// 合购后台系统 - 实体解析缓存
// ==========================================
// 作用域: 单次导入（由导入器持有，每次导入开始时清空并重新预加载）
// 约定: 先查缓存，未命中再走存储层 upsert；结果回写缓存
// ==========================================

use crate::domain::sale::{normalize_name, Quota};
use crate::domain::types::ReferenceKind;
use crate::repository::error::RepositoryResult;
use crate::repository::sale_import_repo::SaleImportRepository;
use std::collections::HashMap;

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: String,
    pub created: bool,
}

#[derive(Debug, Default)]
pub struct EntityResolutionCache {
    references: HashMap<ReferenceKind, HashMap<String, String>>,
    quotas: HashMap<String, String>,
}

impl EntityResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空全部五类映射
    pub fn clear(&mut self) {
        self.references.clear();
        self.quotas.clear();
    }

    /// 以存储层的 (规范化名称, id) 预填充
    pub fn seed(&mut self, kind: ReferenceKind, pairs: Vec<(String, String)>) {
        let map = self.references.entry(kind).or_default();
        for (name, id) in pairs {
            map.insert(normalize_name(&name), id);
        }
    }

    /// 以存储层的 (身份键, id) 预填充份额
    pub fn seed_quotas(&mut self, pairs: Vec<(String, String)>) {
        for (key, id) in pairs {
            self.quotas.insert(key.to_uppercase(), id);
        }
    }

    pub fn get(&self, kind: ReferenceKind, name: &str) -> Option<&str> {
        self.references
            .get(&kind)
            .and_then(|m| m.get(&normalize_name(name)))
            .map(String::as_str)
    }

    pub fn get_quota(&self, group: &str, code: &str) -> Option<&str> {
        self.quotas
            .get(&Quota::identity_key(group, code))
            .map(String::as_str)
    }

    pub fn len(&self, kind: ReferenceKind) -> usize {
        self.references.get(&kind).map_or(0, HashMap::len)
    }

    pub fn quota_count(&self) -> usize {
        self.quotas.len()
    }

    /// 解析参照实体；空白名称返回 None
    pub async fn resolve_reference<R>(
        &mut self,
        repo: &R,
        kind: ReferenceKind,
        name: &str,
    ) -> RepositoryResult<Option<Resolved>>
    where
        R: SaleImportRepository + ?Sized,
    {
        let key = normalize_name(name);
        if key.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.references.get(&kind).and_then(|m| m.get(&key)) {
            return Ok(Some(Resolved {
                id: id.clone(),
                created: false,
            }));
        }

        let (id, created) = repo.upsert_reference(kind, name).await?;
        self.references
            .entry(kind)
            .or_default()
            .insert(key, id.clone());

        if created {
            tracing::debug!(kind = %kind, name = name.trim(), "新建参照实体");
        }

        Ok(Some(Resolved { id, created }))
    }

    /// 解析份额；空白编码返回 None
    pub async fn resolve_quota<R>(
        &mut self,
        repo: &R,
        group: &str,
        code: &str,
        segment: &str,
        administrator_id: Option<&str>,
    ) -> RepositoryResult<Option<Resolved>>
    where
        R: SaleImportRepository + ?Sized,
    {
        if code.trim().is_empty() {
            return Ok(None);
        }

        let key = Quota::identity_key(group, code);
        if let Some(id) = self.quotas.get(&key) {
            return Ok(Some(Resolved {
                id: id.clone(),
                created: false,
            }));
        }

        let (id, created) = repo
            .upsert_quota(group, code, segment, administrator_id)
            .await?;
        self.quotas.insert(key, id.clone());

        Ok(Some(Resolved { id, created }))
    }
}
