// ==========================================
// 合购后台系统 - 领域类型定义
// ==========================================
// 职责: 状态/类型枚举 + 与数据库字符串的双向映射
// 约定: 数据库存储值沿用业务方葡语口径（ATIVO/PENDENTE/...）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 表格版式 (Layout Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Historico, // 历史销售与回款总表
    Pagamento, // 月度佣金发放报表
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutType::Historico => "historico",
            LayoutType::Pagamento => "pagamento",
        }
    }

    pub fn from_db(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "historico" => Some(LayoutType::Historico),
            "pagamento" => Some(LayoutType::Pagamento),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 销售状态 (Sale Status)
// ==========================================
// 状态流转: ATIVO → CANCELADO / ESTORNO / QUITADO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Active,    // 正常
    Cancelled, // 取消
    Reversed,  // 冲销
    Settled,   // 结清
}

impl SaleStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            SaleStatus::Active => "ATIVO",
            SaleStatus::Cancelled => "CANCELADO",
            SaleStatus::Reversed => "ESTORNO",
            SaleStatus::Settled => "QUITADO",
        }
    }

    /// 数据库值 → 枚举（未知值按正常处理）
    pub fn from_db(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CANCELADO" => SaleStatus::Cancelled,
            "ESTORNO" => SaleStatus::Reversed,
            "QUITADO" => SaleStatus::Settled,
            _ => SaleStatus::Active,
        }
    }

    /// 由导入行的状态文本与派生标志确定销售状态
    ///
    /// 取消优先于冲销；其余文本仅识别“结清”，否则视为正常
    pub fn from_import(status_text: &str, is_cancellation: bool, is_reversal: bool) -> Self {
        if is_cancellation {
            return SaleStatus::Cancelled;
        }
        if is_reversal {
            return SaleStatus::Reversed;
        }
        if status_text.trim().to_uppercase().starts_with("QUITAD") {
            return SaleStatus::Settled;
        }
        SaleStatus::Active
    }

    /// 取消/冲销的销售不产生佣金
    pub fn is_void(&self) -> bool {
        matches!(self, SaleStatus::Cancelled | SaleStatus::Reversed)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db())
    }
}

// ==========================================
// 应收佣金状态 (Commission Status)
// ==========================================
// 状态机: PENDING ⇄ BLOCKED, PENDING|BLOCKED → PAID / CANCELLED
// PAID 与 CANCELLED 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Blocked,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDENTE",
            CommissionStatus::Blocked => "BLOQUEADO",
            CommissionStatus::Paid => "PAGO",
            CommissionStatus::Cancelled => "CANCELADO",
        }
    }

    pub fn from_db(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "PENDENTE" => Some(CommissionStatus::Pending),
            "BLOQUEADO" => Some(CommissionStatus::Blocked),
            "PAGO" => Some(CommissionStatus::Paid),
            "CANCELADO" => Some(CommissionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, target: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, target),
            (Pending, Blocked)
                | (Blocked, Pending)
                | (Pending, Paid)
                | (Blocked, Paid)
                | (Pending, Cancelled)
                | (Blocked, Cancelled)
        )
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db())
    }
}

// ==========================================
// 佣金受益人类型 (Beneficiary Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeneficiaryType {
    Salesperson,    // 销售员
    Representative, // 代理商
}

impl BeneficiaryType {
    pub fn as_db(&self) -> &'static str {
        match self {
            BeneficiaryType::Salesperson => "VENDEDOR",
            BeneficiaryType::Representative => "REPRESENTANTE",
        }
    }

    pub fn from_db(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "VENDEDOR" => Some(BeneficiaryType::Salesperson),
            "REPRESENTANTE" => Some(BeneficiaryType::Representative),
            _ => None,
        }
    }
}

impl fmt::Display for BeneficiaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db())
    }
}

// ==========================================
// 逾期记录状态 (Delinquency Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelinquencyStatus {
    Open,     // 未结
    Resolved, // 已解决
}

impl DelinquencyStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            DelinquencyStatus::Open => "ABERTO",
            DelinquencyStatus::Resolved => "RESOLVIDO",
        }
    }
}

// ==========================================
// 参照实体类型 (Reference Kind)
// ==========================================
// 导入时按“规范化名称”去重的四类实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Administrator,  // 管理公司
    Representative, // 代理商
    Salesperson,    // 销售员
    Client,         // 客户
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Administrator,
        ReferenceKind::Representative,
        ReferenceKind::Salesperson,
        ReferenceKind::Client,
    ];

    /// 对应的数据表名
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Administrator => "administradoras",
            ReferenceKind::Representative => "representantes",
            ReferenceKind::Salesperson => "vendedores",
            ReferenceKind::Client => "clientes",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

// ==========================================
// 导入阶段 (Import Phase)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    Preparing,
    Processing,
    Saving,
    Complete,
    Error,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPhase::Preparing => write!(f, "preparing"),
            ImportPhase::Processing => write!(f, "processing"),
            ImportPhase::Saving => write!(f, "saving"),
            ImportPhase::Complete => write!(f, "complete"),
            ImportPhase::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_status_transitions() {
        use CommissionStatus::*;
        assert!(Pending.can_transition_to(Blocked));
        assert!(Blocked.can_transition_to(Pending));
        assert!(Blocked.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Blocked));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Paid));
    }

    #[test]
    fn test_sale_status_from_import() {
        assert_eq!(SaleStatus::from_import("CANCELAMENTO", true, false), SaleStatus::Cancelled);
        assert_eq!(SaleStatus::from_import("ESTORNO", false, true), SaleStatus::Reversed);
        assert_eq!(SaleStatus::from_import("quitado", false, false), SaleStatus::Settled);
        assert_eq!(SaleStatus::from_import("ATIVO", false, false), SaleStatus::Active);
        assert!(SaleStatus::Reversed.is_void());
        assert!(!SaleStatus::Settled.is_void());
    }

    #[test]
    fn test_db_round_trip_strings() {
        assert_eq!(CommissionStatus::from_db("bloqueado"), Some(CommissionStatus::Blocked));
        assert_eq!(CommissionStatus::from_db("LIBERADO"), None);
        assert_eq!(BeneficiaryType::from_db("REPRESENTANTE"), Some(BeneficiaryType::Representative));
        assert_eq!(LayoutType::from_db(" Historico "), Some(LayoutType::Historico));
        assert_eq!(SaleStatus::from_db("xyz"), SaleStatus::Active);
    }
}
