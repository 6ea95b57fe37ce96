// ==========================================
// 合购后台系统 - 表格版式识别
// ==========================================
// 职责: 根据表头集合判定两种已知版式之一，并给出置信度
// 算法: 表头规范化（大写+去空白）后与版式键做双向子串匹配
//       置信度 = 命中键数 / 版式键数
// 判定顺序:
//   1. 含版式专属标记列 且 置信度 >= 0.3 → 该版式
//   2. 置信度严格更高者 且 >= 0.2 → 该版式
//   3. 否则未识别（None）
// ==========================================

use crate::domain::types::LayoutType;
use serde::Serialize;

/// 含专属标记时的最低置信度
pub const MARKER_CONFIDENCE_THRESHOLD: f64 = 0.3;
/// 无专属标记时的最低置信度
pub const FALLBACK_CONFIDENCE_THRESHOLD: f64 = 0.2;

// ==========================================
// LayoutSpec - 版式声明
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct LayoutSpec {
    pub layout_type: LayoutType,
    pub description: &'static str,
    pub expected_keys: &'static [&'static str],
    pub markers: &'static [&'static str],
}

/// 历史销售与回款总表
pub const LAYOUT_HISTORICO: LayoutSpec = LayoutSpec {
    layout_type: LayoutType::Historico,
    description: "Histórico Geral de Vendas e Recebimentos",
    expected_keys: &[
        "DATA DA VENDA",
        "ADM",
        "REPRES",
        "SEGMENTO",
        "GRUPO",
        "COTA",
        "CRÉDITO ATUAL",
        "VENDEDOR 1",
        "VENDEDOR 1 % COMISSÃO",
        "VENDEDOR 2",
        "VENDEDOR 2 % COMISSÃO",
        "COMISSÃO1 ANATOTE",
        "COMISSÃO2 ANATOTE",
        "VALOR TOTAL A RECEBER",
        "SITUAÇÃO",
        "OBSERVAÇÃO",
    ],
    markers: &["DATA DA VENDA", "CRÉDITO ATUAL"],
};

/// 月度佣金发放报表
pub const LAYOUT_PAGAMENTO: LayoutSpec = LayoutSpec {
    layout_type: LayoutType::Pagamento,
    description: "Relatório Mensal de Comissões Pagas a Vendedores",
    expected_keys: &[
        "DATA  VENDA",
        "CLIENTE",
        "ADM",
        "SEGMENTO",
        "GRUPO",
        "COTA",
        "CRÉDITO",
        "%",
        "COMISSÃO TOTAL",
        "TOTAL DE PARCELAS",
        "PARCELA PAGA",
        "VALOR PARCELA COMISSÃO",
        "STATUS PAGTO",
        "OBS",
    ],
    markers: &["PARCELA PAGA", "STATUS PAGTO"],
};

// ==========================================
// DetectedLayout - 识别结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct DetectedLayout {
    pub layout_type: LayoutType,
    pub confidence: f64,
    pub matched_columns: Vec<String>,   // 命中的版式键
    pub unmatched_columns: Vec<String>, // 未命中任何版式键的表头（规范化后）
}

/// 表头规范化: 大写 + 去首尾空白
pub fn normalize_header(header: &str) -> String {
    header.trim().to_uppercase()
}

/// 双向子串匹配
fn header_matches_key(header: &str, key: &str) -> bool {
    header.contains(key) || key.contains(header)
}

struct LayoutScore {
    spec: &'static LayoutSpec,
    confidence: f64,
    matched: Vec<String>,
    has_marker: bool,
}

fn score_layout(spec: &'static LayoutSpec, headers: &[String]) -> LayoutScore {
    let matched: Vec<String> = spec
        .expected_keys
        .iter()
        .filter(|key| headers.iter().any(|h| header_matches_key(h, key)))
        .map(|key| key.to_string())
        .collect();

    let confidence = if spec.expected_keys.is_empty() {
        0.0
    } else {
        matched.len() as f64 / spec.expected_keys.len() as f64
    };

    let has_marker = headers
        .iter()
        .any(|h| spec.markers.iter().any(|m| h.contains(m)));

    LayoutScore {
        spec,
        confidence,
        matched,
        has_marker,
    }
}

fn into_detected(score: LayoutScore, headers: &[String]) -> DetectedLayout {
    let unmatched_columns = headers
        .iter()
        .filter(|h| {
            !score
                .spec
                .expected_keys
                .iter()
                .any(|key| header_matches_key(h, key))
        })
        .cloned()
        .collect();

    DetectedLayout {
        layout_type: score.spec.layout_type,
        confidence: score.confidence,
        matched_columns: score.matched,
        unmatched_columns,
    }
}

/// 识别版式；未识别返回 None（调用方应将其视为整个文件的错误）
pub fn detect_layout_type(columns: &[String]) -> Option<DetectedLayout> {
    // 空表头与任何键都会“被包含”，不参与匹配
    let headers: Vec<String> = columns
        .iter()
        .map(|c| normalize_header(c))
        .filter(|c| !c.is_empty())
        .collect();

    if headers.is_empty() {
        return None;
    }

    let historico = score_layout(&LAYOUT_HISTORICO, &headers);
    let pagamento = score_layout(&LAYOUT_PAGAMENTO, &headers);

    tracing::debug!(
        historico_confidence = historico.confidence,
        pagamento_confidence = pagamento.confidence,
        historico_marker = historico.has_marker,
        pagamento_marker = pagamento.has_marker,
        "版式评分"
    );

    if historico.has_marker && historico.confidence >= MARKER_CONFIDENCE_THRESHOLD {
        return Some(into_detected(historico, &headers));
    }
    if pagamento.has_marker && pagamento.confidence >= MARKER_CONFIDENCE_THRESHOLD {
        return Some(into_detected(pagamento, &headers));
    }

    if historico.confidence > pagamento.confidence
        && historico.confidence >= FALLBACK_CONFIDENCE_THRESHOLD
    {
        return Some(into_detected(historico, &headers));
    }
    if pagamento.confidence > historico.confidence
        && pagamento.confidence >= FALLBACK_CONFIDENCE_THRESHOLD
    {
        return Some(into_detected(pagamento, &headers));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_historico_by_markers() {
        let columns = cols(&[
            "DATA DA VENDA",
            "ADM",
            "REPRES",
            "GRUPO",
            "COTA",
            "CRÉDITO ATUAL",
            "VALOR TOTAL A RECEBER",
            "VALOR RECEBIDO 1",
        ]);
        let detected = detect_layout_type(&columns).unwrap();
        assert_eq!(detected.layout_type, LayoutType::Historico);
        assert!(detected.confidence >= 0.3);
        assert!(detected.matched_columns.contains(&"CRÉDITO ATUAL".to_string()));
        assert_eq!(detected.unmatched_columns, vec!["VALOR RECEBIDO 1".to_string()]);
    }

    #[test]
    fn test_detect_pagamento_by_markers() {
        let columns = cols(&[
            "Data  Venda",
            "Cliente",
            "Grupo",
            "Cota",
            "Parcela Paga",
            "Status Pagto",
        ]);
        let detected = detect_layout_type(&columns).unwrap();
        assert_eq!(detected.layout_type, LayoutType::Pagamento);
    }

    #[test]
    fn test_detect_without_markers_tie_is_undetected() {
        // 历史版式 8/16，发放版式 7/14，均无标志列
        let columns = cols(&[
            "ADM",
            "SEGMENTO",
            "GRUPO",
            "COTA",
            "REPRES",
            "VENDEDOR 2",
            "SITUAÇÃO",
            "CLIENTE",
            "COMISSÃO TOTAL",
            "TOTAL DE PARCELAS",
        ]);
        assert_eq!(score_layout(&LAYOUT_HISTORICO, &columns).confidence, 0.5);
        assert_eq!(score_layout(&LAYOUT_PAGAMENTO, &columns).confidence, 0.5);
        assert!(detect_layout_type(&columns).is_none());
    }

    #[test]
    fn test_detect_without_markers_picks_strictly_higher() {
        // 发放版式 7/14 对 历史版式 4/16
        let columns = cols(&[
            "ADM",
            "SEGMENTO",
            "GRUPO",
            "COTA",
            "CLIENTE",
            "COMISSÃO TOTAL",
            "TOTAL DE PARCELAS",
        ]);
        let detected = detect_layout_type(&columns).unwrap();
        assert_eq!(detected.layout_type, LayoutType::Pagamento);
        assert_eq!(detected.confidence, 0.5);

        // 历史版式 7/16 略高于 发放版式 6/14
        let columns = cols(&[
            "ADM",
            "SEGMENTO",
            "GRUPO",
            "COTA",
            "REPRES",
            "VENDEDOR 2",
            "CLIENTE",
            "TOTAL DE PARCELAS",
        ]);
        let detected = detect_layout_type(&columns).unwrap();
        assert_eq!(detected.layout_type, LayoutType::Historico);
        assert_eq!(detected.confidence, 7.0 / 16.0);
    }

    #[test]
    fn test_undetected_layout() {
        assert!(detect_layout_type(&cols(&["NOME", "EMAIL", "TELEFONE"])).is_none());
        assert!(detect_layout_type(&cols(&["", "  "])).is_none());
        assert!(detect_layout_type(&[]).is_none());
    }
}
