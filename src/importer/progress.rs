// ==========================================
// 合购后台系统 - 导入进度通知
// ==========================================
// 说明: 进度仅供观测，不影响导入控制流
// 阶段: preparing → processing → saving → complete / error
// ==========================================

use crate::domain::import::ImportProgress;
use crate::domain::types::ImportPhase;
use std::sync::Mutex;

/// processing 阶段占用的进度区间上限
const PROCESSING_SPAN: f64 = 80.0;

impl ImportProgress {
    pub fn preparing(total_rows: usize) -> Self {
        Self {
            phase: ImportPhase::Preparing,
            current_row: 0,
            total_rows,
            percentage: 0,
            message: "Preparando importação...".to_string(),
        }
    }

    /// 第 row 行（1 起）的处理进度: round(row / total × 80)
    pub fn processing(row: usize, total_rows: usize) -> Self {
        let percentage = if total_rows == 0 {
            0
        } else {
            (row as f64 / total_rows as f64 * PROCESSING_SPAN).round() as u8
        };

        Self {
            phase: ImportPhase::Processing,
            current_row: row,
            total_rows,
            percentage,
            message: format!("Processando linha {} de {}...", row, total_rows),
        }
    }

    pub fn saving(total_rows: usize) -> Self {
        Self {
            phase: ImportPhase::Saving,
            current_row: total_rows,
            total_rows,
            percentage: 90,
            message: "Salvando log de importação...".to_string(),
        }
    }

    pub fn complete(total_rows: usize) -> Self {
        Self {
            phase: ImportPhase::Complete,
            current_row: total_rows,
            total_rows,
            percentage: 100,
            message: "Importação concluída!".to_string(),
        }
    }

    pub fn error(current_row: usize, total_rows: usize, message: impl Into<String>) -> Self {
        Self {
            phase: ImportPhase::Error,
            current_row,
            total_rows,
            percentage: 100,
            message: message.into(),
        }
    }
}

// ==========================================
// ProgressSink Trait
// ==========================================
pub trait ProgressSink: Send + Sync {
    /// 接收一次进度通知
    fn report(&self, progress: ImportProgress);
}

/// 空操作进度接收者（非交互调用方）
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn report(&self, progress: ImportProgress) {
        tracing::trace!(
            phase = %progress.phase,
            percentage = progress.percentage,
            "NoOpProgressSink: 跳过进度通知"
        );
    }
}

/// 闭包即接收者
impl<F> ProgressSink for F
where
    F: Fn(ImportProgress) + Send + Sync,
{
    fn report(&self, progress: ImportProgress) {
        self(progress)
    }
}

/// 记录全部进度（测试与批处理汇总用）
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ImportProgress>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ImportProgress> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn report(&self, progress: ImportProgress) {
        if let Ok(mut events) = self.events.lock() {
            events.push(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_processing_percentage() {
        assert_eq!(ImportProgress::processing(1, 3).percentage, 27);
        assert_eq!(ImportProgress::processing(3, 3).percentage, 80);
        assert_eq!(ImportProgress::processing(0, 0).percentage, 0);
        assert_eq!(
            ImportProgress::processing(2, 10).message,
            "Processando linha 2 de 10..."
        );
    }

    #[test]
    fn test_closure_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let sink = move |_p: ImportProgress| {
            c.fetch_add(1, Ordering::SeqCst);
        };
        sink.report(ImportProgress::preparing(1));
        sink.report(ImportProgress::complete(1));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
