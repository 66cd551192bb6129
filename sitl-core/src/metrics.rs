use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Метрики супервизора, обновляемые lock-free из relay-потока и
/// основного потока.
#[derive(Debug, Default)]
pub struct SupervisorMetrics {
    /// Успешных запусков процесса
    pub launches: AtomicU64,
    /// Завершённых остановок (по запросу)
    pub stops: AtomicU64,
    /// Строк вывода, переданных в приёмник
    pub lines_relayed: AtomicU64,
    /// Строк, потерянных на переполненном канале
    pub dropped_lines: AtomicU64,
    /// Самостоятельных завершений процесса без запроса stop
    pub unexpected_exits: AtomicU64,
}

/// Snapshot метрик для отображения в конце сессии.
#[derive(Debug, Clone)]
pub struct SupervisionSummary {
    pub duration_secs: f64,
    pub launches: u64,
    pub stops: u64,
    pub lines_relayed: u64,
    pub dropped_lines: u64,
    pub unexpected_exits: u64,
}

impl SupervisorMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Итоговая сводка для вывода в конце сессии.
    pub fn summary(
        &self,
        start: &Instant,
    ) -> SupervisionSummary {
        SupervisionSummary {
            duration_secs: start.elapsed().as_secs_f64(),
            launches: self.launches.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            lines_relayed: self.lines_relayed.load(Ordering::Relaxed),
            dropped_lines: self.dropped_lines.load(Ordering::Relaxed),
            unexpected_exits: self.unexpected_exits.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for SupervisionSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Session        : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Launches       : {}", self.launches)?;
        writeln!(f, "  Stops          : {}", self.stops)?;
        writeln!(f, "  Console lines  : {}", self.lines_relayed)?;
        writeln!(f, "  Dropped lines  : {}", self.dropped_lines)?;
        writeln!(f, "  Unexpected exit: {}", self.unexpected_exits)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_initial_metrics_zero() {
        let metrics = SupervisorMetrics::new();
        let start = Instant::now();
        let summary = metrics.summary(&start);

        assert_eq!(summary.launches, 0);
        assert_eq!(summary.stops, 0);
        assert_eq!(summary.lines_relayed, 0);
        assert_eq!(summary.dropped_lines, 0);
        assert_eq!(summary.unexpected_exits, 0);
    }

    #[test]
    fn test_summary_snapshot_consistency() {
        let metrics = SupervisorMetrics::new();
        metrics.launches.store(3, Ordering::Relaxed);
        metrics.stops.store(2, Ordering::Relaxed);
        metrics.lines_relayed.store(120, Ordering::Relaxed);
        metrics.dropped_lines.store(4, Ordering::Relaxed);
        metrics.unexpected_exits.store(1, Ordering::Relaxed);

        let start = Instant::now();
        let summary = metrics.summary(&start);

        assert_eq!(summary.launches, 3);
        assert_eq!(summary.stops, 2);
        assert_eq!(summary.lines_relayed, 120);
        assert_eq!(summary.dropped_lines, 4);
        assert_eq!(summary.unexpected_exits, 1);
    }

    #[test]
    fn test_multithreaded_updates() {
        let metrics = SupervisorMetrics::new();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        m.lines_relayed.fetch_add(1, Ordering::Relaxed);
                        m.dropped_lines.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.lines_relayed.load(Ordering::Relaxed), 4_000);
        assert_eq!(metrics.dropped_lines.load(Ordering::Relaxed), 4_000);
    }
}
