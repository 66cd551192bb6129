use std::{
    io::BufRead,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};
use sitl_types::LaunchResult;

use crate::{ProcessBackend, ProcessExit, SitlCommand, SitlProcess, SupervisorMetrics};

/// Интервал опроса статуса процесса после EOF вывода.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Супервизор одного процесса прошивки.
///
/// Владеет не более чем одним живым процессом. Новый запуск всегда
/// начинается с полного сноса предыдущего: kill → join relay-потока →
/// только потом spawn. Это исключает гонку двух инстансов за loopback
/// порт контрольного линка.
pub struct Supervisor {
    backend: Box<dyn ProcessBackend>,
    metrics: Arc<SupervisorMetrics>,
    active: Option<ActiveProcess>,
}

struct ActiveProcess {
    pid: u32,
    process: Arc<Mutex<Box<dyn SitlProcess>>>,
    worker: JoinHandle<RelayOutcome>,
    stop_requested: Arc<AtomicBool>,
}

/// Итог работы relay-потока.
#[derive(Debug, Clone, Copy)]
struct RelayOutcome {
    lines: u64,
    exit: Option<ProcessExit>,
}

impl Supervisor {
    /// Создаёт супервизор. Возвращает также shared-ссылку на метрики.
    pub fn new(backend: Box<dyn ProcessBackend>) -> (Self, Arc<SupervisorMetrics>) {
        let metrics = SupervisorMetrics::new();
        let s = Self {
            backend,
            metrics: metrics.clone(),
            active: None,
        };

        (s, metrics)
    }

    /// Запускает процесс прошивки и relay его вывода в `tx`.
    ///
    /// Предыдущий инстанс, если был, полностью сносится до spawn. При
    /// ошибке spawn супервизор остаётся без процесса (не со старым).
    pub fn start(
        &mut self,
        command: &SitlCommand,
        tx: Sender<String>,
    ) -> LaunchResult<u32> {
        // Снос предыдущего инстанса всегда завершается до нового spawn
        self.stop();

        debug!("Spawning: {command}");

        let mut process = self.backend.spawn(command)?;
        let pid = process.id();
        let reader = process.take_stdout()?;
        let process = Arc::new(Mutex::new(process));

        self.metrics.launches.fetch_add(1, Ordering::Relaxed);
        info!("Simulator process started (pid {pid})");

        let stop_requested = Arc::new(AtomicBool::new(false));
        let worker = {
            let process = Arc::clone(&process);
            let metrics = Arc::clone(&self.metrics);
            let stop_requested = stop_requested.clone();

            std::thread::spawn(move || relay_output(reader, process, tx, metrics, stop_requested))
        };

        self.active = Some(ActiveProcess {
            pid,
            process,
            worker,
            stop_requested,
        });

        Ok(pid)
    }

    /// Останавливает живой процесс: kill, join relay-потока, сброс
    /// handle. Идемпотентна — без живого процесса это no-op.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.stop_requested.store(true, Ordering::Relaxed);

        {
            let mut process = active.process.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = process.kill() {
                warn!("Failed to kill simulator process (pid {}): {e}", active.pid);
            }
        }

        // Дожидаемся, пока relay-поток дочитает вывод и увидит выход
        match active.worker.join() {
            Ok(outcome) => {
                info!(
                    "Simulator process stopped (pid {}, {} lines, exit {:?})",
                    active.pid,
                    outcome.lines,
                    outcome.exit.map(|e| e.code),
                );
            }
            Err(_) => warn!("Relay worker panicked (pid {})", active.pid),
        }

        self.metrics.stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Жив ли наблюдаемый процесс (точнее — его relay-поток).
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.worker.is_finished())
    }

    /// PID живого процесса, если есть.
    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.pid)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Relay-поток: построчно читает вывод процесса, передаёт непустые
/// строки в канал до EOF, затем фиксирует статус завершения.
fn relay_output(
    mut reader: Box<dyn BufRead + Send>,
    process: Arc<Mutex<Box<dyn SitlProcess>>>,
    tx: Sender<String>,
    metrics: Arc<SupervisorMetrics>,
    stop_requested: Arc<AtomicBool>,
) -> RelayOutcome {
    let mut lines = 0u64;
    let mut buf = String::new();

    loop {
        buf.clear();

        match reader.read_line(&mut buf) {
            // EOF — stdout закрыт, процесс завершился или убит
            Ok(0) => break,
            Ok(_) => {
                let line = buf.trim();
                if line.is_empty() {
                    continue;
                }

                match tx.try_send(line.to_string()) {
                    Ok(()) => {
                        lines += 1;
                        metrics.lines_relayed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Full(_)) => {
                        metrics.dropped_lines.fetch_add(1, Ordering::Relaxed);
                    }
                    // Приёмник умер — дальше передавать некому, но
                    // процесс дорабатывает до kill/выхода
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Err(e) => {
                warn!("Relay read error: {e}");
                break;
            }
        }
    }

    // Фиксируем статус завершения неблокирующим опросом: блокирующий
    // wait под mutex'ом закрыл бы stop() дорогу к kill
    let exit = loop {
        let polled = {
            let mut process = process.lock().unwrap_or_else(|e| e.into_inner());
            process.try_wait()
        };

        match polled {
            Ok(Some(exit)) => break Some(exit),
            Ok(None) => std::thread::sleep(EXIT_POLL_INTERVAL),
            Err(e) => {
                warn!("Exit status poll failed: {e}");
                break None;
            }
        }
    };

    if !stop_requested.load(Ordering::Relaxed) {
        metrics.unexpected_exits.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Simulator process exited unexpectedly (exit {:?})",
            exit.map(|e| e.code)
        );
    }

    RelayOutcome { lines, exit }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
