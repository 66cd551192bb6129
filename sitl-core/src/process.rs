// Супервизору всё равно, стоит ли за процессом настоящий бинарник
// прошивки или встроенная имитация; оба варианта живут за одним трейтом,
// и тесты гоняют супервизор на имитации.

use std::{
    io::{BufRead, BufReader, Read},
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use sitl_types::{LaunchError, LaunchResult};

use crate::SitlCommand;

/// Статус завершения наблюдаемого процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Код возврата; `None`, если процесс убит сигналом
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Живой процесс прошивки под наблюдением супервизора.
pub trait SitlProcess: Send + std::fmt::Debug {
    /// Идентификатор процесса (для логов).
    fn id(&self) -> u32;

    /// Забирает поток стандартного вывода. Повторный вызов — ошибка.
    fn take_stdout(&mut self) -> LaunchResult<Box<dyn BufRead + Send>>;

    /// Неблокирующая проверка завершения.
    fn try_wait(&mut self) -> LaunchResult<Option<ProcessExit>>;

    /// Блокирует до завершения процесса.
    fn wait(&mut self) -> LaunchResult<ProcessExit>;

    /// Принудительно завершает процесс. Для уже умершего — no-op.
    fn kill(&mut self) -> LaunchResult<()>;
}

/// Абстракция запуска процессов прошивки.
// Реализации: [`OsBackend`] и [`SimBackend`].
pub trait ProcessBackend: Send {
    fn spawn(
        &self,
        command: &SitlCommand,
    ) -> LaunchResult<Box<dyn SitlProcess>>;
}

////////////////////////////////////////////////////////////////////////////////
// OsBackend — настоящий процесс ОС
////////////////////////////////////////////////////////////////////////////////

/// Бэкенд над `std::process::Command`.
pub struct OsBackend;

impl ProcessBackend for OsBackend {
    fn spawn(
        &self,
        command: &SitlCommand,
    ) -> LaunchResult<Box<dyn SitlProcess>> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // stderr не читается; заполнившийся pipe подвесил бы прошивку
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LaunchError::spawn(command.program.display().to_string(), e))?;

        Ok(Box::new(OsProcess { child }))
    }
}

struct OsProcess {
    child: Child,
}

impl std::fmt::Debug for OsProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsProcess").field("id", &self.child.id()).finish()
    }
}

impl SitlProcess for OsProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn take_stdout(&mut self) -> LaunchResult<Box<dyn BufRead + Send>> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::config("process stdout already taken"))?;

        Ok(Box::new(BufReader::new(stdout)))
    }

    fn try_wait(&mut self) -> LaunchResult<Option<ProcessExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ProcessExit { code: status.code() }))
    }

    fn wait(&mut self) -> LaunchResult<ProcessExit> {
        let status = self.child.wait()?;

        Ok(ProcessExit { code: status.code() })
    }

    fn kill(&mut self) -> LaunchResult<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Процесс уже завершился
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// SimBackend — встроенная имитация
////////////////////////////////////////////////////////////////////////////////

/// Строки загрузки имитации по умолчанию.
const DEFAULT_BOOT_LINES: [&str; 4] = [
    "Init ArduPlane",
    "Loaded defaults from defaults.param",
    "Home set from start location",
    "ArduPilot ready",
];

/// Имитация процесса прошивки: отдаёт заготовленные строки загрузки и
/// живёт до `kill`. Позволяет гонять launcher без собранного ArduPilot.
///
/// Темп вывода не имитируется — только жизненный цикл.
pub struct SimBackend {
    boot_lines: Vec<String>,
    hold: bool,
    spawned: Arc<AtomicU64>,
    next_pid: AtomicU32,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::scripted(
            DEFAULT_BOOT_LINES.iter().map(|s| s.to_string()).collect(),
            true,
        )
    }

    /// Имитация с заданным сценарием вывода.
    ///
    /// При `hold = false` процесс «завершается» сразу после последней
    /// строки (код 0); при `hold = true` — живёт до `kill`.
    pub fn scripted(
        boot_lines: Vec<String>,
        hold: bool,
    ) -> Self {
        Self {
            boot_lines,
            hold,
            spawned: Arc::new(AtomicU64::new(0)),
            next_pid: AtomicU32::new(1_000),
        }
    }

    /// Счётчик выполненных spawn'ов (разделяемый, для проверок).
    pub fn spawn_count(&self) -> Arc<AtomicU64> {
        self.spawned.clone()
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend for SimBackend {
    fn spawn(
        &self,
        _command: &SitlCommand,
    ) -> LaunchResult<Box<dyn SitlProcess>> {
        let (tx, rx) = unbounded::<Vec<u8>>();

        for line in &self.boot_lines {
            let mut bytes = line.clone().into_bytes();
            bytes.push(b'\n');
            let _ = tx.send(bytes);
        }

        let state = if self.hold {
            SimState {
                exit: None,
                feed: Some(tx),
            }
        } else {
            // Процесс «отработал и вышел»: буферизованный вывод ещё
            // дочитывается, но статус уже известен
            SimState {
                exit: Some(ProcessExit { code: Some(0) }),
                feed: None,
            }
        };

        self.spawned.fetch_add(1, Ordering::Relaxed);

        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(PipeReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        }));

        Ok(Box::new(SimProcess {
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            shared: Arc::new(SimShared {
                state: Mutex::new(state),
                exited: Condvar::new(),
            }),
            stdout: Some(reader),
        }))
    }
}

struct SimState {
    exit: Option<ProcessExit>,
    /// Отправитель «pipe» стандартного вывода; сброс = EOF у читателя
    feed: Option<Sender<Vec<u8>>>,
}

struct SimShared {
    state: Mutex<SimState>,
    exited: Condvar,
}

struct SimProcess {
    pid: u32,
    shared: Arc<SimShared>,
    stdout: Option<Box<dyn BufRead + Send>>,
}

impl std::fmt::Debug for SimProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimProcess")
            .field("pid", &self.pid)
            .field("stdout_taken", &self.stdout.is_none())
            .finish()
    }
}

impl SitlProcess for SimProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn take_stdout(&mut self) -> LaunchResult<Box<dyn BufRead + Send>> {
        self.stdout
            .take()
            .ok_or_else(|| LaunchError::config("process stdout already taken"))
    }

    fn try_wait(&mut self) -> LaunchResult<Option<ProcessExit>> {
        let state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());

        Ok(state.exit)
    }

    fn wait(&mut self) -> LaunchResult<ProcessExit> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if let Some(exit) = state.exit {
                return Ok(exit);
            }

            state = self
                .shared
                .exited
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn kill(&mut self) -> LaunchResult<()> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());

        // Закрываем «pipe» — читатель получает EOF
        state.feed = None;

        if state.exit.is_none() {
            state.exit = Some(ProcessExit { code: None });
        }

        self.shared.exited.notify_all();

        Ok(())
    }
}

/// Read-адаптер над каналом: имитирует pipe стандартного вывода.
struct PipeReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> std::io::Result<usize> {
        if self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                // Все отправители сброшены — EOF
                Err(_) => return Ok(0),
            }
        }

        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;

        Ok(n)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Выбор бэкенда
////////////////////////////////////////////////////////////////////////////////

/// Тип бэкенда процессов (выбор при старте).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Настоящий процесс ОС
    Os,
    /// Встроенная имитация (не требует собранного ArduPilot)
    Simulated,
}

impl std::fmt::Display for BackendKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            BackendKind::Os => write!(f, "os"),
            BackendKind::Simulated => write!(f, "sim"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "os" | "real" => Ok(BackendKind::Os),
            "sim" | "simulated" => Ok(BackendKind::Simulated),
            _ => Err(format!("Unknown process backend: '{s}'. Use: os, sim")),
        }
    }
}

/// Создаёт нужный бэкенд по типу.
pub fn create_backend(kind: BackendKind) -> Box<dyn ProcessBackend> {
    match kind {
        BackendKind::Os => Box::new(OsBackend),
        BackendKind::Simulated => Box::new(SimBackend::new()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use sitl_types::{LaunchConfig, LaunchMode};

    use super::*;

    fn any_command() -> SitlCommand {
        let config = LaunchConfig::new("tailwind", "4.2.0", LaunchMode::Headless, "Strip-A");
        SitlCommand::from_config(Path::new("bin"), &config)
    }

    fn read_lines_to_eof(reader: &mut Box<dyn BufRead + Send>) -> Vec<String> {
        let mut lines = Vec::new();
        let mut buf = String::new();

        loop {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) => break,
                Ok(_) => lines.push(buf.trim_end().to_string()),
                Err(e) => panic!("read error: {e}"),
            }
        }

        lines
    }

    #[test]
    fn test_sim_emits_lines_then_eof() {
        let backend = SimBackend::scripted(vec!["a".into(), "b".into()], false);
        let mut process = backend.spawn(&any_command()).unwrap();
        let mut reader = process.take_stdout().unwrap();

        assert_eq!(read_lines_to_eof(&mut reader), vec!["a", "b"]);
        assert_eq!(
            process.try_wait().unwrap(),
            Some(ProcessExit { code: Some(0) })
        );
    }

    #[test]
    fn test_sim_hold_lives_until_kill() {
        let backend = SimBackend::scripted(vec!["boot".into()], true);
        let mut process = backend.spawn(&any_command()).unwrap();
        let mut reader = process.take_stdout().unwrap();

        assert_eq!(process.try_wait().unwrap(), None, "процесс ещё жив");

        // Читатель в отдельном потоке — EOF придёт только после kill
        let handle = std::thread::spawn(move || read_lines_to_eof(&mut reader));

        process.kill().unwrap();

        let exit = process.wait().unwrap();
        assert_eq!(exit.code, None, "убит, а не завершился сам");
        assert_eq!(handle.join().unwrap(), vec!["boot"]);
    }

    #[test]
    fn test_sim_kill_is_idempotent() {
        let backend = SimBackend::scripted(vec![], true);
        let mut process = backend.spawn(&any_command()).unwrap();

        process.kill().unwrap();
        process.kill().unwrap();
        assert_eq!(process.wait().unwrap().code, None);
    }

    #[test]
    fn test_sim_stdout_taken_once() {
        let backend = SimBackend::new();
        let mut process = backend.spawn(&any_command()).unwrap();

        assert!(process.take_stdout().is_ok());
        assert!(process.take_stdout().is_err());
    }

    #[test]
    fn test_sim_spawn_count() {
        let backend = SimBackend::scripted(vec![], false);
        let spawned = backend.spawn_count();

        assert_eq!(spawned.load(Ordering::Relaxed), 0);
        let _ = backend.spawn(&any_command()).unwrap();
        let _ = backend.spawn(&any_command()).unwrap();
        assert_eq!(spawned.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_os_backend_missing_binary() {
        let mut command = any_command();
        command.program = Path::new("definitely/not/ArduPlane_0.0.0").to_path_buf();
        command.cwd = Path::new(".").to_path_buf();

        let err = OsBackend.spawn(&command).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_os_backend_echo_roundtrip() {
        let command = SitlCommand {
            program: "/bin/sh".into(),
            cwd: ".".into(),
            args: vec!["-c".into(), "echo ArduPilot ready".into()],
        };

        let mut process = OsBackend.spawn(&command).unwrap();
        let mut reader = process.take_stdout().unwrap();

        assert_eq!(read_lines_to_eof(&mut reader), vec!["ArduPilot ready"]);
        assert_eq!(process.wait().unwrap().code, Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn test_os_backend_kill_long_running() {
        let command = SitlCommand {
            program: "/bin/sh".into(),
            cwd: ".".into(),
            args: vec!["-c".into(), "echo started; sleep 30".into()],
        };

        let mut process = OsBackend.spawn(&command).unwrap();
        process.kill().unwrap();

        let exit = process.wait().unwrap();
        assert_ne!(exit.code, Some(0));
        // Повторный kill после завершения — no-op
        process.kill().unwrap();
    }

    #[test]
    fn test_backend_kind_fromstr() {
        assert_eq!("os".parse::<BackendKind>().unwrap(), BackendKind::Os);
        assert_eq!("sim".parse::<BackendKind>().unwrap(), BackendKind::Simulated);
        assert!("tcp".parse::<BackendKind>().is_err());
    }
}
