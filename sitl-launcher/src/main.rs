use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{error, info, warn};
use sitl_core::{
    create_backend, BackendKind, ResetClient, ResetConfig, SitlCommand, Supervisor,
    DEFAULT_CONTROLLER_ADDR,
};
use sitl_launcher::Catalog;
use sitl_types::LaunchMode;

#[derive(Parser, Debug)]
#[command(
    name = "sitl-launcher",
    version = env!("CARGO_PKG_VERSION"),
    about = "Configure & launch ArduPilot SITL simulation instances",
    long_about = None,
)]
struct Cli {
    /// Файл каталога: самолёты, аэродромы, сохранённый выбор
    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,
    /// Самолёт из каталога (по умолчанию — последний выбранный)
    #[arg(short, long)]
    aircraft: Option<String>,
    /// Версия прошивки ArduPilot
    #[arg(short, long)]
    firmware: Option<String>,
    /// Аэродром из каталога
    #[arg(short = 'p', long)]
    airport: Option<String>,
    /// Режим запуска: headless, visual
    #[arg(short, long, default_value = "headless")]
    mode: String,
    /// Бэкенд процессов: os, sim
    #[arg(long, default_value = "os")]
    backend: String,
    /// Корень с бинарниками прошивки и рабочими директориями
    #[arg(long, default_value = "bin")]
    bin_root: PathBuf,
    /// Адрес управляющего порта RealFlight
    #[arg(long, default_value = DEFAULT_CONTROLLER_ADDR)]
    reset_addr: String,
    /// Пауза между шагами reset-последовательности (мс)
    #[arg(long, default_value = "100")]
    settle_ms: u64,
    /// Ёмкость буфера консольных строк
    #[arg(long, default_value = "256")]
    console_buffer: usize,
    /// Показать каталог и выйти
    #[arg(short, long)]
    list: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    env_logger::Builder::new()
        .filter_level(level.parse().unwrap())
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let mode: LaunchMode = match cli.mode.parse() {
        Ok(m) => m,
        Err(e) => {
            error!("--mode: {e}");
            std::process::exit(1);
        }
    };

    let backend_kind: BackendKind = match cli.backend.parse() {
        Ok(b) => b,
        Err(e) => {
            error!("--backend: {e}");
            std::process::exit(1);
        }
    };

    let mut catalog = match Catalog::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load catalog {:?}: {e}", cli.config);
            std::process::exit(1);
        }
    };

    if cli.list {
        print_catalog(&catalog);
        return;
    }

    if let Err(e) = catalog.select(
        cli.aircraft.as_deref(),
        cli.firmware.as_deref(),
        cli.airport.as_deref(),
    ) {
        error!("{e}");
        std::process::exit(1);
    }

    let config = match catalog.launch_config(mode) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let command = SitlCommand::from_config(&cli.bin_root, &config);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Aircraft      : {}", catalog.selected.aircraft);
    info!("  Firmware      : {}", config.version);
    info!("  Airport       : {}", catalog.selected.airport);
    info!("  Mode          : {mode}");
    info!("  Backend       : {backend_kind}");
    info!("  Working dir   : {:?}", command.cwd);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Reset визуального симулятора — строго до spawn прошивки; отказ
    // соединения отменяет запуск, не деградируя в headless
    if mode.needs_visual_reset() {
        let reset = ResetClient::with_config(ResetConfig {
            addr: cli.reset_addr.clone(),
            settle_delay: Duration::from_millis(cli.settle_ms),
            ..ResetConfig::default()
        });

        if let Err(e) = reset.reset_aircraft() {
            error!("{e}");
            error!("Visual-mode launch aborted: is RealFlight running?");
            std::process::exit(1);
        }
    }

    let (mut supervisor, metrics) = Supervisor::new(create_backend(backend_kind));
    let (tx, rx) = bounded::<String>(cli.console_buffer);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_ctrlc = stop_flag.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C — принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received — stopping simulator...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let session_start = Instant::now();

    if let Err(e) = supervisor.start(&command, tx) {
        error!("{e}");
        std::process::exit(1);
    }

    // Консоль: строки процесса в порядке появления
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            supervisor.stop();
            break;
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => println!("{line}"),
            Err(RecvTimeoutError::Timeout) => {
                if !supervisor.is_running() {
                    supervisor.stop();
                    break;
                }
            }
            // Relay-поток завершился, буфер дочитан
            Err(RecvTimeoutError::Disconnected) => {
                supervisor.stop();
                break;
            }
        }
    }

    // --- Итоговая статистика ---
    let summary = metrics.summary(&session_start);
    info!("\n{summary}");

    // Сохраняем выбор оператора для следующей сессии
    if let Err(e) = catalog.save(&cli.config) {
        warn!("Failed to save selection: {e}");
    }

    if metrics.unexpected_exits.load(Ordering::Relaxed) > 0 {
        warn!("Simulator process exited on its own — check firmware output above");
        std::process::exit(1);
    }

    info!("✓ Session finished");
}

fn print_catalog(catalog: &Catalog) {
    println!("Aircraft:");
    for entry in &catalog.aircraft {
        println!("  {} ({}): {}", entry.name, entry.key, entry.versions.join(", "));
    }

    println!("Airports:");
    for entry in &catalog.airports {
        println!("  {} → {}", entry.name, entry.location);
    }
}
