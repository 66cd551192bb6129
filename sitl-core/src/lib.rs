//! Ядро SITL launcher'а
//!
//! Эталонная реализация жизненного цикла симуляции: построение команды
//! запуска прошивки, супервизор процесса с relay его консольного вывода
//! и reset-клиент внешнего визуального симулятора.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use crossbeam_channel::bounded;
//! use sitl_core::{SimBackend, SitlCommand, Supervisor};
//! use sitl_types::{LaunchConfig, LaunchMode};
//!
//! let config = LaunchConfig::new("tailwind", "4.2.0", LaunchMode::Headless, "Strip-A");
//! let command = SitlCommand::from_config("bin".as_ref(), &config);
//!
//! let (mut supervisor, _metrics) = Supervisor::new(Box::new(SimBackend::new()));
//! let (tx, rx) = bounded(256);
//! supervisor.start(&command, tx)?;
//!
//! for line in rx.iter() {
//!     println!("{line}");
//!     if line == "ArduPilot ready" {
//!         break;
//!     }
//! }
//! supervisor.stop();
//! # Ok::<(), sitl_types::LaunchError>(())
//! ```

pub mod command;
pub mod metrics;
pub mod process;
pub mod reset;
pub mod supervisor;

pub use command::*;
pub use metrics::*;
pub use process::*;
pub use reset::*;
pub use supervisor::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
