use thiserror::Error;

/// Результат для операций запуска SITL
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Типы ошибок жизненного цикла симуляции.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Не удалось запустить исполняемый файл прошивки
    /// (нет бинарника, нет рабочей директории, нет прав)
    #[error("Failed to spawn simulator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Управляющий порт визуального симулятора недоступен
    /// (connection refused / reset / timeout)
    #[error("Simulator reset failed ({addr}): {source}")]
    Reset {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Процесс завершился, пока считался работающим
    #[error("Simulator process exited unexpectedly (code {code:?})")]
    ProcessLost { code: Option<i32> },

    /// Некорректная конфигурация запуска
    #[error("Config error: {0}")]
    Config(String),

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Удобные конструкторы
    pub fn spawn<S: Into<String>>(
        program: S,
        source: std::io::Error,
    ) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn reset<S: Into<String>>(
        addr: S,
        source: std::io::Error,
    ) -> Self {
        Self::Reset {
            addr: addr.into(),
            source,
        }
    }

    pub fn config<S: Into<String>>(s: S) -> Self {
        Self::Config(s.into())
    }
}
