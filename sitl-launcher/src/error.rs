use thiserror::Error;

pub type LauncherResult<T> = std::result::Result<T, LauncherError>;

#[derive(Debug, Error)]
pub enum LauncherError {
    /// Ошибка ядра запуска (spawn, reset, процесс)
    #[error("Launch error: {0}")]
    Launch(#[from] sitl_types::LaunchError),

    /// Некорректный каталог или выбор из него
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Файл каталога не читается / не пишется
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Каталог не парсится
    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LauncherError {
    pub fn catalog<S: Into<String>>(s: S) -> Self {
        Self::Catalog(s.into())
    }
}
