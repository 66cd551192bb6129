use std::path::{Path, PathBuf};

use sitl_types::{LaunchConfig, LaunchMode};

/// Имя файла параметров по умолчанию в рабочей директории инстанса.
pub const DEFAULTS_FILE: &str = "defaults.param";

/// Loopback-only адрес контрольного линка: с ним прошивка не блокируется
/// в ожидании подключения внешней наземной станции.
pub const GCS_LINK: &str = "tcp:0";

/// Готовая команда запуска прошивки: исполняемый файл, рабочая директория
/// и список аргументов.
///
/// Все три поля — чистая функция от [`LaunchConfig`] и корня `bin_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitlCommand {
    /// Путь к исполняемому файлу прошивки
    pub program: PathBuf,
    /// Рабочая директория инстанса
    pub cwd: PathBuf,
    /// Аргументы командной строки
    pub args: Vec<String>,
}

impl SitlCommand {
    /// Собирает команду запуска из конфигурации.
    pub fn from_config(
        bin_root: &Path,
        config: &LaunchConfig,
    ) -> Self {
        let program = bin_root.join(executable_name(&config.version));
        let cwd = bin_root.join(instance_dir(
            &config.aircraft_key,
            &config.version,
            config.mode,
        ));

        let args = vec![
            "--defaults".to_string(),
            DEFAULTS_FILE.to_string(),
            "-M".to_string(),
            config.mode.model_arg().to_string(),
            "--uartA".to_string(),
            GCS_LINK.to_string(),
            "-O".to_string(),
            config.location.clone(),
        ];

        Self { program, cwd, args }
    }
}

impl std::fmt::Display for SitlCommand {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, " (cwd {})", self.cwd.display())
    }
}

/// Имя исполняемого файла прошивки для данной версии.
pub fn executable_name(version: &str) -> String {
    format!("ArduPlane_{version}{}", std::env::consts::EXE_SUFFIX)
}

/// Имя рабочей директории инстанса: `<ключ>_<версия>_<hl|rf>`.
///
/// Версия приводится к нижнему регистру, все пробельные символы
/// выбрасываются.
pub fn instance_dir(
    aircraft_key: &str,
    version: &str,
    mode: LaunchMode,
) -> String {
    let raw = format!(
        "{aircraft_key}_{}_{}",
        version.to_lowercase(),
        mode.dir_suffix()
    );

    raw.split_whitespace().collect()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn tailwind_headless() -> LaunchConfig {
        LaunchConfig::new("tailwind", "4.2.0", LaunchMode::Headless, "Strip-A")
    }

    #[test]
    fn test_headless_command_vector() {
        let command = SitlCommand::from_config(Path::new("bin"), &tailwind_headless());

        assert_eq!(
            command.args,
            vec![
                "--defaults",
                "defaults.param",
                "-M",
                "quadplane",
                "--uartA",
                "tcp:0",
                "-O",
                "Strip-A",
            ]
        );
        assert_eq!(command.cwd, Path::new("bin").join("tailwind_4.2.0_hl"));
        assert_eq!(
            command.program,
            Path::new("bin").join(format!("ArduPlane_4.2.0{}", std::env::consts::EXE_SUFFIX))
        );
    }

    #[test]
    fn test_visual_command_selects_flightaxis() {
        let mut config = tailwind_headless();
        config.mode = LaunchMode::Visual;

        let command = SitlCommand::from_config(Path::new("bin"), &config);

        assert!(command.args.windows(2).any(|w| w == ["-M", "flightaxis"]));
        assert_eq!(command.cwd, Path::new("bin").join("tailwind_4.2.0_rf"));
    }

    #[test]
    fn test_instance_dir_strips_whitespace() {
        // Ключ и версия из каталога могут содержать пробелы
        assert_eq!(
            instance_dir("tail wind", "4.2.0 beta", LaunchMode::Headless),
            "tailwind_4.2.0beta_hl"
        );
    }

    #[test]
    fn test_instance_dir_lowercases_version() {
        assert_eq!(
            instance_dir("tailwind", "4.2.0-RC1", LaunchMode::Visual),
            "tailwind_4.2.0-rc1_rf"
        );
    }

    #[test]
    fn test_command_is_pure_function_of_config() {
        let a = SitlCommand::from_config(Path::new("bin"), &tailwind_headless());
        let b = SitlCommand::from_config(Path::new("bin"), &tailwind_headless());
        assert_eq!(a, b);
    }
}
