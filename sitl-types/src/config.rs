use crate::LaunchMode;

/// Полная конфигурация одного запуска.
///
/// Неизменяема на время запуска; пересобирается из текущего выбора
/// оператора при каждом новом запросе на запуск.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Ключ самолёта — основа имени рабочей директории
    pub aircraft_key: String,
    /// Версия прошивки ArduPilot (часть имени исполняемого файла)
    pub version: String,
    /// Режим запуска
    pub mode: LaunchMode,
    /// Стартовая локация — строка, передаваемая прошивке как `-O`
    pub location: String,
}

impl LaunchConfig {
    pub fn new(
        aircraft_key: impl Into<String>,
        version: impl Into<String>,
        mode: LaunchMode,
        location: impl Into<String>,
    ) -> Self {
        Self {
            aircraft_key: aircraft_key.into(),
            version: version.into(),
            mode,
            location: location.into(),
        }
    }
}

impl std::fmt::Display for LaunchConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} @ {})",
            self.aircraft_key, self.version, self.mode, self.location
        )
    }
}
