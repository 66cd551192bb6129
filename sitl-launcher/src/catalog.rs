use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use sitl_types::{LaunchConfig, LaunchMode};

use crate::{LauncherError, LauncherResult};

/// Самолёт из каталога.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftEntry {
    /// Отображаемое имя
    pub name: String,
    /// Ключ — основа имени рабочей директории инстанса
    pub key: String,
    /// Доступные версии прошивки
    pub versions: Vec<String>,
}

/// Аэродром из каталога.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportEntry {
    /// Отображаемое имя
    pub name: String,
    /// Строка стартовой локации, передаваемая прошивке (`-O`)
    pub location: String,
}

/// Сохранённый выбор оператора. Перезаписывается при чистом выходе.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub aircraft: String,
    pub version: String,
    pub airport: String,
}

/// Каталог launcher'а: самолёты, аэродромы и последний выбор.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub aircraft: Vec<AircraftEntry>,
    pub airports: Vec<AirportEntry>,
    #[serde(default)]
    pub selected: Selection,
}

impl Catalog {
    /// Читает и валидирует каталог из JSON файла.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let raw = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&raw)?;

        catalog.validate()?;

        // Списки показываются оператору в алфавитном порядке
        catalog.aircraft.sort_by(|a, b| a.name.cmp(&b.name));
        catalog.airports.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(catalog)
    }

    /// Сохраняет каталог (вместе с текущим выбором).
    pub fn save(
        &self,
        path: &Path,
    ) -> LauncherResult<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;

        Ok(())
    }

    fn validate(&self) -> LauncherResult<()> {
        let mut seen = std::collections::HashSet::new();

        for entry in &self.aircraft {
            if !seen.insert(entry.name.as_str()) {
                return Err(LauncherError::catalog(format!(
                    "Duplicate aircraft name: {}",
                    entry.name
                )));
            }
            if entry.versions.is_empty() {
                return Err(LauncherError::catalog(format!(
                    "Aircraft '{}' offers no firmware versions",
                    entry.name
                )));
            }
        }

        Ok(())
    }

    pub fn aircraft(
        &self,
        name: &str,
    ) -> Option<&AircraftEntry> {
        self.aircraft.iter().find(|a| a.name == name)
    }

    pub fn airport(
        &self,
        name: &str,
    ) -> Option<&AirportEntry> {
        self.airports.iter().find(|a| a.name == name)
    }

    /// Применяет переопределения из CLI к сохранённому выбору.
    ///
    /// Версия без явного переопределения берётся из сохранённого выбора;
    /// если выбранный самолёт её не предлагает — первая доступная.
    pub fn select(
        &mut self,
        aircraft: Option<&str>,
        version: Option<&str>,
        airport: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(name) = aircraft {
            self.selected.aircraft = name.to_string();
        }
        if let Some(name) = airport {
            self.selected.airport = name.to_string();
        }

        if self.selected.aircraft.is_empty() {
            return Err(LauncherError::catalog(
                "No aircraft selected (use --aircraft, see --list)",
            ));
        }
        if self.selected.airport.is_empty() {
            return Err(LauncherError::catalog(
                "No airport selected (use --airport, see --list)",
            ));
        }

        let entry = self.aircraft(&self.selected.aircraft).ok_or_else(|| {
            LauncherError::catalog(format!(
                "Unknown aircraft: '{}' (see --list)",
                self.selected.aircraft
            ))
        })?;

        let resolved_version = match version {
            Some(v) => {
                if !entry.versions.iter().any(|known| known == v) {
                    return Err(LauncherError::catalog(format!(
                        "Aircraft '{}' offers no firmware {v} (known: {})",
                        entry.name,
                        entry.versions.join(", ")
                    )));
                }
                v.to_string()
            }
            None => {
                if entry.versions.iter().any(|known| *known == self.selected.version) {
                    self.selected.version.clone()
                } else {
                    // Сохранённая версия не предлагается этим самолётом
                    entry.versions[0].clone()
                }
            }
        };
        self.selected.version = resolved_version;

        if self.airport(&self.selected.airport).is_none() {
            return Err(LauncherError::catalog(format!(
                "Unknown airport: '{}' (see --list)",
                self.selected.airport
            )));
        }

        Ok(())
    }

    /// Собирает конфигурацию запуска из текущего выбора.
    ///
    /// Вызывается после [`Catalog::select`].
    pub fn launch_config(
        &self,
        mode: LaunchMode,
    ) -> LauncherResult<LaunchConfig> {
        let entry = self.aircraft(&self.selected.aircraft).ok_or_else(|| {
            LauncherError::catalog(format!("Unknown aircraft: '{}'", self.selected.aircraft))
        })?;

        let airport = self.airport(&self.selected.airport).ok_or_else(|| {
            LauncherError::catalog(format!("Unknown airport: '{}'", self.selected.airport))
        })?;

        Ok(LaunchConfig::new(
            entry.key.clone(),
            self.selected.version.clone(),
            mode,
            airport.location.clone(),
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
