/// Режим запуска симуляции
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Встроенный физический бэкенд, без внешнего 3D симулятора
    Headless,
    /// Внешний 3D симулятор (RealFlight), физика через FlightAxis мост
    Visual,
}

impl LaunchMode {
    /// Значение опции `-M` — выбор физического бэкенда прошивки.
    pub fn model_arg(&self) -> &'static str {
        match self {
            LaunchMode::Headless => "quadplane",
            LaunchMode::Visual => "flightaxis",
        }
    }

    /// Суффикс рабочей директории инстанса.
    pub fn dir_suffix(&self) -> &'static str {
        match self {
            LaunchMode::Headless => "hl",
            LaunchMode::Visual => "rf",
        }
    }

    /// Требуется ли reset-последовательность визуального симулятора
    /// перед запуском прошивки.
    pub fn needs_visual_reset(&self) -> bool {
        matches!(self, LaunchMode::Visual)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для LaunchMode
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for LaunchMode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            LaunchMode::Headless => write!(f, "headless"),
            LaunchMode::Visual => write!(f, "visual"),
        }
    }
}

impl std::str::FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headless" | "hl" => Ok(LaunchMode::Headless),
            "visual" | "rf" | "realflight" => Ok(LaunchMode::Visual),
            _ => Err(format!(
                "Unknown launch mode: '{s}'. Use: headless, visual"
            )),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
