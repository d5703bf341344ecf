use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable holding the filter directive.
pub const ENV_LOG_LEVEL: &str = "TASKBOARD_LOG";
/// Environment variable holding the output format.
pub const ENV_LOG_FORMAT: &str = "TASKBOARD_LOG_FORMAT";

/// Logger settings.
///
/// `level` takes any `EnvFilter` directive, e.g. `info` or `taskboard_core=debug,warn`.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: atty::is(atty::Stream::Stdout),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `TASKBOARD_LOG` and `TASKBOARD_LOG_FORMAT` when set.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::default().with_env_overrides()
    }

    /// Apply `TASKBOARD_LOG` and `TASKBOARD_LOG_FORMAT` on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, LoggerError> {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LoggerError> {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.format = format.parse()?;
        }
        Ok(self)
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }
}
