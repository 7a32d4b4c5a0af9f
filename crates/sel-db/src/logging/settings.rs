//! Verbosity and message-shape settings

use std::env;
use std::str::FromStr;

/// Environment variable names
mod vars {
    pub const SELDB_LOGLEVEL: &str = "SELDB_LOGLEVEL";
    pub const SELDB_LOGTYPE: &str = "SELDB_LOGTYPE";
}

/// Verbosity. Anything other than `DEBUG` or `INFO` means error-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    #[default]
    Error,
    Info,
    Debug,
}

impl LogLevel {
    /// Whether messages at `level` pass this verbosity.
    #[must_use]
    pub fn allows(self, level: Self) -> bool {
        level <= self
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            _ => Self::Error,
        })
    }
}

/// Message shape handed to a caller-supplied logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// `sel-db: <caller>: <message>`
    String,
    /// `{ module, caller, message }`
    #[default]
    Json,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "STRING" => Self::String,
            _ => Self::Json,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LogSettings {
    #[must_use]
    pub const fn new(level: LogLevel, format: LogFormat) -> Self {
        Self { level, format }
    }

    /// Read `SELDB_LOGLEVEL` and `SELDB_LOGTYPE`. Unset variables fall back to
    /// error-only verbosity and JSON messages.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var(vars::SELDB_LOGLEVEL)
            .map(|v| v.parse().unwrap_or_default())
            .unwrap_or_default();
        let format = env::var(vars::SELDB_LOGTYPE)
            .map(|v| v.parse().unwrap_or_default())
            .unwrap_or_default();
        Self { level, format }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap();

        let old_values: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("".parse::<LogLevel>().unwrap(), LogLevel::Error);
    }

    #[test]
    fn test_level_allows() {
        assert!(LogLevel::Debug.allows(LogLevel::Info));
        assert!(LogLevel::Debug.allows(LogLevel::Debug));
        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(!LogLevel::Error.allows(LogLevel::Info));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("string".parse::<LogFormat>().unwrap(), LogFormat::String);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("xml".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_from_env_defaults() {
        with_env_vars(&[("SELDB_LOGLEVEL", None), ("SELDB_LOGTYPE", None)], || {
            let settings = LogSettings::from_env();
            assert_eq!(settings.level, LogLevel::Error);
            assert_eq!(settings.format, LogFormat::Json);
        });
    }

    #[test]
    fn test_from_env_values() {
        with_env_vars(
            &[("SELDB_LOGLEVEL", Some("debug")), ("SELDB_LOGTYPE", Some("String"))],
            || {
                let settings = LogSettings::from_env();
                assert_eq!(settings.level, LogLevel::Debug);
                assert_eq!(settings.format, LogFormat::String);
            },
        );
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(LogLevel::Error.as_filter(), "error");
        assert_eq!(LogLevel::Info.as_filter(), "info");
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }
}
