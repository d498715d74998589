//! Logging context.
//!
//! Built once at process start from the `--log` flag or the `VERIFICATION_LOG`
//! environment variable, then installed as the global `tracing` subscriber.
//! Components log through the `tracing` macros and never touch this type.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::{Result, StencilError};

/// Timestamp format of log lines, e.g. `14:03:27.512`.
pub const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Environment variable enabling logging when set to a positive integer.
pub const LOG_ENV: &str = "VERIFICATION_LOG";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    enabled: bool,
}

impl LogConfig {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Enabled if `flag` is set or [`LOG_ENV`] holds a positive integer.
    pub fn from_env(flag: bool) -> Self {
        Self::resolve(flag, std::env::var(LOG_ENV).ok().as_deref())
    }

    fn resolve(flag: bool, env: Option<&str>) -> Self {
        let from_env = env
            .and_then(|v| v.trim().parse::<i64>().ok())
            .is_some_and(|v| v > 0);
        Self::new(flag || from_env)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn level(&self) -> LevelFilter {
        if self.enabled {
            LevelFilter::DEBUG
        } else {
            LevelFilter::OFF
        }
    }

    /// Local wall-clock time with millisecond resolution.
    pub fn timer() -> ChronoLocal {
        ChronoLocal::new(TIME_FORMAT.to_owned())
    }

    /// Install the stderr subscriber. Fails if one is already installed.
    pub fn install(&self) -> Result<()> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level().into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .with_timer(Self::timer())
            .try_init()
            .map_err(|e| StencilError::InvalidArgument(format!("failed to install logger: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env() {
        assert!(!LogConfig::resolve(false, None).enabled());
        assert!(LogConfig::resolve(true, None).enabled());
        assert!(LogConfig::resolve(false, Some("1")).enabled());
        assert!(!LogConfig::resolve(false, Some("0")).enabled());
        assert!(!LogConfig::resolve(false, Some("-3")).enabled());
        assert!(!LogConfig::resolve(false, Some("yes")).enabled());
    }

    #[test]
    fn test_level() {
        assert_eq!(LogConfig::new(true).level(), LevelFilter::DEBUG);
        assert_eq!(LogConfig::default().level(), LevelFilter::OFF);
    }

    #[test]
    fn test_timestamps_have_milliseconds() {
        use tracing_subscriber::fmt::format::Writer;
        use tracing_subscriber::fmt::time::FormatTime;

        let mut stamp = String::new();
        LogConfig::timer()
            .format_time(&mut Writer::new(&mut stamp))
            .unwrap();
        let (hms, millis) = stamp.split_once('.').unwrap();
        assert_eq!(hms.split(':').count(), 3);
        assert_eq!(millis.len(), 3);
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
    }
}
