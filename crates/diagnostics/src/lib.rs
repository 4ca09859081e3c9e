//! Logging facade for the tunelake workspace
//!
//! Every crate logs through the macros exported here so that a single
//! switch controls output for the whole process.
//!
//! Usage:
//! - Set TUNELAKE_LOG=off (default) - no logs
//! - Set TUNELAKE_LOG=info - stage progress and row counts
//! - Set TUNELAKE_LOG=warn - data-quality anomalies only
//! - Set TUNELAKE_LOG=debug - per-object and per-partition detail
//!
//! Binaries that read a level from their own configuration call
//! [`init_with_level`] instead of [`init_diagnostics`].

use std::str::FromStr;
use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "TUNELAKE_LOG";

static INIT: Once = Once::new();

/// Minimum level that reaches the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl LogLevel {
    fn emit_level(self) -> Option<emit::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(emit::Level::Error),
            LogLevel::Warn => Some(emit::Level::Warn),
            LogLevel::Info => Some(emit::Level::Info),
            LogLevel::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from the TUNELAKE_LOG environment variable.
///
/// Unknown values fall back to `info`. Safe to call more than once; only the
/// first call (of this or [`init_with_level`]) takes effect.
pub fn init_diagnostics() {
    let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
    let level = match raw.parse::<LogLevel>() {
        Ok(level) => level,
        Err(_) => {
            // Bootstrap warning, emitted before any emitter exists
            eprintln!("Warning: Unknown {} value '{}', using 'info'", LOG_ENV, raw);
            LogLevel::Info
        }
    };
    init_with_level(level);
}

/// Initialize diagnostics with an explicit level.
pub fn init_with_level(level: LogLevel) {
    INIT.call_once(|| {
        let Some(min) = level.emit_level() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log basic operations (stage start/finish, rows written, tables committed)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (objects listed, partitions staged, SQL text)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log data-quality anomalies and recoverable conditions
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort a run
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
