//! Logging bootstrap for the desktop host.
//!
//! The library only talks to the `log` facade; the binary installs a
//! `flexi_logger` backend once at startup. Messages use a `key=value` style
//! (`event=... module=... status=...`) so they stay grep-friendly.

use anyhow::{anyhow, Result};
use flexi_logger::{Logger, LoggerHandle};

/// Default level for the current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Starts stderr logging at `level`.
///
/// The returned handle must be kept alive for the lifetime of the process.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when the logger backend cannot start (for example when
///   another logger is already installed).
pub fn init_logging(level: &str) -> Result<LoggerHandle> {
    let level = normalize_level(level)?;
    let handle = Logger::try_with_str(level)?
        .log_to_stderr()
        .format_for_stderr(flexi_logger::detailed_format)
        .start()?;
    log::info!(
        "event=app_start module=core status=ok platform={} level={} version={}",
        std::env::consts::OS,
        level,
        env!("CARGO_PKG_VERSION")
    );
    Ok(handle)
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(anyhow!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}
