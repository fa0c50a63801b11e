//! Logging for the host binary: colored stdout plus a plain `hotreload.log`.
//!
//! Library crates only use the `log` macros; this module installs the sink.

use crate::error::HostError;

use common::ErrorLocation;

use std::fmt::Arguments;
use std::io::stdout;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_ONCE: Once = Once::new();
static INIT_CALLED: AtomicBool = AtomicBool::new(false);

const LOG_FILE_NAME: &str = "hotreload.log";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install the global logger, writing `hotreload.log` into `log_dir`.
///
/// Only the first call does anything. Later calls log a warning and return `Ok`,
/// whatever the first call returned.
///
/// # Errors
///
/// Returns [`HostError::Host`] if the log file cannot be opened or another
/// logger is already installed.
pub fn initialize(log_dir: &Path) -> Result<(), HostError> {
    if INIT_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let mut result = Ok(());
    INIT_ONCE.call_once(|| {
        result = install(log_dir);
        if result.is_ok() {
            info!(
                "Logger initialized at {LOG_LEVEL:?}, writing {}",
                log_dir.join(LOG_FILE_NAME).display()
            );
        }
    });
    result
}

#[track_caller]
fn install(log_dir: &Path) -> Result<(), HostError> {
    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME)).map_err(|e| HostError::Host {
        message: format!("Failed to create log file: {e}"),
        location: ErrorLocation::caller(),
    })?;

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, message, record, colors.color(record.level()))
        })
        .chain(stdout());

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(log_file);

    Dispatch::new()
        .level(LOG_LEVEL)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HostError::Host {
            message: format!("Failed to install logger: {e}"),
            location: ErrorLocation::caller(),
        })
}

fn write_line(
    out: FormatCallback<'_>,
    message: &Arguments<'_>,
    record: &Record<'_>,
    level: impl std::fmt::Display,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{file}:{line}]",
        date = format_rfc3339(SystemTime::now()),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ))
}
