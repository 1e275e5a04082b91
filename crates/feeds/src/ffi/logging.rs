//! FFI logging backend that routes logs to Swift/Kotlin via callback
//!
//! A `log` backend that forwards records to a host callback, so sync
//! engine logs land in os_log or logcat next to the app's own.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

/// Global storage for the FFI logger
static FFI_LOGGER: OnceLock<FfiLogger> = OnceLock::new();

/// Forwards records to the host callback once one is set
struct FfiLogger {
    callback: RwLock<Option<Arc<dyn LogCallback>>>,
    max_level: RwLock<Level>,
}

impl FfiLogger {
    fn new(max_level: Level) -> Self {
        Self {
            callback: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn callback(&self) -> Option<Arc<dyn LogCallback>> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn max_level(&self) -> Level {
        *self.max_level.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for FfiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // No callback yet: drop the record
        let Some(callback) = self.callback() else {
            return;
        };
        callback.on_log(
            FfiLogLevel::from(record.level()),
            record.target().to_string(),
            record.args().to_string(),
        );
    }

    fn flush(&self) {}
}

/// Install the FFI logger as the global `log` backend
///
/// Fails if another logger (e.g. env_logger in the headless binary) is
/// already installed.
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = FFI_LOGGER.get_or_init(|| FfiLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Replace the callback receiving log records; `None` silences it
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(logger) = FFI_LOGGER.get() {
        *logger
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }
}

/// Change the maximum forwarded level at runtime
pub fn set_log_level(level: Level) {
    if let Some(logger) = FFI_LOGGER.get() {
        *logger
            .max_level
            .write()
            .unwrap_or_else(PoisonError::into_inner) = level;
        log::set_max_level(level.to_level_filter());
    }
}

/// Host entry point: install the logger and attach `callback`
///
/// Safe to call more than once; later calls only swap the callback and level.
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) {
    let level = Level::from(max_level);
    if init_ffi_logger(level).is_err() {
        set_log_level(level);
    }
    set_log_callback(Some(Arc::from(callback)));
}
