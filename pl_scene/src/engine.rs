/// Process-wide facade for the scene pipeline
///
/// Holds only what is genuinely process-wide: the logger and the severity
/// filter. Scene graphs, cameras and scene renderers are owned by a
/// `SceneContext`, never by global state.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Global minimum severity (entries below it are dropped)
static MIN_SEVERITY: RwLock<LogSeverity> = RwLock::new(LogSeverity::Trace);

struct EngineState {
    initialized: RwLock<bool>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            initialized: RwLock::new(false),
        }
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Engine facade
///
/// # Example
///
/// ```no_run
/// use pl_scene::plscene::{Engine, log::LogSeverity};
///
/// Engine::initialize()?;
/// Engine::set_min_severity(LogSeverity::Info);
/// // ... build a SceneContext and draw frames ...
/// Engine::shutdown();
/// # Ok::<(), pl_scene::plscene::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Initialize the engine
    ///
    /// Idempotent. Logging works before initialization; this only marks the
    /// process as ready so that `is_initialized()` can be checked by hosts.
    pub fn initialize() -> Result<()> {
        let state = ENGINE_STATE.get_or_init(EngineState::new);
        let mut initialized = state.initialized.write()
            .map_err(|_| Error::InitializationFailed("Engine state lock poisoned".to_string()))?;
        if !*initialized {
            *initialized = true;
            crate::pl_info!("plscene::Engine", "Engine initialized");
        }
        Ok(())
    }

    /// Whether `initialize()` has been called since the last `shutdown()`
    pub fn is_initialized() -> bool {
        ENGINE_STATE.get()
            .and_then(|state| state.initialized.read().ok().map(|flag| *flag))
            .unwrap_or(false)
    }

    /// Shutdown the engine
    ///
    /// Restores the default logger and severity filter.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut initialized) = state.initialized.write() {
                if *initialized {
                    crate::pl_info!("plscene::Engine", "Engine shut down");
                }
                *initialized = false;
            }
        }
        Self::reset_logger();
        Self::set_min_severity(LogSeverity::Trace);
    }

    /// Reset global state for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut initialized) = state.initialized.write() {
                *initialized = false;
            }
        }
        Self::reset_logger();
        Self::set_min_severity(LogSeverity::Trace);
    }

    // ===== LOGGING API =====

    /// Replace the process-wide logger
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Drop every entry less severe than `severity`
    pub fn set_min_severity(severity: LogSeverity) {
        if let Ok(mut lock) = MIN_SEVERITY.write() {
            *lock = severity;
        }
    }

    /// Current minimum severity
    pub fn min_severity() -> LogSeverity {
        MIN_SEVERITY.read().map(|s| *s).unwrap_or(LogSeverity::Trace)
    }

    fn enabled(severity: LogSeverity) -> bool {
        severity >= Self::min_severity()
    }

    /// Logging entry point used by pl_trace!, pl_info!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Logging entry point with file:line information (used by pl_error!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
