//! Registry of named loggers and coordinated shutdown

use super::config::ManagerConfig;
use super::error::{LoggerError, Result};
use super::logger::{Logger, LoggerBuilder};
use super::thread_pool::ThreadPool;
use crate::format::TemplateCache;
use crate::sinks::ConsoleTarget;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const DEFAULT_LOGGER_NAME: &str = "default";

static GLOBAL: OnceLock<LoggerManager> = OnceLock::new();

/// Owns a set of uniquely named loggers, a default logger, and their shutdown.
///
/// Loggers created through the manager share one parsed-template cache.
///
/// # Example
///
/// ```
/// use flog::LoggerManager;
///
/// let manager = LoggerManager::new();
/// let db = manager.register_logger("db").unwrap();
/// db.info("connected to {}", &["primary".into()]).unwrap();
///
/// assert!(manager.register_logger("db").is_err());
/// manager.shutdown().unwrap();
/// assert!(manager.is_shut_down());
/// ```
pub struct LoggerManager {
    config: ManagerConfig,
    registry: RwLock<HashMap<String, Logger>>,
    templates: Arc<TemplateCache>,
    shut_down: AtomicBool,
    /// Serializes concurrent shutdown calls
    shutdown_lock: Mutex<()>,
    closed_default: OnceLock<Logger>,
}

impl LoggerManager {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            templates: Arc::new(TemplateCache::with_capacity(config.template_cache_capacity)),
            config,
            registry: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
            shutdown_lock: Mutex::new(()),
            closed_default: OnceLock::new(),
        }
    }

    /// Process-wide manager, created on first use
    pub fn global() -> &'static LoggerManager {
        GLOBAL.get_or_init(LoggerManager::new)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Builder pre-set with this manager's default level and template cache.
    /// Pass the result to [`register`](Self::register).
    pub fn logger_builder(&self, name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
            .min_level(self.config.default_level)
            .template_cache(Arc::clone(&self.templates))
    }

    /// Create and register a logger writing to stdout.
    ///
    /// # Errors
    ///
    /// [`LoggerError::DuplicateName`] if `name` is taken,
    /// [`LoggerError::ManagerClosed`] after shutdown.
    pub fn register_logger(&self, name: impl Into<String>) -> Result<Logger> {
        let name = name.into();
        // Cheap rejection before any sink is opened
        self.check_available(&name)?;
        let logger = self.logger_builder(name).console(ConsoleTarget::Stdout).build()?;
        self.register(logger)
    }

    /// Register an existing logger under its own name.
    pub fn register(&self, logger: Logger) -> Result<Logger> {
        let mut registry = self.registry.write();
        if self.is_shut_down() {
            return Err(LoggerError::ManagerClosed);
        }
        if registry.contains_key(logger.name()) {
            return Err(LoggerError::DuplicateName {
                name: logger.name().to_string(),
            });
        }
        registry.insert(logger.name().to_string(), logger.clone());
        Ok(logger)
    }

    fn check_available(&self, name: &str) -> Result<()> {
        let registry = self.registry.read();
        if self.is_shut_down() {
            return Err(LoggerError::ManagerClosed);
        }
        if registry.contains_key(name) {
            return Err(LoggerError::DuplicateName { name: name.to_string() });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Logger> {
        self.registry.read().get(name).cloned()
    }

    /// Registered names, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The logger named `"default"`, created (stdout sink) on first use.
    ///
    /// After shutdown this returns a closed logger that ignores every call.
    pub fn default_logger(&self) -> Logger {
        if let Some(logger) = self.registry.read().get(DEFAULT_LOGGER_NAME) {
            return logger.clone();
        }

        let mut registry = self.registry.write();
        if self.is_shut_down() {
            return self.closed_default().clone();
        }
        registry
            .entry(DEFAULT_LOGGER_NAME.to_string())
            .or_insert_with(|| {
                let logger = Logger::new(DEFAULT_LOGGER_NAME);
                logger.set_min_level(self.config.default_level);
                logger
            })
            .clone()
    }

    fn closed_default(&self) -> &Logger {
        self.closed_default.get_or_init(|| Logger::closed(DEFAULT_LOGGER_NAME))
    }

    /// Stop every registered logger and the pools they deliver through.
    ///
    /// Timers are cancelled first, then every logger stops accepting records
    /// and drains against one shared deadline (`shutdown_timeout`). Sinks are
    /// flushed and released, and each distinct pool is joined. If any logger
    /// missed the deadline, its pool discards what is still queued.
    ///
    /// Later calls return `Ok(())` without doing anything.
    ///
    /// # Errors
    ///
    /// [`LoggerError::ShutdownTimeout`] when records were dropped. Cleanup
    /// has completed by the time it is returned.
    pub fn shutdown(&self) -> Result<()> {
        let _serial = self.shutdown_lock.lock();

        let loggers: Vec<Logger> = {
            let mut registry = self.registry.write();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            registry.drain().map(|(_, logger)| logger).collect()
        };

        for logger in &loggers {
            logger.cancel_periodic_flush();
        }
        for logger in &loggers {
            logger.begin_draining();
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        let mut timed_out = 0usize;
        let mut dropped = 0u64;
        for logger in &loggers {
            if let Some(left) = logger.finish_shutdown(deadline) {
                timed_out += 1;
                dropped += left;
            }
        }

        let mut pools: Vec<Arc<ThreadPool>> = Vec::new();
        for logger in &loggers {
            if let Some(pool) = logger.pool() {
                if !pools.iter().any(|known| Arc::ptr_eq(known, &pool)) {
                    pools.push(pool);
                }
            }
        }
        for pool in &pools {
            pool.shutdown(timed_out == 0);
        }

        if timed_out > 0 {
            eprintln!(
                "[FLOG WARN] Shutdown deadline passed: {} logger(s) did not drain, {} record(s) dropped",
                timed_out, dropped
            );
            return Err(LoggerError::ShutdownTimeout {
                loggers: timed_out,
                dropped,
            });
        }
        Ok(())
    }
}

impl Default for LoggerManager {
    fn default() -> Self {
        Self::new()
    }
}
