//! Process-wide logger registry
//!
//! Maps logger names to [`Logger`] instances, creating them lazily on first
//! lookup. Every logger created by one registry shares its default sink and
//! buffer factory.

use super::{
    config::RegistryConfig,
    logger::{Logger, DEFAULT_LOGGER_LEVEL},
    pool::{BufferFactory, BufferPool, PoolLimits},
    severity::Severity,
    sink::Sink,
};
use crate::sinks::console;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name of the logger that exists from construction.
pub const ROOT_LOGGER_NAME: &str = "ROOT";

lazy_static! {
    static ref GLOBAL_REGISTRY: LogRegistry = LogRegistry::new();
}

/// Logger named `name` from the global registry.
pub fn logger(name: &str) -> Arc<Logger> {
    LogRegistry::global().get(name)
}

/// The global registry's root logger.
pub fn root_logger() -> Arc<Logger> {
    LogRegistry::global().root()
}

pub struct LogRegistry {
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
    default_sink: Mutex<Arc<dyn Sink>>,
    factory: Arc<dyn BufferFactory>,
    default_level: Severity,
    local_time: bool,
    root: Arc<Logger>,
}

impl LogRegistry {
    /// Registry writing to the shared stderr sink through a fresh buffer pool.
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The process-wide registry, created on first use.
    ///
    /// It is never torn down; no ordering is guaranteed against other
    /// process-wide state during exit.
    pub fn global() -> &'static LogRegistry {
        &GLOBAL_REGISTRY
    }

    /// Existing logger for `name`, or a new one sharing this registry's
    /// default sink and buffer factory.
    ///
    /// The map lock is held across check-and-create, so concurrent first
    /// lookups of one name all receive the same instance.
    pub fn get(&self, name: &str) -> Arc<Logger> {
        let mut loggers = self.loggers.lock();
        if let Some(logger) = loggers.get(name) {
            return Arc::clone(logger);
        }

        let logger = Arc::new(self.new_logger(name));
        loggers.insert(name.to_string(), Arc::clone(&logger));
        logger
    }

    pub fn root(&self) -> Arc<Logger> {
        Arc::clone(&self.root)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loggers.lock().contains_key(name)
    }

    /// Names of every logger created so far, sorted.
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loggers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn default_sink(&self) -> Arc<dyn Sink> {
        Arc::clone(&self.default_sink.lock())
    }

    /// Replace the sink given to loggers created from now on.
    ///
    /// Existing loggers keep their current sinks.
    pub fn set_default_sink(&self, sink: Arc<dyn Sink>) {
        *self.default_sink.lock() = sink;
    }

    pub fn buffer_factory(&self) -> &Arc<dyn BufferFactory> {
        &self.factory
    }

    pub fn default_level(&self) -> Severity {
        self.default_level
    }

    /// Apply per-logger levels from `config`, creating loggers as needed.
    ///
    /// `default_level`, `local_time` and pool limits only take effect when a
    /// registry is built from the config.
    pub fn apply_config(&self, config: &RegistryConfig) {
        for (name, level) in &config.levels {
            self.get(name).set_level(*level);
        }
    }

    /// Flush every sink of every logger; failures are reported by each logger.
    pub fn flush_all(&self) {
        let loggers: Vec<Arc<Logger>> = self.loggers.lock().values().cloned().collect();
        for logger in loggers {
            let _ = logger.flush();
        }
    }

    fn new_logger(&self, name: &str) -> Logger {
        Logger::builder(name)
            .level(self.default_level)
            .sink(self.default_sink())
            .buffer_factory(Arc::clone(&self.factory))
            .local_time(self.local_time)
            .build()
    }
}

impl Default for LogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRegistry")
            .field("loggers", &self.logger_names())
            .field("default_level", &self.default_level)
            .field("local_time", &self.local_time)
            .finish()
    }
}

/// Builder for an injectable [`LogRegistry`]
///
/// # Example
/// ```
/// use ldgr::prelude::*;
/// use std::sync::Arc;
///
/// let sink = Arc::new(MemorySink::new());
/// let registry = LogRegistry::builder()
///     .default_sink(sink.clone())
///     .default_level(Severity::Debug)
///     .build();
///
/// registry.get("APP").debug("ready");
/// assert_eq!(sink.lines().len(), 1);
/// ```
pub struct RegistryBuilder {
    default_sink: Option<Arc<dyn Sink>>,
    factory: Option<Arc<dyn BufferFactory>>,
    default_level: Severity,
    local_time: bool,
    pool_limits: PoolLimits,
    levels: BTreeMap<String, Severity>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            default_sink: None,
            factory: None,
            default_level: DEFAULT_LOGGER_LEVEL,
            local_time: false,
            pool_limits: PoolLimits::default(),
            levels: BTreeMap::new(),
        }
    }

    /// Sink attached to every logger on creation; defaults to stderr.
    #[must_use = "builder methods return a new value"]
    pub fn default_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.default_sink = Some(sink);
        self
    }

    /// Factory shared by every logger; defaults to a [`BufferPool`].
    #[must_use = "builder methods return a new value"]
    pub fn buffer_factory(mut self, factory: Arc<dyn BufferFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_level(mut self, level: Severity) -> Self {
        self.default_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    /// Limits for the default buffer pool; ignored with a custom factory.
    #[must_use = "builder methods return a new value"]
    pub fn pool_limits(mut self, limits: PoolLimits) -> Self {
        self.pool_limits = limits;
        self
    }

    /// Take defaults, pool limits and per-logger levels from `config`.
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: &RegistryConfig) -> Self {
        self.default_level = config.default_level;
        self.local_time = config.local_time;
        self.pool_limits = config.pool;
        self.levels = config.levels.clone();
        self
    }

    pub fn build(self) -> LogRegistry {
        let default_sink = self
            .default_sink
            .unwrap_or_else(|| console::stderr_sink() as Arc<dyn Sink>);
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(BufferPool::with_limits(self.pool_limits)) as Arc<dyn BufferFactory>);

        let root = Arc::new(
            Logger::builder(ROOT_LOGGER_NAME)
                .level(self.default_level)
                .sink(Arc::clone(&default_sink))
                .buffer_factory(Arc::clone(&factory))
                .local_time(self.local_time)
                .build(),
        );

        let mut loggers = HashMap::new();
        loggers.insert(ROOT_LOGGER_NAME.to_string(), Arc::clone(&root));

        let registry = LogRegistry {
            loggers: Mutex::new(loggers),
            default_sink: Mutex::new(default_sink),
            factory,
            default_level: self.default_level,
            local_time: self.local_time,
            root,
        };

        for (name, level) in &self.levels {
            registry.get(name).set_level(*level);
        }
        registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
