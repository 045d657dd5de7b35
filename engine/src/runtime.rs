//! The SCORM runtime engine.
//!
//! [`ScormEngine`] is what course content talks to. It owns an [`ApiAdapter`]
//! when an LMS is reachable and otherwise serves the same calls from a local
//! [`CacheStore`], validated against the same data-model tables. Content cannot
//! tell the two modes apart except through [`ScormEngine::is_connected`].
//!
//! The engine never reads a clock. Callers pass the current time to
//! [`ScormEngine::initialize`] and drive periodic commits with
//! [`ScormEngine::tick`].

use crate::{
    adapter::{ApiAdapter, CallResult},
    cache::CacheStore,
    discovery::ApiLocator,
    schema::{count_indices, DataModelSchema},
    version::Field,
    ErrorCode, ScormVersion, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Default auto-commit period.
pub const DEFAULT_AUTO_COMMIT_MS: u64 = 60_000;

/// Default pass mark, in percent.
pub const DEFAULT_PASSING_SCORE: f64 = 70.0;

/// Fields carried across sessions through the local cache.
const CACHED_FIELDS: [Field; 2] = [Field::Location, Field::SuspendData];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub version: ScormVersion,
    /// Milliseconds between automatic commits; 0 disables them.
    pub auto_commit_interval: u64,
    /// Percent score at or above which completion counts as passed.
    pub passing_score: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: ScormVersion::default(),
            auto_commit_interval: DEFAULT_AUTO_COMMIT_MS,
            passing_score: DEFAULT_PASSING_SCORE,
        }
    }
}

impl EngineConfig {
    pub fn new(version: ScormVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn with_auto_commit(mut self, interval_ms: u64) -> Self {
        self.auto_commit_interval = interval_ms;
        self
    }

    pub fn with_passing_score(mut self, percent: f64) -> Self {
        self.passing_score = percent;
        self
    }
}

/// Fixed-period schedule driven by caller-supplied time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCommit {
    interval: u64,
    next_due: Option<Timestamp>,
}

impl AutoCommit {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: Timestamp) {
        self.next_due = (self.interval > 0).then(|| now.saturating_add(self.interval));
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.next_due
    }

    /// Whether a commit is due at `now`. Missed periods collapse into one.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let missed = (now - due) / self.interval;
                self.next_due = Some(due.saturating_add((missed + 1) * self.interval));
                true
            }
            _ => false,
        }
    }
}

/// How the engine is currently serving data-model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Lms,
    LocalCache,
}

pub struct ScormEngine {
    config: EngineConfig,
    schema: DataModelSchema,
    locator: Box<dyn ApiLocator>,
    cache: Box<dyn CacheStore>,
    adapter: Option<ApiAdapter>,
    initialized: bool,
    last_error: ErrorCode,
    auto_commit: AutoCommit,
}

impl ScormEngine {
    pub fn new(
        config: EngineConfig,
        locator: impl ApiLocator + 'static,
        cache: impl CacheStore + 'static,
    ) -> Self {
        Self {
            schema: DataModelSchema::for_version(config.version),
            auto_commit: AutoCommit::new(config.auto_commit_interval),
            config,
            locator: Box::new(locator),
            cache: Box::new(cache),
            adapter: None,
            initialized: false,
            last_error: ErrorCode::NoError,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn version(&self) -> ScormVersion {
        self.config.version
    }

    pub fn schema(&self) -> &DataModelSchema {
        &self.schema
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True while a live LMS session backs the engine.
    pub fn is_connected(&self) -> bool {
        self.initialized && self.adapter.is_some()
    }

    pub fn mode(&self) -> Option<ConnectionMode> {
        if !self.initialized {
            None
        } else if self.adapter.is_some() {
            Some(ConnectionMode::Lms)
        } else {
            Some(ConnectionMode::LocalCache)
        }
    }

    pub fn auto_commit(&self) -> &AutoCommit {
        &self.auto_commit
    }

    /// Start a session.
    ///
    /// Connects to the LMS when one can be found and initialized; otherwise
    /// engages the local cache. Either way the engine is usable afterwards.
    pub fn initialize(&mut self, now: Timestamp) -> bool {
        if self.initialized {
            warn!("SCORM engine already initialized");
            return true;
        }

        info!(version = %self.config.version, "Initializing SCORM engine");
        let mut adapter = ApiAdapter::new(self.config.version);
        match adapter.initialize(self.locator.as_ref()) {
            Ok(()) => {
                self.adapter = Some(adapter);
                self.initialized = true;
                self.auto_commit.start(now);
                self.restore_cached_data();
                info!("SCORM engine connected to LMS");
            }
            Err(code) => {
                error!(code = code.code(), "Failed to initialize SCORM API");
                info!("Falling back to local cache");
                self.adapter = None;
                self.initialized = true;
            }
        }
        self.last_error = ErrorCode::NoError;
        true
    }

    /// End the session, persisting resumable state to the cache first.
    pub fn terminate(&mut self) -> bool {
        if !self.initialized {
            warn!("SCORM engine not initialized");
            return false;
        }

        self.auto_commit.stop();
        self.persist_cached_data();

        let result = match self.adapter.as_mut() {
            Some(adapter) => match adapter.terminate() {
                Ok(()) => true,
                Err(code) => {
                    error!(code = code.code(), "Failed to terminate LMS session");
                    false
                }
            },
            None => true,
        };
        self.adapter = None;
        self.initialized = false;
        info!("SCORM engine terminated");
        result
    }

    pub fn get_value(&mut self, element: &str) -> CallResult<String> {
        let result = self.ensure_initialized().and_then(|_| match self.adapter.as_mut() {
            Some(adapter) => adapter.get_value(element),
            None => self
                .schema
                .check_get(element)
                .map(|_| read_cached(&self.schema, self.cache.as_ref(), element)),
        });
        self.record(result)
    }

    pub fn set_value(&mut self, element: &str, value: &str) -> CallResult<()> {
        let result = self.ensure_initialized().and_then(|_| match self.adapter.as_mut() {
            Some(adapter) => adapter.set_value(element, value),
            None => {
                self.schema.check_set(element, value)?;
                self.cache.set_value(element, value).map_err(|e| {
                    error!(element, error = %e, "Failed to write local cache");
                    ErrorCode::GeneralException
                })
            }
        });
        self.record(result)
    }

    pub fn commit(&mut self) -> CallResult<()> {
        let result = self.ensure_initialized().and_then(|_| match self.adapter.as_mut() {
            Some(adapter) => adapter.commit(),
            None => self.cache.commit().map_err(|e| {
                error!(error = %e, "Failed to commit local cache");
                ErrorCode::GeneralException
            }),
        });
        self.record(result)
    }

    /// Advance time. Commits when the auto-commit period has elapsed and
    /// reports whether a commit ran.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        if !self.initialized || !self.auto_commit.poll(now) {
            return false;
        }
        debug!(now, "Auto-committing SCORM data");
        if let Err(code) = self.commit() {
            warn!(code = code.code(), "Auto-commit failed");
        }
        true
    }

    pub fn get_last_error(&self) -> ErrorCode {
        self.last_error
    }

    pub fn get_error_string(&self, code: ErrorCode) -> String {
        code.to_string()
    }

    pub fn get_diagnostic(&self, code: ErrorCode) -> String {
        match self.adapter.as_ref() {
            Some(adapter) => adapter.get_diagnostic(code),
            None => code.to_string(),
        }
    }

    fn ensure_initialized(&self) -> CallResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(ErrorCode::NotInitialized)
        }
    }

    fn record<T>(&mut self, result: CallResult<T>) -> CallResult<T> {
        self.last_error = match &result {
            Ok(_) => ErrorCode::NoError,
            Err(code) => *code,
        };
        result
    }

    fn cached_elements(&self) -> impl Iterator<Item = &'static str> {
        let version = self.config.version;
        CACHED_FIELDS.into_iter().filter_map(move |f| version.element(f))
    }

    /// Push previously cached resume data into a freshly opened LMS session.
    fn restore_cached_data(&mut self) {
        let elements: Vec<_> = self.cached_elements().collect();
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        for element in elements {
            let value = self.cache.get_value(element);
            if value.is_empty() {
                continue;
            }
            match adapter.set_value(element, &value) {
                Ok(()) => debug!(element, "Restored cached value"),
                Err(code) => warn!(element, code = code.code(), "Failed to restore cached value"),
            }
        }
    }

    /// Copy resume data from the LMS into the cache and commit it.
    fn persist_cached_data(&mut self) {
        let elements: Vec<_> = self.cached_elements().collect();
        if let Some(adapter) = self.adapter.as_mut() {
            for element in elements {
                let Ok(value) = adapter.get_value(element) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                if let Err(e) = self.cache.set_value(element, &value) {
                    warn!(element, error = %e, "Failed to cache value");
                }
            }
        }
        if let Err(e) = self.cache.commit() {
            warn!(error = %e, "Failed to commit local cache");
        }
    }
}

/// Answer a read from the local cache the way an LMS would, keywords
/// included.
fn read_cached(schema: &DataModelSchema, cache: &dyn CacheStore, element: &str) -> String {
    if let Some(prefix) = element.strip_suffix("._count") {
        let keys = cache.keys();
        return count_indices(prefix, keys.iter().map(String::as_str)).to_string();
    }
    schema
        .keyword_value(element)
        .unwrap_or_else(|| cache.get_value(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::discovery::{DirectHost, Standalone};
    use crate::host::{host_ref, MockLms};

    fn offline(version: ScormVersion) -> (MemoryCache, ScormEngine) {
        let cache = MemoryCache::new();
        let engine = ScormEngine::new(EngineConfig::new(version), Standalone, cache.reopen());
        (cache, engine)
    }

    #[test]
    fn auto_commit_schedule() {
        let mut schedule = AutoCommit::new(1_000);
        assert!(!schedule.poll(5_000));
        schedule.start(0);
        assert!(!schedule.poll(999));
        assert!(schedule.poll(1_000));
        assert!(!schedule.poll(1_500));
        // Several missed periods fire once.
        assert!(schedule.poll(4_200));
        assert_eq!(schedule.next_due(), Some(5_000));
        schedule.stop();
        assert!(!schedule.poll(10_000));
    }

    #[test]
    fn zero_interval_never_runs() {
        let mut schedule = AutoCommit::new(0);
        schedule.start(0);
        assert!(!schedule.is_running());
        assert!(!schedule.poll(u64::MAX));
    }

    #[test]
    fn calls_before_initialize_report_not_initialized() {
        let (_cache, mut engine) = offline(ScormVersion::Scorm12);
        assert_eq!(
            engine.get_value("cmi.core.lesson_location"),
            Err(ErrorCode::NotInitialized)
        );
        assert_eq!(engine.get_last_error(), ErrorCode::NotInitialized);
        assert!(!engine.terminate());
    }

    #[test]
    fn falls_back_to_cache_without_lms() {
        let (cache, mut engine) = offline(ScormVersion::Scorm12);
        assert!(engine.initialize(0));
        assert!(!engine.is_connected());
        assert_eq!(engine.mode(), Some(ConnectionMode::LocalCache));

        engine
            .set_value("cmi.core.lesson_location", "page-2")
            .unwrap();
        assert_eq!(engine.get_last_error(), ErrorCode::NoError);
        assert_eq!(
            engine.get_value("cmi.core.lesson_location").unwrap(),
            "page-2"
        );
        assert!(engine.terminate());
        assert_eq!(
            cache.durable_value("cmi.core.lesson_location").as_deref(),
            Some("page-2")
        );
    }

    #[test]
    fn cache_mode_validates_like_the_lms() {
        let (_cache, mut engine) = offline(ScormVersion::Scorm2004);
        engine.initialize(0);
        assert_eq!(
            engine.set_value("cmi.learner_id", "x"),
            Err(ErrorCode::InvalidSetValue)
        );
        assert_eq!(
            engine.get_value("cmi.session_time"),
            Err(ErrorCode::ElementIsWriteOnly)
        );
        assert_eq!(
            engine.set_value("cmi.score.scaled", "2"),
            Err(ErrorCode::InvalidSetValue)
        );
    }

    #[test]
    fn cache_mode_answers_keywords_like_the_lms() {
        for version in [ScormVersion::Scorm12, ScormVersion::Scorm2004] {
            let (_lms, host) = host_ref(MockLms::seeded(version));
            let mut connected =
                ScormEngine::new(EngineConfig::new(version), DirectHost(host), MemoryCache::new());
            let (_cache, mut cached) = offline(version);
            connected.initialize(0);
            cached.initialize(0);

            for engine in [&mut connected, &mut cached] {
                engine.set_value("cmi.objectives.0.id", "intro").unwrap();
                engine.set_value("cmi.objectives.1.id", "outro").unwrap();
                engine.set_value("cmi.objectives.1.score.raw", "40").unwrap();
            }

            let score_children = match version {
                ScormVersion::Scorm12 => "cmi.core.score._children",
                ScormVersion::Scorm2004 => "cmi.score._children",
            };
            for element in [
                "cmi._version",
                "cmi.objectives._count",
                "cmi.objectives._children",
                "cmi.interactions._count",
                score_children,
            ] {
                assert_eq!(
                    cached.get_value(element),
                    connected.get_value(element),
                    "{version} {element}"
                );
            }
            assert_eq!(cached.get_value("cmi.objectives._count").as_deref(), Ok("2"));
            assert_eq!(cached.get_value("cmi.interactions._count").as_deref(), Ok("0"));
        }
    }

    #[test]
    fn connected_engine_restores_cached_location() {
        let mut cache = MemoryCache::new();
        cache.set_value("cmi.location", "slide-9").unwrap();
        cache.commit().unwrap();

        let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm2004));
        let mut engine = ScormEngine::new(
            EngineConfig::new(ScormVersion::Scorm2004),
            DirectHost(host),
            cache.reopen(),
        );
        assert!(engine.initialize(0));
        assert!(engine.is_connected());
        assert_eq!(lms.borrow().value("cmi.location"), Some("slide-9"));
    }

    #[test]
    fn tick_commits_on_schedule() {
        let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
        let mut engine = ScormEngine::new(
            EngineConfig::new(ScormVersion::Scorm12).with_auto_commit(60_000),
            DirectHost(host),
            MemoryCache::new(),
        );
        engine.initialize(1_000);
        assert!(!engine.tick(30_000));
        assert!(engine.tick(61_000));
        assert_eq!(lms.borrow().commit_count(), 1);

        engine.terminate();
        assert!(!engine.tick(500_000));
        assert_eq!(lms.borrow().commit_count(), 1);
    }

    #[test]
    fn terminate_caches_lms_resume_data() {
        let cache = MemoryCache::new();
        let (_lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
        let mut engine = ScormEngine::new(
            EngineConfig::default(),
            DirectHost(host),
            cache.reopen(),
        );
        engine.initialize(0);
        engine.set_value("cmi.suspend_data", "resume-me").unwrap();
        assert!(engine.terminate());
        assert!(!engine.is_initialized());
        assert_eq!(
            cache.durable_value("cmi.suspend_data").as_deref(),
            Some("resume-me")
        );
    }
}
