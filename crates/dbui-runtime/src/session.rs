#![forbid(unsafe_code)]

//! Per-display runtime context.
//!
//! A [`Session`] owns everything one display needs at runtime: the toolkit
//! handle, the scheduler, the representation host and a cache for shared
//! per-session resources (fonts, color maps, loaded images). Nothing is
//! process-global; two sessions in one process share no state.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dbui_core::Widget;
use dbui_core::sync::lock;

use crate::config::RuntimeConfig;
use crate::host::{HostError, RepresentReport, RepresentationHost};
use crate::load::BackgroundLoad;
use crate::scheduler::UpdateScheduler;
use crate::toolkit::{Toolkit, UiExecutor};

type Entry = Arc<dyn Any + Send + Sync>;

/// Type-keyed cache of shared session resources.
#[derive(Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<TypeId, Entry>>,
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache").field("len", &self.len()).finish()
    }
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached `R`, creating it with `init` on first use.
    ///
    /// `init` runs without the cache locked, so it may itself use the cache.
    /// If two threads race, the first insert wins and both get that value.
    pub fn get_or_insert_with<R>(&self, init: impl FnOnce() -> R) -> Arc<R>
    where
        R: Any + Send + Sync,
    {
        if let Some(existing) = self.get::<R>() {
            return existing;
        }
        let created = Arc::new(init());
        let winner = Arc::clone(
            lock(&self.entries)
                .entry(TypeId::of::<R>())
                .or_insert_with(|| Arc::clone(&created) as Entry),
        );
        winner.downcast::<R>().unwrap_or(created)
    }

    pub fn get<R: Any + Send + Sync>(&self) -> Option<Arc<R>> {
        let entry = lock(&self.entries).get(&TypeId::of::<R>()).cloned()?;
        entry.downcast::<R>().ok()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runtime context for one display.
pub struct Session<T: Toolkit> {
    toolkit: Arc<T>,
    config: RuntimeConfig,
    scheduler: UpdateScheduler,
    host: RepresentationHost<T>,
    cache: SessionCache,
    closed: AtomicBool,
}

impl<T: Toolkit> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("host", &self.host)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T: Toolkit> Session<T> {
    pub fn new(toolkit: Arc<T>, config: RuntimeConfig) -> Self {
        let executor: Arc<dyn UiExecutor> = Arc::clone(&toolkit) as Arc<dyn UiExecutor>;
        let scheduler = UpdateScheduler::new(executor, &config);
        let host = RepresentationHost::new(Arc::clone(&toolkit), scheduler.clone(), config.clone());
        tracing::debug!(max_pass_batch = config.max_pass_batch, "session created");
        Self {
            toolkit,
            config,
            scheduler,
            host,
            cache: SessionCache::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Session configured from the process environment.
    pub fn from_env(toolkit: Arc<T>) -> Self {
        Self::new(toolkit, RuntimeConfig::from_env())
    }

    pub fn toolkit(&self) -> &Arc<T> {
        &self.toolkit
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn host(&self) -> &RepresentationHost<T> {
        &self.host
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Represent `model`'s children under `parent`. UI thread only.
    pub fn represent(
        &self,
        parent: &T::Node,
        model: &Widget,
    ) -> Result<RepresentReport, HostError> {
        self.host.represent_model(parent, model)
    }

    /// Start a background load bounded by this session's `load_timeout`.
    ///
    /// Returns `None` if the load fails or does not finish in time.
    pub fn load_blocking<R, E>(
        &self,
        what: impl Into<String>,
        loader: impl FnOnce() -> Result<R, E> + Send + 'static,
    ) -> Option<R>
    where
        R: Send + 'static,
        E: fmt::Display,
    {
        BackgroundLoad::spawn(what, loader).wait(self.config.load_timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Dispose every representation and drop cached resources. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.host.dispose_all();
        self.cache.clear();
        tracing::debug!(stats = ?self.scheduler.stats(), "session shut down");
    }
}

impl<T: Toolkit> Drop for Session<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
