use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::{ParameterCache, SlotState};
use crate::error::SyncError;
use crate::model::{ConfigTriple, KnownParameter, Parameter};
use crate::prefs::{normalize_base_url, ColorMap, ConfigPreferences, PrintHeadColorResolver};
use crate::remote::{ClientFactory, ConfigApi};

/// Result of a `load()` or `reload()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadOutcome {
    /// A completed load is still valid; nothing was fetched.
    Skipped,
    /// Every dispatched fetch settled.
    Completed { succeeded: usize, failed: usize },
    /// The endpoint changed while fetches were in flight; their results were dropped.
    Superseded,
    /// The session was shut down.
    Cancelled,
}

/// Engine-wide state as the presentation layer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnginePhase {
    Idle,
    Loading,
    Ready,
    PartiallyFailed,
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}

struct Session {
    /// Bumped on every endpoint switch; results tagged with an older
    /// generation are dropped.
    generation: u64,
    loaded: bool,
    client: Option<Arc<dyn ConfigApi>>,
}

struct EngineInner {
    prefs: ConfigPreferences,
    factory: Arc<dyn ClientFactory>,
    resolver: PrintHeadColorResolver,
    cache: ParameterCache,
    session: Mutex<Session>,
    load_lock: tokio::sync::Mutex<()>,
    current_load: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    is_loading: watch::Sender<bool>,
    last_error: watch::Sender<Option<Notice>>,
    last_success: watch::Sender<Option<Notice>>,
    colors: watch::Sender<ColorMap>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EngineInner {
    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session().generation == generation
    }

    /// Write to a slot only if no endpoint switch happened since `generation`.
    fn commit(&self, generation: u64, id: &str, update: impl FnOnce(&mut SlotState)) -> bool {
        let session = self.session();
        if session.generation != generation {
            debug!(
                "Dropping stale result for {} (generation {} superseded by {})",
                id, generation, session.generation
            );
            return false;
        }
        self.cache.modify(id, update)
    }

    fn notify_error(&self, message: String) {
        warn!("{}", message);
        self.last_error.send_replace(Some(Notice::new(message)));
    }

    fn notify_success(&self, message: &str) {
        info!("{}", message);
        self.last_success.send_replace(Some(Notice::new(message)));
    }
}

/// Clears the loading state when a load ends, including when the caller
/// drops the `load()` future before the fan-in completes.
struct LoadingGuard<'a> {
    inner: &'a EngineInner,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.inner.current_load) = None;
        let settled = self.inner.cache.settle_loading();
        if settled > 0 {
            debug!("Load abandoned with {} fetches outstanding", settled);
        }
        self.inner.is_loading.send_replace(false);
    }
}

/// Log-friendly name for a parameter identifier.
fn display_name(parameter_id: &str) -> &str {
    KnownParameter::from_id(parameter_id)
        .map(KnownParameter::label)
        .unwrap_or(parameter_id)
}

/// Reconciles the fixed parameter set between the remote service, the local
/// preference store and observable in-memory slots.
///
/// Cheap to clone; clones drive the same session. Dropping the last handle
/// cancels every outstanding request.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Engine over the five [`KnownParameter`]s.
    pub fn new(prefs: ConfigPreferences, factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_parameters(prefs, factory, KnownParameter::all_ids())
    }

    /// Engine over an arbitrary fixed identifier set.
    pub fn with_parameters<I, S>(
        prefs: ConfigPreferences,
        factory: Arc<dyn ClientFactory>,
        parameter_ids: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inner = EngineInner {
            resolver: PrintHeadColorResolver::new(prefs.clone()),
            prefs,
            factory,
            cache: ParameterCache::new(parameter_ids),
            session: Mutex::new(Session {
                generation: 0,
                loaded: false,
                client: None,
            }),
            load_lock: tokio::sync::Mutex::new(()),
            current_load: Mutex::new(None),
            shutdown: CancellationToken::new(),
            is_loading: watch::channel(false).0,
            last_error: watch::channel(None).0,
            last_success: watch::channel(None).0,
            colors: watch::channel(ColorMap::default()).0,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    // --- Observable state ---

    pub fn parameter_ids(&self) -> Vec<String> {
        self.inner.cache.ids().map(|id| id.to_string()).collect()
    }

    pub fn slot(&self, parameter_id: &str) -> Option<watch::Receiver<SlotState>> {
        self.inner.cache.subscribe(parameter_id)
    }

    pub fn slot_state(&self, parameter_id: &str) -> Option<SlotState> {
        self.inner.cache.get(parameter_id)
    }

    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.inner.is_loading.subscribe()
    }

    pub fn last_error(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.last_error.subscribe()
    }

    pub fn last_success(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.last_success.subscribe()
    }

    pub fn colors(&self) -> watch::Receiver<ColorMap> {
        self.inner.colors.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.session().loaded
    }

    pub fn phase(&self) -> EnginePhase {
        if *self.inner.is_loading.borrow() {
            return EnginePhase::Loading;
        }
        if !self.is_loaded() && self.inner.cache.all_empty() && !self.inner.cache.any_failed() {
            return EnginePhase::Idle;
        }
        if self.inner.cache.any_failed() {
            EnginePhase::PartiallyFailed
        } else {
            EnginePhase::Ready
        }
    }

    /// Every slot is empty after a load: the only case that blocks the whole UI.
    pub fn is_total_failure(&self) -> bool {
        !*self.inner.is_loading.borrow() && self.is_loaded() && self.inner.cache.all_empty()
    }

    pub fn preferences(&self) -> &ConfigPreferences {
        &self.inner.prefs
    }

    // --- Commands ---

    /// Fetch every parameter unless a completed load is still valid.
    pub async fn load(&self) -> LoadOutcome {
        self.load_with(false).await
    }

    /// Fetch every parameter unconditionally.
    pub async fn reload(&self) -> LoadOutcome {
        self.inner.session().loaded = false;
        self.load_with(true).await
    }

    async fn load_with(&self, force: bool) -> LoadOutcome {
        let _guard = self.inner.load_lock.lock().await;
        if self.inner.shutdown.is_cancelled() {
            return LoadOutcome::Cancelled;
        }

        let generation = {
            let session = self.inner.session();
            if !force && session.loaded && self.inner.cache.all_present() {
                debug!("Configuration already loaded, skipping fetch");
                return LoadOutcome::Skipped;
            }
            session.generation
        };

        let token = self.inner.shutdown.child_token();
        *lock(&self.inner.current_load) = Some(token.clone());
        self.inner.is_loading.send_replace(true);
        let _loading = LoadingGuard { inner: &self.inner };
        self.inner.last_error.send_replace(None);

        self.run_load(generation, &token).await
    }

    async fn run_load(&self, generation: u64, token: &CancellationToken) -> LoadOutcome {
        let (api, triple) = match self.connect(generation).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let mut failed = 0;
                for id in self.inner.cache.ids() {
                    if self.inner.commit(generation, id, |slot| slot.fail(e.clone())) {
                        failed += 1;
                    }
                }
                self.inner
                    .notify_error(format!("Failed to load configuration: {}", e));
                return self.finish_load(generation, 0, failed).await;
            }
        };

        info!(
            "Loading {} parameters from space {} container {} version {}",
            self.inner.cache.len(),
            triple.space_id,
            triple.config_container_id,
            triple.version_id
        );

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, String> = HashMap::new();
        for id in self.inner.cache.ids() {
            self.inner.commit(generation, id, |slot| slot.begin_loading());
            let api = api.clone();
            let triple = triple.clone();
            let token = token.clone();
            let parameter_id = id.to_string();
            let handle = tasks.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => None,
                    result = api.fetch_parameter(&triple, &parameter_id) => Some(result),
                }
            });
            pending.insert(handle.id(), id.to_string());
        }

        // Fan-in: every task settles before the loading flag is cleared.
        let (mut succeeded, mut failed) = (0, 0);
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(e) => {
                    let outcome = if e.is_cancelled() {
                        None
                    } else {
                        Some(Err(SyncError::Transport(format!("fetch task aborted: {}", e))))
                    };
                    (e.id(), outcome)
                }
            };
            let Some(id) = pending.remove(&task_id) else {
                continue;
            };

            match result {
                Some(Ok(parameter)) => {
                    if self.inner.commit(generation, &id, |slot| slot.succeed(parameter)) {
                        debug!("Loaded parameter {}", display_name(&id));
                        succeeded += 1;
                    }
                }
                Some(Err(e)) => {
                    if self.inner.commit(generation, &id, |slot| slot.fail(e.clone())) {
                        failed += 1;
                        self.inner
                            .notify_error(format!("Failed to load configuration: {}", e));
                    }
                }
                None => {
                    self.inner.commit(generation, &id, |slot| slot.settle());
                    debug!("Fetch for {} cancelled", display_name(&id));
                }
            }
        }

        self.finish_load(generation, succeeded, failed).await
    }

    async fn finish_load(&self, generation: u64, succeeded: usize, failed: usize) -> LoadOutcome {
        if self.inner.shutdown.is_cancelled() {
            info!("Load cancelled by shutdown");
            return LoadOutcome::Cancelled;
        }
        if !self.inner.is_current(generation) {
            info!("Endpoint changed during load, results discarded");
            return LoadOutcome::Superseded;
        }

        self.refresh_colors().await;

        let mut session = self.inner.session();
        if session.generation != generation {
            return LoadOutcome::Superseded;
        }
        session.loaded = true;
        info!(
            "Configuration load finished: {} succeeded, {} failed",
            succeeded, failed
        );
        LoadOutcome::Completed { succeeded, failed }
    }

    /// Resolve the triple and a client for the current endpoint.
    /// The triple is checked first so an incomplete one never reaches the network.
    async fn connect(
        &self,
        generation: u64,
    ) -> Result<(Arc<dyn ConfigApi>, ConfigTriple), SyncError> {
        let triple = self.inner.prefs.triple().await?;
        triple.ensure_complete()?;

        if let Some(client) = self.inner.session().client.clone() {
            return Ok((client, triple));
        }

        let base_url = self.inner.prefs.base_url().await?;
        if base_url.is_empty() {
            return Err(SyncError::EndpointNotSet);
        }
        let client = self.inner.factory.connect(&base_url)?;

        let mut session = self.inner.session();
        if session.generation == generation {
            session.client = Some(client.clone());
        }
        Ok((client, triple))
    }

    /// Replace `content[0].value` of one parameter on the server, then
    /// re-fetch it and store the server's answer in the slot.
    pub async fn update_parameter(
        &self,
        parameter_id: &str,
        new_value: &str,
    ) -> Result<Parameter, SyncError> {
        self.inner.last_error.send_replace(None);
        self.inner.last_success.send_replace(None);

        let result = tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(SyncError::Cancelled),
            result = self.try_update(parameter_id, new_value) => result,
        };

        match &result {
            Ok(_) => self.inner.notify_success("Parameter updated successfully"),
            Err(SyncError::Cancelled) => debug!("Update of {} cancelled", parameter_id),
            Err(e) => self
                .inner
                .notify_error(format!("Failed to update parameter: {}", e)),
        }
        result
    }

    async fn try_update(&self, parameter_id: &str, new_value: &str) -> Result<Parameter, SyncError> {
        if !self.inner.cache.contains(parameter_id) {
            return Err(SyncError::UnknownParameter(parameter_id.to_string()));
        }
        let current = self
            .inner
            .cache
            .get(parameter_id)
            .and_then(|slot| slot.value)
            .ok_or_else(|| SyncError::NotLoaded(parameter_id.to_string()))?;
        let modified = current.with_value(new_value)?;

        let generation = self.inner.session().generation;
        let (api, triple) = self.connect(generation).await?;

        info!(
            "Updating parameter {} to '{}'",
            display_name(parameter_id),
            new_value
        );
        api.put_parameter(&triple, parameter_id, &modified).await?;

        // The write is not trusted; the slot takes whatever the server now reports.
        match api.fetch_parameter(&triple, parameter_id).await {
            Ok(fresh) => {
                self.inner
                    .commit(generation, parameter_id, |slot| slot.succeed(fresh.clone()));
                Ok(fresh)
            }
            Err(e) => {
                self.inner
                    .commit(generation, parameter_id, |slot| slot.fail(e.clone()));
                Err(e)
            }
        }
    }

    /// Persist a new endpoint and invalidate everything tied to the old one.
    /// Follow with [`SyncEngine::load`].
    pub async fn switch_endpoint(&self, base_url: &str) -> Result<(), SyncError> {
        let base_url = normalize_base_url(base_url)?;
        self.inner.prefs.set_base_url(&base_url).await?;

        {
            let mut session = self.inner.session();
            session.generation += 1;
            session.loaded = false;
            session.client = None;
            self.inner.cache.clear();
        }
        if let Some(token) = lock(&self.inner.current_load).as_ref() {
            token.cancel();
        }
        info!("Switched endpoint to {}", base_url);
        Ok(())
    }

    /// Recompute the print-head color map from the store and publish it.
    pub async fn refresh_colors(&self) -> ColorMap {
        let map = self.inner.resolver.resolve().await;
        self.inner.colors.send_replace(map.clone());
        map
    }

    /// Cancel every outstanding request. Later loads return `Cancelled`.
    pub fn shutdown(&self) {
        info!("Shutting down configuration session");
        self.inner.shutdown.cancel();
    }
}
