#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use coinconf::{
    ClientFactory, ConfigApi, ConfigPreferences, ConfigTriple, Parameter, ParameterContent,
    PreferenceStore, SyncEngine, SyncError,
};

pub const BASE_URL: &str = "https://one.example/";

pub fn param(id: &str, value: &str) -> Parameter {
    Parameter {
        id: id.to_string(),
        key: format!("key-{}", id),
        kind: "string".to_string(),
        content: vec![ParameterContent {
            unit: "mm".to_string(),
            value: value.to_string(),
            language: "en".to_string(),
            display_name: id.to_string(),
        }],
        parent_id: Some("root".to_string()),
        parameters: Default::default(),
        parent_type: Some("group".to_string()),
        linked_parameters: vec![],
    }
}

/// Scripted in-memory configuration service.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<String, Result<Parameter, SyncError>>>,
    put_error: Mutex<Option<SyncError>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    puts: Mutex<Vec<(String, Parameter)>>,
    pub fetch_calls: AtomicUsize,
    pub fetch_completed: AtomicUsize,
    pub put_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, id: &str, result: Result<Parameter, SyncError>) {
        self.responses.lock().unwrap().insert(id.to_string(), result);
    }

    pub fn respond_ok(&self, id: &str, value: &str) {
        self.respond(id, Ok(param(id, value)));
    }

    pub fn fail_puts(&self, error: SyncError) {
        *self.put_error.lock().unwrap() = Some(error);
    }

    /// Hold fetches of `id` until the returned handle is notified.
    pub fn gate(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(id.to_string(), gate.clone());
        gate
    }

    pub fn puts(&self) -> Vec<(String, Parameter)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.fetch_completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigApi for FakeApi {
    async fn fetch_parameter(
        &self,
        _triple: &ConfigTriple,
        parameter_id: &str,
    ) -> Result<Parameter, SyncError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(parameter_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let result = self
            .responses
            .lock()
            .unwrap()
            .get(parameter_id)
            .cloned()
            .unwrap_or(Err(SyncError::NotFound));
        self.fetch_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn put_parameter(
        &self,
        _triple: &ConfigTriple,
        parameter_id: &str,
        parameter: &Parameter,
    ) -> Result<(), SyncError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.put_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.puts
            .lock()
            .unwrap()
            .push((parameter_id.to_string(), parameter.clone()));
        Ok(())
    }
}

/// Hands out a fake service per base URL and records every connect.
#[derive(Default)]
pub struct FakeFactory {
    apis: Mutex<HashMap<String, Arc<FakeApi>>>,
    connects: Mutex<Vec<String>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, base_url: &str, api: Arc<FakeApi>) {
        self.apis.lock().unwrap().insert(base_url.to_string(), api);
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeFactory {
    fn connect(&self, base_url: &str) -> Result<Arc<dyn ConfigApi>, SyncError> {
        self.connects.lock().unwrap().push(base_url.to_string());
        let api = self
            .apis
            .lock()
            .unwrap()
            .get(base_url)
            .cloned()
            .ok_or_else(|| SyncError::Transport(format!("no fake for {}", base_url)))?;
        Ok(api)
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub api: Arc<FakeApi>,
    pub factory: Arc<FakeFactory>,
    pub prefs: ConfigPreferences,
}

/// Engine over `ids` with triple (space1, cfg1, v1) and one fake endpoint.
pub async fn harness(ids: &[&str]) -> Harness {
    let prefs = ConfigPreferences::new(PreferenceStore::open_in_memory().unwrap());
    prefs
        .set_triple(&ConfigTriple::new("space1", "cfg1", "v1"))
        .await
        .unwrap();
    prefs.set_base_url(BASE_URL).await.unwrap();

    let api = FakeApi::new();
    let factory = FakeFactory::new();
    factory.register(BASE_URL, api.clone());

    let engine = SyncEngine::with_parameters(
        prefs.clone(),
        factory.clone(),
        ids.iter().map(|id| id.to_string()),
    );
    Harness {
        engine,
        api,
        factory,
        prefs,
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
