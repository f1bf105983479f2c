pub mod engine;
pub mod error;
pub mod model;
pub mod prefs;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

pub use engine::{
    EnginePhase, LoadOutcome, Notice, SettingsOutcome, SettingsUpdate, SlotState, SlotStatus,
    SyncEngine,
};
pub use error::SyncError;
pub use model::{ConfigTriple, KnownParameter, Parameter, ParameterContent};
pub use prefs::{Argb, ColorMap, ConfigPreferences, PreferenceStore};
pub use remote::{ClientConfig, ClientFactory, ConfigApi, HttpClientFactory};

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Platform data directory for the preference database.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("coinconf"))
}

/// Composition root: owns the preference store and the engine built on it.
pub struct Configurator {
    prefs: ConfigPreferences,
    engine: SyncEngine,
}

impl Configurator {
    /// Open the store under `data_dir`, seed first-run defaults and build
    /// the engine against the HTTP client.
    pub async fn open(data_dir: &Path, client: ClientConfig) -> Result<Self> {
        let store = PreferenceStore::open(&data_dir.join("preferences.db"))
            .map_err(|e| anyhow!(e))
            .context("Failed to open preference store")?;
        let prefs = ConfigPreferences::new(store);
        prefs
            .seed_defaults()
            .await
            .context("Failed to seed default preferences")?;

        let factory = HttpClientFactory::new(&client)?;
        let engine = SyncEngine::new(prefs.clone(), Arc::new(factory));
        engine.refresh_colors().await;

        info!("Configurator ready (data dir {:?})", data_dir);
        Ok(Self { prefs, engine })
    }

    /// [`Configurator::open`] in the platform data directory.
    pub async fn open_default() -> Result<Self> {
        let dir = default_data_dir().ok_or_else(|| anyhow!("No data directory available"))?;
        Self::open(&dir, ClientConfig::default()).await
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn preferences(&self) -> &ConfigPreferences {
        &self.prefs
    }

    /// No endpoint has been entered yet; the UI must ask for one before loading.
    pub async fn needs_endpoint(&self) -> Result<bool> {
        Ok(self.prefs.base_url().await?.is_empty())
    }
}
