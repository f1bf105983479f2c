pub mod colors;
pub mod endpoint;
pub mod language;
pub mod store;

use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::error::SyncError;
use crate::model::known::PRINT_HEAD_COUNT;
use crate::model::ConfigTriple;

pub use colors::{clamp_head, default_color, Argb, ColorMap, PrintHeadColorResolver};
pub use endpoint::normalize_base_url;
pub use language::{Language, AVAILABLE_LANGUAGES};
pub use store::PreferenceStore;

/// Persisted key layout.
pub mod keys {
    pub const BASE_URL: &str = "base_url";
    pub const SPACE_ID: &str = "space_id";
    pub const CONFIG_CONTAINER_ID: &str = "config_container_id";
    pub const VERSION_ID: &str = "version_id";
    pub const SELECTED_LANGUAGE: &str = "selected_language";

    pub fn color_head(head: u8) -> String {
        format!("color_head_{}", head)
    }
}

pub const DEFAULT_SPACE_ID: &str = "proceed-default-no-iam-user";
pub const DEFAULT_CONFIG_CONTAINER_ID: &str = "2a106465-669c-4faa-b15f-4c8c71c82554";
pub const DEFAULT_VERSION_ID: &str = "latest";

/// Typed access to the preference keys the configurator uses.
///
/// Cheap to clone; all clones share the same underlying store.
#[derive(Clone)]
pub struct ConfigPreferences {
    store: PreferenceStore,
}

impl ConfigPreferences {
    pub fn new(store: PreferenceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PreferenceStore {
        &self.store
    }

    async fn get_string(&self, key: &str) -> Result<String, SyncError> {
        let value = self.store.get(key).await.map_err(SyncError::LocalStore)?;
        Ok(value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .unwrap_or_default())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.store
            .set(key, json!(value))
            .await
            .map_err(SyncError::LocalStore)
    }

    /// Persisted endpoint, empty when never set.
    pub async fn base_url(&self) -> Result<String, SyncError> {
        self.get_string(keys::BASE_URL).await
    }

    pub async fn set_base_url(&self, url: &str) -> Result<(), SyncError> {
        info!("Setting base URL: {}", url);
        self.set_string(keys::BASE_URL, url).await
    }

    /// Stream of the persisted endpoint: current value first, then every change.
    pub async fn observe_base_url(&self) -> Result<impl Stream<Item = String>, SyncError> {
        let stream = self
            .store
            .observe(keys::BASE_URL)
            .await
            .map_err(SyncError::LocalStore)?;
        Ok(stream.map(|value| {
            value
                .and_then(|v| v.as_str().map(|s| s.to_string()))
                .unwrap_or_default()
        }))
    }

    pub async fn triple(&self) -> Result<ConfigTriple, SyncError> {
        Ok(ConfigTriple {
            space_id: self.get_string(keys::SPACE_ID).await?,
            config_container_id: self.get_string(keys::CONFIG_CONTAINER_ID).await?,
            version_id: self.get_string(keys::VERSION_ID).await?,
        })
    }

    pub async fn set_triple(&self, triple: &ConfigTriple) -> Result<(), SyncError> {
        self.set_string(keys::SPACE_ID, &triple.space_id).await?;
        self.set_string(keys::CONFIG_CONTAINER_ID, &triple.config_container_id)
            .await?;
        self.set_string(keys::VERSION_ID, &triple.version_id).await
    }

    /// Stored color for `head` (clamped into 1..=5), `None` when never set.
    pub async fn head_color(&self, head: i32) -> Result<Option<Argb>, SyncError> {
        let key = keys::color_head(clamp_head(head));
        match self.store.get(&key).await.map_err(SyncError::LocalStore)? {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(|v| Some(Argb(v)))
                .ok_or_else(|| {
                    SyncError::LocalStore(format!("'{}' does not hold a color: {}", key, value))
                }),
        }
    }

    pub async fn set_head_color(&self, head: i32, color: Argb) -> Result<(), SyncError> {
        let head = clamp_head(head);
        info!("Setting print head {} color to {}", head, color);
        self.store
            .set(&keys::color_head(head), json!(color.0))
            .await
            .map_err(SyncError::LocalStore)
    }

    /// Selected UI language code, `en` when never set.
    pub async fn language(&self) -> Result<String, SyncError> {
        let code = self.get_string(keys::SELECTED_LANGUAGE).await?;
        if code.is_empty() {
            Ok(language::ENGLISH.to_string())
        } else {
            Ok(code)
        }
    }

    pub async fn set_language(&self, code: &str) -> Result<(), SyncError> {
        if !language::is_supported(code) {
            return Err(SyncError::InvalidPreference(format!(
                "unsupported language '{}'",
                code
            )));
        }
        info!("Setting language to: {}", code);
        self.set_string(keys::SELECTED_LANGUAGE, code).await
    }

    /// First-run seeding of head colors and the configuration triple.
    /// Only absent keys are written. Returns how many keys were seeded.
    pub async fn seed_defaults(&self) -> Result<usize, SyncError> {
        let mut seeds: Vec<(String, Value)> = (1..=PRINT_HEAD_COUNT)
            .map(|h| (keys::color_head(h), json!(default_color(h).0)))
            .collect();
        seeds.push((keys::SPACE_ID.to_string(), json!(DEFAULT_SPACE_ID)));
        seeds.push((
            keys::CONFIG_CONTAINER_ID.to_string(),
            json!(DEFAULT_CONFIG_CONTAINER_ID),
        ));
        seeds.push((keys::VERSION_ID.to_string(), json!(DEFAULT_VERSION_ID)));

        let mut seeded = 0;
        for (key, value) in seeds {
            if self
                .store
                .set_if_absent(&key, value)
                .await
                .map_err(SyncError::LocalStore)?
            {
                seeded += 1;
            }
        }
        if seeded > 0 {
            info!("Seeded {} default preferences", seeded);
        }
        Ok(seeded)
    }
}
