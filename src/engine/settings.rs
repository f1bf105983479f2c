use serde::Serialize;
use tracing::info;

use super::sync::{LoadOutcome, SyncEngine};
use crate::error::SyncError;
use crate::prefs::{language, normalize_base_url, Argb};

/// A batch of preference edits, applied all-or-nothing with respect to
/// validation.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub base_url: Option<String>,
    /// Print head (clamped into 1..=5) and `RRGGBB` hex color.
    pub head_colors: Vec<(i32, String)>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsOutcome {
    pub endpoint_changed: bool,
    pub language_changed: bool,
    /// Present when the endpoint changed and parameters were reloaded.
    pub reload: Option<LoadOutcome>,
}

impl SyncEngine {
    /// Validate every field, persist, refresh the color map, and switch
    /// endpoint plus reload when the base URL changed.
    ///
    /// Nothing is written if any field is invalid.
    pub async fn apply_settings(&self, update: SettingsUpdate) -> Result<SettingsOutcome, SyncError> {
        let base_url = update
            .base_url
            .as_deref()
            .map(normalize_base_url)
            .transpose()?;
        let colors = update
            .head_colors
            .iter()
            .map(|(head, hex)| Argb::from_hex(hex).map(|color| (*head, color)))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(code) = update.language.as_deref() {
            if !language::is_supported(code) {
                return Err(SyncError::InvalidPreference(format!(
                    "unsupported language '{}'",
                    code
                )));
            }
        }

        let prefs = self.preferences();
        for (head, color) in colors {
            prefs.set_head_color(head, color).await?;
        }
        self.refresh_colors().await;

        let mut language_changed = false;
        if let Some(code) = update.language.as_deref() {
            if prefs.language().await? != code {
                prefs.set_language(code).await?;
                language_changed = true;
            }
        }

        let current_url = prefs.base_url().await?;
        let (endpoint_changed, reload) = match base_url {
            Some(url) if url != current_url => {
                self.switch_endpoint(&url).await?;
                (true, Some(self.reload().await))
            }
            _ => (false, None),
        };

        info!(
            "Applied settings (endpoint changed: {}, language changed: {})",
            endpoint_changed, language_changed
        );
        Ok(SettingsOutcome {
            endpoint_changed,
            language_changed,
            reload,
        })
    }
}
