use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ConfigPreferences;
use crate::error::SyncError;
use crate::model::known::PRINT_HEAD_COUNT;

/// Packed 0xAARRGGBB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argb(pub u32);

impl Argb {
    pub const RED: Argb = Argb(0xFFFF0000);
    pub const GREEN: Argb = Argb(0xFF00FF00);
    pub const BLUE: Argb = Argb(0xFF0000FF);
    pub const YELLOW: Argb = Argb(0xFFFFFF00);
    pub const CYAN: Argb = Argb(0xFF00FFFF);

    /// Parse six hex digits (`RRGGBB`, optional leading `#`). Alpha is forced opaque.
    pub fn from_hex(hex: &str) -> Result<Self, SyncError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(SyncError::InvalidPreference(format!(
                "color must be 6 hex digits, got '{}'",
                hex
            )));
        }
        let rgb = u32::from_str_radix(digits, 16).map_err(|_| {
            SyncError::InvalidPreference(format!("invalid color format '{}'", hex))
        })?;
        Ok(Argb(0xFF00_0000 | rgb))
    }

    /// `RRGGBB`, uppercase, alpha dropped.
    pub fn to_hex(self) -> String {
        format!("{:06X}", self.0 & 0x00FF_FFFF)
    }
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Clamp a print-head index into `1..=5`.
///
/// Out-of-range input is forgiven rather than rejected.
// TODO: confirm with product whether out-of-range heads should be an error.
pub fn clamp_head(head: i32) -> u8 {
    head.clamp(1, PRINT_HEAD_COUNT as i32) as u8
}

/// Built-in color for a head: red, green, blue, yellow, cyan for 1..=5.
pub fn default_color(head: u8) -> Argb {
    match clamp_head(head as i32) {
        1 => Argb::RED,
        2 => Argb::GREEN,
        3 => Argb::BLUE,
        4 => Argb::YELLOW,
        _ => Argb::CYAN,
    }
}

/// Head index to color, always with exactly five entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorMap {
    colors: BTreeMap<u8, Argb>,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            colors: (1..=PRINT_HEAD_COUNT).map(|h| (h, default_color(h))).collect(),
        }
    }
}

impl ColorMap {
    /// Color for `head`, clamped into range.
    pub fn color_for(&self, head: i32) -> Argb {
        let head = clamp_head(head);
        self.colors
            .get(&head)
            .copied()
            .unwrap_or_else(|| default_color(head))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, Argb)> + '_ {
        self.colors.iter().map(|(h, c)| (*h, *c))
    }
}

/// Derives the print-head [`ColorMap`] from the preference store on demand.
///
/// Not reactive: the map is a manually invalidated cache, recomputed only
/// when a caller asks for it.
#[derive(Clone)]
pub struct PrintHeadColorResolver {
    prefs: ConfigPreferences,
}

impl PrintHeadColorResolver {
    pub fn new(prefs: ConfigPreferences) -> Self {
        Self { prefs }
    }

    /// Read all five slots, substituting the built-in default for absent or
    /// unreadable ones.
    pub async fn resolve(&self) -> ColorMap {
        let mut colors = BTreeMap::new();
        for head in 1..=PRINT_HEAD_COUNT {
            let color = match self.prefs.head_color(head as i32).await {
                Ok(Some(color)) => color,
                Ok(None) => default_color(head),
                Err(e) => {
                    warn!("Failed to read color for print head {}: {}", head, e);
                    default_color(head)
                }
            };
            colors.insert(head, color);
        }
        debug!("Resolved print head colors");
        ColorMap { colors }
    }
}
