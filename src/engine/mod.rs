pub mod cache;
pub mod settings;
pub mod sync;

pub use cache::{ParameterCache, SlotState, SlotStatus};
pub use settings::{SettingsOutcome, SettingsUpdate};
pub use sync::{EnginePhase, LoadOutcome, Notice, SyncEngine};
