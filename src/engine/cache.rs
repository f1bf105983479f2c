use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::SyncError;
use crate::model::Parameter;

/// Load state of one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    #[default]
    Unset,
    Loading,
    Ready,
    Failed,
}

/// Observable contents of one slot.
///
/// A failed refresh keeps the previous `value` and sets `error` next to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotState {
    pub value: Option<Parameter>,
    pub error: Option<SyncError>,
    pub status: SlotStatus,
}

impl SlotState {
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub(crate) fn begin_loading(&mut self) {
        self.status = SlotStatus::Loading;
    }

    pub(crate) fn succeed(&mut self, parameter: Parameter) {
        self.value = Some(parameter);
        self.error = None;
        self.status = SlotStatus::Ready;
    }

    pub(crate) fn fail(&mut self, error: SyncError) {
        self.error = Some(error);
        self.status = SlotStatus::Failed;
    }

    /// Leave `Loading` without recording anything (cancelled fetch).
    pub(crate) fn settle(&mut self) {
        self.status = if self.error.is_some() {
            SlotStatus::Failed
        } else if self.value.is_some() {
            SlotStatus::Ready
        } else {
            SlotStatus::Unset
        };
    }
}

/// Fixed set of independently observable parameter slots.
pub struct ParameterCache {
    slots: BTreeMap<String, watch::Sender<SlotState>>,
}

impl ParameterCache {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = ids
            .into_iter()
            .map(|id| (id.into(), watch::channel(SlotState::default()).0))
            .collect();
        Self { slots }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.keys().map(|k| k.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn subscribe(&self, id: &str) -> Option<watch::Receiver<SlotState>> {
        self.slots.get(id).map(|tx| tx.subscribe())
    }

    pub fn get(&self, id: &str) -> Option<SlotState> {
        self.slots.get(id).map(|tx| tx.borrow().clone())
    }

    /// Apply `update` to one slot and notify its observers.
    /// Returns false for an unknown identifier.
    pub(crate) fn modify(&self, id: &str, update: impl FnOnce(&mut SlotState)) -> bool {
        match self.slots.get(id) {
            Some(tx) => {
                tx.send_modify(update);
                true
            }
            None => false,
        }
    }

    /// Reset every slot to unset.
    pub(crate) fn clear(&self) {
        for tx in self.slots.values() {
            tx.send_replace(SlotState::default());
        }
    }

    /// Settle every slot still marked `Loading`. Returns how many were touched.
    pub(crate) fn settle_loading(&self) -> usize {
        let mut settled = 0;
        for tx in self.slots.values() {
            tx.send_if_modified(|slot| {
                if slot.status != SlotStatus::Loading {
                    return false;
                }
                slot.settle();
                settled += 1;
                true
            });
        }
        settled
    }

    /// Every slot holds a value.
    pub fn all_present(&self) -> bool {
        self.slots.values().all(|tx| !tx.borrow().is_empty())
    }

    /// No slot holds a value.
    pub fn all_empty(&self) -> bool {
        self.slots.values().all(|tx| tx.borrow().is_empty())
    }

    pub fn any_failed(&self) -> bool {
        self.slots.values().any(|tx| tx.borrow().error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterContent;

    fn param(id: &str, value: &str) -> Parameter {
        Parameter {
            id: id.to_string(),
            key: id.to_string(),
            kind: "string".to_string(),
            content: vec![ParameterContent {
                unit: String::new(),
                value: value.to_string(),
                language: "en".to_string(),
                display_name: id.to_string(),
            }],
            parent_id: None,
            parameters: Default::default(),
            parent_type: None,
            linked_parameters: vec![],
        }
    }

    #[test]
    fn test_new_cache_is_unset() {
        let cache = ParameterCache::new(["a", "b"]);
        assert_eq!(cache.len(), 2);
        assert!(cache.all_empty());
        assert!(!cache.all_present());
        assert_eq!(cache.get("a").unwrap().status, SlotStatus::Unset);
        assert!(cache.get("zzz").is_none());
    }

    #[test]
    fn test_failure_keeps_stale_value() {
        let cache = ParameterCache::new(["a"]);
        cache.modify("a", |s| s.succeed(param("a", "1")));
        cache.modify("a", |s| s.fail(SyncError::NotFound));

        let state = cache.get("a").unwrap();
        assert_eq!(state.value, Some(param("a", "1")));
        assert_eq!(state.error, Some(SyncError::NotFound));
        assert_eq!(state.status, SlotStatus::Failed);
    }

    #[test]
    fn test_success_clears_error() {
        let cache = ParameterCache::new(["a"]);
        cache.modify("a", |s| s.fail(SyncError::NotFound));
        cache.modify("a", |s| s.succeed(param("a", "2")));
        let state = cache.get("a").unwrap();
        assert!(state.error.is_none());
        assert_eq!(state.status, SlotStatus::Ready);
    }

    #[test]
    fn test_slots_are_independent() {
        let cache = ParameterCache::new(["a", "b"]);
        let rx_b = cache.subscribe("b").unwrap();
        cache.modify("a", |s| s.fail(SyncError::NotFound));
        assert!(!rx_b.has_changed().unwrap());
        assert_eq!(cache.get("b").unwrap(), SlotState::default());
    }

    #[test]
    fn test_settle_restores_status() {
        let cache = ParameterCache::new(["a", "b"]);
        cache.modify("a", |s| s.succeed(param("a", "1")));
        cache.modify("a", |s| s.begin_loading());
        cache.modify("a", |s| s.settle());
        cache.modify("b", |s| s.begin_loading());
        cache.modify("b", |s| s.settle());
        assert_eq!(cache.get("a").unwrap().status, SlotStatus::Ready);
        assert_eq!(cache.get("b").unwrap().status, SlotStatus::Unset);
    }

    #[test]
    fn test_settle_loading_only_touches_loading_slots() {
        let cache = ParameterCache::new(["a", "b", "c"]);
        cache.modify("a", |s| s.succeed(param("a", "1")));
        cache.modify("a", |s| s.begin_loading());
        cache.modify("b", |s| s.begin_loading());
        cache.modify("c", |s| s.fail(SyncError::NotFound));
        let rx_c = cache.subscribe("c").unwrap();

        assert_eq!(cache.settle_loading(), 2);
        assert_eq!(cache.get("a").unwrap().status, SlotStatus::Ready);
        assert_eq!(cache.get("b").unwrap().status, SlotStatus::Unset);
        assert_eq!(cache.get("c").unwrap().status, SlotStatus::Failed);
        assert!(!rx_c.has_changed().unwrap());
        assert!(cache.contains("a"));
        assert!(!cache.contains("zzz"));
    }

    #[test]
    fn test_clear_and_unknown_ids() {
        let cache = ParameterCache::new(["a"]);
        cache.modify("a", |s| s.succeed(param("a", "1")));
        assert!(cache.all_present());
        assert!(!cache.modify("nope", |s| s.fail(SyncError::NotFound)));
        cache.clear();
        assert!(cache.all_empty());
        assert!(!cache.any_failed());
    }
}
