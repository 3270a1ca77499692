//! Bandit state: the item registry and the Beta parameter store, held as one
//! ordered list of `(item id, parameters)` entries plus a lookup index.

use crate::params::BetaParameters;
use bandit_core::{BanditError, BanditResult, ParameterSnapshot};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct ItemEntry {
    item_id: String,
    params: BetaParameters,
}

/// Registered items in registration order. An item's index is its position
/// in `entries` and never changes once assigned.
#[derive(Debug, Clone, Default)]
pub struct BanditState {
    entries: Vec<ItemEntry>,
    index: HashMap<String, usize>,
}

// ─── Item registry ──────────────────────────────────────────────────────

impl BanditState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `item_id`, registering it with a fresh prior if unseen.
    pub fn register_or_get(&mut self, item_id: &str) -> BanditResult<usize> {
        validate_item_key(item_id)?;

        if let Some(&idx) = self.index.get(item_id) {
            return Ok(idx);
        }

        let idx = self.entries.len();
        self.entries.push(ItemEntry {
            item_id: item_id.to_string(),
            params: BetaParameters::prior(),
        });
        self.index.insert(item_id.to_string(), idx);
        Ok(idx)
    }

    pub fn index_of(&self, item_id: &str) -> Option<usize> {
        self.index.get(item_id).copied()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.index.contains_key(item_id)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn item_id(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.item_id.as_str())
    }

    /// `(item id, parameters)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BetaParameters)> {
        self.entries.iter().map(|e| (e.item_id.as_str(), &e.params))
    }
}

// ─── Beta parameter store ───────────────────────────────────────────────

impl BanditState {
    pub fn get(&self, index: usize) -> Option<BetaParameters> {
        self.entries.get(index).map(|e| e.params)
    }

    /// Add observed successes and failures to the item at `index`.
    /// Negative counts are rejected without touching the parameters.
    pub fn increment(&mut self, index: usize, successes: i64, failures: i64) -> BanditResult<()> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| BanditError::InvalidItemKey(format!("unknown item index {index}")))?;

        if successes < 0 {
            return Err(BanditError::invalid_observation(
                &entry.item_id,
                format!("successes must be non-negative, got {successes}"),
            ));
        }
        if failures < 0 {
            return Err(BanditError::invalid_observation(
                &entry.item_id,
                format!("failures must be non-negative, got {failures}"),
            ));
        }

        if !entry.params.add(successes as u64, failures as u64) {
            return Err(BanditError::invalid_observation(
                &entry.item_id,
                "cumulative counts overflow",
            ));
        }
        Ok(())
    }

    pub fn successes(&self, index: usize) -> Option<u64> {
        self.get(index).map(|p| p.successes())
    }

    pub fn failures(&self, index: usize) -> Option<u64> {
        self.get(index).map(|p| p.failures())
    }

    pub fn trials(&self, index: usize) -> Option<u64> {
        self.get(index).map(|p| p.trials())
    }

    pub fn snapshot(&self) -> Vec<ParameterSnapshot> {
        self.iter()
            .map(|(item_id, p)| ParameterSnapshot {
                item_id: item_id.to_string(),
                successes: p.successes(),
                failures: p.failures(),
                trials: p.trials(),
            })
            .collect()
    }
}

pub(crate) fn validate_item_key(item_id: &str) -> BanditResult<()> {
    if item_id.is_empty() {
        return Err(BanditError::InvalidItemKey(
            "item id must not be empty".to_string(),
        ));
    }
    Ok(())
}
