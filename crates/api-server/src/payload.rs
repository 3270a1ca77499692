//! Wire payloads for observation updates and their conversion into
//! [`Observation`] records.
//!
//! An update body is either one entry or a list of entries, each keyed by
//! item id:
//!
//! ```json
//! [{"game_key_1": {"number_successes": 50, "number_trials": 400}},
//!  {"game_key_2": {"number_successes": 30, "number_failures": 3}}]
//! ```

use bandit_core::{BanditError, Observation};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdatePayload {
    Batch(Vec<PayloadEntry>),
    Single(PayloadEntry),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationCounts {
    pub number_successes: i64,
    #[serde(default)]
    pub number_trials: Option<i64>,
    #[serde(default)]
    pub number_failures: Option<i64>,
}

/// Optional body of a selection request restricting the candidate items.
#[derive(Debug, Default, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub items: Option<Vec<String>>,
}

/// One payload entry: a JSON object with exactly one item id key. Count
/// validation happens later, in order, so that a bad entry stops the batch
/// at its position.
#[derive(Debug, Clone)]
pub struct PayloadEntry {
    pub item_id: String,
    pub counts: ObservationCounts,
}

impl<'de> Deserialize<'de> for PayloadEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PayloadEntryVisitor)
    }
}

struct PayloadEntryVisitor;

impl<'de> Visitor<'de> for PayloadEntryVisitor {
    type Value = PayloadEntry;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object with exactly one item id")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let (item_id, counts) = map
            .next_entry::<String, ObservationCounts>()?
            .ok_or_else(|| de::Error::custom("entry has no item id"))?;

        // A second key, even a repeat of the first, would otherwise replace
        // one observation with another.
        if let Some(extra) = map.next_key::<String>()? {
            return Err(de::Error::custom(format!(
                "entry must contain exactly one item id, found '{item_id}' and '{extra}'"
            )));
        }

        Ok(PayloadEntry { item_id, counts })
    }
}

impl UpdatePayload {
    /// Flatten into ordered entries, rejecting payloads that cannot be
    /// applied at all.
    pub fn into_entries(
        self,
        max_batch_size: usize,
        max_item_id_len: usize,
    ) -> Result<Vec<PayloadEntry>, String> {
        let entries = match self {
            UpdatePayload::Batch(list) => list,
            UpdatePayload::Single(entry) => vec![entry],
        };

        if entries.len() > max_batch_size {
            return Err(format!(
                "batch of {} observations exceeds maximum of {}",
                entries.len(),
                max_batch_size
            ));
        }

        if let Some(pos) = entries
            .iter()
            .position(|e| e.item_id.len() > max_item_id_len)
        {
            return Err(format!("entry {pos}: item id exceeds maximum length"));
        }

        Ok(entries)
    }
}

impl PayloadEntry {
    /// Resolve the trial count. `number_trials` wins when present; otherwise
    /// it is `number_successes + number_failures`. When both are given they
    /// must agree.
    pub fn to_observation(&self) -> Result<Observation, BanditError> {
        let c = &self.counts;
        let trials = match (c.number_trials, c.number_failures) {
            (Some(trials), None) => trials,
            (None, Some(failures)) => c.number_successes.checked_add(failures).ok_or_else(|| {
                BanditError::invalid_observation(&self.item_id, "trial count overflows")
            })?,
            (Some(trials), Some(failures)) => {
                if c.number_successes.checked_add(failures) != Some(trials) {
                    return Err(BanditError::invalid_observation(
                        &self.item_id,
                        format!(
                            "number_trials ({trials}) != number_successes + number_failures ({} + {failures})",
                            c.number_successes
                        ),
                    ));
                }
                trials
            }
            (None, None) => {
                return Err(BanditError::invalid_observation(
                    &self.item_id,
                    "either number_trials or number_failures is required",
                ))
            }
        };
        Ok(Observation::new(self.item_id.clone(), c.number_successes, trials))
    }
}
