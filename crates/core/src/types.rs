use serde::{Deserialize, Serialize, Serializer};

/// A validated observation for one item: `successes` out of `trials`.
///
/// Counts are signed so that negative values coming from a host can reach the
/// engine and be rejected as `InvalidObservation` instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub item_id: String,
    pub successes: i64,
    pub trials: i64,
}

impl Observation {
    pub fn new(item_id: impl Into<String>, successes: i64, trials: i64) -> Self {
        Self {
            item_id: item_id.into(),
            successes,
            trials,
        }
    }
}

/// Introspection record for one item, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub item_id: String,
    pub successes: u64,
    pub failures: u64,
    pub trials: u64,
}

/// Sampled success probabilities, kept in sampling order.
///
/// Serializes as a JSON object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Probabilities(Vec<(String, f64)>);

impl Probabilities {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, item_id: impl Into<String>, probability: f64) {
        self.0.push((item_id.into(), probability));
    }

    pub fn get(&self, item_id: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(id, _)| id == item_id)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(id, p)| (id.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the largest probability. Exact ties resolve to the
    /// earliest entry.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, (_, p)) in self.0.iter().enumerate() {
            match best {
                Some((_, best_p)) if *p <= best_p => {}
                _ => best = Some((idx, *p)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn item_at(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(|(id, _)| id.as_str())
    }
}

impl Serialize for Probabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(id, p)| (id, p)))
    }
}

/// Outcome of one Thompson sampling pass: the winner and the full vector it
/// was chosen from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub selected_item_id: String,
    pub probabilities: Probabilities,
}
