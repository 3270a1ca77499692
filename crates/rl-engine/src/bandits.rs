//! Beta-Bernoulli Thompson Sampling engine for picking the best creative
//! among a growing set of items.

use crate::params::BetaParameters;
use crate::registry::{validate_item_key, BanditState};
use bandit_core::{
    BanditError, BanditResult, BatchFailure, Observation, ParameterSnapshot, Probabilities,
    Selection,
};
use parking_lot::Mutex;
use rand::Rng;

/// Thread-safe bandit over one campaign's items.
///
/// Every operation holds the state mutex for its full duration, so readers
/// never see a half-registered item or a half-applied update.
pub struct BanditEngine {
    state: Mutex<BanditState>,
}

impl BanditEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BanditState::new()),
        }
    }

    /// Record `successes` out of `trials` for `item_id`, registering the item
    /// on first sight. Returns the item's index.
    ///
    /// Nothing is mutated unless the whole update is valid.
    pub fn update(&self, item_id: &str, successes: i64, trials: i64) -> BanditResult<usize> {
        let failures = validate_counts(item_id, successes, trials)?;

        let mut state = self.state.lock();
        let idx = state.register_or_get(item_id)?;
        state.increment(idx, successes, failures)?;
        Ok(idx)
    }

    pub fn submit(&self, observation: &Observation) -> BanditResult<usize> {
        self.update(
            &observation.item_id,
            observation.successes,
            observation.trials,
        )
    }

    /// Apply observations in order, stopping at the first invalid one.
    /// Entries applied before the failure are kept.
    pub fn submit_batch(&self, observations: &[Observation]) -> Result<usize, BatchFailure> {
        for (processed, observation) in observations.iter().enumerate() {
            if let Err(error) = self.submit(observation) {
                return Err(BatchFailure { processed, error });
            }
        }
        Ok(observations.len())
    }

    /// One independent Beta draw per registered item, in registration order.
    pub fn sample_probabilities(&self) -> Probabilities {
        self.sample_probabilities_with(&mut rand::thread_rng())
    }

    pub fn sample_probabilities_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Probabilities {
        let state = self.state.lock();
        draw_all(rng, state.iter())
    }

    /// Thompson sampling: draw once from every posterior and return the
    /// arg-max together with the vector it came from.
    pub fn select_best(&self) -> BanditResult<Selection> {
        self.select_best_with(&mut rand::thread_rng())
    }

    pub fn select_best_with<R: Rng + ?Sized>(&self, rng: &mut R) -> BanditResult<Selection> {
        let state = self.state.lock();
        if state.is_empty() {
            return Err(BanditError::NoItemsRegistered);
        }
        pick_best(draw_all(rng, state.iter()))
    }

    /// Thompson sampling restricted to `candidates`.
    ///
    /// Unregistered candidates are drawn from the uniform prior without being
    /// registered. Registered candidates come first in registration order,
    /// then unregistered ones in the order given.
    pub fn select_best_among<S: AsRef<str>>(&self, candidates: &[S]) -> BanditResult<Selection> {
        self.select_best_among_with(&mut rand::thread_rng(), candidates)
    }

    pub fn select_best_among_with<R: Rng + ?Sized, S: AsRef<str>>(
        &self,
        rng: &mut R,
        candidates: &[S],
    ) -> BanditResult<Selection> {
        if candidates.is_empty() {
            return Err(BanditError::NoItemsRegistered);
        }
        for candidate in candidates {
            validate_item_key(candidate.as_ref())?;
        }

        let state = self.state.lock();
        let mut known = vec![false; state.size()];
        let mut unknown: Vec<&str> = Vec::new();
        for candidate in candidates {
            let id = candidate.as_ref();
            match state.index_of(id) {
                Some(idx) => known[idx] = true,
                None if !unknown.contains(&id) => unknown.push(id),
                None => {}
            }
        }

        let prior = BetaParameters::prior();
        let pool = state
            .iter()
            .enumerate()
            .filter(|(idx, _)| known[*idx])
            .map(|(_, entry)| entry)
            .chain(unknown.into_iter().map(|id| (id, &prior)));

        pick_best(draw_all(rng, pool))
    }

    /// Current counts per item, in registration order.
    pub fn dump_parameters(&self) -> Vec<ParameterSnapshot> {
        self.state.lock().snapshot()
    }

    /// Drop every item. Returns how many were cleared.
    pub fn reset(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.size();
        *state = BanditState::new();
        cleared
    }

    pub fn parameters(&self, item_id: &str) -> Option<BetaParameters> {
        let state = self.state.lock();
        state.index_of(item_id).and_then(|idx| state.get(idx))
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.state.lock().contains(item_id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }
}

impl Default for BanditEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Input checks of [`BanditEngine::update`], without touching any state.
/// Returns the failure count.
pub fn validate_observation(observation: &Observation) -> BanditResult<i64> {
    validate_counts(
        &observation.item_id,
        observation.successes,
        observation.trials,
    )
}

fn validate_counts(item_id: &str, successes: i64, trials: i64) -> BanditResult<i64> {
    validate_item_key(item_id)?;
    if successes < 0 {
        return Err(BanditError::invalid_observation(
            item_id,
            format!("successes must be non-negative, got {successes}"),
        ));
    }
    if trials < successes {
        return Err(BanditError::invalid_observation(
            item_id,
            format!("trials ({trials}) must be >= successes ({successes})"),
        ));
    }
    Ok(trials - successes)
}

fn draw_all<'a, R, I>(rng: &mut R, entries: I) -> Probabilities
where
    R: Rng + ?Sized,
    I: Iterator<Item = (&'a str, &'a BetaParameters)>,
{
    let mut probabilities = Probabilities::with_capacity(entries.size_hint().0);
    for (item_id, params) in entries {
        probabilities.push(item_id, params.sample(rng));
    }
    probabilities
}

fn pick_best(probabilities: Probabilities) -> BanditResult<Selection> {
    let selected_item_id = probabilities
        .argmax()
        .and_then(|idx| probabilities.item_at(idx))
        .ok_or(BanditError::NoItemsRegistered)?
        .to_string();

    Ok(Selection {
        selected_item_id,
        probabilities,
    })
}
