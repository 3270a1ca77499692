//! Beta-Bernoulli posterior for a single item.

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

const PRIOR_ALPHA: f64 = 1.0;
const PRIOR_BETA: f64 = 1.0;

/// Posterior over an item's success probability, held as exact observation
/// counts. The Beta shapes are `alpha = 1 + successes`, `beta = 1 + failures`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaParameters {
    successes: u64,
    failures: u64,
}

impl BetaParameters {
    /// Uniform, minimally informative prior Beta(1, 1).
    pub fn prior() -> Self {
        Self {
            successes: 0,
            failures: 0,
        }
    }

    pub fn alpha(&self) -> f64 {
        PRIOR_ALPHA + self.successes as f64
    }

    pub fn beta(&self) -> f64 {
        PRIOR_BETA + self.failures as f64
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn trials(&self) -> u64 {
        self.successes + self.failures
    }

    /// Posterior mean `alpha / (alpha + beta)`.
    pub fn mean(&self) -> f64 {
        self.alpha() / (self.alpha() + self.beta())
    }

    /// Conjugate update. Returns `false`, leaving the counts untouched, if any
    /// cumulative count would overflow `u64`.
    pub(crate) fn add(&mut self, successes: u64, failures: u64) -> bool {
        let next = self
            .successes
            .checked_add(successes)
            .zip(self.failures.checked_add(failures));
        match next {
            Some((s, f)) if s.checked_add(f).is_some() => {
                self.successes = s;
                self.failures = f;
                true
            }
            _ => false,
        }
    }

    /// One Thompson draw: `Ga / (Ga + Gb)` with `Ga ~ Gamma(alpha, 1)` and
    /// `Gb ~ Gamma(beta, 1)`, which handles non-integer shapes.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let ga = gamma_draw(rng, self.alpha());
        let gb = gamma_draw(rng, self.beta());
        match (ga, gb) {
            (Some(ga), Some(gb)) if ga + gb > 0.0 => (ga / (ga + gb)).clamp(0.0, 1.0),
            // Both draws underflowed; fall back to the mean.
            _ => self.mean(),
        }
    }
}

impl Default for BetaParameters {
    fn default() -> Self {
        Self::prior()
    }
}

fn gamma_draw<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> Option<f64> {
    Gamma::new(shape, 1.0).ok().map(|g| g.sample(rng))
}
