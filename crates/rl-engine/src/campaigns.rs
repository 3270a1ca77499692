//! Independent bandit engines keyed by campaign id.

use crate::bandits::{validate_observation, BanditEngine};
use bandit_core::{BanditError, BanditResult, BatchFailure, Observation};
use dashmap::DashMap;
use std::sync::Arc;

/// One [`BanditEngine`] per campaign, created on first write. Campaigns
/// share no state.
pub struct CampaignBandits {
    engines: DashMap<String, Arc<BanditEngine>>,
}

impl CampaignBandits {
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, campaign_id: &str) -> BanditResult<Arc<BanditEngine>> {
        validate_campaign_id(campaign_id)?;
        let engine = self
            .engines
            .entry(campaign_id.to_string())
            .or_insert_with(|| Arc::new(BanditEngine::new()));
        Ok(engine.value().clone())
    }

    /// Apply a batch to `campaign_id`, fail-fast. An unknown campaign is only
    /// created when the first observation is valid, so a fully rejected or
    /// empty batch leaves no campaign behind.
    pub fn submit_batch(
        &self,
        campaign_id: &str,
        observations: &[Observation],
    ) -> Result<usize, BatchFailure> {
        let rejected = |error| BatchFailure {
            processed: 0,
            error,
        };

        validate_campaign_id(campaign_id).map_err(rejected)?;
        let engine = match self.get(campaign_id) {
            Some(engine) => engine,
            None => {
                let Some(first) = observations.first() else {
                    return Ok(0);
                };
                validate_observation(first).map_err(rejected)?;
                self.get_or_create(campaign_id).map_err(rejected)?
            }
        };
        engine.submit_batch(observations)
    }

    pub fn get(&self, campaign_id: &str) -> Option<Arc<BanditEngine>> {
        self.engines.get(campaign_id).map(|e| e.value().clone())
    }

    pub fn campaign_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

fn validate_campaign_id(campaign_id: &str) -> BanditResult<()> {
    if campaign_id.is_empty() {
        return Err(BanditError::InvalidItemKey(
            "campaign id must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl Default for CampaignBandits {
    fn default() -> Self {
        Self::new()
    }
}
