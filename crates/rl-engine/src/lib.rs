//! Bandit decision engine: Beta-Bernoulli posteriors per item, Thompson
//! Sampling selection, and per-campaign engine instances.

pub mod bandits;
pub mod campaigns;
pub mod params;
pub mod registry;

pub use bandits::BanditEngine;
pub use campaigns::CampaignBandits;
pub use params::BetaParameters;
pub use registry::BanditState;
