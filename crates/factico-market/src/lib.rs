//! Market intelligence agent for Factico prediction markets.
//!
//! Seeds fresh markets tied to claims, maintains lightweight tier-1
//! sentiment/news aggregates, and runs tier-2 deep reassessments with
//! bounded adjustment trades. Every trade is attributed to the reserved
//! system actor and settles as a balance-checked debit against the
//! actor's credit account, recorded append-only.

pub mod agent;
pub mod error;
pub mod pricing;

pub use agent::{MarketAgent, MarketAgentConfig};
pub use error::MarketError;
pub use pricing::{move_toward, side_for};
