//! Retrieval-augmented verification context builder for Factico.
//!
//! For each extracted claim this crate assembles everything the
//! verification orchestrator needs: similar prior claims (embedding
//! similarity with a trigram fallback), candidate evidence URLs from web
//! search, fetched and text-extracted evidence documents with credibility
//! tiers, and pre-extracted entity hints.
//!
//! Evidence fetches are memoized by URL for 24 hours in a bounded
//! TTL + LRU cache, gated per host, and capped by a per-claim budget.
//! Blacklisted domains never reach the context; tiers otherwise only bias
//! ordering and weighting.

pub mod builder;
pub mod cache;
pub mod credibility;
pub mod error;
pub mod fetch;
pub mod search;

pub use builder::{order_evidence, ContextBuilder, DEFAULT_DEDUP_THRESHOLD};
pub use cache::TtlCache;
pub use credibility::{domain_of, CredibilityMap};
pub use error::RagError;
pub use fetch::{EvidenceFetcher, FetchConfig, FetchedDoc};
pub use search::{derive_query, SearchConfig, SearchHit, WebSearchClient};
