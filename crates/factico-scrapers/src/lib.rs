//! Platform scraper adapters and the scrape driver for Factico.
//!
//! Four adapters (short-post social, news RSS, video transcripts,
//! community forum) produce one normalized boundary type,
//! [`factico_types::Source`]. The driver runs enabled adapters in
//! parallel under a concurrency bound and per-adapter token-bucket rate
//! limits; duplicate sources are discarded later at the insert boundary.
//!
//! # Modules
//!
//! - [`social`], [`rss`], [`video`], [`forum`] -- per-platform adapters
//! - [`normalize`] -- raw item to `Source` normalization rules
//! - [`rate`] -- token buckets keyed by adapter
//! - [`driver`] -- the parallel scrape driver

pub mod driver;
pub mod error;
pub mod forum;
pub mod normalize;
pub mod rate;
pub mod rss;
pub mod social;
pub mod video;

pub use driver::{AdapterFailure, ScrapeDriver, ScrapeReport, ScraperAdapter};
pub use error::ScraperError;
pub use forum::{ForumConfig, ForumScraper};
pub use normalize::{normalize, RawItem};
pub use rate::RateLimiter;
pub use rss::{RssConfig, RssScraper};
pub use social::{SocialConfig, SocialShortScraper};
pub use video::{VideoConfig, VideoScraper};
