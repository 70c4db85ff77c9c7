//! Trending topic detection for Factico.
//!
//! Pure computation over the rolling 24-hour window of sources and their
//! linked claim verdicts: candidate phrases from n-gram frequency with a
//! Spanish stop-list, scored on trend, velocity, cross-platform
//! correlation, taxonomy relevance, and misinformation risk, then ranked
//! by a configured weighted priority. The worker persists the top-N as an
//! atomic snapshot.

pub mod detector;
pub mod ngram;

pub use detector::{detect, TrendDoc, TrendWeights};
pub use ngram::{mentions, phrase_counts, tokenize};
