//! Domain credibility tiers and the blacklist.
//!
//! Tier assignment is rule-based: official domains (government, central
//! bank, statistics institute) are tier 1, vetted national press tier 2,
//! anything that looks like a news outlet tier 3, and the rest tier 4.
//! Tiers bias evidence ordering and sub-agent weighting; only the
//! blacklist drops a source entirely.

use factico_types::CredibilityTier;

/// Official domains and suffixes (tier 1).
const OFFICIAL_SUFFIXES: [&str; 4] = [".gob.mx", ".gov", "banxico.org.mx", "inegi.org.mx"];

/// Vetted national press (tier 2).
const VETTED_PRESS: [&str; 8] = [
    "eluniversal.com.mx",
    "reforma.com",
    "milenio.com",
    "proceso.com.mx",
    "animalpolitico.com",
    "elfinanciero.com.mx",
    "eleconomista.com.mx",
    "expansion.mx",
];

/// Markers that suggest a press outlet (tier 3 when unvetted).
const PRESS_MARKERS: [&str; 6] = [
    "noticias", "diario", "news", "periodico", "prensa", "radio",
];

/// Domains that never appear as evidence.
const BLACKLIST: [&str; 4] = [
    "example-fakenews.mx",
    "notiexpress-viral.com",
    "eldiario-falso.net",
    "clickbait-politico.com",
];

/// Classifier over evidence domains.
#[derive(Debug, Clone, Default)]
pub struct CredibilityMap {
    /// Extra blacklisted domains from configuration.
    extra_blacklist: Vec<String>,
    /// Extra vetted press domains from configuration.
    extra_vetted: Vec<String>,
}

impl CredibilityMap {
    /// Create a map with the built-in rules only.
    pub const fn new() -> Self {
        Self {
            extra_blacklist: Vec::new(),
            extra_vetted: Vec::new(),
        }
    }

    /// Extend the blacklist from configuration.
    #[must_use]
    pub fn with_blacklist(mut self, domains: Vec<String>) -> Self {
        self.extra_blacklist = domains;
        self
    }

    /// Extend the vetted press set from configuration.
    #[must_use]
    pub fn with_vetted(mut self, domains: Vec<String>) -> Self {
        self.extra_vetted = domains;
        self
    }

    /// Whether evidence from this domain is dropped entirely.
    pub fn is_blacklisted(&self, domain: &str) -> bool {
        let lowered = domain.to_lowercase();
        BLACKLIST.iter().any(|d| lowered == *d || lowered.ends_with(&format!(".{d}")))
            || self
                .extra_blacklist
                .iter()
                .any(|d| lowered == *d || lowered.ends_with(&format!(".{d}")))
    }

    /// The credibility tier for a domain.
    pub fn tier(&self, domain: &str) -> CredibilityTier {
        let lowered = domain.to_lowercase();

        if OFFICIAL_SUFFIXES
            .iter()
            .any(|s| lowered.ends_with(s) || lowered == s.trim_start_matches('.'))
        {
            return CredibilityTier::Official;
        }

        if VETTED_PRESS.iter().any(|d| lowered == *d || lowered.ends_with(&format!(".{d}")))
            || self
                .extra_vetted
                .iter()
                .any(|d| lowered == *d || lowered.ends_with(&format!(".{d}")))
        {
            return CredibilityTier::VettedPress;
        }

        if PRESS_MARKERS.iter().any(|m| lowered.contains(m)) {
            return CredibilityTier::OtherPress;
        }

        CredibilityTier::Unknown
    }
}

/// Extract the registrable host from a URL, lowercased, without `www.`.
pub fn domain_of(url: &str) -> String {
    let stripped = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or(url.trim());
    let host = stripped.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.split('@').next_back().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.strip_prefix("www.").unwrap_or(host).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_domains_are_tier_one() {
        let map = CredibilityMap::new();
        assert_eq!(map.tier("banxico.org.mx"), CredibilityTier::Official);
        assert_eq!(map.tier("www.inegi.org.mx"), CredibilityTier::Official);
        assert_eq!(map.tier("presidencia.gob.mx"), CredibilityTier::Official);
    }

    #[test]
    fn vetted_press_is_tier_two() {
        let map = CredibilityMap::new();
        assert_eq!(map.tier("eluniversal.com.mx"), CredibilityTier::VettedPress);
        assert_eq!(map.tier("elfinanciero.com.mx"), CredibilityTier::VettedPress);
    }

    #[test]
    fn press_markers_are_tier_three() {
        let map = CredibilityMap::new();
        assert_eq!(map.tier("noticias-hoy.mx"), CredibilityTier::OtherPress);
    }

    #[test]
    fn unknown_is_tier_four() {
        let map = CredibilityMap::new();
        assert_eq!(map.tier("blog-personal.com"), CredibilityTier::Unknown);
    }

    #[test]
    fn blacklist_matches_exact_and_subdomains() {
        let map = CredibilityMap::new()
            .with_blacklist(vec!["granjadebots.mx".to_owned()]);
        assert!(map.is_blacklisted("example-fakenews.mx"));
        assert!(map.is_blacklisted("sub.example-fakenews.mx"));
        assert!(map.is_blacklisted("granjadebots.mx"));
        assert!(!map.is_blacklisted("eluniversal.com.mx"));
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://www.banxico.org.mx/comunicado?x=1"), "banxico.org.mx");
        assert_eq!(domain_of("http://Example.MX/path"), "example.mx");
        assert_eq!(domain_of("https://host.mx:8443/a"), "host.mx");
    }
}
