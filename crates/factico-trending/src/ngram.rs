//! Candidate phrase extraction: tokenization, stop-list, n-grams.
//!
//! Phrases are one to three tokens after stop-word removal. Tokens are
//! lowercased and stripped of punctuation; short tokens and numbers on
//! their own are dropped.

use std::collections::HashMap;

/// Spanish stop words excluded from candidate phrases.
const STOP_WORDS: [&str; 48] = [
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "a", "en", "por",
    "para", "con", "sin", "sobre", "entre", "que", "se", "su", "sus", "es", "son", "fue", "ser",
    "está", "están", "como", "más", "menos", "pero", "ya", "no", "sí", "este", "esta", "estos",
    "estas", "ese", "esa", "lo", "le", "les", "y", "o", "hay",
];

/// Longest phrase length in tokens.
const MAX_NGRAM: usize = 3;

/// Minimum token length kept after cleaning.
const MIN_TOKEN_LEN: usize = 3;

/// Tokenize a text: lowercase, strip punctuation, drop stop words and
/// bare numbers.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| {
            token.chars().count() >= MIN_TOKEN_LEN
                && !token.chars().all(char::is_numeric)
                && !STOP_WORDS.contains(&token.as_str())
        })
        .collect()
}

/// Count phrase occurrences (1- to 3-grams) in a set of texts.
///
/// Returns phrase -> occurrence count across all texts.
pub fn phrase_counts<'a, I: IntoIterator<Item = &'a str>>(texts: I) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for text in texts {
        let tokens = tokenize(text);
        for n in 1..=MAX_NGRAM {
            for window in tokens.windows(n) {
                let phrase = window.join(" ");
                counts
                    .entry(phrase)
                    .and_modify(|c| *c = c.saturating_add(1))
                    .or_insert(1);
            }
        }
    }
    counts
}

/// Whether a text mentions a phrase (token-normalized containment).
pub fn mentions(text: &str, phrase: &str) -> bool {
    let tokens = tokenize(text);
    let phrase_tokens: Vec<&str> = phrase.split(' ').collect();
    if phrase_tokens.is_empty() {
        return false;
    }
    tokens
        .windows(phrase_tokens.len())
        .any(|window| window.iter().map(String::as_str).eq(phrase_tokens.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_stopwords_and_punctuation() {
        let tokens = tokenize("La tasa de interés subió, según el banco central.");
        assert_eq!(tokens, vec!["tasa", "interés", "subió", "según", "banco", "central"]);
    }

    #[test]
    fn bare_numbers_are_dropped() {
        let tokens = tokenize("subió 11.00 puntos 2026");
        assert!(!tokens.iter().any(|t| t == "2026"));
        assert!(tokens.iter().any(|t| t == "puntos"));
    }

    #[test]
    fn phrase_counts_include_bigrams() {
        let counts = phrase_counts(["banco central sube tasa", "banco central mantiene tasa"]);
        assert_eq!(counts.get("banco central").copied(), Some(2));
        assert_eq!(counts.get("banco").copied(), Some(2));
        assert_eq!(counts.get("sube tasa").copied(), Some(1));
    }

    #[test]
    fn mentions_is_token_exact() {
        assert!(mentions("El banco central subió la tasa", "banco central"));
        assert!(!mentions("El banco nacional subió la tasa", "banco central"));
    }
}
