//! Tokenization shared by the indexing and query paths.

use std::collections::HashSet;

use regex::Regex;

/// Splits free text into the set of lowercase word tokens worth
/// indexing. Tokens shorter than three characters are dropped.
pub(crate) struct Tokenizer {
    word: Regex,
}

impl Tokenizer {
    pub(crate) fn new() -> Self {
        Self {
            word: Regex::new(r"[a-z0-9]+").expect("static pattern"),
        }
    }

    pub(crate) fn tokenize(&self, text: &str) -> HashSet<String> {
        self.word
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .filter(|token| token.len() > 2)
            .collect()
    }

    /// Query terms keep their order so scoring can count distinct
    /// matches.
    pub(crate) fn tokenize_query(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.word
            .find_iter(&query.to_lowercase())
            .map(|m| m.as_str().to_string())
            .filter(|token| token.len() > 2 && seen.insert(token.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_filters_short_words() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("The Quick Brown fox, at 10 mph!");
        assert!(tokens.contains("the"));
        assert!(tokens.contains("quick"));
        assert!(tokens.contains("brown"));
        assert!(tokens.contains("fox"));
        assert!(!tokens.contains("at"), "short tokens are dropped");
        assert!(!tokens.contains("10"), "short tokens are dropped");
    }

    #[test]
    fn query_terms_are_deduplicated() {
        let tokenizer = Tokenizer::new();
        let terms = tokenizer.tokenize_query("rust rust async");
        assert_eq!(terms, vec!["rust", "async"]);
    }
}
