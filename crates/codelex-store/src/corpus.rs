//! The two matching-corpus structures backing every dictionary section.
//!
//! [`ExactMatchCorpus`] is a plain token set; [`PrefixMatchCorpus`] keeps a
//! sorted list and matches a query that is a prefix of any stored word,
//! which gives the natural-language dictionary tolerance for truncated
//! identifiers (`repo` matches `repository`).
//!
//! Both track a dirty flag so the store can skip the rewrite at close when
//! nothing changed. `add` is idempotent and dirties only on real insertion.

use std::collections::BTreeSet;

/// Unordered token set with exact membership matching.
#[derive(Debug, Default)]
pub struct ExactMatchCorpus {
    tokens: BTreeSet<String>,
    dirty: bool,
}

impl ExactMatchCorpus {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            dirty: false,
        }
    }

    pub fn matches(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn add(&mut self, token: &str) {
        if !self.tokens.contains(token) {
            self.tokens.insert(token.to_owned());
            self.dirty = true;
        }
    }

    /// Keep only tokens satisfying the predicate; dirties if any were
    /// removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let before = self.tokens.len();
        self.tokens.retain(|t| keep(t));
        if self.tokens.len() != before {
            self.dirty = true;
        }
    }

    /// Tokens in serialization (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// Sorted token list matched by prefix.
///
/// The backing vector is sorted at every observation point; `matches` runs a
/// binary search for the insertion point and inspects only the element
/// there. If that word does not start with the query, no later word can,
/// so one probe suffices.
#[derive(Debug, Default)]
pub struct PrefixMatchCorpus {
    tokens: Vec<String>,
    dirty: bool,
}

impl PrefixMatchCorpus {
    pub fn new(mut tokens: Vec<String>) -> Self {
        tokens.sort();
        tokens.dedup();
        Self {
            tokens,
            dirty: false,
        }
    }

    /// True if `token` is a prefix of some stored word.
    pub fn matches(&self, token: &str) -> bool {
        match self.tokens.binary_search_by(|w| w.as_str().cmp(token)) {
            Ok(_) => true,
            Err(at) => self
                .tokens
                .get(at)
                .is_some_and(|w| w.starts_with(token)),
        }
    }

    pub fn add(&mut self, token: &str) {
        if let Err(at) = self.tokens.binary_search_by(|w| w.as_str().cmp(token)) {
            self.tokens.insert(at, token.to_owned());
            self.dirty = true;
        }
    }

    /// Keep only tokens satisfying the predicate; relative order (and thus
    /// sortedness) is preserved. Dirties if any were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let before = self.tokens.len();
        self.tokens.retain(|t| keep(t));
        if self.tokens.len() != before {
            self.dirty = true;
        }
    }

    /// Tokens in serialization (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn exact_corpus_matches_only_whole_tokens() {
        let mut corpus = ExactMatchCorpus::new(strings(&["lambda", "yield"]));
        assert!(corpus.matches("lambda"));
        assert!(!corpus.matches("lamb"));
        assert!(!corpus.is_dirty());

        corpus.add("async");
        assert!(corpus.matches("async"));
        assert!(corpus.is_dirty());

        corpus.mark_clean();
        corpus.add("async");
        assert!(!corpus.is_dirty(), "re-adding must not dirty");
    }

    #[test]
    fn prefix_corpus_matches_prefixes() {
        let corpus = PrefixMatchCorpus::new(strings(&["colour", "repository", "zebra"]));
        assert!(corpus.matches("repo"));
        assert!(corpus.matches("repository"));
        assert!(corpus.matches("colour"));
        assert!(!corpus.matches("colourz"));
        assert!(!corpus.matches("reposix"));
        assert!(!corpus.matches("zz"));
    }

    #[test]
    fn prefix_corpus_add_keeps_sorted_order() {
        let mut corpus = PrefixMatchCorpus::new(Vec::new());
        for word in ["mango", "apple", "zebra", "apricot", "apple"] {
            corpus.add(word);
        }
        let stored: Vec<&str> = corpus.iter().collect();
        assert_eq!(stored, ["apple", "apricot", "mango", "zebra"]);
    }

    #[test]
    fn prefix_corpus_agrees_with_reference_set_under_random_insertions() {
        // Deterministic pseudo-random insertion order via a small LCG.
        let mut seed: u64 = 0x2545F491;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed
        };

        let mut corpus = PrefixMatchCorpus::new(Vec::new());
        let mut reference = BTreeSet::new();
        for _ in 0..500 {
            let n = next();
            let word: String = (0..(1 + n % 6))
                .map(|i| char::from(b'a' + ((n >> (i * 5)) % 26) as u8))
                .collect();
            corpus.add(&word);
            reference.insert(word);
        }

        let stored: Vec<&str> = corpus.iter().collect();
        let mut sorted = stored.clone();
        sorted.sort();
        assert_eq!(stored, sorted, "backing sequence must stay sorted");

        for probe in ["a", "ab", "zzz", "m", "qx"] {
            let expected = reference.iter().any(|w| w.starts_with(probe));
            assert_eq!(corpus.matches(probe), expected, "probe {probe:?}");
        }
        for word in reference.iter().take(50) {
            assert!(corpus.matches(word));
        }
    }

    #[test]
    fn retain_dirties_only_on_removal() {
        let mut corpus = PrefixMatchCorpus::new(strings(&["alpha", "beta", "gamma"]));
        corpus.retain(|_| true);
        assert!(!corpus.is_dirty());
        corpus.retain(|t| t != "beta");
        assert!(corpus.is_dirty());
        assert!(!corpus.matches("beta"));
        assert!(corpus.matches("gamma"));
    }
}
