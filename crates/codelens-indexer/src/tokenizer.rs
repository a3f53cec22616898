//! Content tokenization for the inverted index.
//!
//! Tokens are lower-cased runs of `[a-z0-9_]`. Everything else separates
//! tokens. Stop words and single characters are dropped.

use std::collections::HashMap;

/// Words too common to be worth a posting.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Minimum token length kept in the index.
pub const MIN_TOKEN_LEN: usize = 2;

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Split `content` into normalized tokens, in order of appearance.
pub fn tokenize(content: &str) -> Vec<String> {
    content
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|raw| raw.len() >= MIN_TOKEN_LEN)
        .map(|raw| raw.to_ascii_lowercase())
        .filter(|token| !is_stop_word(token))
        .collect()
}

/// Token -> occurrence count.
pub fn term_frequencies(tokens: &[String]) -> HashMap<String, u32> {
    let mut freqs = HashMap::new();
    for token in tokens {
        *freqs.entry(token.clone()).or_insert(0) += 1;
    }
    freqs
}

/// Levenshtein edit distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        let tokens = tokenize("export function loginUser(user_id) { return 42; }");
        assert_eq!(
            tokens,
            vec!["export", "function", "loginuser", "user_id", "return", "42"]
        );
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("if x is the value of a map");
        assert_eq!(tokens, vec!["value", "map"]);
    }

    #[test]
    fn test_tokenize_garbage_degrades_to_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("{}();\u{fffd}\u{0}!!").is_empty());
        // Non-ASCII letters act as separators
        assert_eq!(tokenize("caféteria"), vec!["caf", "teria"]);
    }

    #[test]
    fn test_term_frequencies() {
        let tokens = tokenize("login login logout");
        let freqs = term_frequencies(&tokens);
        assert_eq!(freqs["login"], 2);
        assert_eq!(freqs["logout"], 1);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("login", "login"), 0);
        assert_eq!(edit_distance("logn", "login"), 1);
        assert_eq!(edit_distance("lagin", "login"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
