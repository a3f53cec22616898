//! Programming-term synonyms used to widen full-text queries.

use std::collections::HashMap;

const GROUPS: &[&[&str]] = &[
    &["function", "method", "fn", "func", "def", "procedure"],
    &["class", "struct", "type"],
    &["interface", "trait", "protocol"],
    &["variable", "var", "let"],
    &["constant", "const", "static"],
    &["import", "require", "include", "use"],
    &["error", "exception", "err", "failure"],
    &["delete", "remove", "destroy"],
    &["create", "new", "make", "init"],
    &["get", "fetch", "retrieve", "load"],
    &["config", "configuration", "settings", "options"],
    &["test", "spec", "assert"],
];

/// Term -> related terms, symmetric within each group.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    related: HashMap<&'static str, Vec<&'static str>>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let mut related: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for group in GROUPS {
            for term in group.iter() {
                let entry = related.entry(*term).or_default();
                entry.extend(group.iter().filter(|other| *other != term));
            }
        }
        Self { related }
    }
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Related terms, not including `term` itself.
    pub fn expand(&self, term: &str) -> &[&'static str] {
        self.related.get(term).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_is_symmetric() {
        let table = SynonymTable::new();
        assert!(table.expand("function").contains(&"method"));
        assert!(table.expand("method").contains(&"function"));
        assert!(!table.expand("function").contains(&"function"));
    }

    #[test]
    fn test_unknown_term_has_no_synonyms() {
        let table = SynonymTable::new();
        assert!(table.expand("login").is_empty());
    }
}
