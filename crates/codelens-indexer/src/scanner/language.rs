//! Language tags for indexed files.
//!
//! Only languages with a grammar produce symbols and imports; the data and
//! prose formats are still indexed for full-text search.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Json,
    Yaml,
    Toml,
    Markdown,
    Unknown,
}

/// Lower-case extension to language.
const EXTENSIONS: &[(&str, Language)] = &[
    ("rs", Language::Rust),
    ("ts", Language::TypeScript),
    ("tsx", Language::TypeScript),
    ("mts", Language::TypeScript),
    ("cts", Language::TypeScript),
    ("js", Language::JavaScript),
    ("jsx", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("cjs", Language::JavaScript),
    ("py", Language::Python),
    ("pyi", Language::Python),
    ("go", Language::Go),
    ("json", Language::Json),
    ("yaml", Language::Yaml),
    ("yml", Language::Yaml),
    ("toml", Language::Toml),
    ("md", Language::Markdown),
    ("markdown", Language::Markdown),
];

/// Shebang interpreter to language.
const INTERPRETERS: &[(&str, Language)] = &[
    ("python", Language::Python),
    ("node", Language::JavaScript),
    ("deno", Language::TypeScript),
];

impl Language {
    /// Tag used in language filters and serialized records.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Unknown => "unknown",
        }
    }

    /// Whether symbols, imports and complexity can be extracted.
    pub fn has_parser(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::TypeScript
                | Language::JavaScript
                | Language::Python
                | Language::Go
        )
    }

    /// Extension first, then the shebang line.
    pub fn detect(path: &Path, content: &str) -> Language {
        detect_language(path)
            .or_else(|| detect_language_from_content(content))
            .unwrap_or(Language::Unknown)
    }

    /// A filter value matches either the tag or any extension of the
    /// language, ignoring case and surrounding whitespace.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.trim().to_lowercase();
        if self.tag() == filter {
            return true;
        }
        EXTENSIONS
            .iter()
            .any(|(ext, language)| language == self && *ext == filter)
    }
}

pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
}

pub fn detect_language_from_content(content: &str) -> Option<Language> {
    let shebang = content.lines().next()?.strip_prefix("#!")?;
    INTERPRETERS
        .iter()
        .find(|(interpreter, _)| shebang.contains(interpreter))
        .map(|(_, language)| *language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        let cases = [
            ("src/main.rs", Language::Rust),
            ("App.tsx", Language::TypeScript),
            ("module.mjs", Language::JavaScript),
            ("types.pyi", Language::Python),
            ("cmd/server.go", Language::Go),
            ("config.yml", Language::Yaml),
            ("README.md", Language::Markdown),
            ("main.RS", Language::Rust),
        ];
        for (path, expected) in cases {
            assert_eq!(detect_language(Path::new(path)), Some(expected), "{}", path);
        }
    }

    #[test]
    fn test_markup_and_unknown_files() {
        assert_eq!(detect_language(Path::new("index.html")), None);
        assert_eq!(detect_language(Path::new("site.css")), None);
        assert_eq!(detect_language(Path::new("noextension")), None);
        assert_eq!(
            Language::detect(Path::new("noextension"), "plain text"),
            Language::Unknown
        );
    }

    #[test]
    fn test_detect_falls_back_to_shebang() {
        assert_eq!(
            Language::detect(Path::new("bin/tool"), "#!/usr/bin/env python3\n"),
            Language::Python
        );
        assert_eq!(
            detect_language_from_content("#!/usr/bin/env -S deno run\n"),
            Some(Language::TypeScript)
        );
        assert_eq!(detect_language_from_content("python = 3"), None);
    }

    #[test]
    fn test_matches_filter() {
        assert!(Language::TypeScript.matches_filter("typescript"));
        assert!(Language::TypeScript.matches_filter("TS"));
        assert!(Language::Python.matches_filter("py"));
        assert!(Language::Rust.matches_filter(" rust "));
        assert!(!Language::Go.matches_filter("rust"));
        assert!(!Language::JavaScript.matches_filter("ts"));
    }

    #[test]
    fn test_has_parser() {
        assert!(Language::Go.has_parser());
        assert!(!Language::Json.has_parser());
        assert!(!Language::Unknown.has_parser());
    }
}
