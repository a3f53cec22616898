//! Normalized per-file analysis records.
//!
//! A [`FileAnalysis`] is the shape every analysis producer hands to the
//! index and the analytics engine. Optional fields mean "no data", never an
//! error.

use crate::scanner::Language;
use crate::IndexerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Analysis of a single source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    /// Normalized relative path
    pub path: String,
    /// Detected language
    pub language: Language,
    /// Size in bytes
    pub size: u64,
    /// Number of lines
    pub line_count: usize,
    /// File-level complexity score
    #[serde(default)]
    pub complexity: Option<u32>,
    /// Declared symbols
    #[serde(default)]
    pub symbols: Option<Vec<Symbol>>,
    /// Raw dependency specifiers
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    /// Import statements
    #[serde(default)]
    pub imports: Option<Vec<ImportRecord>>,
    /// Exported names
    #[serde(default)]
    pub exports: Option<Vec<ExportRecord>>,
    /// Function summaries
    #[serde(default)]
    pub functions: Option<Vec<FunctionInfo>>,
    /// Class / type summaries
    #[serde(default)]
    pub classes: Option<Vec<ClassInfo>>,
    /// Last modification time of the source
    pub last_modified: DateTime<Utc>,
}

impl FileAnalysis {
    /// Create a record carrying only the basic counts.
    pub fn new(path: impl Into<String>, language: Language, size: u64, line_count: usize) -> Self {
        Self {
            path: path.into(),
            language,
            size,
            line_count,
            complexity: None,
            symbols: None,
            dependencies: None,
            imports: None,
            exports: None,
            functions: None,
            classes: None,
            last_modified: Utc::now(),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        self.symbols.as_deref().unwrap_or_default()
    }

    pub fn imports(&self) -> &[ImportRecord] {
        self.imports.as_deref().unwrap_or_default()
    }

    pub fn exports(&self) -> &[ExportRecord] {
        self.exports.as_deref().unwrap_or_default()
    }

    pub fn functions(&self) -> &[FunctionInfo] {
        self.functions.as_deref().unwrap_or_default()
    }

    pub fn classes(&self) -> &[ClassInfo] {
        self.classes.as_deref().unwrap_or_default()
    }

    pub fn dependencies(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or_default()
    }

    /// Every module specifier this file refers to: import sources plus raw
    /// dependency entries, in declaration order without duplicates.
    pub fn referenced_modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        let all = self
            .imports()
            .iter()
            .map(|i| i.module.as_str())
            .chain(self.dependencies().iter().map(String::as_str));
        for module in all {
            if !module.is_empty() && !modules.contains(&module) {
                modules.push(module);
            }
        }
        modules
    }
}

/// A code symbol (function, class, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Kind of symbol
    pub kind: SymbolKind,
    /// Line (1-indexed)
    pub line: usize,
    /// Column (1-indexed)
    pub column: usize,
    pub visibility: Visibility,
    /// Parameter names, for callables
    #[serde(default)]
    pub parameters: Option<Vec<String>>,
    /// Declared return type, for callables
    #[serde(default)]
    pub return_type: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: usize, column: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            column,
            visibility: Visibility::Private,
            parameters: None,
            return_type: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Kind of symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Interface,
    Class,
    Variable,
    Constant,
    Import,
    Export,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Interface => "interface",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
        }
    }
}

/// Symbol visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Module specifier as written (`./auth`, `std::fmt`, `os.path`)
    pub module: String,
    /// Imported names, empty for whole-module imports
    #[serde(default)]
    pub items: Vec<String>,
    pub line: usize,
}

/// An exported name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub name: String,
    pub kind: SymbolKind,
    pub line: usize,
}

/// Summary of a function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub line: usize,
    /// Cyclomatic complexity (1 + decision points)
    pub complexity: u32,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub line_count: usize,
    #[serde(default)]
    pub is_async: bool,
}

/// Summary of a class, struct or other member-bearing type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl ClassInfo {
    pub fn member_count(&self) -> usize {
        self.methods.len() + self.properties.len()
    }
}

/// Converts raw file content into a [`FileAnalysis`].
///
/// Implementations must be pure: the same `(path, content)` always yields an
/// equivalent record.
pub trait AnalysisProducer: Send + Sync {
    fn analyze(&self, path: &str, content: &str) -> Result<FileAnalysis, IndexerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_empty() {
        let analysis = FileAnalysis::new("src/lib.rs", Language::Rust, 10, 1);
        assert!(analysis.symbols().is_empty());
        assert!(analysis.imports().is_empty());
        assert!(analysis.classes().is_empty());
        assert!(analysis.referenced_modules().is_empty());
    }

    #[test]
    fn test_referenced_modules_dedup() {
        let mut analysis = FileAnalysis::new("a.ts", Language::TypeScript, 10, 1);
        analysis.imports = Some(vec![
            ImportRecord {
                module: "./auth".to_string(),
                items: vec!["login".to_string()],
                line: 1,
            },
            ImportRecord {
                module: "react".to_string(),
                items: vec![],
                line: 2,
            },
        ]);
        analysis.dependencies = Some(vec!["react".to_string(), "lodash".to_string()]);

        assert_eq!(
            analysis.referenced_modules(),
            vec!["./auth", "react", "lodash"]
        );
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{
            "path": "b.py",
            "language": "python",
            "size": 42,
            "lineCount": 3,
            "lastModified": "2024-01-01T00:00:00Z"
        }"#;
        let analysis: FileAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.language, Language::Python);
        assert!(analysis.complexity.is_none());
        assert!(analysis.functions().is_empty());
    }

    #[test]
    fn test_class_member_count() {
        let class = ClassInfo {
            name: "Service".to_string(),
            line: 1,
            methods: vec!["a".to_string(), "b".to_string()],
            properties: vec!["c".to_string()],
        };
        assert_eq!(class.member_count(), 3);
    }
}
