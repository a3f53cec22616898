//! Analysis records from tree-sitter syntax trees.
//!
//! This is a best-effort front end: it walks the concrete syntax tree and
//! picks out declarations, imports and branch points by node kind. It does not
//! resolve types or scopes.

use super::Language;
use crate::analysis::{
    AnalysisProducer, ClassInfo, ExportRecord, FileAnalysis, FunctionInfo, ImportRecord, Symbol,
    SymbolKind, Visibility,
};
use crate::IndexerError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::Node;

/// Produces [`FileAnalysis`] records for Rust, TypeScript/JavaScript, Python
/// and Go sources. Other languages get a record with counts only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterProducer;

impl TreeSitterProducer {
    pub fn new() -> Self {
        Self
    }

    fn grammar(path: &str, language: Language) -> Option<tree_sitter::Language> {
        let is_tsx = path.ends_with(".tsx") || path.ends_with(".jsx");
        let grammar = match language {
            Language::Rust => tree_sitter_rust::LANGUAGE,
            Language::TypeScript if is_tsx => tree_sitter_typescript::LANGUAGE_TSX,
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
            // TSX grammar accepts plain JavaScript including JSX
            Language::JavaScript => tree_sitter_typescript::LANGUAGE_TSX,
            Language::Python => tree_sitter_python::LANGUAGE,
            Language::Go => tree_sitter_go::LANGUAGE,
            _ => return None,
        };
        Some(grammar.into())
    }
}

impl AnalysisProducer for TreeSitterProducer {
    fn analyze(&self, path: &str, content: &str) -> Result<FileAnalysis, IndexerError> {
        let language = Language::detect(Path::new(path), content);
        let mut analysis = FileAnalysis::new(
            path,
            language,
            content.len() as u64,
            content.lines().count(),
        );
        // Deterministic output; callers stamp the real modification time.
        analysis.last_modified = DateTime::<Utc>::default();

        let Some(grammar) = Self::grammar(path, language) else {
            return Ok(analysis);
        };

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| IndexerError::Parse {
                path: PathBuf::from(path),
                message: format!("Failed to set language: {}", e),
            })?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| IndexerError::Parse {
                path: PathBuf::from(path),
                message: "Failed to parse content".to_string(),
            })?;

        let mut extractor = Extractor::new(language, content.as_bytes());
        let root = tree.root_node();
        extractor.visit(root, Scope::default());

        let complexity = 1 + extractor.count_decisions(root, true);
        let dependencies = {
            let mut deps: Vec<String> = Vec::new();
            for import in &extractor.imports {
                if !deps.contains(&import.module) {
                    deps.push(import.module.clone());
                }
            }
            deps
        };

        debug!(
            path = %path,
            symbols = extractor.symbols.len(),
            imports = extractor.imports.len(),
            complexity,
            "Analyzed file"
        );

        analysis.complexity = Some(complexity);
        analysis.symbols = Some(extractor.symbols);
        analysis.imports = Some(extractor.imports);
        analysis.exports = Some(extractor.exports);
        analysis.functions = Some(extractor.functions);
        analysis.classes = Some(extractor.classes);
        analysis.dependencies = Some(dependencies);

        Ok(analysis)
    }
}

/// Where in the tree the walk currently is.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    /// Index into `Extractor::classes` of the enclosing type
    class: Option<usize>,
    in_function: bool,
    /// Inside a TypeScript `export` statement
    exported: bool,
}

impl Scope {
    fn is_top_level(&self) -> bool {
        self.class.is_none() && !self.in_function
    }
}

struct Extractor<'a> {
    language: Language,
    source: &'a [u8],
    symbols: Vec<Symbol>,
    imports: Vec<ImportRecord>,
    exports: Vec<ExportRecord>,
    functions: Vec<FunctionInfo>,
    classes: Vec<ClassInfo>,
}

impl<'a> Extractor<'a> {
    fn new(language: Language, source: &'a [u8]) -> Self {
        Self {
            language,
            source,
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn visit(&mut self, node: Node<'_>, scope: Scope) {
        use Language::*;

        if self.is_function(node) {
            self.handle_function(node, scope);
            return;
        }

        match (self.language, node.kind()) {
            (Rust, "struct_item") => return self.handle_class(node, scope, SymbolKind::Struct),
            (Rust, "enum_item") => return self.handle_class(node, scope, SymbolKind::Enum),
            (Rust, "trait_item") => return self.handle_class(node, scope, SymbolKind::Interface),
            (Rust, "impl_item") => return self.handle_rust_impl(node),
            (Rust, "use_declaration") => return self.handle_rust_use(node),
            (Rust, "mod_item") if node.child_by_field_name("body").is_none() => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_import(format!("self::{}", name), Vec::new(), node);
                }
                return;
            }
            (Rust, "const_item" | "static_item") => {
                self.handle_binding(node, scope, SymbolKind::Constant);
            }
            (Rust, "field_declaration" | "enum_variant") => self.push_property(node, scope),
            (Rust, "function_signature_item") => self.push_method(node, scope),

            (TypeScript | JavaScript, "class_declaration" | "class" | "abstract_class_declaration") => {
                return self.handle_class(node, scope, SymbolKind::Class)
            }
            (TypeScript | JavaScript, "interface_declaration") => {
                return self.handle_class(node, scope, SymbolKind::Interface)
            }
            (TypeScript | JavaScript, "import_statement") => return self.handle_ts_import(node),
            (TypeScript | JavaScript, "export_statement") => {
                return self.handle_ts_export(node, scope)
            }
            (TypeScript | JavaScript, "call_expression") => self.handle_require(node),
            (TypeScript | JavaScript, "variable_declarator") if scope.is_top_level() => {
                self.handle_ts_declarator(node, scope)
            }
            (
                TypeScript | JavaScript,
                "public_field_definition" | "field_definition" | "property_signature",
            ) => self.push_property(node, scope),
            (TypeScript | JavaScript, "method_signature" | "abstract_method_signature") => {
                self.push_method(node, scope)
            }

            (Python, "class_definition") => {
                return self.handle_class(node, scope, SymbolKind::Class)
            }
            (Python, "import_statement" | "import_from_statement") => {
                return self.handle_python_import(node)
            }
            (Python, "assignment") if !scope.in_function => {
                self.handle_python_assignment(node, scope)
            }

            (Go, "type_spec") => return self.handle_go_type(node, scope),
            (Go, "import_spec") => {
                if let Some(path) = self.field_text(node, "path") {
                    self.push_import(unquote(path).to_string(), Vec::new(), node);
                }
                return;
            }
            (Go, "field_declaration") => {
                if let Some(idx) = scope.class {
                    let mut cursor = node.walk();
                    let names: Vec<String> = node
                        .children_by_field_name("name", &mut cursor)
                        .map(|n| self.text(n).to_string())
                        .collect();
                    self.classes[idx].properties.extend(names);
                }
            }
            (Go, "method_elem" | "method_spec") => self.push_method(node, scope),
            (Go, "const_spec") if scope.is_top_level() => {
                self.handle_binding(node, scope, SymbolKind::Constant)
            }
            (Go, "var_spec") if scope.is_top_level() => {
                self.handle_binding(node, scope, SymbolKind::Variable)
            }
            _ => {}
        }

        self.visit_children(node, scope);
    }

    fn visit_children(&mut self, node: Node<'_>, scope: Scope) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child, scope);
        }
    }

    fn is_function(&self, node: Node<'_>) -> bool {
        use Language::*;
        matches!(
            (self.language, node.kind()),
            (Rust, "function_item")
                | (
                    TypeScript | JavaScript,
                    "function_declaration"
                        | "generator_function_declaration"
                        | "method_definition"
                        | "arrow_function"
                        | "function_expression"
                        | "function"
                )
                | (Python, "function_definition")
                | (Go, "function_declaration" | "method_declaration" | "func_literal")
        )
    }

    fn is_decision(&self, node: Node<'_>) -> bool {
        use Language::*;
        match (self.language, node.kind()) {
            (Rust, "if_expression" | "match_arm" | "while_expression" | "for_expression") => true,
            (
                TypeScript | JavaScript,
                "if_statement" | "for_statement" | "for_in_statement" | "while_statement"
                | "do_statement" | "switch_case" | "catch_clause" | "ternary_expression",
            ) => true,
            (
                Python,
                "if_statement" | "elif_clause" | "for_statement" | "while_statement"
                | "except_clause" | "conditional_expression" | "boolean_operator",
            ) => true,
            (
                Go,
                "if_statement" | "for_statement" | "expression_case" | "type_case"
                | "communication_case",
            ) => true,
            (_, "binary_expression") => node
                .child_by_field_name("operator")
                .is_some_and(|op| matches!(op.kind(), "&&" | "||" | "??")),
            _ => false,
        }
    }

    /// Count branch points below `node`. With `include_nested` false the
    /// walk stops at nested function boundaries.
    fn count_decisions(&self, node: Node<'_>, include_nested: bool) -> u32 {
        let mut count = 0;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !include_nested && self.is_function(child) {
                continue;
            }
            if self.is_decision(child) {
                count += 1;
            }
            count += self.count_decisions(child, include_nested);
        }
        count
    }

    fn visibility(&self, node: Node<'_>, name: &str, scope: Scope) -> Visibility {
        match self.language {
            Language::Rust => {
                if has_child_kind(node, "visibility_modifier") {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            Language::TypeScript | Language::JavaScript => {
                if let Some(modifier) = child_of_kind(node, "accessibility_modifier") {
                    match self.text(modifier) {
                        "private" => Visibility::Private,
                        "protected" => Visibility::Protected,
                        _ => Visibility::Public,
                    }
                } else if scope.class.is_some() {
                    if name.starts_with('#') {
                        Visibility::Private
                    } else {
                        Visibility::Public
                    }
                } else if scope.exported {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            Language::Python => {
                let dunder = name.starts_with("__") && name.ends_with("__");
                if name.starts_with('_') && !dunder {
                    Visibility::Private
                } else {
                    Visibility::Public
                }
            }
            Language::Go => {
                if name.chars().next().is_some_and(char::is_uppercase) {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            _ => Visibility::Public,
        }
    }

    fn handle_function(&mut self, node: Node<'_>, scope: Scope) {
        let name = self.field_text(node, "name").or_else(|| {
            // `const handler = () => {}` takes the declarator's name
            node.parent()
                .filter(|p| p.kind() == "variable_declarator")
                .and_then(|p| self.field_text(p, "name"))
        });

        let body_scope = Scope {
            class: None,
            in_function: true,
            exported: false,
        };

        let Some(name) = name else {
            self.visit_children(node, body_scope);
            return;
        };

        let mut class = scope.class;
        if self.language == Language::Go && node.kind() == "method_declaration" {
            if let Some(receiver) = node.child_by_field_name("receiver") {
                if let Some(type_name) = find_descendant(receiver, "type_identifier") {
                    let type_name = self.text(type_name).to_string();
                    class = Some(self.class_index(&type_name, node));
                }
            }
        }

        let parameters = self.parameters(node);
        let return_type = self
            .field_text(node, "return_type")
            .or_else(|| self.field_text(node, "result"))
            .map(|t| t.trim_start_matches(':').trim_start_matches("->").trim().to_string());
        let start = node.start_position();
        let end = node.end_position();
        let prefix_end = node
            .child_by_field_name("name")
            .map(|n| n.start_byte())
            .unwrap_or(node.start_byte());
        let is_async = self
            .source
            .get(node.start_byte()..prefix_end)
            .and_then(|b| std::str::from_utf8(b).ok())
            .is_some_and(|prefix| prefix.contains("async"));

        let fn_scope = Scope { class, ..scope };
        let visibility = self.visibility(node, name, fn_scope);

        let mut symbol = Symbol::new(name, SymbolKind::Function, start.row + 1, start.column + 1)
            .with_visibility(visibility);
        symbol.parameters = Some(parameters.clone());
        symbol.return_type = return_type;
        self.symbols.push(symbol);

        self.functions.push(FunctionInfo {
            name: name.to_string(),
            line: start.row + 1,
            complexity: 1 + self.count_decisions(node, false),
            parameters,
            line_count: end.row - start.row + 1,
            is_async,
        });

        if let Some(idx) = class {
            self.classes[idx].methods.push(name.to_string());
        } else if scope.is_top_level() && self.is_exported(visibility, scope) {
            self.exports.push(ExportRecord {
                name: name.to_string(),
                kind: SymbolKind::Function,
                line: start.row + 1,
            });
        }

        self.visit_children(node, body_scope);
    }

    fn is_exported(&self, visibility: Visibility, scope: Scope) -> bool {
        match self.language {
            Language::TypeScript | Language::JavaScript => scope.exported,
            _ => visibility == Visibility::Public,
        }
    }

    fn parameters(&self, node: Node<'_>) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter(|p| !matches!(p.kind(), "comment" | "line_comment" | "block_comment"))
            .map(|p| {
                p.child_by_field_name("pattern")
                    .or_else(|| p.child_by_field_name("name"))
                    .map(|n| self.text(n))
                    .unwrap_or_else(|| self.text(p))
                    .to_string()
            })
            .collect()
    }

    fn class_index(&mut self, name: &str, node: Node<'_>) -> usize {
        if let Some(idx) = self.classes.iter().position(|c| c.name == name) {
            return idx;
        }
        self.classes.push(ClassInfo {
            name: name.to_string(),
            line: node.start_position().row + 1,
            methods: Vec::new(),
            properties: Vec::new(),
        });
        self.classes.len() - 1
    }

    fn handle_class(&mut self, node: Node<'_>, scope: Scope, kind: SymbolKind) {
        let Some(name) = self.field_text(node, "name") else {
            self.visit_children(node, scope);
            return;
        };
        self.declare_type(node, name, scope, kind);
        let idx = self.class_index(name, node);

        let member_scope = Scope {
            class: Some(idx),
            in_function: false,
            exported: false,
        };
        match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, member_scope),
            None => self.visit_children(node, member_scope),
        }
    }

    fn declare_type(&mut self, node: Node<'_>, name: &str, scope: Scope, kind: SymbolKind) {
        let start = node.start_position();
        let visibility = self.visibility(node, name, scope);
        self.symbols.push(
            Symbol::new(name, kind, start.row + 1, start.column + 1).with_visibility(visibility),
        );
        if scope.is_top_level() && self.is_exported(visibility, scope) {
            self.exports.push(ExportRecord {
                name: name.to_string(),
                kind,
                line: start.row + 1,
            });
        }
    }

    fn handle_rust_impl(&mut self, node: Node<'_>) {
        let Some(type_name) = self.field_text(node, "type") else {
            return;
        };
        let type_name = type_name.split('<').next().unwrap_or(type_name).trim();
        let idx = self.class_index(type_name, node);
        let scope = Scope {
            class: Some(idx),
            in_function: false,
            exported: false,
        };
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body, scope);
        }
    }

    fn handle_go_type(&mut self, node: Node<'_>, scope: Scope) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let kind = match type_node.kind() {
            "struct_type" => SymbolKind::Struct,
            "interface_type" => SymbolKind::Interface,
            _ => return,
        };
        self.declare_type(node, name, scope, kind);
        let idx = self.class_index(name, node);
        let member_scope = Scope {
            class: Some(idx),
            in_function: false,
            exported: false,
        };
        self.visit_children(type_node, member_scope);
    }

    fn push_property(&mut self, node: Node<'_>, scope: Scope) {
        let Some(idx) = scope.class else { return };
        if scope.in_function {
            return;
        }
        if let Some(name) = self
            .field_text(node, "name")
            .or_else(|| self.field_text(node, "property"))
        {
            self.classes[idx].properties.push(name.to_string());
        }
    }

    fn push_method(&mut self, node: Node<'_>, scope: Scope) {
        let Some(idx) = scope.class else { return };
        if let Some(name) = self.field_text(node, "name") {
            self.classes[idx].methods.push(name.to_string());
        }
    }

    fn handle_binding(&mut self, node: Node<'_>, scope: Scope, kind: SymbolKind) {
        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name_node in names {
            let name = self.text(name_node);
            let start = name_node.start_position();
            let visibility = self.visibility(node, name, scope);
            self.symbols.push(
                Symbol::new(name, kind, start.row + 1, start.column + 1)
                    .with_visibility(visibility),
            );
            if scope.is_top_level() && self.is_exported(visibility, scope) {
                self.exports.push(ExportRecord {
                    name: name.to_string(),
                    kind,
                    line: start.row + 1,
                });
            }
        }
    }

    fn handle_ts_declarator(&mut self, node: Node<'_>, scope: Scope) {
        let is_callable = node.child_by_field_name("value").is_some_and(|v| {
            matches!(v.kind(), "arrow_function" | "function_expression" | "function")
        });
        if is_callable {
            return;
        }
        let is_const = node
            .parent()
            .and_then(|p| p.child(0))
            .is_some_and(|kw| kw.kind() == "const");
        let kind = if is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };
        self.handle_binding(node, scope, kind);
    }

    fn handle_python_assignment(&mut self, node: Node<'_>, scope: Scope) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.text(left);
        if let Some(idx) = scope.class {
            self.classes[idx].properties.push(name.to_string());
            return;
        }
        let kind = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };
        let start = left.start_position();
        let visibility = self.visibility(node, name, scope);
        self.symbols.push(
            Symbol::new(name, kind, start.row + 1, start.column + 1).with_visibility(visibility),
        );
    }

    fn push_import(&mut self, module: String, items: Vec<String>, node: Node<'_>) {
        let start = node.start_position();
        self.symbols.push(
            Symbol::new(module.as_str(), SymbolKind::Import, start.row + 1, start.column + 1)
                .with_visibility(Visibility::Private),
        );
        self.imports.push(ImportRecord {
            module,
            items,
            line: start.row + 1,
        });
    }

    fn handle_rust_use(&mut self, node: Node<'_>) {
        let Some(argument) = self.field_text(node, "argument") else {
            return;
        };
        let argument: String = argument.split_whitespace().collect();
        let (module, items) = match argument.split_once("::{") {
            Some((module, rest)) => {
                let items = rest
                    .trim_end_matches('}')
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (module.to_string(), items)
            }
            None => match argument.rsplit_once("::") {
                Some((module, item)) => (module.to_string(), vec![item.to_string()]),
                None => (argument.clone(), Vec::new()),
            },
        };
        self.push_import(module, items, node);
    }

    fn handle_ts_import(&mut self, node: Node<'_>) {
        let Some(source) = self.field_text(node, "source") else {
            return;
        };
        let mut items = Vec::new();
        if let Some(clause) = child_of_kind(node, "import_clause") {
            self.collect_import_names(clause, &mut items);
        }
        self.push_import(unquote(source).to_string(), items, node);
    }

    fn collect_import_names(&self, node: Node<'_>, items: &mut Vec<String>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => items.push(self.text(child).to_string()),
                "import_specifier" | "export_specifier" => {
                    if let Some(name) = self.field_text(child, "name") {
                        items.push(name.to_string());
                    }
                }
                "namespace_import" => {
                    if let Some(id) = child_of_kind(child, "identifier") {
                        items.push(self.text(id).to_string());
                    }
                }
                _ => self.collect_import_names(child, items),
            }
        }
    }

    fn handle_ts_export(&mut self, node: Node<'_>, scope: Scope) {
        let line = node.start_position().row + 1;

        if let Some(clause) = child_of_kind(node, "export_clause") {
            let mut names = Vec::new();
            self.collect_import_names(clause, &mut names);
            if let Some(source) = self.field_text(node, "source") {
                self.push_import(unquote(source).to_string(), names.clone(), node);
            }
            for name in names {
                let start = node.start_position();
                self.symbols.push(
                    Symbol::new(name.as_str(), SymbolKind::Export, line, start.column + 1)
                        .with_visibility(Visibility::Public),
                );
                self.exports.push(ExportRecord {
                    name,
                    kind: SymbolKind::Export,
                    line,
                });
            }
            return;
        }

        if node.child_by_field_name("declaration").is_none()
            && has_child_kind(node, "default")
        {
            self.exports.push(ExportRecord {
                name: "default".to_string(),
                kind: SymbolKind::Export,
                line,
            });
        }

        let exported = Scope {
            exported: true,
            ..scope
        };
        self.visit_children(node, exported);
    }

    fn handle_require(&mut self, node: Node<'_>) {
        let is_require = node
            .child_by_field_name("function")
            .is_some_and(|f| f.kind() == "identifier" && self.text(f) == "require");
        if !is_require {
            return;
        }
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        if let Some(source) = child_of_kind(args, "string") {
            self.push_import(unquote(self.text(source)).to_string(), Vec::new(), node);
        }
    }

    fn handle_python_import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .map(|n| {
                n.child_by_field_name("name")
                    .map(|inner| self.text(inner))
                    .unwrap_or_else(|| self.text(n))
                    .to_string()
            })
            .collect();

        if node.kind() == "import_from_statement" {
            let module = self.field_text(node, "module_name").unwrap_or_default();
            self.push_import(module.to_string(), names, node);
        } else {
            for name in names {
                self.push_import(name, Vec::new(), node);
            }
        }
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    child_of_kind(node, kind).is_some()
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn find_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(|c| find_descendant(c, kind))
}
