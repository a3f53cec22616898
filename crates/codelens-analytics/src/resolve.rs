//! Mapping import specifiers to indexed document paths.
//!
//! Only project-local imports resolve: relative script imports (`./`, `../`),
//! Python modules (leading dots or dotted paths under the root) and Rust
//! `crate::`, `self::` and `super::` paths. Everything else is external and
//! yields no candidates.

use codelens_indexer::Language;

const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Candidate document paths for `module` imported from `importer`, most
/// specific first. The first candidate that names a known document wins.
pub fn candidates(importer: &str, module: &str, language: Language) -> Vec<String> {
    let module = module.trim();
    if module.is_empty() {
        return Vec::new();
    }
    match language {
        Language::TypeScript | Language::JavaScript => script_candidates(importer, module),
        Language::Python => python_candidates(importer, module),
        Language::Rust => rust_candidates(importer, module),
        _ if is_relative(module) => join(parent_dir(importer), module).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn is_relative(module: &str) -> bool {
    module == "." || module == ".." || module.starts_with("./") || module.starts_with("../")
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Join `rel` onto `dir`, folding `.` and `..`. `None` when the result
/// would escape the root.
fn join(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

fn script_candidates(importer: &str, module: &str) -> Vec<String> {
    if !is_relative(module) {
        return Vec::new();
    }
    let Some(base) = join(parent_dir(importer), module) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let file_name = base.rsplit('/').next().unwrap_or(&base);
    if file_name.contains('.') {
        out.push(base.clone());
        // TypeScript sources are often imported by their emitted `.js` name
        if let Some(stem) = base.strip_suffix(".js") {
            out.push(format!("{}.ts", stem));
            out.push(format!("{}.tsx", stem));
        }
    }
    for ext in SCRIPT_EXTENSIONS {
        out.push(format!("{}.{}", base, ext));
    }
    for ext in SCRIPT_EXTENSIONS {
        out.push(prefixed(&base, &format!("index.{}", ext)));
    }
    out
}

fn python_candidates(importer: &str, module: &str) -> Vec<String> {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = module[dots..].replace('.', "/");

    let base = if dots == 0 {
        rest
    } else {
        let mut dir = parent_dir(importer).to_string();
        for _ in 1..dots {
            if dir.is_empty() {
                return Vec::new();
            }
            dir = parent_dir(&dir).to_string();
        }
        match join(&dir, &rest) {
            Some(base) => base,
            None => return Vec::new(),
        }
    };

    if base.is_empty() {
        return vec!["__init__.py".to_string()];
    }
    vec![format!("{}.py", base), format!("{}/__init__.py", base)]
}

fn rust_candidates(importer: &str, module: &str) -> Vec<String> {
    let segments: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
    let (dir, rest) = match segments.first() {
        Some(&"crate") => (crate_root(importer), &segments[1..]),
        Some(&"self") => (module_dir(importer), &segments[1..]),
        Some(&"super") => {
            let mut dir = module_dir(importer);
            let mut consumed = 0;
            while segments.get(consumed) == Some(&"super") {
                if dir.is_empty() {
                    return Vec::new();
                }
                dir = parent_dir(&dir).to_string();
                consumed += 1;
            }
            (dir, &segments[consumed..])
        }
        _ => return Vec::new(),
    };

    if rest.is_empty() {
        return module_files(&dir, &crate_root(importer));
    }

    // `crate::a::b` may name module `a::b` or item `b` in module `a`
    let mut out = Vec::new();
    for len in (1..=rest.len()).rev() {
        let Some(path) = join(&dir, &rest[..len].join("/")) else {
            continue;
        };
        out.push(format!("{}.rs", path));
        out.push(format!("{}/mod.rs", path));
    }
    out
}

/// Files that can define the module rooted at `dir`.
fn module_files(dir: &str, crate_root: &str) -> Vec<String> {
    if dir == crate_root {
        return vec![prefixed(dir, "lib.rs"), prefixed(dir, "main.rs")];
    }
    vec![format!("{}.rs", dir), format!("{}/mod.rs", dir)]
}

/// Directory holding the crate root: everything up to the first `src`.
fn crate_root(importer: &str) -> String {
    let parts: Vec<&str> = importer.split('/').collect();
    match parts.iter().position(|p| *p == "src") {
        Some(idx) => parts[..=idx].join("/"),
        None => String::new(),
    }
}

/// Directory where child modules of `importer` live.
fn module_dir(importer: &str) -> String {
    let dir = parent_dir(importer);
    let file = importer.rsplit('/').next().unwrap_or(importer);
    let stem = file.strip_suffix(".rs").unwrap_or(file);
    match stem {
        "mod" | "lib" | "main" => dir.to_string(),
        _ => prefixed(dir, stem),
    }
}

fn prefixed(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_relative_imports() {
        let found = candidates("src/auth/login.ts", "./crypto", Language::TypeScript);
        assert_eq!(found[0], "src/auth/crypto.ts");
        assert!(found.contains(&"src/auth/crypto/index.ts".to_string()));

        let found = candidates("src/auth/login.ts", "../util/hash.js", Language::TypeScript);
        assert_eq!(found[0], "src/util/hash.js");
        assert_eq!(found[1], "src/util/hash.ts");
    }

    #[test]
    fn test_external_imports_have_no_candidates() {
        assert!(candidates("src/a.ts", "react", Language::TypeScript).is_empty());
        assert!(candidates("src/lib.rs", "std::collections", Language::Rust).is_empty());
        assert!(candidates("main.go", "fmt", Language::Go).is_empty());
    }

    #[test]
    fn test_escaping_root_is_unresolved() {
        assert!(candidates("a.ts", "../../x", Language::TypeScript).is_empty());
    }

    #[test]
    fn test_python_imports() {
        assert_eq!(
            candidates("pkg/sub/mod.py", ".helpers", Language::Python),
            vec!["pkg/sub/helpers.py", "pkg/sub/helpers/__init__.py"]
        );
        assert_eq!(
            candidates("pkg/sub/mod.py", "..core", Language::Python),
            vec!["pkg/core.py", "pkg/core/__init__.py"]
        );
        assert_eq!(
            candidates("app.py", "pkg.models", Language::Python),
            vec!["pkg/models.py", "pkg/models/__init__.py"]
        );
    }

    #[test]
    fn test_rust_paths() {
        let found = candidates("src/lib.rs", "self::store", Language::Rust);
        assert_eq!(found, vec!["src/store.rs", "src/store/mod.rs"]);

        let found = candidates("src/query/engine.rs", "crate::store", Language::Rust);
        assert_eq!(found, vec!["src/store.rs", "src/store/mod.rs"]);

        let found = candidates("src/query/engine.rs", "super::history", Language::Rust);
        assert_eq!(found[0], "src/query/history.rs");

        let found = candidates("src/query/mod.rs", "self::engine", Language::Rust);
        assert_eq!(found[0], "src/query/engine.rs");

        let found = candidates("src/query/engine.rs", "super", Language::Rust);
        assert_eq!(found, vec!["src/query.rs", "src/query/mod.rs"]);

        let found = candidates("crates/x/src/a/b.rs", "crate::a::c", Language::Rust);
        assert_eq!(found[0], "crates/x/src/a/c.rs");
        assert_eq!(found[2], "crates/x/src/a.rs");
    }
}
