//! Source discovery and analysis.
//!
//! Provides gitignore-aware file walking, language detection, and the
//! tree-sitter backed analysis producer.

mod language;
mod producer;
mod walker;

pub use language::{detect_language, detect_language_from_content, Language};
pub use producer::TreeSitterProducer;
pub use walker::{relative_path, FileEntry, Walker};
