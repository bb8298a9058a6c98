//! Declaration linting - static analysis of model declaration files.
//!
//! Checks declaration files for:
//! - JSON syntax and declaration shape errors
//! - References to models that are never declared
//! - Masks that do not parse
//! - Discriminator conflicts and polymorphic fields without one common ancestor

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{LoadError, ModelError};
use crate::field::{Field, FieldType};
use crate::loader::{declaration_values, load_document, parse_declaration, register_declaration};
use crate::model::ModelRegistry;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON pointer to the issue (e.g., "/models/0/fields/owner")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_declaration_files(path);
    let results: Vec<FileResult> = files.iter().map(|file| lint_file(file, path)).collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| match r.status {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

struct Collector<'a> {
    file: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

impl Collector<'_> {
    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path: path.to_string(),
            message,
        });
    }

    fn error(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Error, code, path, message);
    }

    fn warning(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Warning, code, path, message);
    }

    /// Report a registry error under the code matching its cause.
    fn model_error(&mut self, path: &str, error: &ModelError) {
        let code = match error {
            ModelError::UnknownModel { .. } => "E002",
            ModelError::DuplicateDiscriminator { .. } | ModelError::AmbiguousAncestor { .. } => {
                "E004"
            }
            ModelError::DuplicateModel { .. } | ModelError::InheritanceCycle { .. } => "E001",
        };
        self.error(code, path, error.to_string());
    }
}

/// Lint a single declaration file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut collector = Collector {
        file,
        diagnostics: Vec::new(),
    };
    check_document(file, &mut collector);

    let has_errors = collector
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    let status = if has_errors {
        FileStatus::Error
    } else if collector.diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics: collector.diagnostics,
    }
}

fn check_document(file: &Path, collector: &mut Collector<'_>) {
    let document = match load_document(file) {
        Ok(document) => document,
        Err(e) => {
            collector.error("E001", "/", format!("syntax error: {}", e));
            return;
        }
    };
    let values = match declaration_values(&document) {
        Ok(values) => values,
        Err(e) => {
            collector.error("E001", "/models", e.to_string());
            return;
        }
    };

    let mut registry = ModelRegistry::new();
    let mut pointers: HashMap<String, String> = HashMap::new();

    for (pointer, value) in values {
        let decl = match parse_declaration(value, &pointer) {
            Ok(decl) => decl,
            Err(LoadError::InvalidMask { path, source }) => {
                collector.error("E003", &path, format!("invalid mask: {}", source));
                continue;
            }
            Err(LoadError::InvalidDeclaration { path, message }) => {
                collector.error("E001", &path, message);
                continue;
            }
            Err(e) => {
                collector.error("E001", &pointer, e.to_string());
                continue;
            }
        };

        if decl.fields.is_empty() && decl.parents.is_empty() && decl.sources.is_empty() {
            collector.warning("W001", &pointer, format!("model '{}' has no fields", decl.name));
        }
        if decl.description.is_none() {
            collector.warning(
                "W002",
                &pointer,
                format!("model '{}' has no description", decl.name),
            );
        }

        let name = decl.name.clone();
        match register_declaration(&mut registry, decl) {
            Ok(()) => {
                pointers.insert(name, pointer);
            }
            Err(LoadError::Model(e)) => collector.model_error(&pointer, &e),
            Err(e) => collector.error("E001", &pointer, e.to_string()),
        }
    }

    for model in registry.iter() {
        let pointer = pointers.get(model.name()).map(String::as_str).unwrap_or("/");
        if let Err(e) = registry.resolve(model) {
            collector.model_error(pointer, &e);
        }
        for (name, field) in model.fields() {
            check_field(field, &registry, &format!("{}/fields/{}", pointer, name), collector);
        }
    }
}

fn check_field(field: &Field, registry: &ModelRegistry, path: &str, collector: &mut Collector<'_>) {
    match &field.field_type {
        FieldType::List { items, .. } => {
            check_field(items, registry, &format!("{}/items", path), collector);
        }
        FieldType::Nested { model, .. } => {
            if !registry.contains(model.name()) {
                collector.error("E002", path, format!("unknown model '{}'", model.name()));
            }
        }
        FieldType::Polymorphic { mapping } => {
            let missing: Vec<&str> = mapping
                .values()
                .map(String::as_str)
                .filter(|name| !registry.contains(name))
                .collect();
            if !missing.is_empty() {
                for name in missing {
                    collector.error("E002", path, format!("unknown model '{}'", name));
                }
            } else if let Err(e) = registry.common_ancestor(mapping.values().map(String::as_str)) {
                collector.model_error(path, &e);
            }
        }
        FieldType::Primitive(_) => {}
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_declaration_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().is_some_and(|e| e == "json") {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
}
