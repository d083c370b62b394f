pub mod format;

use crate::error::{read_source, CoreError, Result};
use crate::parser::{self, CodeElement};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An immutable excerpt of a file: an inclusive, 1-indexed line range plus
/// the language tag derived from the file extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    /// Verbatim lines with terminators normalized to `\n`.
    pub code: String,
    /// Empty when the extension is not recognized.
    pub language: String,
}

impl CodeBlock {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Language tag for a file extension, empty for anything unknown.
pub fn detect_language(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "cpp" | "hpp" => "cpp",
        "c" | "h" => "c",
        "cs" => "csharp",
        "rb" => "ruby",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "xml" => "xml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "sh" => "bash",
        "bat" => "batch",
        "ps1" => "powershell",
        _ => "",
    }
}

/// Capture `start_line..=end_line` (or just `start_line`) from a file.
pub fn capture(path: &Path, start_line: usize, end_line: Option<usize>) -> Result<CodeBlock> {
    let source = read_source(path)?;
    capture_from_source(path, &source, start_line, end_line)
}

fn capture_from_source(
    path: &Path,
    source: &str,
    start_line: usize,
    end_line: Option<usize>,
) -> Result<CodeBlock> {
    if start_line < 1 {
        return Err(CoreError::invalid_range(format!(
            "start_line must be >= 1, got {}",
            start_line
        )));
    }
    let end_line = end_line.unwrap_or(start_line);
    if end_line < start_line {
        return Err(CoreError::invalid_range(format!(
            "end_line ({}) must be >= start_line ({})",
            end_line, start_line
        )));
    }

    let lines: Vec<&str> = source.lines().collect();
    let total = lines.len();
    if start_line > total {
        return Err(CoreError::invalid_range(format!(
            "start_line {} exceeds file length {}",
            start_line, total
        )));
    }
    if end_line > total {
        return Err(CoreError::invalid_range(format!(
            "end_line {} exceeds file length {}",
            end_line, total
        )));
    }

    let mut code = lines[start_line - 1..end_line].join("\n");
    // The file's last line keeps its missing terminator missing.
    if end_line < total || source.ends_with('\n') {
        code.push('\n');
    }

    Ok(CodeBlock {
        file_path: path.to_path_buf(),
        start_line,
        end_line,
        code,
        language: detect_language(path).to_string(),
    })
}

/// Capture several ranges from one file, in order. The first invalid range
/// fails the whole batch.
pub fn capture_many(path: &Path, ranges: &[(usize, Option<usize>)]) -> Result<Vec<CodeBlock>> {
    let source = read_source(path)?;
    ranges
        .iter()
        .map(|&(start, end)| capture_from_source(path, &source, start, end))
        .collect()
}

fn capture_element(path: &Path, source: &str, element: &CodeElement) -> Result<CodeBlock> {
    capture_from_source(path, source, element.start_line, Some(element.end_line))
}

/// Read and analyze once, so resolution and slicing see the same text.
fn analyzed(path: &Path) -> Result<(String, Vec<CodeElement>)> {
    let source = read_source(path)?;
    let elements = parser::code_parser::CodeParser::new().parse(&path.display().to_string(), &source)?;
    Ok((source, elements))
}

pub fn capture_function(path: &Path, name: &str) -> Result<CodeBlock> {
    let (source, elements) = analyzed(path)?;
    let element = parser::find_function(&elements, name).map_err(|e| e.in_file(path))?;
    capture_element(path, &source, element)
}

pub fn capture_class(path: &Path, name: &str) -> Result<CodeBlock> {
    let (source, elements) = analyzed(path)?;
    let element = parser::find_class(&elements, name).map_err(|e| e.in_file(path))?;
    capture_element(path, &source, element)
}

pub fn capture_method(path: &Path, class_name: &str, method_name: &str) -> Result<CodeBlock> {
    let (source, elements) = analyzed(path)?;
    let element =
        parser::find_method(&elements, class_name, method_name).map_err(|e| e.in_file(path))?;
    capture_element(path, &source, element)
}

/// Capture each named function, class or method in order; any unresolved
/// name fails the batch.
pub fn capture_by_names<S: AsRef<str>>(path: &Path, names: &[S]) -> Result<Vec<CodeBlock>> {
    let (source, elements) = analyzed(path)?;
    parser::find_many(&elements, names)
        .map_err(|e| e.in_file(path))?
        .into_iter()
        .map(|element| capture_element(path, &source, element))
        .collect()
}

pub fn capture_all_functions(path: &Path, include_methods: bool) -> Result<Vec<CodeBlock>> {
    let (source, elements) = analyzed(path)?;
    parser::all_functions(&elements, include_methods)
        .into_iter()
        .map(|element| capture_element(path, &source, element))
        .collect()
}

pub fn capture_all_classes(path: &Path) -> Result<Vec<CodeBlock>> {
    let (source, elements) = analyzed(path)?;
    parser::all_classes(&elements)
        .into_iter()
        .map(|element| capture_element(path, &source, element))
        .collect()
}
