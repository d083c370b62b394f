pub mod code_parser;

use crate::error::{read_source, CoreError, Result};
use code_parser::CodeParser;
use serde::Serialize;
use std::path::Path;

/// A named function, class or method located in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeElement {
    pub name: String,
    pub kind: ElementKind,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive.
    pub end_line: usize,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    /// Enclosing class, set only for methods.
    pub parent_class: Option<String>,
}

/// Type of code element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Function,
    AsyncFunction,
    Class,
    Method,
    AsyncMethod,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::AsyncFunction => "async_function",
            ElementKind::Class => "class",
            ElementKind::Method => "method",
            ElementKind::AsyncMethod => "async_method",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, ElementKind::Function | ElementKind::AsyncFunction)
    }

    pub fn is_method(&self) -> bool {
        matches!(self, ElementKind::Method | ElementKind::AsyncMethod)
    }

    pub fn is_async(&self) -> bool {
        matches!(self, ElementKind::AsyncFunction | ElementKind::AsyncMethod)
    }
}

impl CodeElement {
    fn first_doc_line(&self) -> Option<&str> {
        self.docstring.as_deref().and_then(|doc| doc.lines().next())
    }

    fn contains(&self, other: &CodeElement) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }
}

/// Analyze Python source text held in memory.
pub fn analyze(source: &str) -> Result<Vec<CodeElement>> {
    CodeParser::new().parse("<source>", source)
}

/// Analyze a Python file. A missing file fails before any parse is attempted.
pub fn analyze_file(path: &Path) -> Result<Vec<CodeElement>> {
    let source = read_source(path)?;
    CodeParser::new().parse(&path.display().to_string(), &source)
}

pub fn find_function<'a>(elements: &'a [CodeElement], name: &str) -> Result<&'a CodeElement> {
    elements
        .iter()
        .find(|e| e.kind.is_function() && e.name == name)
        .ok_or_else(|| CoreError::not_found(format!("function '{}'", name)))
}

pub fn find_class<'a>(elements: &'a [CodeElement], name: &str) -> Result<&'a CodeElement> {
    elements
        .iter()
        .find(|e| e.kind == ElementKind::Class && e.name == name)
        .ok_or_else(|| CoreError::not_found(format!("class '{}'", name)))
}

pub fn find_method<'a>(
    elements: &'a [CodeElement],
    class_name: &str,
    method_name: &str,
) -> Result<&'a CodeElement> {
    find_class(elements, class_name)?;
    elements
        .iter()
        .find(|e| {
            e.kind.is_method()
                && e.name == method_name
                && e.parent_class.as_deref() == Some(class_name)
        })
        .ok_or_else(|| CoreError::not_found(format!("method '{}.{}'", class_name, method_name)))
}

/// Resolve every name, in order, to the first element carrying it.
/// The first unresolved name fails the whole batch.
pub fn find_many<'a, S: AsRef<str>>(
    elements: &'a [CodeElement],
    names: &[S],
) -> Result<Vec<&'a CodeElement>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            elements
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| CoreError::not_found(format!("'{}'", name)))
        })
        .collect()
}

pub fn all_functions(elements: &[CodeElement], include_methods: bool) -> Vec<&CodeElement> {
    elements
        .iter()
        .filter(|e| e.kind.is_function() || (include_methods && e.kind.is_method()))
        .collect()
}

pub fn all_classes(elements: &[CodeElement]) -> Vec<&CodeElement> {
    elements
        .iter()
        .filter(|e| e.kind == ElementKind::Class)
        .collect()
}

fn methods_of<'a>(
    elements: &'a [CodeElement],
    class: &'a CodeElement,
) -> impl Iterator<Item = &'a CodeElement> {
    elements.iter().filter(move |e| {
        e.kind.is_method() && e.parent_class.as_deref() == Some(class.name.as_str()) && class.contains(e)
    })
}

/// Human-readable outline: classes with their methods indented beneath
/// them, then top-level functions, each with the first docstring line.
pub fn summarize(elements: &[CodeElement]) -> String {
    if elements.is_empty() {
        return "(no functions or classes found)".to_string();
    }

    let mut lines = Vec::new();
    for element in elements {
        match element.kind {
            ElementKind::Class => {
                lines.push(format!(
                    "## Class: {} (lines {}-{})",
                    element.name, element.start_line, element.end_line
                ));
                if let Some(doc) = element.first_doc_line() {
                    lines.push(format!("   {}", doc));
                }
                for method in methods_of(elements, element) {
                    let prefix = if method.kind.is_async() { "async " } else { "" };
                    lines.push(format!(
                        "   - {}{}() (lines {}-{})",
                        prefix, method.name, method.start_line, method.end_line
                    ));
                    if let Some(doc) = method.first_doc_line() {
                        lines.push(format!("     {}", doc));
                    }
                }
                lines.push(String::new());
            }
            ElementKind::Function | ElementKind::AsyncFunction => {
                let prefix = if element.kind.is_async() { "async " } else { "" };
                lines.push(format!(
                    "### {}Function: {}() (lines {}-{})",
                    prefix, element.name, element.start_line, element.end_line
                ));
                if let Some(doc) = element.first_doc_line() {
                    lines.push(format!("   {}", doc));
                }
                lines.push(String::new());
            }
            // Listed under their owning class.
            ElementKind::Method | ElementKind::AsyncMethod => {}
        }
    }

    lines.join("\n").trim_end().to_string()
}

pub fn file_summary(path: &Path) -> Result<String> {
    let elements = analyze_file(path)?;
    Ok(format!(
        "# Code Summary: {}\n\n{}",
        path.display(),
        summarize(&elements)
    ))
}
