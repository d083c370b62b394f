use crate::error::{CoreError, Result};
use ignore::WalkBuilder;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extensions searched when the caller does not name any.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "c", "cpp", "h", "hpp", "cs", "go", "rs", "rb", "php",
    "swift", "kt", "scala", "html", "css", "scss", "less", "vue", "svelte", "json", "yaml", "yml",
    "xml", "toml", "ini", "cfg", "md", "txt", "rst", "sql", "sh", "bash", "ps1", "bat",
];

/// Directory names never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "__pycache__", "node_modules", ".git", ".svn", ".hg", "venv", ".venv", "env", ".env", "dist",
    "build", "target", "out", "bin", "obj", ".idea", ".vscode", ".vs", "coverage",
    ".pytest_cache", ".mypy_cache",
];

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub is_regex: bool,
    pub case_sensitive: bool,
    /// Lowercase extensions without the dot.
    pub extensions: HashSet<String>,
    pub exclude_dirs: HashSet<String>,
    pub context_lines: usize,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            is_regex: false,
            case_sensitive: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDES.iter().map(|e| e.to_string()).collect(),
            context_lines: 2,
            max_results: 1000,
        }
    }
}

/// A matching line. Offsets count characters within `line_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub line_content: String,
    pub match_start: usize,
    pub match_end: usize,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub file_path: PathBuf,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub query: String,
    pub is_regex: bool,
    pub folder_path: PathBuf,
    pub results: Vec<SearchResult>,
}

impl SearchSummary {
    pub fn total_matches(&self) -> usize {
        self.results.iter().map(|r| r.matches.len()).sum()
    }

    pub fn files_with_matches(&self) -> usize {
        self.results.iter().filter(|r| !r.matches.is_empty()).count()
    }
}

/// Search every eligible file under `folder` for `query`, line by line.
pub fn search_in_folder(folder: &Path, query: &str, options: &SearchOptions) -> Result<SearchSummary> {
    if !folder.is_dir() {
        return Err(CoreError::not_found(format!("folder {}", folder.display())));
    }

    let pattern = compile(query, options)?;
    let mut summary = SearchSummary {
        query: query.to_string(),
        is_regex: options.is_regex,
        folder_path: folder.to_path_buf(),
        results: Vec::new(),
    };

    let excludes = options.exclude_dirs.clone();
    let walker = WalkBuilder::new(folder)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            let name = entry.file_name().to_string_lossy();
            !(is_dir && entry.depth() > 0 && excludes.contains(&*name))
        })
        .build();

    let mut remaining = options.max_results;
    for entry in walker.flatten() {
        if remaining == 0 {
            break;
        }
        if entry.file_type().map_or(true, |ft| !ft.is_file()) {
            continue;
        }
        let path = entry.path();
        if !has_extension(path, &options.extensions) {
            continue;
        }

        // Unreadable files are skipped.
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        let text = String::from_utf8_lossy(&bytes);

        let matches = search_text(path, &text, &pattern, options.context_lines, remaining);
        if !matches.is_empty() {
            remaining -= matches.len();
            summary.results.push(SearchResult {
                file_path: path.to_path_buf(),
                matches,
            });
        }
    }

    Ok(summary)
}

fn compile(query: &str, options: &SearchOptions) -> Result<Regex> {
    let source = if options.is_regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    Ok(RegexBuilder::new(&source)
        .case_insensitive(!options.case_sensitive)
        .build()?)
}

fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.contains(&e.to_ascii_lowercase()))
}

fn search_text(
    path: &Path,
    text: &str,
    pattern: &Regex,
    context_lines: usize,
    limit: usize,
) -> Vec<SearchMatch> {
    let lines: Vec<&str> = text.lines().collect();
    let mut matches = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if matches.len() >= limit {
            break;
        }
        let Some(found) = pattern.find(line) else {
            continue;
        };

        let before = i.saturating_sub(context_lines);
        let after = (i + context_lines + 1).min(lines.len());
        matches.push(SearchMatch {
            file_path: path.to_path_buf(),
            line_number: i + 1,
            line_content: line.to_string(),
            match_start: line[..found.start()].chars().count(),
            match_end: line[..found.end()].chars().count(),
            context_before: lines[before..i].iter().map(|l| l.to_string()).collect(),
            context_after: lines[i + 1..after].iter().map(|l| l.to_string()).collect(),
        });
    }

    matches
}

/// Plain-text report of a search.
pub fn format_search_results(summary: &SearchSummary, show_context: bool) -> String {
    let mut lines = vec![
        format!("Search results for: '{}'", summary.query),
        format!("   Folder: {}", summary.folder_path.display()),
        format!(
            "   Matches: {} in {} files",
            summary.total_matches(),
            summary.files_with_matches()
        ),
        String::new(),
    ];

    for result in &summary.results {
        lines.push(format!(
            "{} ({} matches)",
            result.file_path.display(),
            result.matches.len()
        ));
        for m in &result.matches {
            lines.push(format!("   Line {}: {}", m.line_number, m.line_content.trim()));
            if show_context {
                lines.extend(m.context_before.iter().map(|c| format!("      | {}", c)));
                lines.push(format!("   >> | {}", m.line_content));
                lines.extend(m.context_after.iter().map(|c| format!("      | {}", c)));
                lines.push(String::new());
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
