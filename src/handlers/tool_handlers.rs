use crate::capture::format::{code_documentation, format_code_block};
use crate::capture::{self, CodeBlock};
use crate::config::Config;
use crate::diff::render::{render_inline, render_side_by_side, side_by_side, unified_patch};
use crate::diff::{algorithm_from_name, compute_diff_with, DiffStats};
use crate::mcp::types::Content;
use crate::parser;
use crate::search::{format_search_results, search_in_folder, SearchOptions};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use similar::Algorithm;
use std::path::PathBuf;
use tokio::fs;

const SIDE_BY_SIDE_WIDTH: usize = 60;
const UNIFIED_CONTEXT: usize = 3;

/// What a single-symbol capture resolves.
enum Symbol {
    Method(String, String),
    Class(String),
    Function(String),
}

/// Tool handlers for MCP server
pub struct ToolHandlers {
    config: Config,
}

impl ToolHandlers {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn path_arg(&self, args: &Value, key: &str) -> Result<PathBuf> {
        let raw = str_arg(args, key)?;
        Ok(self.config.resolve(raw))
    }

    /// Handle capture_code tool
    pub async fn handle_capture_code(&self, args: &Value) -> Result<Vec<Content>> {
        let path = self.path_arg(args, "file_path")?;
        let start_line = line_arg(args, "start_line")?.context("Missing 'start_line' argument")?;
        let end_line = line_arg(args, "end_line")?;
        let line_numbers = bool_arg(args, "line_numbers", true);

        let block = blocking(move || Ok(capture::capture(&path, start_line, end_line)?)).await?;
        Ok(vec![Content::text(format_code_block(&block, line_numbers))])
    }

    /// Handle capture_blocks tool
    pub async fn handle_capture_blocks(&self, args: &Value) -> Result<Vec<Content>> {
        let path = self.path_arg(args, "file_path")?;
        let title = args
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Code Documentation");

        let ranges = args
            .get("ranges")
            .and_then(|v| v.as_array())
            .context("Missing 'ranges' argument")?
            .iter()
            .map(parse_range)
            .collect::<Result<Vec<_>>>()?;

        let blocks = blocking(move || Ok(capture::capture_many(&path, &ranges)?)).await?;
        Ok(vec![Content::text(code_documentation(&blocks, title))])
    }

    /// Handle capture_symbol tool
    pub async fn handle_capture_symbol(&self, args: &Value) -> Result<Vec<Content>> {
        let path = self.path_arg(args, "file_path")?;
        let line_numbers = bool_arg(args, "line_numbers", true);
        let class_name = args.get("class_name").and_then(|v| v.as_str());
        let method_name = args.get("method_name").and_then(|v| v.as_str());
        let name = args.get("name").and_then(|v| v.as_str());

        let blocks = if let Some(names) = args.get("names").and_then(|v| v.as_array()) {
            let names = names
                .iter()
                .map(|v| v.as_str().map(str::to_string).context("'names' must contain strings"))
                .collect::<Result<Vec<_>>>()?;
            blocking(move || Ok(capture::capture_by_names(&path, &names)?)).await?
        } else {
            let symbol = match (class_name, method_name, name) {
                (Some(class_name), Some(method_name), _) => {
                    Symbol::Method(class_name.to_string(), method_name.to_string())
                }
                (Some(class_name), None, _) => Symbol::Class(class_name.to_string()),
                (None, _, Some(name)) => Symbol::Function(name.to_string()),
                _ => bail!("Provide 'name', 'names', or 'class_name' (with optional 'method_name')"),
            };
            let block = blocking(move || {
                Ok(match symbol {
                    Symbol::Method(class_name, method_name) => {
                        capture::capture_method(&path, &class_name, &method_name)?
                    }
                    Symbol::Class(class_name) => capture::capture_class(&path, &class_name)?,
                    Symbol::Function(name) => capture::capture_function(&path, &name)?,
                })
            })
            .await?;
            vec![block]
        };

        Ok(vec![Content::text(join_blocks(&blocks, line_numbers))])
    }

    /// Handle capture_all tool
    pub async fn handle_capture_all(&self, args: &Value) -> Result<Vec<Content>> {
        let path = self.path_arg(args, "file_path")?;
        let target = args.get("target").and_then(|v| v.as_str()).unwrap_or("functions");
        let include_methods = bool_arg(args, "include_methods", false);

        let blocks = match target {
            "functions" => {
                let path = path.clone();
                blocking(move || Ok(capture::capture_all_functions(&path, include_methods)?)).await?
            }
            "classes" => {
                let path = path.clone();
                blocking(move || Ok(capture::capture_all_classes(&path)?)).await?
            }
            other => bail!("Unknown target '{}': expected 'functions' or 'classes'", other),
        };

        if blocks.is_empty() {
            return Ok(vec![Content::text(format!(
                "No {} found in {}",
                target,
                path.display()
            ))]);
        }
        Ok(vec![Content::text(join_blocks(&blocks, true))])
    }

    /// Handle summarize_file tool
    pub async fn handle_summarize_file(&self, args: &Value) -> Result<Vec<Content>> {
        let path = self.path_arg(args, "file_path")?;
        let text = match args.get("format").and_then(|v| v.as_str()).unwrap_or("text") {
            "text" => blocking(move || Ok(parser::file_summary(&path)?)).await?,
            "json" => {
                let elements = blocking(move || Ok(parser::analyze_file(&path)?)).await?;
                serde_json::to_string_pretty(&elements)?
            }
            other => bail!("Unknown format '{}': expected 'text' or 'json'", other),
        };
        Ok(vec![Content::text(text)])
    }

    /// Handle compute_diff tool
    pub async fn handle_compute_diff(&self, args: &Value) -> Result<Vec<Content>> {
        let old = self.text_or_file(args, "old_code", "old_path").await?;
        let new = self.text_or_file(args, "new_code", "new_path").await?;
        let algorithm = match args.get("algorithm").and_then(|v| v.as_str()) {
            Some(name) => algorithm_from_name(name)
                .with_context(|| format!("Unknown algorithm '{}': expected myers, patience or lcs", name))?,
            None => Algorithm::Myers,
        };
        let view = args.get("view").and_then(|v| v.as_str()).unwrap_or("inline");

        let lines = compute_diff_with(&old, &new, algorithm);
        let stats = DiffStats::of(&lines);
        if stats.is_identical() {
            return Ok(vec![Content::text(format!(
                "No differences ({} identical lines)",
                stats.unchanged
            ))]);
        }

        let body = match view {
            "inline" => render_inline(&lines, true),
            "side_by_side" => render_side_by_side(&side_by_side(&lines), SIDE_BY_SIDE_WIDTH),
            "unified" => unified_patch(&lines, UNIFIED_CONTEXT),
            other => bail!(
                "Unknown view '{}': expected 'inline', 'side_by_side' or 'unified'",
                other
            ),
        };

        Ok(vec![Content::text(format!(
            "+{} -{} ({} unchanged)\n\n{}",
            stats.added, stats.removed, stats.unchanged, body
        ))])
    }

    async fn text_or_file(&self, args: &Value, text_key: &str, path_key: &str) -> Result<String> {
        if let Some(text) = args.get(text_key).and_then(|v| v.as_str()) {
            return Ok(text.to_string());
        }
        let path = self
            .path_arg(args, path_key)
            .with_context(|| format!("Provide '{}' or '{}'", text_key, path_key))?;
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Handle search_folder tool
    pub async fn handle_search_folder(&self, args: &Value) -> Result<Vec<Content>> {
        let folder = self.path_arg(args, "folder_path")?;
        let query = str_arg(args, "query")?.to_string();
        let show_context = bool_arg(args, "show_context", true);

        let mut options = SearchOptions {
            is_regex: bool_arg(args, "is_regex", false),
            case_sensitive: bool_arg(args, "case_sensitive", false),
            context_lines: count_arg(args, "context_lines").unwrap_or(self.config.search_context_lines),
            max_results: count_arg(args, "max_results").unwrap_or(self.config.search_max_results),
            ..SearchOptions::default()
        };
        if let Some(extensions) = args.get("extensions").and_then(|v| v.as_array()) {
            options.extensions = extensions
                .iter()
                .filter_map(|v| v.as_str())
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }

        tracing::debug!("Searching {} for {:?}", folder.display(), query);
        let summary = blocking(move || Ok(search_in_folder(&folder, &query, &options)?)).await?;

        Ok(vec![Content::text(format_search_results(&summary, show_context))])
    }
}

/// File reads and parsing run on the blocking pool, off the request loop.
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("Blocking task failed")?
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing '{}' argument", key))
}

fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn count_arg(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

/// Optional line number. Present but not a non-negative integer is an error.
fn line_arg(args: &Value, key: &str) -> Result<Option<usize>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .with_context(|| format!("'{}' must be a non-negative integer", key)),
    }
}

/// `[start]`, `[start, end]` or `{"start": .., "end": ..}`.
fn parse_range(value: &Value) -> Result<(usize, Option<usize>)> {
    let (start, end) = match value {
        Value::Array(items) => (items.first(), items.get(1)),
        Value::Object(map) => (map.get("start"), map.get("end")),
        _ => bail!("Each range must be [start, end] or {{\"start\", \"end\"}}"),
    };
    let start = start
        .and_then(|v| v.as_u64())
        .context("Range is missing a valid start line")? as usize;
    let end = match end {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_u64().context("Range end must be a non-negative integer")? as usize),
    };
    Ok((start, end))
}

fn join_blocks(blocks: &[CodeBlock], line_numbers: bool) -> String {
    blocks
        .iter()
        .map(|block| format_code_block(block, line_numbers))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ErrorKind};
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    const MODULE: &str = "def foo():\n    return 1\n\n\nclass Bar:\n    def baz(self):\n        return 2\n";

    fn handlers(root: &Path) -> ToolHandlers {
        ToolHandlers::new(Config {
            root: root.to_path_buf(),
            ..Config::default()
        })
    }

    fn text(content: Vec<Content>) -> String {
        match content.into_iter().next() {
            Some(Content::Text { text }) => text,
            None => panic!("no content"),
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("module.py"), MODULE).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_capture_code_resolves_relative_paths() {
        let dir = fixture();
        let out = handlers(dir.path())
            .handle_capture_code(&json!({"file_path": "module.py", "start_line": 1, "end_line": 2}))
            .await
            .unwrap();
        assert!(text(out).ends_with("```python\n1 | def foo():\n2 |     return 1\n```"));
    }

    #[tokio::test]
    async fn test_capture_code_errors() {
        let dir = fixture();
        let handlers = handlers(dir.path());

        let err = handlers
            .handle_capture_code(&json!({"file_path": "module.py"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start_line"));

        let err = handlers
            .handle_capture_code(&json!({"file_path": "module.py", "start_line": 0}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid range"));
    }

    #[tokio::test]
    async fn test_capture_blocks() {
        let dir = fixture();
        let out = handlers(dir.path())
            .handle_capture_blocks(&json!({
                "file_path": "module.py",
                "ranges": [[1, 2], {"start": 5}],
                "title": "Tour"
            }))
            .await
            .unwrap();
        let doc = text(out);
        assert!(doc.starts_with("# Tour\n\n## Block 1\n"));
        assert!(doc.contains("## Block 2\n"));
        assert!(doc.contains("Lines 5-5"));
    }

    #[tokio::test]
    async fn test_capture_symbol_variants() {
        let dir = fixture();
        let handlers = handlers(dir.path());

        let out = handlers
            .handle_capture_symbol(&json!({"file_path": "module.py", "class_name": "Bar", "method_name": "baz"}))
            .await
            .unwrap();
        assert!(text(out).contains("Lines 6-7"));

        let out = handlers
            .handle_capture_symbol(&json!({"file_path": "module.py", "names": ["Bar", "foo"]}))
            .await
            .unwrap();
        let both = text(out);
        assert!(both.find("Lines 5-7").unwrap() < both.find("Lines 1-2").unwrap());

        let err = handlers
            .handle_capture_symbol(&json!({"file_path": "module.py", "name": "nope"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("function 'nope'"));
    }

    #[tokio::test]
    async fn test_summarize_file_json() {
        let dir = fixture();
        let out = handlers(dir.path())
            .handle_summarize_file(&json!({"file_path": "module.py", "format": "json"}))
            .await
            .unwrap();
        let elements: Value = serde_json::from_str(&text(out)).unwrap();
        assert_eq!(elements[2]["name"], "baz");
        assert_eq!(elements[2]["kind"], "method");
        assert_eq!(elements[2]["parent_class"], "Bar");
    }

    #[tokio::test]
    async fn test_compute_diff_views() {
        let dir = fixture();
        let handlers = handlers(dir.path());

        let out = handlers
            .handle_compute_diff(&json!({"old_code": "a\nb\nc\n", "new_code": "a\nx\nc\n"}))
            .await
            .unwrap();
        assert_eq!(text(out), "+1 -1 (2 unchanged)\n\n1 1   a\n2   - b\n  2 + x\n3 3   c");

        let out = handlers
            .handle_compute_diff(&json!({
                "old_path": "module.py",
                "new_code": MODULE.replace("return 2", "return 3"),
                "view": "unified"
            }))
            .await
            .unwrap();
        assert!(text(out).contains("+        return 3"));

        let out = handlers
            .handle_compute_diff(&json!({"old_code": "same\n", "new_code": "same\n"}))
            .await
            .unwrap();
        assert_eq!(text(out), "No differences (1 identical lines)");

        let err = handlers
            .handle_compute_diff(&json!({"old_code": "a", "new_code": "b", "view": "fancy"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown view"));
    }

    #[tokio::test]
    async fn test_unified_view_agrees_with_counts() {
        let dir = fixture();
        let out = handlers(dir.path())
            .handle_compute_diff(&json!({
                "old_code": "a\r\nb\r\nc\r\n",
                "new_code": "a\nx\nc\n",
                "view": "unified"
            }))
            .await
            .unwrap();
        let text = text(out);
        assert_eq!(
            text,
            "+1 -1 (2 unchanged)\n\n--- old\n+++ new\n@@ -1,3 +1,3 @@\n a\n-b\n+x\n c\n"
        );

        let body = text.split_once("\n\n").unwrap().1;
        let removed = body.lines().filter(|l| l.starts_with('-') && !l.starts_with("---")).count();
        let added = body.lines().filter(|l| l.starts_with('+') && !l.starts_with("+++")).count();
        assert_eq!((added, removed), (1, 1));
    }

    #[tokio::test]
    async fn test_blocking_tasks_keep_core_errors() {
        let dir = fixture();
        let err = handlers(dir.path())
            .handle_capture_symbol(&json!({"file_path": "gone.py", "name": "foo"}))
            .await
            .unwrap_err();
        let kind = err.downcast_ref::<CoreError>().map(|e| e.kind());
        assert_eq!(kind, Some(ErrorKind::NotFound));

        let value = blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_search_folder() {
        let dir = fixture();
        let out = handlers(dir.path())
            .handle_search_folder(&json!({"folder_path": ".", "query": "RETURN", "show_context": false}))
            .await
            .unwrap();
        assert!(text(out).contains("Matches: 2 in 1 files"));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(&json!([3, 9])).unwrap(), (3, Some(9)));
        assert_eq!(parse_range(&json!([3])).unwrap(), (3, None));
        assert_eq!(parse_range(&json!({"start": 4, "end": null})).unwrap(), (4, None));
        assert!(parse_range(&json!("3-9")).is_err());
        assert!(parse_range(&json!([-1])).is_err());
    }
}
