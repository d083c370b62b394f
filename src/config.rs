use std::path::{Path, PathBuf};

const DEFAULT_MAX_RESULTS: usize = 1000;
const DEFAULT_CONTEXT_LINES: usize = 2;

/// Server settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base for relative tool paths.
    pub root: PathBuf,
    pub search_max_results: usize,
    pub search_context_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            search_max_results: DEFAULT_MAX_RESULTS,
            search_context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            root: lookup("CODE_CAPTURE_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            search_max_results: parse_count(
                "CODE_CAPTURE_MAX_RESULTS",
                lookup("CODE_CAPTURE_MAX_RESULTS"),
                defaults.search_max_results,
            ),
            search_context_lines: parse_count(
                "CODE_CAPTURE_CONTEXT_LINES",
                lookup("CODE_CAPTURE_CONTEXT_LINES"),
                defaults.search_context_lines,
            ),
        }
    }

    /// Resolve a tool-supplied path against [`Config::root`].
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn parse_count(key: &str, value: Option<String>, default: usize) -> usize {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.search_max_results, 1000);
        assert_eq!(config.search_context_lines, 2);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = config(&[
            ("CODE_CAPTURE_ROOT", "/srv/project"),
            ("CODE_CAPTURE_MAX_RESULTS", "50"),
            ("CODE_CAPTURE_CONTEXT_LINES", "lots"),
        ]);
        assert_eq!(config.root, PathBuf::from("/srv/project"));
        assert_eq!(config.search_max_results, 50);
        assert_eq!(config.search_context_lines, 2);
    }

    #[test]
    fn test_resolve() {
        let config = config(&[("CODE_CAPTURE_ROOT", "/srv/project")]);
        assert_eq!(config.resolve("src/app.py"), PathBuf::from("/srv/project/src/app.py"));
        assert_eq!(config.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
