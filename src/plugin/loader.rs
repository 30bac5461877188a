//! Handler manifests and directory loading.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::builtin::HttpHandler;
use super::handler::Handler;
use super::matcher::{Matcher, Matchers};
use super::LoadError;

/// One `[[plugin.matchers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherSpec {
    pub pattern: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The `[plugin]` table of a handler manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginSpec {
    /// Handler type. Must name a kind known to the loader.
    #[serde(default)]
    pub kind: Option<String>,
    /// Optional target URL template, `{group}` filled from captures.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub matchers: Vec<MatcherSpec>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    plugin: Option<PluginSpec>,
}

/// Builds a handler of one kind from its manifest and compiled matchers.
pub type KindFactory =
    Arc<dyn Fn(&str, &PluginSpec, Matchers) -> Result<Arc<dyn Handler>, LoadError> + Send + Sync>;

/// Turns handler manifests into handlers.
#[derive(Clone)]
pub struct PluginLoader {
    kinds: BTreeMap<String, KindFactory>,
}

impl PluginLoader {
    /// Loader that knows the `http` kind.
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
        .with_kind("http", |name, spec, matchers| {
            HttpHandler::from_spec(name, spec, matchers).map(|h| Arc::new(h) as Arc<dyn Handler>)
        })
    }

    /// Register (or replace) a handler kind.
    #[must_use]
    pub fn with_kind<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str, &PluginSpec, Matchers) -> Result<Arc<dyn Handler>, LoadError>
            + Send
            + Sync
            + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Names of the known kinds.
    pub fn kinds(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    /// Load every `*.toml` manifest in `dir`, in file name order.
    ///
    /// An unreadable directory yields nothing. A manifest that fails to
    /// load is logged and skipped.
    pub fn load_dir(&self, dir: &Path) -> Vec<(String, Arc<dyn Handler>)> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to read plugin directory {}: {err}", dir.display());
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension() == Some(OsStr::new("toml")))
            .collect();
        files.sort();

        let mut loaded = Vec::new();
        for file in files {
            let Some(name) = file.file_stem().and_then(OsStr::to_str) else {
                continue;
            };
            match self.load_file(name, &file) {
                Ok(Some(handler)) => {
                    debug!("Loaded plugin {name} from {}", file.display());
                    loaded.push((name.to_string(), handler));
                }
                Ok(None) => debug!("No plugin in {}", file.display()),
                Err(err) => warn!("Failed to load plugin {name}: {err}"),
            }
        }
        loaded
    }

    /// Load one manifest file as handler `name`.
    pub fn load_file(&self, name: &str, path: &Path) -> Result<Option<Arc<dyn Handler>>, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(name, &content)
    }

    /// Load a manifest from its TOML text.
    ///
    /// `Ok(None)` means the manifest declares no handler, or one of a kind
    /// this loader does not know.
    pub fn load_str(&self, name: &str, content: &str) -> Result<Option<Arc<dyn Handler>>, LoadError> {
        validate_name(name)?;

        let file: ManifestFile = toml::from_str(content).map_err(|source| LoadError::Parse {
            name: name.to_string(),
            source,
        })?;
        let Some(spec) = file.plugin else {
            return Ok(None);
        };
        let Some(factory) = spec.kind.as_deref().and_then(|kind| self.kinds.get(kind)) else {
            debug!("Plugin {name} has no recognized kind ({:?})", spec.kind);
            return Ok(None);
        };

        let matchers = compile_matchers(name, &spec.matchers)?;
        factory(name, &spec, matchers).map(Some)
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), LoadError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(LoadError::InvalidName(name.to_string()))
    }
}

fn compile_matchers(name: &str, specs: &[MatcherSpec]) -> Result<Matchers, LoadError> {
    let mut matchers = Matchers::new();
    for spec in specs {
        let mut matcher = Matcher::new(&spec.pattern).map_err(|source| LoadError::Pattern {
            name: name.to_string(),
            pattern: spec.pattern.clone(),
            source,
        })?;
        if let Some(label) = &spec.name {
            matcher = matcher.with_name(label.clone());
        }
        matchers.push(matcher);
    }
    Ok(matchers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
[plugin]
kind = "http"
url = "https://cdn.sitea.example/{id}.mp4"

[[plugin.matchers]]
name = "video"
pattern = '^https://sitea\.example/video/(?P<id>\d+)'
"#;

    #[test]
    fn loads_http_kind() {
        let handler = PluginLoader::new().load_str("sitea", SITE).unwrap().unwrap();
        let hit = handler.matchers().find("https://sitea.example/video/9").unwrap();
        assert_eq!(hit.matcher.as_deref(), Some("video"));
        assert_eq!(hit.captures.get("id").map(String::as_str), Some("9"));
    }

    #[test]
    fn missing_plugin_table_is_not_an_error() {
        let loaded = PluginLoader::new().load_str("notes", "title = \"x\"\n").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let manifest = "[plugin]\nkind = \"ftp\"\n";
        assert!(PluginLoader::new().load_str("other", manifest).unwrap().is_none());

        let manifest = "[plugin]\n";
        assert!(PluginLoader::new().load_str("other", manifest).unwrap().is_none());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = PluginLoader::new().load_str("broken", "[plugin\nkind=").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let manifest = "[plugin]\nkind = \"http\"\n[[plugin.matchers]]\npattern = '[oops'\n";
        let err = PluginLoader::new().load_str("bad", manifest).unwrap_err();
        assert!(matches!(err, LoadError::Pattern { ref pattern, .. } if pattern == "[oops"));
    }

    #[test]
    fn rejects_odd_names() {
        for name in ["", "a.b", "with space", "../x"] {
            let err = PluginLoader::new().load_str(name, SITE).unwrap_err();
            assert!(matches!(err, LoadError::InvalidName(_)), "{name}");
        }
    }

    #[test]
    fn custom_kinds_are_used() {
        let loader = PluginLoader::new().with_kind("custom", |name, spec, matchers| {
            HttpHandler::from_spec(name, spec, matchers).map(|h| Arc::new(h) as Arc<dyn Handler>)
        });
        assert_eq!(loader.kinds(), ["custom", "http"]);

        let manifest = "[plugin]\nkind = \"custom\"\n[[plugin.matchers]]\npattern = '^x://'\n";
        assert!(loader.load_str("x", manifest).unwrap().is_some());
    }
}
