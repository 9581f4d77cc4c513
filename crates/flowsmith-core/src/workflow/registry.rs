//! Template registry: a shared cache of validated templates.
//!
//! The registry is an explicit value injected where it is needed. Lookups go
//! to the cache first and fall back to an optional `TemplateSource`; each name
//! is loaded once. Two callers racing on the same uncached name may both load
//! it, and the first insert wins. The registry also serves as the engine's
//! sub-workflow loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use flowsmith_types::workflow::{Template, DEFAULT_NODE_TIMEOUT_SECS};

use super::invoker::{BoxFuture, LoadError, SubWorkflowLoader};
use super::parser::{parse_and_validate_with_timeout, TemplateError};
use super::validator::TemplateValidator;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where uncached templates come from.
pub trait TemplateSource: Send + Sync {
    /// Raw workflow text for `name`, or `None` if the source has no such workflow.
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, LoadError>>;

    /// Names this source can provide.
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>, LoadError>>;
}

/// Reads `<dir>/<name>.yaml`, falling back to `<dir>/<name>.yml`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for DirectorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, LoadError>> {
        Box::pin(async move {
            if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
                return Ok(None);
            }
            for ext in ["yaml", "yml"] {
                let path = self.dir.join(format!("{name}.{ext}"));
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => return Ok(Some(text)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(LoadError::Io {
                            name: name.to_string(),
                            message: format!("{}: {e}", path.display()),
                        })
                    }
                }
            }
            Ok(None)
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<String>, LoadError>> {
        Box::pin(async move {
            let io_err = |e: std::io::Error| LoadError::Io {
                name: self.dir.display().to_string(),
                message: e.to_string(),
            };
            let mut names = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let path = entry.path();
                let is_yaml = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml");
                if let (true, Some(stem)) = (is_yaml, path.file_stem().and_then(|s| s.to_str())) {
                    if !names.iter().any(|n| n == stem) {
                        names.push(stem.to_string());
                    }
                }
            }
            names.sort();
            Ok(names)
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct TemplateRegistry {
    cache: DashMap<String, Arc<Template>>,
    source: Option<Arc<dyn TemplateSource>>,
    validator: TemplateValidator,
    default_timeout_secs: u64,
}

impl TemplateRegistry {
    /// A registry holding only explicitly registered templates.
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            source: None,
            validator: TemplateValidator::new(),
            default_timeout_secs: DEFAULT_NODE_TIMEOUT_SECS,
        }
    }

    /// A registry that loads missing templates from `source`.
    pub fn with_source(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new()
        }
    }

    /// Validate loaded templates with this validator (custom capabilities).
    pub fn with_validator(mut self, validator: TemplateValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Timeout given to loaded nodes that declare none.
    pub fn with_default_timeout_secs(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// Validate and cache a template under its own name, replacing any entry.
    pub fn register(&self, template: Template) -> Result<Arc<Template>, LoadError> {
        let errors = self.validator.validate(&template);
        if !errors.is_empty() {
            return Err(LoadError::Invalid {
                name: template.name.clone(),
                reason: TemplateError::ValidationFailed(errors).to_string(),
            });
        }
        let template = Arc::new(template);
        self.cache.insert(template.name.clone(), Arc::clone(&template));
        Ok(template)
    }

    /// Fetch a template by name, loading it from the source on first use.
    pub async fn get(&self, name: &str) -> Result<Arc<Template>, LoadError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Arc::clone(cached.value()));
        }

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let text = source
            .fetch(name)
            .await?
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let template =
            parse_and_validate_with_timeout(&text, &self.validator, self.default_timeout_secs)
                .map_err(|e| LoadError::Invalid {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
        if template.name != name {
            tracing::warn!(
                requested = name,
                declared = template.name.as_str(),
                "workflow file declares a different name; caching under the requested one"
            );
        }

        tracing::debug!(workflow = name, "template loaded into registry");
        let entry = self
            .cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(template));
        Ok(Arc::clone(entry.value()))
    }

    /// Load every template the source lists. Returns how many are cached.
    pub async fn load_all(&self) -> Result<usize, LoadError> {
        if let Some(source) = &self.source {
            for name in source.list().await? {
                self.get(&name).await?;
            }
        }
        Ok(self.cache.len())
    }

    /// Drop one cached entry. Returns whether it was present.
    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Cached template names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// First cached template (by name) with a trigger pattern matching `text`.
    pub fn find_by_trigger(&self, text: &str) -> Option<Arc<Template>> {
        let mut matches: Vec<Arc<Template>> = self
            .cache
            .iter()
            .filter(|e| e.value().matches_trigger(text))
            .map(|e| Arc::clone(e.value()))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches.into_iter().next()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubWorkflowLoader for TemplateRegistry {
    fn load<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Template>, LoadError>> {
        Box::pin(self.get(name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use flowsmith_types::workflow::{Capability, Node, TriggerPattern};

    const SUMMARIZE: &str = r#"
name: summarize
version: "1"
description: Summarize text
triggers: ["summarize *"]
nodes:
  - summary: {capability: writer, instruction: "Summarize {text}"}
"#;

    /// Counts fetches so load-once behavior is observable.
    struct CountingSource {
        inner: DirectorySource,
        fetches: AtomicUsize,
    }

    impl TemplateSource for CountingSource {
        fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, LoadError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(name)
        }

        fn list(&self) -> BoxFuture<'_, Result<Vec<String>, LoadError>> {
            self.inner.list()
        }
    }

    fn template(name: &str, trigger: &str) -> Template {
        let mut t = Template::new(name, "1", "test");
        t.triggers.push(TriggerPattern::new(trigger));
        t.nodes.push(Node::new("only", Capability::Writer, "write"));
        t
    }

    #[tokio::test]
    async fn test_loads_once_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summarize.yaml"), SUMMARIZE).unwrap();
        let source = Arc::new(CountingSource {
            inner: DirectorySource::new(dir.path()),
            fetches: AtomicUsize::new(0),
        });
        let registry = TemplateRegistry::with_source(source.clone());

        let first = registry.get("summarize").await.unwrap();
        let second = registry.get("summarize").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        assert!(registry.invalidate("summarize"));
        registry.get("summarize").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loaded_nodes_inherit_configured_timeout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pair.yaml"),
            "name: pair\nversion: '1'\ndescription: x\nnodes:\n  - plain: {capability: writer, instruction: a}\n  - explicit: {capability: writer, instruction: b, timeout: 5s}\n",
        )
        .unwrap();
        let registry = TemplateRegistry::with_source(Arc::new(DirectorySource::new(dir.path())))
            .with_default_timeout_secs(42);

        let loaded = registry.get("pair").await.unwrap();
        assert_eq!(loaded.node("plain").unwrap().timeout_secs, 42);
        assert_eq!(loaded.node("explicit").unwrap().timeout_secs, 5);

        let defaults = TemplateRegistry::with_source(Arc::new(DirectorySource::new(dir.path())));
        let loaded = defaults.get("pair").await.unwrap();
        assert_eq!(loaded.node("plain").unwrap().timeout_secs, DEFAULT_NODE_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_yml_extension_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summarize.yml"), SUMMARIZE).unwrap();
        let registry = TemplateRegistry::with_source(Arc::new(DirectorySource::new(dir.path())));

        assert_eq!(registry.get("summarize").await.unwrap().name, "summarize");
        assert_eq!(
            registry.get("absent").await.unwrap_err(),
            LoadError::NotFound("absent".into())
        );
        assert_eq!(
            registry.get("../summarize").await.unwrap_err(),
            LoadError::NotFound("../summarize".into())
        );
    }

    #[tokio::test]
    async fn test_invalid_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("broken.yaml"),
            "name: broken\nversion: '1'\ndescription: x\nnodes: []\n",
        )
        .unwrap();
        let registry = TemplateRegistry::with_source(Arc::new(DirectorySource::new(dir.path())));
        let err = registry.get("broken").await.unwrap_err();
        assert!(matches!(err, LoadError::Invalid { ref name, .. } if name == "broken"));
    }

    #[tokio::test]
    async fn test_load_all_and_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summarize.yaml"), SUMMARIZE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let registry = TemplateRegistry::with_source(Arc::new(DirectorySource::new(dir.path())));
        assert_eq!(registry.load_all().await.unwrap(), 1);
        assert_eq!(registry.names(), vec!["summarize"]);
        registry.clear();
        assert!(registry.names().is_empty());
    }

    #[tokio::test]
    async fn test_register_and_loader() {
        let registry = TemplateRegistry::new();
        registry.register(template("alpha", "alpha *")).unwrap();
        let loaded = SubWorkflowLoader::load(&registry, "alpha").await.unwrap();
        assert_eq!(loaded.name, "alpha");
        assert!(matches!(
            SubWorkflowLoader::load(&registry, "beta").await,
            Err(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn test_register_rejects_invalid() {
        let registry = TemplateRegistry::new();
        let err = registry.register(Template::new("empty", "1", "")).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_find_by_trigger() {
        let registry = TemplateRegistry::new();
        registry.register(template("report", "*report*")).unwrap();
        registry.register(template("research", "research *")).unwrap();
        assert_eq!(
            registry.find_by_trigger("Research the market").unwrap().name,
            "research"
        );
        assert_eq!(registry.find_by_trigger("weekly report").unwrap().name, "report");
        // Both match; the first by name wins.
        assert_eq!(
            registry.find_by_trigger("research report").unwrap().name,
            "report"
        );
        assert!(registry.find_by_trigger("hello").is_none());
    }
}
