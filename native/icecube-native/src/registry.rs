//! Registry of compiled components.
//!
//! Entries are either live (compiled in this process) or cached (loaded from
//! a cache file). Cached entries read their compiled code artifact from disk
//! the first time they are resolved.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cache::{CacheFile, CachedComponent};
use crate::compiler::CompiledComponent;
use crate::error::{IceCubeError, Result};
use crate::script::style_element_id;

#[derive(Debug, Clone)]
enum Entry {
    Compiled(CompiledComponent),
    Cached {
        component: CachedComponent,
        code: Option<String>,
    },
}

impl Entry {
    fn component_name(&self) -> &str {
        match self {
            Entry::Compiled(c) => c.component_name(),
            Entry::Cached { component, .. } => &component.component_name,
        }
    }

    fn compiled_style(&self) -> Option<&str> {
        match self {
            Entry::Compiled(c) => c.compiled_style.as_deref(),
            Entry::Cached { component, .. } => component.compiled_style.as_deref(),
        }
    }

    fn script_url(&self) -> Option<&str> {
        match self {
            Entry::Compiled(c) => c.script_url.as_deref(),
            Entry::Cached { component, .. } => component.script_url.as_deref(),
        }
    }

    fn to_cached(&self, include_styles: bool) -> CachedComponent {
        match self {
            Entry::Compiled(c) => CachedComponent::from_compiled(c, include_styles),
            Entry::Cached { component, .. } if include_styles => component.clone(),
            Entry::Cached { component, .. } => component.clone().without_style(),
        }
    }

    fn view(&self) -> Resolved<'_> {
        match self {
            Entry::Compiled(c) => Resolved {
                identifier: c.identifier(),
                component_name: c.component_name(),
                code: c.compiled_code(),
                compiled_code_path: &c.compiled_code_path,
                compiled_style: c.compiled_style.as_deref(),
                script_url: c.script_url.as_deref(),
                digest: &c.digest,
            },
            Entry::Cached { component, code } => Resolved {
                identifier: &component.identifier,
                component_name: &component.component_name,
                code: code.as_deref().unwrap_or_default(),
                compiled_code_path: &component.compiled_code_path,
                compiled_style: component.compiled_style.as_deref(),
                script_url: component.script_url.as_deref(),
                digest: &component.digest,
            },
        }
    }
}

/// Handle to a resolved component with its compiled code loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub identifier: &'a str,
    pub component_name: &'a str,
    pub code: &'a str,
    pub compiled_code_path: &'a Path,
    pub compiled_style: Option<&'a str>,
    pub script_url: Option<&'a str>,
    pub digest: &'a str,
}

/// An inline `<style>` element for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleElement {
    pub id: String,
    pub css: String,
}

impl fmt::Display for StyleElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<style id=\"{}\">{}</style>", self.id, self.css)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: HashMap<String, Entry>,
    /// component name -> identifier
    names: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// The live compilation result, if `identifier` was compiled in this process.
    pub fn compiled(&self, identifier: &str) -> Option<&CompiledComponent> {
        match self.entries.get(identifier)? {
            Entry::Compiled(c) => Some(c),
            Entry::Cached { .. } => None,
        }
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Fails when a different identifier already owns `component_name`.
    pub(crate) fn check_name(&self, identifier: &str, component_name: &str) -> Result<()> {
        match self.names.get(component_name) {
            Some(existing) if existing != identifier => Err(IceCubeError::NameCollision {
                component_name: component_name.to_string(),
                existing: existing.clone(),
                incoming: identifier.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, identifier: &str, entry: Entry) {
        self.names
            .insert(entry.component_name().to_string(), identifier.to_string());
        self.entries.insert(identifier.to_string(), entry);
    }

    /// Insert or overwrite. Fails when a different identifier already owns the
    /// same component name.
    pub fn register(&mut self, identifier: &str, component: CompiledComponent) -> Result<()> {
        self.check_name(identifier, component.component_name())?;
        self.insert(identifier, Entry::Compiled(component));
        Ok(())
    }

    /// Resolve a registered component, loading its compiled code from disk on
    /// first use if it came from a cache file. `Ok(None)` when unregistered.
    pub fn resolve(&mut self, identifier: &str) -> Result<Option<Resolved<'_>>> {
        let Some(entry) = self.entries.get_mut(identifier) else {
            return Ok(None);
        };

        if let Entry::Cached { component, code } = entry {
            if code.is_none() {
                let path = &component.compiled_code_path;
                let text = fs::read_to_string(path).map_err(|e| IceCubeError::io(path, e))?;
                debug!(component = %component.component_name, "loaded cached compiled code");
                *code = Some(text);
            }
        }

        Ok(Some(entry.view()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn cached_components(&self, include_styles: bool) -> Vec<CachedComponent> {
        self.entries
            .values()
            .map(|entry| entry.to_cached(include_styles))
            .collect()
    }

    /// Persist every registered component to `path`. Compiled script bodies
    /// are never stored; styles only when `include_styles`.
    pub fn store_cache(&self, path: &Path, include_styles: bool) -> Result<usize> {
        self.store_cache_matching(path, include_styles, |_| true)
    }

    /// Persist the components whose identifier satisfies `keep`.
    pub fn store_cache_matching(
        &self,
        path: &Path,
        include_styles: bool,
        keep: impl Fn(&str) -> bool,
    ) -> Result<usize> {
        let cache = CacheFile::new(
            self.entries
                .iter()
                .filter(|(identifier, _)| keep(identifier.as_str()))
                .map(|(_, entry)| entry.to_cached(include_styles)),
        );
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::artifact::ensure_dir(parent)?;
        }
        cache.write(path)?;
        info!(
            path = %path.display(),
            count = cache.components.len(),
            include_styles,
            "stored component cache"
        );
        Ok(cache.components.len())
    }

    /// Repopulate from a cache file. Compiled code is loaded lazily by
    /// [`Registry::resolve`].
    pub fn try_load_cache(&mut self, path: &Path) -> Result<usize> {
        let cache = CacheFile::read(path)?;
        for component in cache.components.values() {
            self.check_name(&component.identifier, &component.component_name)?;
        }

        let count = cache.components.len();
        for (_, component) in cache.components {
            let identifier = component.identifier.clone();
            self.insert(
                &identifier,
                Entry::Cached {
                    component,
                    code: None,
                },
            );
        }
        info!(path = %path.display(), count, "loaded component cache");
        Ok(count)
    }

    /// Like [`Registry::try_load_cache`], reporting failure as `false` so the
    /// caller can fall back to live compilation.
    pub fn load_cache(&mut self, path: &Path) -> bool {
        match self.try_load_cache(path) {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %path.display(), code = e.code(), "cannot load component cache: {}", e);
                false
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DELIVERY
    // ═══════════════════════════════════════════════════════════════════════════

    /// One style element per component with compiled style text, by component
    /// name.
    pub fn style_elements(&self) -> Vec<StyleElement> {
        let mut elements: Vec<StyleElement> = self
            .entries
            .values()
            .filter_map(|entry| {
                entry.compiled_style().map(|css| StyleElement {
                    id: style_element_id(entry.component_name()),
                    css: css.to_string(),
                })
            })
            .collect();
        elements.sort_by(|a, b| a.id.cmp(&b.id));
        elements
    }

    pub fn all_styles(&self) -> String {
        self.style_elements()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// component name -> public script URL
    pub fn script_urls(&self) -> BTreeMap<String, String> {
        self.entries
            .values()
            .filter_map(|entry| {
                entry
                    .script_url()
                    .map(|url| (entry.component_name().to_string(), url.to_string()))
            })
            .collect()
    }

    /// Client bootstrap that loads each marked element's script module.
    pub fn bootstrap_script(&self) -> String {
        let urls = serde_json::to_string(&self.script_urls())
            .unwrap_or_else(|_| "{}".to_string())
            .replace("</", "<\\/");
        BOOTSTRAP_TEMPLATE.replace("__COMPONENT_SCRIPTS__", &urls)
    }
}

const BOOTSTRAP_TEMPLATE: &str = r#"<script type="module">
const componentScripts = __COMPONENT_SCRIPTS__;

const initComponent = async (node) => {
  const name = node.dataset.icecube;
  if (!name || !componentScripts[name] || node.dataset.cube) return;
  node.dataset.cube = 'icing';
  const mod = await import(componentScripts[name]);
  if (!mod) return;
  const refs = new Proxy({}, { get: (_, r) => node.querySelector(`[data-ref="${r}"]`) });
  await mod.default({ root: node, refs, props: JSON.parse(node.dataset.props || '{}') });
  node.dataset.cube = 'iced';
};

(() => {
  document.querySelectorAll('[data-icecube]').forEach(initComponent);

  const observer = new MutationObserver((mutations) => {
    mutations.flatMap(m => [...m.addedNodes]).forEach(node => {
      if (node.nodeType === Node.ELEMENT_NODE && node.dataset.icecube !== undefined) {
        initComponent(node);
        node.querySelectorAll?.('[data-icecube]').forEach(initComponent);
      }
    });
  });

  observer.observe(document.documentElement, { childList: true, subtree: true });
})();
</script>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_component;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn compiled(identifier: &str, dir: &Path) -> CompiledComponent {
        let parsed = parse_component(identifier, "<?php ?>", None);
        let name = parsed.component_name.clone();
        let digest = parsed.digest.clone();
        CompiledComponent {
            compiled_code_path: dir.join(format!("{}.php", name)),
            compiled_assets_base_path: dir.join(&name),
            compiled_script: "script()".to_string(),
            compiled_style: Some(format!("[data-icecube={}] {{ a{{}} }}", name)),
            script_url: Some(format!("/s/{}.js?digest={}", name, digest)),
            digest,
            parsed,
        }
    }

    #[test]
    fn test_register_overwrites_same_identifier() {
        let mut registry = Registry::new();
        let dir = PathBuf::from("/tmp");
        registry.register("Foo", compiled("Foo", &dir)).unwrap();
        let mut again = compiled("Foo", &dir);
        again.compiled_script = "second()".to_string();
        registry.register("Foo", again).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.compiled("Foo").unwrap().compiled_script, "second()");
    }

    #[test]
    fn test_flattened_name_collision_is_rejected() {
        let mut registry = Registry::new();
        let dir = PathBuf::from("/tmp");
        registry.register(r"A\B", compiled(r"A\B", &dir)).unwrap();
        let err = registry.register("A_B", compiled("A_B", &dir)).unwrap_err();
        assert!(matches!(err, IceCubeError::NameCollision { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let mut registry = Registry::new();
        assert!(registry.resolve("Nope").unwrap().is_none());
    }

    #[test]
    fn test_load_cache_missing_file_reports_false() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::new();
        assert!(!registry.load_cache(&tmp.path().join("missing.json")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cached_code_is_loaded_lazily() {
        let tmp = TempDir::new().unwrap();
        let component = compiled(r"App\Foo", tmp.path());
        fs::write(&component.compiled_code_path, "<?php echo 'cached'; ?>").unwrap();

        let mut live = Registry::new();
        live.register(r"App\Foo", component.clone()).unwrap();
        let cache_path = tmp.path().join("cache.json");
        live.store_cache(&cache_path, true).unwrap();

        let mut fresh = Registry::new();
        assert!(fresh.load_cache(&cache_path));
        // Editing the artifact before first use shows the load is deferred
        fs::write(&component.compiled_code_path, "<?php echo 'later'; ?>").unwrap();
        let resolved = fresh.resolve(r"App\Foo").unwrap().unwrap();
        assert_eq!(resolved.code, "<?php echo 'later'; ?>");
        assert_eq!(resolved.component_name, "App_Foo");

        // Subsequent resolutions are served from memory
        fs::remove_file(&component.compiled_code_path).unwrap();
        let resolved = fresh.resolve(r"App\Foo").unwrap().unwrap();
        assert_eq!(resolved.code, "<?php echo 'later'; ?>");
    }

    #[test]
    fn test_store_cache_drops_styles_when_asked() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::new();
        registry.register("Foo", compiled("Foo", tmp.path())).unwrap();

        let path = tmp.path().join("nested/dir/cache.json");
        assert_eq!(registry.store_cache(&path, false).unwrap(), 1);

        let cache = CacheFile::read(&path).unwrap();
        let entry = &cache.components["Foo"];
        assert!(entry.compiled_style.is_none());
        assert!(entry.script_url.is_some());
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("script()"), "script body must not be cached");
    }

    #[test]
    fn test_all_styles() {
        let dir = PathBuf::from("/tmp");
        let mut registry = Registry::new();
        registry.register("B", compiled("B", &dir)).unwrap();
        registry.register("A", compiled("A", &dir)).unwrap();
        let mut unstyled = compiled("C", &dir);
        unstyled.compiled_style = None;
        registry.register("C", unstyled).unwrap();

        assert_eq!(
            registry.all_styles(),
            "<style id=\"icecube-style-A\">[data-icecube=A] { a{} }</style>\n\
             <style id=\"icecube-style-B\">[data-icecube=B] { a{} }</style>"
        );
    }

    #[test]
    fn test_bootstrap_script_embeds_urls() {
        let dir = PathBuf::from("/tmp");
        let mut registry = Registry::new();
        let component = compiled("Foo", &dir);
        let url = component.script_url.clone().unwrap();
        registry.register("Foo", component).unwrap();

        let script = registry.bootstrap_script();
        assert!(script.starts_with("<script type=\"module\">"));
        assert!(script.contains(&format!("const componentScripts = {{\"Foo\":\"{}\"}};", url)));
        assert!(script.contains("new MutationObserver"));
        assert!(script.contains("node.dataset.cube = 'iced';"));
    }
}
