//! Compiler configurations.
//!
//! A project declares one or more named configurations, each with its own
//! namespace, directories and strategies:
//!
//! ```toml
//! [compilers.default]
//! namespace_prefix = 'App\Components'
//! source_dir = "app/Components"
//! compiled_code_dir = "storage/app/private/icecube"
//! compiled_assets_dir = "storage/app/public/icecube"
//! public_url = "/storage/icecube"
//! script_compiler = "external-bundler"
//! style_compiler = "preprocessor"
//! cache_enabled = true
//! cache_file = "storage/app/private/icecube/default.cache.json"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IceCubeError, Result};
use crate::script::{BundlerScriptCompiler, EmbedStyleScriptCompiler, ScriptCompiler};
use crate::style::{NestingStyleCompiler, ScssStyleCompiler, StyleCompiler};

/// Environment variable overriding `cache_enabled` for every configuration.
pub const CACHE_ENV_VAR: &str = "ICECUBE_CACHE";

pub const DEFAULT_CONFIG_FILE: &str = "icecube.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptStrategy {
    #[default]
    Embedded,
    ExternalBundler,
}

impl ScriptStrategy {
    pub fn build(self) -> Box<dyn ScriptCompiler> {
        match self {
            ScriptStrategy::Embedded => Box::new(EmbedStyleScriptCompiler),
            ScriptStrategy::ExternalBundler => Box::new(BundlerScriptCompiler),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleStrategy {
    #[default]
    ScopingOnly,
    Preprocessor,
}

impl StyleStrategy {
    pub fn build(self) -> Box<dyn StyleCompiler> {
        match self {
            StyleStrategy::ScopingOnly => Box::new(NestingStyleCompiler),
            StyleStrategy::Preprocessor => Box::new(ScssStyleCompiler::new()),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub namespace_prefix: String,
    pub source_dir: PathBuf,
    pub compiled_code_dir: PathBuf,
    pub compiled_assets_dir: PathBuf,
    pub public_url: String,
    #[serde(default)]
    pub script_compiler: ScriptStrategy,
    #[serde(default)]
    pub style_compiler: StyleStrategy,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Defaults to `<compiled_code_dir>/<name>.cache.json`
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

impl CompilerConfig {
    pub fn cache_file_for(&self, name: &str) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| self.compiled_code_dir.join(format!("{}.cache.json", name)))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.namespace_prefix.trim().is_empty() {
            return Err(IceCubeError::Config(format!(
                "compiler '{}' has an empty namespace_prefix",
                name
            )));
        }
        if self.compiled_code_dir.as_os_str().is_empty()
            || self.compiled_assets_dir.as_os_str().is_empty()
        {
            return Err(IceCubeError::Config(format!(
                "compiler '{}' needs both compiled_code_dir and compiled_assets_dir",
                name
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCubeConfig {
    #[serde(default)]
    pub compilers: BTreeMap<String, CompilerConfig>,
}

impl Default for IceCubeConfig {
    fn default() -> Self {
        let mut compilers = BTreeMap::new();
        compilers.insert(
            "default".to_string(),
            CompilerConfig {
                namespace_prefix: r"App\Components".to_string(),
                source_dir: PathBuf::from("app/Components"),
                compiled_code_dir: PathBuf::from("storage/app/private/icecube"),
                compiled_assets_dir: PathBuf::from("storage/app/public/icecube"),
                public_url: "/storage/icecube".to_string(),
                script_compiler: ScriptStrategy::ExternalBundler,
                style_compiler: StyleStrategy::Preprocessor,
                cache_enabled: true,
                cache_file: Some(PathBuf::from(
                    "storage/app/private/icecube/default.cache.json",
                )),
            },
        );
        Self { compilers }
    }
}

impl IceCubeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: IceCubeConfig =
            toml::from_str(text).map_err(|e| IceCubeError::Config(e.to_string()))?;
        for (name, compiler) in &config.compilers {
            compiler.validate(name)?;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| IceCubeError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, else `icecube.toml` when present, else defaults.
    /// Environment overrides are applied in every case.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(enabled) = std::env::var(CACHE_ENV_VAR).ok().and_then(|v| parse_flag(&v)) {
            self.set_cache_enabled(enabled);
        }
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        for compiler in self.compilers.values_mut() {
            compiler.cache_enabled = enabled;
        }
    }

    /// Only the named configuration, or all of them in name order.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<(&str, &CompilerConfig)>> {
        match name {
            Some(name) => self
                .compilers
                .get_key_value(name)
                .map(|(k, v)| vec![(k.as_str(), v)])
                .ok_or_else(|| IceCubeError::UnknownConfiguration(name.to_string())),
            None => Ok(self
                .compilers
                .iter()
                .map(|(k, v)| (k.as_str(), v))
                .collect()),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: &str = r#"
[compilers.default]
namespace_prefix = 'App\Components'
source_dir = "app/Components"
compiled_code_dir = "out/code"
compiled_assets_dir = "out/assets"
public_url = "/storage/icecube"

[compilers.admin]
namespace_prefix = 'App\Admin\Components'
source_dir = "app/Admin/Components"
compiled_code_dir = "out/admin/code"
compiled_assets_dir = "out/admin/assets"
public_url = "/storage/icecube/admin"
script_compiler = "external-bundler"
style_compiler = "preprocessor"
cache_enabled = false
cache_file = "out/admin.cache.json"
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = IceCubeConfig::from_toml_str(ADMIN).unwrap();
        let default = &config.compilers["default"];
        assert_eq!(default.namespace_prefix, r"App\Components");
        assert_eq!(default.script_compiler, ScriptStrategy::Embedded);
        assert_eq!(default.style_compiler, StyleStrategy::ScopingOnly);
        assert!(default.cache_enabled);
        assert_eq!(
            default.cache_file_for("default"),
            PathBuf::from("out/code/default.cache.json")
        );

        let admin = &config.compilers["admin"];
        assert_eq!(admin.script_compiler, ScriptStrategy::ExternalBundler);
        assert_eq!(admin.style_compiler, StyleStrategy::Preprocessor);
        assert!(!admin.cache_enabled);
        assert_eq!(admin.cache_file_for("admin"), PathBuf::from("out/admin.cache.json"));
    }

    #[test]
    fn test_select() {
        let config = IceCubeConfig::from_toml_str(ADMIN).unwrap();
        let all = config.select(None).unwrap();
        assert_eq!(
            all.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            vec!["admin", "default"]
        );

        let one = config.select(Some("admin")).unwrap();
        assert_eq!(one.len(), 1);

        let err = config.select(Some("missing")).unwrap_err();
        assert!(matches!(err, IceCubeError::UnknownConfiguration(ref n) if n == "missing"));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let text = ADMIN.replace("\"preprocessor\"", "\"less\"");
        let err = IceCubeConfig::from_toml_str(&text).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_CONFIG);
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        let text = ADMIN.replace(r"'App\Components'", "''");
        assert!(IceCubeConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_cache_flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);

        let mut config = IceCubeConfig::from_toml_str(ADMIN).unwrap();
        config.set_cache_enabled(true);
        assert!(config.compilers.values().all(|c| c.cache_enabled));
    }

    #[test]
    fn test_env_override_applies_to_every_compiler() {
        let mut config = IceCubeConfig::from_toml_str(ADMIN).unwrap();
        std::env::set_var(CACHE_ENV_VAR, "off");
        config.apply_env_overrides();
        assert!(config.compilers.values().all(|c| !c.cache_enabled));

        std::env::set_var(CACHE_ENV_VAR, "1");
        config.apply_env_overrides();
        assert!(config.compilers.values().all(|c| c.cache_enabled));

        // Unrecognised values leave the configuration alone
        std::env::set_var(CACHE_ENV_VAR, "maybe");
        config.apply_env_overrides();
        assert!(config.compilers.values().all(|c| c.cache_enabled));
        std::env::remove_var(CACHE_ENV_VAR);
    }

    #[test]
    fn test_default_matches_bundler_setup() {
        let config = IceCubeConfig::default();
        let default = &config.compilers["default"];
        assert_eq!(default.script_compiler, ScriptStrategy::ExternalBundler);
        assert_eq!(default.style_compiler, StyleStrategy::Preprocessor);
    }
}
