//! Compiler orchestrator.
//!
//! Drives the parser and both strategies for one configuration, writes the
//! code, script and style artifacts, and registers the result.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::artifact::{ensure_dir, write_if_changed};
use crate::config::CompilerConfig;
use crate::error::{IceCubeError, Result};
use crate::parse::{parse_component, ParsedComponent, NAMESPACE_SEPARATOR};
use crate::registry::Registry;
use crate::script::ScriptCompiler;
use crate::style::{compile_style_blocks, StyleCompiler};

/// Suffix of component source files.
pub const COMPONENT_SUFFIX: &str = ".ice.php";
/// Suffix of a colocated script file sharing the component's base name.
pub const COLOCATED_SCRIPT_SUFFIX: &str = ".js";

pub const CODE_EXTENSION: &str = "php";
pub const SCRIPT_EXTENSION: &str = "js";
pub const STYLE_EXTENSION: &str = "css";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILED COMPONENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledComponent {
    pub parsed: ParsedComponent,
    pub compiled_code_path: PathBuf,
    /// Asset path without extension; `.js` and `.css` are siblings of it
    pub compiled_assets_base_path: PathBuf,
    pub compiled_script: String,
    pub compiled_style: Option<String>,
    pub script_url: Option<String>,
    pub digest: String,
}

impl CompiledComponent {
    pub fn identifier(&self) -> &str {
        &self.parsed.identifier
    }

    pub fn component_name(&self) -> &str {
        &self.parsed.component_name
    }

    pub fn compiled_code(&self) -> &str {
        &self.parsed.code_section
    }

    pub fn script_path(&self) -> PathBuf {
        sibling(&self.compiled_assets_base_path, SCRIPT_EXTENSION)
    }

    pub fn style_path(&self) -> PathBuf {
        sibling(&self.compiled_assets_base_path, STYLE_EXTENSION)
    }
}

fn sibling(base: &Path, extension: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// `<dir>/<name>.<ext>` without treating dots in `name` as an extension.
fn file_in(dir: &Path, name: &str, extension: Option<&str>) -> PathBuf {
    match extension {
        Some(ext) => dir.join(format!("{}.{}", name, ext)),
        None => dir.join(name),
    }
}

/// Path of the colocated script for a component source, if it follows the
/// naming convention.
pub fn colocated_script_path(source_path: &Path) -> Option<PathBuf> {
    let file_name = source_path.file_name()?.to_str()?;
    let base = file_name.strip_suffix(COMPONENT_SUFFIX)?;
    Some(source_path.with_file_name(format!("{}{}", base, COLOCATED_SCRIPT_SUFFIX)))
}

/// Contents of a colocated script. Unreadable or non-UTF-8 files are skipped
/// with a warning and the inline script applies.
fn read_colocated(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(script) => Some(script),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable colocated script: {}", e);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct IceCubeCompiler {
    name: String,
    config: CompilerConfig,
    style_compiler: Box<dyn StyleCompiler>,
    script_compiler: Box<dyn ScriptCompiler>,
}

impl IceCubeCompiler {
    /// Build a compiler with the strategies named in `config`.
    pub fn new(name: impl Into<String>, config: CompilerConfig) -> Self {
        let style_compiler = config.style_compiler.build();
        let script_compiler = config.script_compiler.build();
        Self::with_strategies(name, config, style_compiler, script_compiler)
    }

    pub fn with_strategies(
        name: impl Into<String>,
        config: CompilerConfig,
        style_compiler: Box<dyn StyleCompiler>,
        script_compiler: Box<dyn ScriptCompiler>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            style_compiler,
            script_compiler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn include_styles_in_cache(&self) -> bool {
        self.script_compiler.embeds_styles()
    }

    pub fn cache_file(&self) -> PathBuf {
        self.config.cache_file_for(&self.name)
    }

    pub fn ensure_compiled_dirs(&self) -> Result<()> {
        ensure_dir(&self.config.compiled_code_dir)?;
        ensure_dir(&self.config.compiled_assets_dir)
    }

    fn prefix(&self) -> &str {
        self.config.namespace_prefix.trim_end_matches(NAMESPACE_SEPARATOR)
    }

    /// Whether `identifier` lives under this configuration's namespace.
    pub fn owns(&self, identifier: &str) -> bool {
        identifier
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR))
            .is_some_and(|rest| !rest.is_empty())
    }

    /// Fully-qualified identifier for a source file name.
    pub fn identifier_for(&self, base_name: &str) -> String {
        format!("{}{}{}", self.prefix(), NAMESPACE_SEPARATOR, base_name)
    }

    /// Source file expected to define `identifier`.
    pub fn source_path_for(&self, identifier: &str) -> Option<PathBuf> {
        if !self.owns(identifier) {
            return None;
        }
        let rest = identifier[self.prefix().len()..].trim_start_matches(NAMESPACE_SEPARATOR);
        let mut path = self.config.source_dir.clone();
        let segments: Vec<&str> = rest.split(NAMESPACE_SEPARATOR).collect();
        let (last, dirs) = segments.split_last()?;
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{}{}", last, COMPONENT_SUFFIX));
        Some(path)
    }

    /// Compile the source at `source_path` and register the result.
    ///
    /// The component name is checked against `registry` before any artifact
    /// is written, so a colliding component never replaces another's files.
    pub fn compile(
        &self,
        registry: &mut Registry,
        identifier: &str,
        source_path: &Path,
    ) -> Result<CompiledComponent> {
        let parsed = self.parse_file(identifier, source_path)?;
        registry.check_name(identifier, &parsed.component_name)?;
        let compiled = self.compile_parsed(parsed)?;
        registry.register(identifier, compiled.clone())?;
        Ok(compiled)
    }

    /// Compile and write artifacts without touching any registry.
    pub fn compile_file(&self, identifier: &str, source_path: &Path) -> Result<CompiledComponent> {
        let parsed = self.parse_file(identifier, source_path)?;
        self.compile_parsed(parsed)
    }

    fn parse_file(&self, identifier: &str, source_path: &Path) -> Result<ParsedComponent> {
        let source =
            fs::read_to_string(source_path).map_err(|e| IceCubeError::io(source_path, e))?;
        let colocated = colocated_script_path(source_path).and_then(|path| read_colocated(&path));
        Ok(parse_component(identifier, &source, colocated.as_deref()))
    }

    pub fn compile_parsed(&self, parsed: ParsedComponent) -> Result<CompiledComponent> {
        self.ensure_compiled_dirs()?;

        let name = parsed.component_name.as_str();
        let code_path = file_in(&self.config.compiled_code_dir, name, Some(CODE_EXTENSION));
        let assets_base_path = file_in(&self.config.compiled_assets_dir, name, None);
        let script_path = file_in(&self.config.compiled_assets_dir, name, Some(SCRIPT_EXTENSION));
        let style_path = file_in(&self.config.compiled_assets_dir, name, Some(STYLE_EXTENSION));

        let compiled_style =
            compile_style_blocks(self.style_compiler.as_ref(), name, &parsed.style_blocks)?;
        let compiled_script = self.script_compiler.compile(
            name,
            parsed.script_section.as_deref().unwrap_or(""),
            &compiled_style,
        );

        write_if_changed(&code_path, &parsed.code_section)?;
        write_if_changed(&script_path, &compiled_script)?;
        write_if_changed(&style_path, &compiled_style)?;

        let script_url = format!(
            "{}/{}.{}?digest={}",
            self.config.public_url.trim_end_matches('/'),
            name,
            SCRIPT_EXTENSION,
            parsed.digest
        );

        debug!(
            compiler = %self.name,
            component = %name,
            digest = %parsed.digest,
            "compiled component"
        );

        let digest = parsed.digest.clone();
        Ok(CompiledComponent {
            parsed,
            compiled_code_path: code_path,
            compiled_assets_base_path: assets_base_path,
            compiled_script,
            compiled_style: Some(compiled_style),
            script_url: Some(script_url),
            digest,
        })
    }

    /// Compile every `*.ice.php` file directly inside the source directory.
    ///
    /// Returns the identifiers compiled, in file-name order.
    pub fn scan_and_compile(&self, registry: &mut Registry) -> Result<Vec<String>> {
        self.ensure_compiled_dirs()?;

        let source_dir = &self.config.source_dir;
        if !source_dir.is_dir() {
            debug!(compiler = %self.name, dir = %source_dir.display(), "source directory missing");
            return Ok(Vec::new());
        }

        let mut compiled = Vec::new();
        for entry in WalkDir::new(source_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source_dir).to_path_buf();
                IceCubeError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let base_name = match entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(COMPONENT_SUFFIX))
            {
                Some(base) if !base.is_empty() => base.to_string(),
                _ => continue,
            };

            let identifier = self.identifier_for(&base_name);
            self.compile(registry, &identifier, entry.path())?;
            compiled.push(identifier);
        }

        info!(
            compiler = %self.name,
            count = compiled.len(),
            "scanned and compiled components"
        );
        Ok(compiled)
    }
}

impl std::fmt::Debug for IceCubeCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IceCubeCompiler")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
