//! Packing of bundler-emitted component styles.
//!
//! With the external bundler strategy every component imports its own CSS
//! file, so the bundler emits one stylesheet per component. Packing merges the
//! stylesheets of one configuration into a single asset and points the client
//! runtime entry at it.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::artifact::{ensure_dir, write_atomic};
use crate::error::{IceCubeError, Result};
use crate::parse::component_name;

pub const MANIFEST_FILE: &str = "manifest.json";
/// Client runtime entry that receives the packed stylesheets
pub const RUNTIME_ENTRY: &str = "resources/js/icecube.js";
pub const ASSETS_DIR: &str = "assets";

pub fn packed_style_name(config_name: &str) -> String {
    format!("icecube_{}_styles.css", config_name)
}

#[derive(Debug, Clone)]
pub struct Manifest {
    build_dir: PathBuf,
    entries: Map<String, Value>,
}

impl Manifest {
    /// Load `manifest.json` from a bundler build directory.
    pub fn load(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(IceCubeError::Manifest(format!(
                "{} not found in {}. Run the bundler build first.",
                MANIFEST_FILE,
                build_dir.display()
            )));
        }
        let raw = fs::read_to_string(&path).map_err(|e| IceCubeError::io(&path, e))?;
        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) => {
                return Err(IceCubeError::Manifest(format!(
                    "{} is not a JSON object",
                    path.display()
                )))
            }
            Err(e) => return Err(IceCubeError::Manifest(format!("{}: {}", path.display(), e))),
        };
        Ok(Self {
            build_dir: build_dir.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Remove and return the `css` lists of every entry whose `name` starts
    /// with `prefix`, de-duplicated in first-seen order.
    pub fn take_css(&mut self, prefix: &str) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for entry in self.entries.values_mut() {
            let Some(entry) = entry.as_object_mut() else {
                continue;
            };
            let matches = entry
                .get("name")
                .and_then(Value::as_str)
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(Value::Array(css)) = entry.remove("css") {
                for file in css.iter().filter_map(Value::as_str) {
                    if !files.iter().any(|f| f == file) {
                        files.push(file.to_string());
                    }
                }
            }
        }
        files
    }

    /// Pack the styles of the configuration `config_name`, whose components
    /// live under `namespace_prefix`. Returns the packed asset, or `None` when
    /// no entry carried styles.
    pub fn pack(&mut self, config_name: &str, namespace_prefix: &str) -> Result<Option<PathBuf>> {
        let files = self.take_css(&component_name(namespace_prefix));
        if files.is_empty() {
            debug!(config = config_name, "no component styles in manifest");
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(files.len());
        for file in &files {
            let path = self.build_dir.join(file);
            parts.push(fs::read_to_string(&path).map_err(|e| IceCubeError::io(&path, e))?);
        }

        let key = packed_style_name(config_name);
        let file = format!("{}/{}", ASSETS_DIR, key);
        let target = self.build_dir.join(&file);
        ensure_dir(&self.build_dir.join(ASSETS_DIR))?;
        write_atomic(&target, parts.join("\n").as_bytes())?;

        let mut entry = Map::new();
        entry.insert("file".to_string(), Value::String(file.clone()));
        entry.insert("name".to_string(), Value::String(key.clone()));
        entry.insert("src".to_string(), Value::String(file.clone()));
        entry.insert("isEntry".to_string(), Value::Bool(false));
        entry.insert("isDynamicEntry".to_string(), Value::Bool(false));
        self.entries.insert(key, Value::Object(entry));

        let runtime = self
            .entries
            .entry(RUNTIME_ENTRY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(runtime) = runtime.as_object_mut() {
            let css = runtime
                .entry("css".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(css) = css.as_array_mut() {
                if !css.iter().any(|v| v.as_str() == Some(file.as_str())) {
                    css.push(Value::String(file));
                }
            }
        }

        info!(config = config_name, files = files.len(), path = %target.display(), "packed component styles");
        Ok(Some(target))
    }

    pub fn save(&self) -> Result<()> {
        let path = self.build_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| IceCubeError::Manifest(e.to_string()))?;
        write_atomic(&path, json.as_bytes())
    }
}
