use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::write_atomic;
use crate::compiler::CompiledComponent;
use crate::error::{IceCubeError, Result};

pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Compiled-component metadata as persisted in the cache file. The script
/// body is never stored; it already lives in its asset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedComponent {
    pub identifier: String,
    pub component_name: String,
    pub compiled_code_path: PathBuf,
    pub compiled_assets_base_path: PathBuf,
    pub compiled_style: Option<String>,
    pub script_url: Option<String>,
    pub digest: String,
}

impl CachedComponent {
    pub fn from_compiled(component: &CompiledComponent, include_styles: bool) -> Self {
        Self {
            identifier: component.parsed.identifier.clone(),
            component_name: component.parsed.component_name.clone(),
            compiled_code_path: component.compiled_code_path.clone(),
            compiled_assets_base_path: component.compiled_assets_base_path.clone(),
            compiled_style: if include_styles {
                component.compiled_style.clone()
            } else {
                None
            },
            script_url: component.script_url.clone(),
            digest: component.digest.clone(),
        }
    }

    pub fn without_style(mut self) -> Self {
        self.compiled_style = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: u32,
    /// Keyed by component name
    pub components: BTreeMap<String, CachedComponent>,
}

impl CacheFile {
    pub fn new(components: impl IntoIterator<Item = CachedComponent>) -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            components: components
                .into_iter()
                .map(|c| (c.component_name.clone(), c))
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).map_err(|e| IceCubeError::CacheFormat {
            path: path.to_path_buf(),
            source: e,
        })?;
        write_atomic(path, &data)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| IceCubeError::io(path, e))?;
        let cache: CacheFile =
            serde_json::from_slice(&data).map_err(|e| IceCubeError::CacheFormat {
                path: path.to_path_buf(),
                source: e,
            })?;
        if cache.version != CACHE_FORMAT_VERSION {
            return Err(IceCubeError::Config(format!(
                "cache file {} has version {}, expected {}",
                path.display(),
                cache.version,
                CACHE_FORMAT_VERSION
            )));
        }
        Ok(cache)
    }
}
