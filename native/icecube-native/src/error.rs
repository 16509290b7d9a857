//! Error types for the IceCube compiler.
//!
//! Every variant carries a stable diagnostic code so that callers (the CLI,
//! a hosting framework) can match on failures without parsing messages.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_IO: &str = "ICE-ERR-IO-001";
pub const ERR_CONFIG: &str = "ICE-ERR-CONFIG-001";
pub const ERR_UNKNOWN_CONFIGURATION: &str = "ICE-ERR-CONFIG-002";
pub const ERR_STYLE: &str = "ICE-ERR-STYLE-001";
pub const ERR_NAME_COLLISION: &str = "ICE-ERR-REGISTRY-001";
pub const ERR_UNKNOWN_COMPONENT: &str = "ICE-ERR-REGISTRY-002";
pub const ERR_CACHE_FORMAT: &str = "ICE-ERR-CACHE-001";
pub const ERR_MANIFEST: &str = "ICE-ERR-MANIFEST-001";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum IceCubeError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Compiler configuration '{0}' not found!")]
    UnknownConfiguration(String),

    #[error("failed to compile styles of {component}: {message}")]
    Style { component: String, message: String },

    #[error(
        "component name '{component_name}' is claimed by both '{existing}' and '{incoming}'"
    )]
    NameCollision {
        component_name: String,
        existing: String,
        incoming: String,
    },

    #[error("no compiler configuration can resolve component '{0}'")]
    UnknownComponent(String),

    #[error("malformed cache file {}: {source}", path.display())]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("bundler manifest error: {0}")]
    Manifest(String),
}

impl IceCubeError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        IceCubeError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            IceCubeError::Io { .. } => ERR_IO,
            IceCubeError::Config(_) => ERR_CONFIG,
            IceCubeError::UnknownConfiguration(_) => ERR_UNKNOWN_CONFIGURATION,
            IceCubeError::Style { .. } => ERR_STYLE,
            IceCubeError::NameCollision { .. } => ERR_NAME_COLLISION,
            IceCubeError::UnknownComponent(_) => ERR_UNKNOWN_COMPONENT,
            IceCubeError::CacheFormat { .. } => ERR_CACHE_FORMAT,
            IceCubeError::Manifest(_) => ERR_MANIFEST,
        }
    }
}

pub type Result<T> = std::result::Result<T, IceCubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = IceCubeError::UnknownConfiguration("admin".to_string());
        assert_eq!(err.code(), "ICE-ERR-CONFIG-002");
        assert_eq!(err.to_string(), "Compiler configuration 'admin' not found!");

        let err = IceCubeError::io("/tmp/x", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code(), ERR_IO);
        assert!(err.to_string().contains("/tmp/x"));
    }
}
