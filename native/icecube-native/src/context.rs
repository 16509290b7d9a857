//! Process-wide IceCube context.
//!
//! Owns the registry and every configured compiler. Construct one at process
//! start and hand it to whatever renders components; there is no global state.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::compiler::{CompiledComponent, IceCubeCompiler};
use crate::config::IceCubeConfig;
use crate::error::{IceCubeError, Result};
use crate::registry::{Registry, Resolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Load caches where enabled; compile everything else up front.
    Production,
    /// Compile every configuration from source.
    Development,
}

#[derive(Debug, Default)]
pub struct IceCube {
    registry: Registry,
    compilers: Vec<IceCubeCompiler>,
}

impl IceCube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &IceCubeConfig) -> Self {
        let mut cube = Self::new();
        for (name, compiler) in &config.compilers {
            cube.add_compiler(IceCubeCompiler::new(name.clone(), compiler.clone()));
        }
        cube
    }

    pub fn add_compiler(&mut self, compiler: IceCubeCompiler) {
        self.compilers.push(compiler);
    }

    pub fn compilers(&self) -> &[IceCubeCompiler] {
        &self.compilers
    }

    pub fn compiler(&self, name: &str) -> Option<&IceCubeCompiler> {
        self.compilers.iter().find(|c| c.name() == name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn boot(&mut self, mode: BootMode) -> Result<()> {
        for compiler in &self.compilers {
            let cached = mode == BootMode::Production
                && compiler.config().cache_enabled
                && self.registry.load_cache(&compiler.cache_file());
            if !cached {
                compiler.scan_and_compile(&mut self.registry)?;
            }
        }
        info!(?mode, components = self.registry.len(), "icecube booted");
        Ok(())
    }

    /// Scan and compile the named configuration, or all of them.
    pub fn scan_and_compile(&mut self, name: Option<&str>) -> Result<usize> {
        let mut total = 0;
        for compiler in selected(&self.compilers, name)? {
            total += compiler.scan_and_compile(&mut self.registry)?.len();
        }
        Ok(total)
    }

    /// Store one cache file per selected configuration, holding the components
    /// under its namespace. Returns the written paths.
    pub fn store_caches(&self, name: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for compiler in selected(&self.compilers, name)? {
            let path = compiler.cache_file();
            self.registry.store_cache_matching(
                &path,
                compiler.include_styles_in_cache(),
                |identifier| compiler.owns(identifier),
            )?;
            written.push(path);
        }
        Ok(written)
    }

    /// Resolve a component, compiling it synchronously on first reference if
    /// it is not registered yet.
    pub fn resolve(&mut self, identifier: &str) -> Result<Resolved<'_>> {
        if !self.registry.contains(identifier) {
            debug!(component = identifier, "compiling on first reference");
            self.compile_owned(identifier)?;
        }

        self.registry
            .resolve(identifier)?
            .ok_or_else(|| IceCubeError::UnknownComponent(identifier.to_string()))
    }

    /// Compile `identifier` again even if it is already registered.
    pub fn recompile(&mut self, identifier: &str) -> Result<CompiledComponent> {
        self.compile_owned(identifier)
    }

    fn compile_owned(&mut self, identifier: &str) -> Result<CompiledComponent> {
        let compiler = owner_of(&self.compilers, identifier)?;
        let source_path = compiler
            .source_path_for(identifier)
            .ok_or_else(|| IceCubeError::UnknownComponent(identifier.to_string()))?;
        compiler.compile(&mut self.registry, identifier, &source_path)
    }
}

fn selected<'a>(
    compilers: &'a [IceCubeCompiler],
    name: Option<&str>,
) -> Result<Vec<&'a IceCubeCompiler>> {
    match name {
        Some(name) => compilers
            .iter()
            .find(|c| c.name() == name)
            .map(|c| vec![c])
            .ok_or_else(|| IceCubeError::UnknownConfiguration(name.to_string())),
        None => Ok(compilers.iter().collect()),
    }
}

fn owner_of<'a>(compilers: &'a [IceCubeCompiler], identifier: &str) -> Result<&'a IceCubeCompiler> {
    compilers
        .iter()
        .find(|c| c.owns(identifier))
        .ok_or_else(|| IceCubeError::UnknownComponent(identifier.to_string()))
}
