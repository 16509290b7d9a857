//! # IceCube Single-File Component Compiler
//!
//! A component is one `.ice.php` source holding server code, an optional
//! `<script>` and any number of `<style>` blocks, plus an optional colocated
//! `.js` file. Compilation splits it into three artifacts:
//!
//! 1. **Code**: the server code section, trimmed through its last `?>`.
//! 2. **Script**: the client script, with styles either embedded as a runtime
//!    `<style>` injector or imported for an external bundler.
//! 3. **Style**: every style block scoped under `[data-icecube=<name>]`.
//!
//! ## Pipeline
//!
//! `parse` extracts sections and the content digest, `style` and `script`
//! apply the configured strategies, `artifact` writes files only when their
//! bytes change, and `registry` keeps the results, persisting them to a cache
//! file for production boots.
//!
//! ## Naming
//!
//! An identifier such as `App\Components\Forms\Input` flattens to the
//! component name `App_Components_Forms_Input`, which names every artifact,
//! the scoping attribute and the style element id. Two identifiers flattening
//! to the same name are rejected (ICE-ERR-REGISTRY-001).

pub mod artifact;
pub mod cache;
pub mod compiler;
pub mod component;
pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod parse;
pub mod registry;
pub mod remote;
pub mod script;
pub mod style;


pub use compiler::{CompiledComponent, IceCubeCompiler};
pub use component::{RootAttributes, SingleFileComponent};
pub use config::{CompilerConfig, IceCubeConfig, ScriptStrategy, StyleStrategy};
pub use context::{BootMode, IceCube};
pub use error::{IceCubeError, Result};
pub use parse::{component_name, parse_component, ParsedComponent, StyleBlock};
pub use registry::{Registry, Resolved, StyleElement};
pub use remote::{ComponentRequest, ComponentResponse, InteractiveComponent, RemoteDispatcher, RemoteError};
