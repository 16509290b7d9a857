//! IceCube command-line tool.
//!
//! ```bash
//! icecube compile
//! icecube --config icecube.toml compile --compiler admin
//! icecube vite --build-dir public/build
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use icecube_native::config::{IceCubeConfig, ScriptStrategy};
use icecube_native::context::IceCube;
use icecube_native::error::Result;
use icecube_native::manifest::Manifest;

#[derive(Parser)]
#[command(name = "icecube")]
#[command(about = "Single-file component compiler", long_about = None)]
#[command(version)]
struct Cli {
    /// Project configuration (defaults to ./icecube.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every component and store the caches
    Compile {
        /// Only this compiler configuration
        #[arg(long, value_name = "NAME")]
        compiler: Option<String>,
    },

    /// Pack bundler-emitted component styles into one asset per configuration
    Vite {
        /// Only this compiler configuration
        #[arg(long, value_name = "NAME")]
        compiler: Option<String>,

        /// Bundler output directory holding manifest.json
        #[arg(long, value_name = "DIR", default_value = "public/build")]
        build_dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = IceCubeConfig::discover(cli.config.as_deref())?;
    match cli.command {
        Commands::Compile { compiler } => compile(&config, compiler.as_deref()),
        Commands::Vite {
            compiler,
            build_dir,
        } => vite(&config, compiler.as_deref(), &build_dir),
    }
}

fn compile(config: &IceCubeConfig, selected: Option<&str>) -> Result<()> {
    let mut cube = IceCube::from_config(config);
    for (name, _) in config.select(selected)? {
        println!("Compiling '{}'...", name);
        let count = cube.scan_and_compile(Some(name))?;
        for path in cube.store_caches(Some(name))? {
            println!("  {} component(s) cached in {}", count, path.display());
        }
        let styles_cached = cube
            .compiler(name)
            .map(|c| c.include_styles_in_cache())
            .unwrap_or(true);
        if !styles_cached {
            println!("  styles excluded from cache (delivered by the bundler)");
        }
    }
    println!("All components compiled successfully!");
    Ok(())
}

fn vite(config: &IceCubeConfig, selected: Option<&str>, build_dir: &std::path::Path) -> Result<()> {
    let configs = config.select(selected)?;
    let mut manifest = Manifest::load(build_dir)?;

    for (name, compiler) in configs {
        if compiler.script_compiler != ScriptStrategy::ExternalBundler {
            warn!(config = name, "skipping configuration without the external bundler strategy");
            continue;
        }
        match manifest.pack(name, &compiler.namespace_prefix)? {
            Some(path) => println!("Packed '{}' styles into {}", name, path.display()),
            None => println!("No styles to pack for '{}'", name),
        }
    }

    manifest.save()?;
    println!("All components packed successfully!");
    Ok(())
}
