#![deny(unsafe_code)]

//! lineage CLI: inspect attribute configurations and trace resolution.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use lineage_config::AppConfig;
use lineage_core::native::{self, fiber, task, thread};
use lineage_core::{AttributeHandle, AttributeRegistry, ContextId, ContextKind, Source, logging};

/// lineage: context-scoped attributes with ancestor inheritance.
#[derive(Parser)]
#[command(name = "lineage", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "lineage.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// List configured attributes and their policies.
    Attrs,

    /// Resolve one attribute through a chain of nested contexts.
    Trace {
        owner: String,
        name: String,

        /// Write this value in the root context first.
        #[arg(long)]
        set: Option<String>,

        /// Number of nested contexts below the root.
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// Kind of nested context to create.
        #[arg(long, value_enum, default_value_t = Mode::Thread)]
        mode: Mode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Thread,
    Fiber,
    Task,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let config = runtime.block_on(load_config(&cli.config))?;

    logging::init_with_level(logging::effective_level(&config.logging.level, cli.verbose))?;
    info!(path = %cli.config.display(), "Configuration loaded");

    native::configure(&config.hierarchy)?;
    let root = native::bind_root()?;
    debug!(root = %root.id(), "Main thread bound");

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Attrs => cmd_attrs(&config)?,
        Commands::Trace {
            owner,
            name,
            set,
            depth,
            mode,
        } => cmd_trace(&runtime, &config, &owner, &name, set, depth, mode)?,
    }

    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).map_err(|e| anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn cmd_attrs(config: &AppConfig) -> Result<()> {
    let registry = AttributeRegistry::native();
    registry.declare_from_config(&config.attributes)?;

    if registry.owners().is_empty() {
        println!("No attributes configured.");
        return Ok(());
    }
    for owner in registry.owners() {
        let Some(table) = registry.owner(&owner) else {
            continue;
        };
        println!("{owner}");
        for attr in table.describe() {
            let description = attr.description.unwrap_or_default();
            println!(
                "  {:<20} policy={:<16} visibility={:<8} accessors={:<7} {description}",
                attr.name,
                attr.policy.to_string(),
                attr.visibility.to_string(),
                attr.accessors.to_string()
            );
        }
    }
    Ok(())
}

fn cmd_trace(
    runtime: &tokio::runtime::Runtime,
    config: &AppConfig,
    owner: &str,
    name: &str,
    set: Option<String>,
    depth: usize,
    mode: Mode,
) -> Result<()> {
    let registry = AttributeRegistry::native();
    let handles = registry.declare_from_config(&config.attributes)?;
    let handle = handles
        .into_iter()
        .find(|h| h.key().as_str() == format!("{owner}.{name}"))
        .ok_or_else(|| anyhow!("attribute `{owner}.{name}` is not declared in the configuration"))?;

    if let Some(value) = set {
        handle.set(Arc::new(value));
    }

    for step in trace_chain(runtime, &handle, depth, mode)? {
        println!("{step}");
    }
    Ok(())
}

/// What one context in the chain observed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TraceStep {
    level: usize,
    context: ContextId,
    kind: ContextKind,
    value: Option<String>,
    source: Source,
}

impl std::fmt::Display for TraceStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.value.as_deref().unwrap_or("<none>");
        write!(
            f,
            "{:indent$}{} [{}] = {value} ({})",
            "",
            self.context,
            self.kind,
            self.source,
            indent = self.level * 2
        )
    }
}

fn observe(handle: &AttributeHandle, level: usize) -> Result<TraceStep> {
    let context = native::current();
    let resolution = handle.get_traced()?;
    let value = match resolution.value {
        None => None,
        Some(value) => Some(
            value
                .downcast_ref::<String>()
                .cloned()
                .ok_or_else(|| anyhow!("`{}` does not hold a string", handle.key()))?,
        ),
    };
    Ok(TraceStep {
        level,
        context: context.id(),
        kind: context.kind(),
        value,
        source: resolution.source,
    })
}

fn trace_chain(
    runtime: &tokio::runtime::Runtime,
    handle: &AttributeHandle,
    depth: usize,
    mode: Mode,
) -> Result<Vec<TraceStep>> {
    let mut steps = vec![observe(handle, 0)?];
    let nested = match mode {
        Mode::Task => runtime.block_on(descend_tasks(handle.clone(), depth, 1))?,
        _ => descend(handle.clone(), mode, depth, 1)?,
    };
    steps.extend(nested);
    Ok(steps)
}

fn descend(handle: AttributeHandle, mode: Mode, remaining: usize, level: usize) -> Result<Vec<TraceStep>> {
    if remaining == 0 {
        return Ok(Vec::new());
    }
    let name = format!("trace-{level}");
    let body = move || -> Result<Vec<TraceStep>> {
        let mut steps = vec![observe(&handle, level)?];
        steps.extend(descend(handle, mode, remaining - 1, level + 1)?);
        Ok(steps)
    };
    match mode {
        Mode::Thread => thread::Builder::new()
            .name(name)
            .spawn(body)?
            .join()
            .map_err(|_| anyhow!("trace thread at level {level} panicked"))?,
        Mode::Fiber => fiber::Fiber::named(name, body).resume(),
        Mode::Task => bail!("task chains are driven by the runtime"),
    }
}

fn descend_tasks(
    handle: AttributeHandle,
    remaining: usize,
    level: usize,
) -> Pin<Box<dyn Future<Output = Result<Vec<TraceStep>>>>> {
    Box::pin(async move {
        if remaining == 0 {
            return Ok(Vec::new());
        }
        task::scope_named(Some(format!("trace-{level}")), async move {
            let mut steps = vec![observe(&handle, level)?];
            steps.extend(descend_tasks(handle, remaining - 1, level + 1).await?);
            Ok::<_, anyhow::Error>(steps)
        })
        .await
    })
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow!(e))
    } else {
        Ok(AppConfig::default())
    }
}
