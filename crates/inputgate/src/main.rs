//! InputGate remapping daemon entry point.
//!
//! Installs the system-wide keyboard hook, applies the key bindings from the
//! config file and the command line, and keeps them active until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! inputgate [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Config file [default: platform config dir]
//!   --bind <SRC=DST>      Extra binding, repeatable (e.g. --bind CapsLock=Escape)
//!   --log-level <FILTER>  Log filter when RUST_LOG is unset
//!   --log-pointer         Trace every pointer event
//! ```
//!
//! Bindings from the command line are applied after the ones in the config
//! file, so `--bind` can retarget a configured key.
//!
//! # Architecture overview
//!
//! ```text
//! main()
//!  └─ platform::native()     -- hook thread + SendInput adapters
//!  └─ InputHooks             -- keyboard/pointer HookManagers + KeyRemapper
//!       └─ KeyRemapper::bind for every binding
//!  └─ ctrl_c().await
//!  └─ InputHooks::dispose    -- unhooks everything
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

use inputgate::application::InputHooks;
use inputgate::infrastructure::platform;
use inputgate::infrastructure::storage::config::{self, AppConfig, BindingEntry};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// System-wide key remapper.
#[derive(Debug, Parser)]
#[command(name = "inputgate", about = "System-wide keyboard remapping daemon", version)]
struct Cli {
    /// Path of the TOML config file.
    ///
    /// Defaults to `config.toml` in the platform config directory.  A missing
    /// file is not an error.
    #[arg(long, env = "INPUTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Binds a source key to a target key, e.g. `CapsLock=Escape`.
    ///
    /// Keys are names (`A`, `F5`, `RightAlt`, `Numpad3`) or hex VK codes
    /// (`0x5B`).  May be given several times.
    #[arg(long = "bind", value_name = "SRC=DST", value_parser = parse_binding)]
    bindings: Vec<BindingEntry>,

    /// Log filter used when `RUST_LOG` is not set; overrides the config file.
    #[arg(long, env = "INPUTGATE_LOG")]
    log_level: Option<String>,

    /// Trace every intercepted pointer event.
    #[arg(long)]
    log_pointer: bool,
}

impl Cli {
    /// Config bindings followed by command-line bindings.
    fn effective_bindings(&self, config: &AppConfig) -> Vec<BindingEntry> {
        config.remap.iter().chain(self.bindings.iter()).copied().collect()
    }

    fn log_filter(&self, config: &AppConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    fn load_config(&self) -> anyhow::Result<AppConfig> {
        match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => match config::load_config() {
                Err(config::ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
                other => other.context("failed to load config"),
            },
        }
    }
}

/// Parses `SRC=DST` into a binding.
fn parse_binding(s: &str) -> Result<BindingEntry, String> {
    let (source, target) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SRC=DST, got '{s}'"))?;
    Ok(BindingEntry {
        source: source.parse().map_err(|e| format!("{e}"))?,
        target: target.parse().map_err(|e| format!("{e}"))?,
    })
}

/// Applies `bindings` in order.
///
/// # Errors
///
/// Fails on the first binding whose hook installation is refused.
fn apply_bindings(hooks: &InputHooks, bindings: &[BindingEntry]) -> anyhow::Result<()> {
    for binding in bindings {
        hooks
            .remapper()
            .bind(binding.source, binding.target)
            .with_context(|| format!("failed to bind {} to {}", binding.source, binding.target))?;
        info!("bound {} -> {}", binding.source, binding.target);
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = cli.load_config()?;

    // `RUST_LOG` wins; otherwise --log-level, then the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter(&app_config))),
        )
        .init();

    info!("InputGate starting");

    let services = platform::native().context("low-level input hooks are unavailable")?;
    let hooks = InputHooks::with_slow_dispatch_threshold(
        services.hooks,
        services.injector,
        services.pointer,
        app_config.general.slow_dispatch_threshold(),
    );

    apply_bindings(&hooks, &cli.effective_bindings(&app_config))?;

    if cli.log_pointer || app_config.hooks.log_pointer_events {
        hooks
            .subscribe_pointer("pointer-trace", |event| {
                trace!(?event, "pointer event");
                true
            })
            .context("failed to install pointer hook")?;
    }

    if hooks.remapper().is_empty() {
        info!("no bindings configured; waiting for Ctrl+C");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");

    hooks.dispose();
    info!("InputGate stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
