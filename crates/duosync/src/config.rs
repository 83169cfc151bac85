//! CLI flag overrides on top of `duosync_config`.
//!
//! This is the single boundary where flag values cross into core types.

use clap::ValueEnum;

use duosync_config::{Config, load_config};
use duosync_core::SyncConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Load the config file (or defaults) and apply global flag overrides.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config(global.config.as_deref())?;

    if let Some(ref url) = global.api_url {
        cfg.hub.url.clone_from(url);
    }
    if global.insecure {
        cfg.hub.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.defaults.timeout = timeout;
    }
    Ok(cfg)
}

/// Resolve everything a hub-bound command needs.
pub fn sync_config(global: &GlobalOpts) -> Result<(Config, SyncConfig), CliError> {
    let cfg = effective_config(global)?;
    let sync = cfg.to_sync_config()?;
    Ok((cfg, sync))
}

/// `--output` wins; otherwise the config default, falling back to a table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}
