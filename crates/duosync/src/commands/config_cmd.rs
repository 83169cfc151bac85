//! Config subcommand handlers.

use duosync_config::{Config, config_path, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::effective_config(global)?;
            let out = match config::output_format(global, &cfg) {
                OutputFormat::Json => output::render_json(&cfg, false)?,
                OutputFormat::JsonCompact => output::render_json(&cfg, true)?,
                OutputFormat::Table | OutputFormat::Plain => to_toml(&cfg)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut cfg = Config::default();
            if let Some(ref url) = global.api_url {
                cfg.hub.url.clone_from(url);
            }
            // Catch a bad --api-url before it lands on disk.
            cfg.to_sync_config()?;

            save_config(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}

fn to_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: format!("failed to serialize config: {e}"),
    })
}
