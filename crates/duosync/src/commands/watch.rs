//! Live status: runs the sync controller and prints connectivity changes
//! and device updates until interrupted.

use std::time::Duration;

use chrono::Local;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use duosync_core::{StoreChange, SyncController, SyncPhase};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, mut sync) = config::sync_config(global)?;
    if args.no_push {
        sync.push_enabled = false;
    }
    let printer = Printer {
        format: config::output_format(global, &cfg),
        painter: Painter::new(global.color),
        quiet: global.quiet,
    };

    let ctrl = SyncController::spawn(sync)?;
    info!(api_url = %ctrl.config().api_url, "watching hub");

    let (tx, mut changes) = mpsc::unbounded_channel();
    let subscription = ctrl.store().subscribe(move |change: &StoreChange| {
        let _ = tx.send(change.clone());
    });

    let mut phase = ctrl.phase();
    printer.phase(*phase.borrow_and_update(), None)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match args.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            () = &mut deadline => break,
            res = phase.changed() => {
                if res.is_err() {
                    break;
                }
                let current = *phase.borrow_and_update();
                let age = ctrl.store().data_age().and_then(|d| d.to_std().ok());
                printer.phase(current, age)?;
                if current == SyncPhase::Stopped {
                    break;
                }
            }
            Some(change) = changes.recv() => printer.change(&change)?,
        }
    }

    subscription.unsubscribe();
    ctrl.shutdown().await;
    Ok(())
}

// ── Event printing ──────────────────────────────────────────────────

struct Printer {
    format: OutputFormat,
    painter: Painter,
    quiet: bool,
}

impl Printer {
    fn phase(&self, phase: SyncPhase, data_age: Option<Duration>) -> Result<(), CliError> {
        let out = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => self.json(&json!({
                "event": "phase",
                "phase": output::phase_label(phase),
                "data_age_secs": data_age.map(|d| d.as_secs()),
            }))?,
            OutputFormat::Table | OutputFormat::Plain => {
                let age = data_age
                    .map(|d| {
                        let whole = Duration::from_secs(d.as_secs());
                        format!(", data {} old", humantime::format_duration(whole))
                    })
                    .unwrap_or_default();
                format!(
                    "{} hub {}{}",
                    self.painter.dim(&timestamp()),
                    self.painter.phase(phase),
                    self.painter.dim(&age)
                )
            }
        };
        output::print_output(&out, self.quiet);
        Ok(())
    }

    fn change(&self, change: &StoreChange) -> Result<(), CliError> {
        let devices = change
            .changed
            .iter()
            .filter_map(|id| change.snapshot.get(id).map(|s| (id, s)));

        let out = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                let devices: serde_json::Map<String, serde_json::Value> = devices
                    .map(|(id, s)| Ok((id.clone(), serde_json::to_value(s)?)))
                    .collect::<Result<_, serde_json::Error>>()?;
                self.json(&json!({
                    "event": "update",
                    "version": change.version,
                    "devices": devices,
                }))?
            }
            OutputFormat::Table | OutputFormat::Plain => {
                let stamp = self.painter.dim(&timestamp());
                devices
                    .map(|(id, s)| format!("{stamp} {}", util::device_line(id, s)))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        output::print_output(&out, self.quiet);
        Ok(())
    }

    /// `json-compact` gives one event per line; `json` pretty-prints each.
    fn json(&self, event: &serde_json::Value) -> Result<String, CliError> {
        output::render_json(event, self.format == OutputFormat::JsonCompact)
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
