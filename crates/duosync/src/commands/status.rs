//! One-shot status pull.

use std::collections::BTreeMap;

use tracing::debug;

use duosync_core::{DeviceStatus, HubStatusSource};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, sync) = config::sync_config(global)?;
    let format = config::output_format(global, &cfg);
    let painter = Painter::new(global.color);

    let source = HubStatusSource::new(sync.hub_client()?);
    let batch = source
        .try_fetch()
        .await
        .map_err(|e| CliError::from(e).with_timeout(cfg.defaults.timeout))?;
    debug!(devices = batch.len(), "status pulled");

    // A pull carries whole records; fill anything missing with defaults.
    let statuses: BTreeMap<String, DeviceStatus> = batch
        .iter()
        .filter(|(id, _)| args.device_ids.is_empty() || args.device_ids.contains(*id))
        .map(|(id, patch)| (id.clone(), DeviceStatus::default().merged(patch)))
        .collect();

    let items: Vec<(&String, &DeviceStatus)> = statuses.iter().collect();
    let out = output::render_list(
        format,
        &statuses,
        &items,
        |(id, s)| util::device_row(id, s, painter),
        |(id, s)| util::device_line(id, s),
    )?;
    output::print_output(&out, global.quiet);

    if statuses.is_empty() && !global.quiet {
        eprintln!("No devices reported by the hub");
    }
    Ok(())
}
