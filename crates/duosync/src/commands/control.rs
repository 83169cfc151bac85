//! Device control handlers.
//!
//! Commands are fire-and-forget: success means the hub accepted the
//! request. The resulting state change arrives later through `status` or
//! `watch`.

use serde_json::json;
use tracing::debug;

use duosync_core::{Command, CommandDispatcher};

use crate::cli::{
    BrightnessArgs, ColorArgs, GlobalOpts, OutputFormat, TargetArgs, TemperatureArgs, WhiteArgs,
};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn turn_on(targets: TargetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::TurnOn {
            device_ids: targets.device_ids,
        },
        global,
    )
    .await
}

pub async fn turn_off(targets: TargetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::TurnOff {
            device_ids: targets.device_ids,
        },
        global,
    )
    .await
}

pub async fn color(args: ColorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::SetColor {
            device_ids: args.targets.device_ids,
            red: args.red,
            green: args.green,
            blue: args.blue,
        },
        global,
    )
    .await
}

pub async fn brightness(args: BrightnessArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::SetBrightness {
            device_ids: args.targets.device_ids,
            brightness: args.value,
        },
        global,
    )
    .await
}

pub async fn temperature(args: TemperatureArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::SetTemperature {
            device_ids: args.targets.device_ids,
            temperature: args.kelvin,
        },
        global,
    )
    .await
}

pub async fn white(args: WhiteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    send(
        Command::SetWhite {
            device_ids: args.targets.device_ids,
            white: args.white,
            gain: args.gain,
        },
        global,
    )
    .await
}

// ── Shared dispatch ─────────────────────────────────────────────────

async fn send(command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, sync) = config::sync_config(global)?;
    let format = config::output_format(global, &cfg);

    let dispatcher = CommandDispatcher::new(sync.hub_client()?);
    debug!(action = %command.action(), devices = command.device_ids().len(), "dispatching");
    dispatcher
        .dispatch(&command)
        .await
        .map_err(|e| CliError::from(e).with_timeout(cfg.defaults.timeout))?;

    let out = match format {
        OutputFormat::Table | OutputFormat::Plain => format!(
            "Sent {} to {} device(s)",
            command.action(),
            command.device_ids().len()
        ),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(
            &json!({
                "action": command.action().to_string(),
                "device_ids": command.device_ids(),
                "expected": command.optimistic_patch(),
            }),
            format == OutputFormat::JsonCompact,
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
