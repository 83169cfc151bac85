//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use duosync_core::{PowerState, SyncPhase};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Applies terminal colors when enabled, passes text through otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            enabled: should_color(mode),
        }
    }

    pub fn state(self, state: PowerState) -> String {
        match (self.enabled, state) {
            (false, _) => state.to_string(),
            (true, PowerState::On) => state.green().bold().to_string(),
            (true, PowerState::Off) => state.dimmed().to_string(),
        }
    }

    pub fn phase(self, phase: SyncPhase) -> String {
        let text = phase_label(phase);
        if !self.enabled {
            return text;
        }
        match phase {
            SyncPhase::Connected => text.green().to_string(),
            SyncPhase::Bootstrapping | SyncPhase::Reconnecting { .. } => {
                text.yellow().to_string()
            }
            SyncPhase::Degraded => text.red().to_string(),
            SyncPhase::Stopped => text.dimmed().to_string(),
        }
    }

    pub fn dim(self, text: &str) -> String {
        if self.enabled {
            text.dimmed().to_string()
        } else {
            text.to_owned()
        }
    }
}

/// Human label for a controller phase.
pub fn phase_label(phase: SyncPhase) -> String {
    match phase {
        SyncPhase::Bootstrapping => "bootstrapping".into(),
        SyncPhase::Connected => "connected (push)".into(),
        SyncPhase::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        SyncPhase::Degraded => "degraded (polling)".into(),
        SyncPhase::Stopped => "stopped".into(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes `data` via serde
/// - `plain`: calls `line_fn` on each item
pub fn render_list<T, D, R>(
    format: OutputFormat,
    data: &D,
    items: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    D: serde::Serialize + ?Sized,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = items.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => Ok(items.iter().map(line_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}
