//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod status;
pub mod util;
pub mod watch;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::On(targets) => control::turn_on(targets, global).await,
        Command::Off(targets) => control::turn_off(targets, global).await,
        Command::Color(args) => control::color(args, global).await,
        Command::Brightness(args) => control::brightness(args, global).await,
        Command::Temperature(args) => control::temperature(args, global).await,
        Command::White(args) => control::white(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            completions(args.shell);
            Ok(())
        }
    }
}

fn completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "duosync", &mut std::io::stdout());
}
