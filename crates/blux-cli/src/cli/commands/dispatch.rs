use super::super::args::*;
use crate::exit_codes::SUCCESS;
use blux_core::BuildConfig;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    // Ambient configuration is read once, here, and passed down explicitly.
    let config = BuildConfig::from_env();
    tracing::debug!(?config, "resolved build configuration");
    match cli.cmd {
        Command::Snapshot(args) => super::snapshot::run(args, &config),
        Command::Receipt(args) => super::receipt::run(args, &config),
        Command::Replay(args) => super::replay::run(args, &config),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
