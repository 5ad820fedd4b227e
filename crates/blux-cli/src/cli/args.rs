use blux_core::types::PackRef;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "blux-system",
    version,
    about = "BLUX deterministic snapshots, execution receipts and replay reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record a deterministic snapshot of input and output files
    Snapshot(SnapshotArgs),
    /// Bind a snapshot to agent and run metadata
    Receipt(ReceiptArgs),
    /// Re-verify a receipt against files on disk
    Replay(ReplayArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Input directory (or single file)
    #[arg(long = "in", value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory; hashed as the run's outputs and receives snapshot.json
    #[arg(long = "out", value_name = "DIR")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ReceiptArgs {
    /// Snapshot document
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Directory that receives receipt.json
    #[arg(long = "out", value_name = "DIR")]
    pub output: PathBuf,

    /// Policy pack reference
    #[arg(long, value_name = "ID@VERSION", value_parser = parse_pack_ref)]
    pub policy_pack: Option<PackRef>,

    /// Reasoning pack reference
    #[arg(long, value_name = "ID@VERSION", value_parser = parse_pack_ref)]
    pub reasoning_pack: Option<PackRef>,

    /// JSON file with run-graph steps (an array, or an object with "steps")
    #[arg(long, value_name = "FILE")]
    pub run_graph: Option<PathBuf>,

    /// JSON file with one dataset fixture ({"id", "hash"?, "path"?})
    #[arg(long, value_name = "FILE")]
    pub dataset_fixture: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Receipt document to verify
    #[arg(long, value_name = "FILE")]
    pub receipt: PathBuf,

    /// Directory the receipt's output paths are resolved against
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Write replay_report.json here instead of printing to stdout
    #[arg(long = "out", value_name = "DIR")]
    pub output: Option<PathBuf>,
}

fn parse_pack_ref(s: &str) -> Result<PackRef, String> {
    match s.split_once('@') {
        Some((id, version)) if !id.is_empty() && !version.is_empty() => Ok(PackRef {
            id: id.to_string(),
            version: version.to_string(),
        }),
        _ => Err(format!("expected ID@VERSION, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_ref_splits_on_first_at() {
        let pack = parse_pack_ref("policy-core@1.2.0").unwrap();
        assert_eq!(pack.id, "policy-core");
        assert_eq!(pack.version, "1.2.0");
    }

    #[test]
    fn pack_ref_requires_both_halves() {
        assert!(parse_pack_ref("policy-core").is_err());
        assert!(parse_pack_ref("@1.0").is_err());
        assert!(parse_pack_ref("policy-core@").is_err());
    }

    #[test]
    fn cli_parses_receipt_flags() {
        let cli = Cli::try_parse_from([
            "blux-system",
            "receipt",
            "--snapshot",
            "s.json",
            "--out",
            "out",
            "--policy-pack",
            "p@1",
        ])
        .unwrap();
        match cli.cmd {
            Command::Receipt(args) => {
                assert_eq!(args.policy_pack.unwrap().version, "1");
                assert!(args.run_graph.is_none());
            }
            _ => panic!("expected receipt subcommand"),
        }
    }
}
