use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use axiom_chain::{group_by_session, verify_sessions};
use axiom_core::{CausalityGraph, Frame, TraceConfig};
use axiom_store::read_lines;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "axiom")]
struct Cli {
    /// Vault directory; overrides `vault_dir` from `--config`. Defaults to `./axiom_vault`.
    #[arg(long)]
    vault: Option<PathBuf>,
    /// YAML trace config.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify every session's hash chain.
    Verify,
    Tail {
        #[arg(long, default_value_t = 10)]
        lines: usize,
    },
    /// Print the cause → effect chain ending at a frame.
    Chain { frame_id: String },
    Sessions,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.vault.as_deref(), cli.config.as_deref())?;
    let path = config.frames_path();

    match cli.command {
        Command::Tail { lines } => {
            let all = read_log(&path)?;
            let start = all.len().saturating_sub(lines);
            for line in &all[start..] {
                println!("{line}");
            }
        }
        Command::Verify => {
            let sessions = verify_sessions(&load_frames(&path)?)?;
            println!("frame log ok ({sessions} sessions)");
        }
        Command::Chain { frame_id } => {
            let graph = CausalityGraph::from_frames(load_frames(&path)?);
            for frame in graph.get_chain(&frame_id)? {
                println!(
                    "{} {} [{}] {}",
                    frame.timestamp, frame.frame_id, frame.event_type, frame.vector_key
                );
            }
        }
        Command::Sessions => {
            for (session_id, frames) in group_by_session(&load_frames(&path)?) {
                println!("{session_id}\t{}", frames.len());
            }
        }
    }

    Ok(())
}

/// `--config` (or defaults), with `--vault` applied on top only when given.
fn resolve_config(vault: Option<&Path>, config: Option<&Path>) -> anyhow::Result<TraceConfig> {
    let mut cfg = match config {
        Some(path) => TraceConfig::from_path(path)?,
        None => TraceConfig::default(),
    };
    if let Some(vault) = vault {
        cfg = cfg.with_vault_dir(vault);
    }
    Ok(cfg)
}

/// Raw lines of an existing frame log. Never creates the vault.
fn read_log(path: &Path) -> anyhow::Result<Vec<String>> {
    if !path.is_file() {
        bail!("no frame log at {}", path.display());
    }
    tracing::debug!(path = %path.display(), "reading frame log");
    read_lines(path).with_context(|| format!("reading {}", path.display()))
}

fn load_frames(path: &Path) -> anyhow::Result<Vec<Frame>> {
    read_log(path)?
        .iter()
        .enumerate()
        .map(|(i, line)| {
            Frame::from_line(line)
                .with_context(|| format!("{}:{}: not a valid frame", path.display(), i + 1))
        })
        .collect()
}
