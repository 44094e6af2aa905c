//! Command-line interface
//!
//! Grounded in the teacher's `cli::mod` (`Cli`/`Commands` via `clap::Parser`,
//! one submodule per subcommand, `cli::output` for table/JSON rendering).
//! `serve` runs the gateway process itself; every other subcommand is a thin
//! HTTP client talking to an already-running `serve` instance over
//! `/internal/*` and `/api/v1/*` (spec.md §6) rather than operating on
//! in-process state the way the teacher's `backends`/`models`/`health`
//! subcommands do, since here a CLI invocation is a separate process.

pub mod client;
pub mod completions;
pub mod delete;
pub mod list;
pub mod output;
pub mod pull;
pub mod run;
pub mod serve;
pub mod status;
pub mod stop;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "Local LLM gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway server
    Serve(ServeArgs),
    /// Check whether a gateway instance is running
    Status(ConnectArgs),
    /// Stop a running gateway instance
    Stop(ConnectArgs),
    /// List models in the catalog
    List(ListArgs),
    /// Download a model's artifacts
    Pull(PullArgs),
    /// Remove a model's cached artifacts
    Delete(DeleteArgs),
    /// Load a model and leave it serving
    Run(RunArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Flags shared by every subcommand that talks to a running instance over
/// HTTP rather than starting one.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Host the running gateway listens on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port the running gateway listens on
    #[arg(long, default_value_t = 8000)]
    pub port: u16,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gatehouse.toml")]
    pub config: PathBuf,
    /// Override server port
    #[arg(short, long, env = "GATEHOUSE_PORT")]
    pub port: Option<u16>,
    /// Override server host
    #[arg(short = 'H', long, env = "GATEHOUSE_HOST")]
    pub host: Option<String>,
    /// Context window size passed to the CPU/GPU engine
    #[arg(long)]
    pub ctx_size: Option<u32>,
    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GATEHOUSE_LOG_LEVEL")]
    pub log_level: Option<String>,
    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Include models that are not yet downloaded
    #[arg(long)]
    pub show_all: bool,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Gateway-facing model name
    pub name: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Upstream checkpoint id (required when `name` is not already registered)
    #[arg(long)]
    pub checkpoint: Option<String>,
    /// Adapter recipe (`llamabox` or `npu`)
    #[arg(long)]
    pub recipe: Option<String>,
    /// Tag the model with the `reasoning` label
    #[arg(long)]
    pub reasoning: bool,
    /// Tag the model with the `vision` label
    #[arg(long)]
    pub vision: bool,
    /// Tag the model with the `embedding` label
    #[arg(long)]
    pub embedding: bool,
    /// Tag the model with the `reranking` label
    #[arg(long)]
    pub reranking: bool,
    /// Multimodal projector file, for vision models
    #[arg(long)]
    pub mmproj: Option<String>,
}

impl PullArgs {
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if self.reasoning {
            labels.push("reasoning".to_string());
        }
        if self.vision {
            labels.push("vision".to_string());
        }
        if self.embedding {
            labels.push("embedding".to_string());
        }
        if self.reranking {
            labels.push("reranking".to_string());
        }
        labels
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub name: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub name: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_serve_defaults() {
        let cli = Cli::try_parse_from(["gatehouse", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("gatehouse.toml"));
                assert!(args.port.is_none());
            }
            _ => panic!("expected Serve"),
        }
    }

    #[test]
    fn parses_pull_with_labels() {
        let cli = Cli::try_parse_from(["gatehouse", "pull", "Model-X", "--checkpoint", "org/repo", "--vision"])
            .unwrap();
        match cli.command {
            Commands::Pull(args) => {
                assert_eq!(args.name, "Model-X");
                assert_eq!(args.labels(), vec!["vision".to_string()]);
            }
            _ => panic!("expected Pull"),
        }
    }

    #[test]
    fn parses_status_connect_defaults() {
        let cli = Cli::try_parse_from(["gatehouse", "status"]).unwrap();
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.port, 8000);
            }
            _ => panic!("expected Status"),
        }
    }
}
