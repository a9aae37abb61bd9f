//! HotStuff daemon: entry point for running a member node.

use anyhow::Context;
use clap::Parser;
use hotstuff_consensus::VariantKind;
use hotstuff_crypto::generate_keypair;
use hotstuff_node::{init_logging, HotStuffNode, LogFormat, NodeConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "hotstuff-daemon", about = "HotStuff BFT consensus node daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a member node.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, env = "HOTSTUFF_CONFIG")]
        config: PathBuf,

        /// Override the listen address from the file.
        #[arg(long, env = "HOTSTUFF_LISTEN_ADDR")]
        listen_addr: Option<String>,

        /// Override the protocol variant: "basic" or "chained".
        #[arg(long, env = "HOTSTUFF_VARIANT", value_parser = parse_variant)]
        variant: Option<VariantKind>,

        /// Override the log level, e.g. "debug" or "info,hotstuff_consensus=trace".
        #[arg(long, env = "HOTSTUFF_LOG_LEVEL")]
        log_level: Option<String>,

        /// Override the log format: "human" or "json".
        #[arg(long, env = "HOTSTUFF_LOG_FORMAT", value_parser = parse_log_format)]
        log_format: Option<LogFormat>,

        /// Submit each line read from stdin as an item to order.
        #[arg(long)]
        submit_stdin: bool,
    },

    /// Generate a fresh member key pair.
    Keygen {
        /// Address to put in the printed member entry.
        #[arg(long, default_value = "127.0.0.1:7400")]
        address: String,
    },
}

fn parse_variant(s: &str) -> Result<VariantKind, String> {
    s.parse().map_err(|e: hotstuff_consensus::ConsensusError| e.to_string())
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse().map_err(|e: hotstuff_node::NodeError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            listen_addr,
            variant,
            log_level,
            log_format,
            submit_stdin,
        } => {
            let mut node_config = NodeConfig::from_toml_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            if let Some(addr) = listen_addr {
                node_config.listen_addr = addr;
            }
            if let Some(variant) = variant {
                node_config.variant = variant;
            }
            if let Some(level) = log_level {
                node_config.log_level = level;
            }
            let format = match log_format {
                Some(format) => format,
                None => node_config.log_format()?,
            };
            init_logging(format, &node_config.log_level)?;
            tracing::info!(config = %config.display(), "configuration loaded");

            run(node_config, submit_stdin).await
        }
        Command::Keygen { address } => {
            let keypair = generate_keypair();
            println!("# keep private_key secret; share the [[members]] entry");
            println!("private_key = \"{}\"", hex::encode(&keypair.private.0));
            println!();
            println!("[[members]]");
            println!("public_key = \"{}\"", keypair.public);
            println!("address = \"{address}\"");
            Ok(())
        }
    }
}

async fn run(config: NodeConfig, submit_stdin: bool) -> anyhow::Result<()> {
    let node = HotStuffNode::start(config)
        .await
        .context("starting node")?;
    tracing::info!(listen = %node.local_addr(), "node running, waiting for shutdown signal");

    if submit_stdin {
        let processor = node.processor().clone();
        let mut shutdown_rx = node.shutdown_controller().subscribe();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) if !line.is_empty() => processor.submit(line.into_bytes()),
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "stdin read failed");
                            break;
                        }
                    },
                }
            }
        });
    }

    node.run_until_signal().await?;
    tracing::info!("HotStuff daemon exited cleanly");
    Ok(())
}
