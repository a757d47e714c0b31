//! Full node entry point: load configuration, start networking, and
//! drive the interactive shell on stdin.

use clap::Parser;

#[derive(Parser)]
#[command(name = "brook-node", about = "Run a Brook full node")]
struct Args {
    /// Path to a TOML/YAML/JSON config file (without extension).
    #[arg(long)]
    config: Option<String>,
    /// Socket address to bind the peer WebSocket listener to.
    #[arg(long, default_value = "127.0.0.1:7373")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = brook_node::NodeConfig::load(args.config.as_deref())?;
    config.bind_address = args.bind;

    let node = brook_node::Node::start(config).await?;
    brook_node::shell::run(node).await
}
