//! Local-development shell: starts a node on an ephemeral listen
//! address and drops straight into the interactive REPL, for exercising
//! the command surface without standing up a real peer network.

use clap::Parser;

#[derive(Parser)]
#[command(name = "brook-cli", about = "Run a Brook node and its shell for local development")]
struct Args {
    #[arg(long)]
    config: Option<String>,
    /// Peer to connect to immediately, if any.
    #[arg(long)]
    peer: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = brook_node::NodeConfig::load(args.config.as_deref())?;
    config.bind_address = "127.0.0.1:0".to_string();

    let node = brook_node::Node::start(config).await?;
    if let Some(peer) = args.peer {
        node.peer_add(&peer).await?;
    }
    brook_node::shell::run(node).await
}
