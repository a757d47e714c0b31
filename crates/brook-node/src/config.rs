//! Node configuration (§6): recognized config-file keys, with an
//! environment variable override for the advertised listen address.

use brook_core::constants::DEFAULT_MAX_BLOCK_BYTES;

const ENV_LISTEN_ADDRESS: &str = "BROOK_SERVER_LISTEN_ADDRESS";

/// Configuration for a full node instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Max total transaction bytes per block.
    pub max_data_bytes: usize,
    /// Advertised `host:port` for peer discovery, if any.
    pub listen_address: Option<String>,
    /// Local socket address the WebSocket server binds to.
    pub bind_address: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_data_bytes: DEFAULT_MAX_BLOCK_BYTES,
            listen_address: None,
            bind_address: "127.0.0.1:7373".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load from a config file (`config` crate: TOML/YAML/JSON all
    /// accepted by extension), then apply the environment override.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = path {
            let source = config::Config::builder()
                .add_source(config::File::with_name(path).required(false))
                .build()?;
            if let Ok(max_bytes) = source.get_int("maxDataBytes") {
                cfg.max_data_bytes = max_bytes as usize;
            }
            if let Ok(addr) = source.get_string("listenAddress") {
                cfg.listen_address = Some(addr);
            }
        }
        if let Ok(addr) = std::env::var(ENV_LISTEN_ADDRESS) {
            cfg.listen_address = Some(addr);
        }
        Ok(cfg)
    }
}
