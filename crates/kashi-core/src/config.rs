//! Configuration types for the Kashi monitor

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Network;

/// Sliding-window rate limit: at most `times` calls per `interval_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub times: u32,
    pub interval_ms: u64,
}

impl ThrottleConfig {
    pub const fn new(times: u32, interval_ms: u64) -> Self {
        Self { times, interval_ms }
    }
}

/// Static deployment data for one network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: Network,
    pub name: String,
    /// One-letter tag used in reports
    pub ticker: String,
    pub coin_name: String,

    /// RPC endpoint without the API key suffix
    pub rpc_url: String,
    /// Env var holding the RPC API key
    pub rpc_key_env: String,
    pub rpc_throttle: ThrottleConfig,

    /// Block-explorer API root (e.g., "https://api.etherscan.io")
    pub scan_api_url: String,
    /// Env var holding the block-explorer API key
    pub scan_key_env: String,
    pub scan_throttle: ThrottleConfig,

    pub bento_box_v1_address: String,
    pub kashi_pair_master_address: String,
}

/// RPC provider limit: 300 requests per second
const RPC_THROTTLE: ThrottleConfig = ThrottleConfig::new(300, 1000);
/// Explorer free tier: 4 requests per 1.1 seconds
const SCAN_THROTTLE: ThrottleConfig = ThrottleConfig::new(4, 1100);

impl NetworkConfig {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Ethereum => Self {
                network,
                name: "Ethereum".to_string(),
                ticker: "E".to_string(),
                coin_name: "ETH".to_string(),
                rpc_url: "https://eth-mainnet.alchemyapi.io/v2/".to_string(),
                rpc_key_env: "ALCHEMY_API_KEY_ETHEREUM".to_string(),
                rpc_throttle: RPC_THROTTLE,
                scan_api_url: "https://api.etherscan.io".to_string(),
                scan_key_env: "ETHERSCAN_API_KEY".to_string(),
                scan_throttle: SCAN_THROTTLE,
                bento_box_v1_address: "0xF5BCE5077908a1b7370B9ae04AdC565EBd643966".to_string(),
                kashi_pair_master_address: "0x2cBA6Ab6574646Badc84F0544d05059e57a5dc42"
                    .to_string(),
            },
            Network::Kovan => Self {
                network,
                name: "Kovan".to_string(),
                ticker: "K".to_string(),
                coin_name: "ETH".to_string(),
                rpc_url: "https://eth-kovan.alchemyapi.io/v2/".to_string(),
                rpc_key_env: "ALCHEMY_API_KEY_KOVAN".to_string(),
                rpc_throttle: RPC_THROTTLE,
                scan_api_url: "https://api-kovan.etherscan.io".to_string(),
                scan_key_env: "ETHERSCAN_API_KEY".to_string(),
                scan_throttle: SCAN_THROTTLE,
                bento_box_v1_address: "0xc381a85ed7C7448Da073b7d6C9d4cBf1Cbf576f0".to_string(),
                kashi_pair_master_address: "0x2cBA6Ab6574646Badc84F0544d05059e57a5dc42"
                    .to_string(),
            },
            Network::Polygon => Self {
                network,
                name: "Polygon".to_string(),
                ticker: "P".to_string(),
                coin_name: "MATIC".to_string(),
                rpc_url: "https://polygon-mainnet.g.alchemy.com/v2/".to_string(),
                rpc_key_env: "ALCHEMY_API_KEY_POLYGON".to_string(),
                rpc_throttle: RPC_THROTTLE,
                scan_api_url: "https://api.polygonscan.com".to_string(),
                scan_key_env: "POLYGONSCAN_API_KEY".to_string(),
                scan_throttle: SCAN_THROTTLE,
                bento_box_v1_address: "0x0319000133d3AdA02600f0875d2cf03D442C3367".to_string(),
                kashi_pair_master_address: "0xB527C5295c4Bc348cBb3a2E96B2494fD292075a7"
                    .to_string(),
            },
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network deployment settings
    pub network: NetworkConfig,

    /// Block-explorer API key (may be empty for keyless endpoints)
    #[serde(default)]
    pub scan_api_key: String,

    /// Directory for the permanent metadata cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Attempts per scan API call before giving up
    #[serde(default = "default_max_scan_attempts")]
    pub max_scan_attempts: u32,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_max_scan_attempts() -> u32 {
    5
}

impl AppConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network: NetworkConfig::for_network(network),
            scan_api_key: String::new(),
            cache_dir: default_cache_dir(),
            max_scan_attempts: default_max_scan_attempts(),
        }
    }

    /// Build a config for `network`, pulling secrets through `lookup`
    /// (normally `std::env::var`)
    pub fn from_lookup<F>(network: Network, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::for_network(network);
        if let Some(key) = lookup(&config.network.scan_key_env) {
            config.scan_api_key = key;
        }
        if let Some(dir) = lookup("KASHI_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_network(Network::Ethereum)
    }
}
