//! `networks`: supported deployments

use kashi_core::{Network, NetworkConfig};

pub fn rows() -> Vec<String> {
    Network::ALL
        .iter()
        .map(|network| {
            let config = NetworkConfig::for_network(*network);
            format!(
                "{:<8} {:<9} {:<6} bentobox={} master={} scan={}",
                network.cli_name(),
                config.name,
                config.coin_name,
                config.bento_box_v1_address,
                config.kashi_pair_master_address,
                config.scan_api_url
            )
        })
        .collect()
}

pub fn run() {
    for row in rows() {
        println!("{row}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_every_network() {
        let rows = rows();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("ether"));
        assert!(rows[2].contains("MATIC"));
        assert!(rows[2].contains("api.polygonscan.com"));
    }
}
