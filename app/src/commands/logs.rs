//! `logs`: raw event log query

use kashi_core::{Address, AppConfig};
use scan_client::{LogFilter, PermanentCache, ScanClient, TxRef};

/// Cache of logs per mined transaction
const TX_LOGS_CACHE: &str = "txLogs";

pub fn build_filter(
    address: &str,
    topic0: Option<String>,
    address1: Option<String>,
    tx: Option<(String, u64)>,
) -> anyhow::Result<LogFilter> {
    let mut filter = LogFilter::new(Address::parse(address)?);
    if let Some(topic0) = topic0 {
        filter = filter.event(topic0);
    }
    if let Some(address1) = address1 {
        filter = filter.address1(&Address::parse(&address1)?);
    }
    if let Some((hash, block_number)) = tx {
        filter = filter.in_tx(TxRef { block_number, hash });
    }
    Ok(filter)
}

pub async fn run(
    config: &AppConfig,
    address: &str,
    topic0: Option<String>,
    address1: Option<String>,
    tx: Option<(String, u64)>,
) -> anyhow::Result<()> {
    let filter = build_filter(address, topic0, address1, tx)?;
    let client = ScanClient::new(config)?;

    let logs = if filter.tx.is_some() {
        let cache = PermanentCache::open(&config.cache_dir, TX_LOGS_CACHE)?;
        client.get_logs_cached(&filter, &cache).await?
    } else {
        client.get_logs(&filter).await?
    };

    tracing::info!(address, count = logs.len(), "Fetched logs");
    println!("{}", serde_json::to_string_pretty(&logs)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENTO: &str = "0xF5BCE5077908a1b7370B9ae04AdC565EBd643966";
    const MASTER: &str = "0x2cBA6Ab6574646Badc84F0544d05059e57a5dc42";

    #[test]
    fn test_build_filter() {
        let filter = build_filter(
            BENTO,
            Some(scan_client::events::LOG_DEPLOY.to_string()),
            Some(MASTER.to_string()),
            Some(("0xabc".to_string(), 42)),
        )
        .unwrap();

        assert_eq!(filter.address, Some(Address::new(BENTO)));
        assert_eq!(filter.topic1, Some(Address::new(MASTER).to_topic()));
        assert_eq!(filter.tx.map(|tx| tx.block_number), Some(42));
    }

    #[test]
    fn test_build_filter_validates_addresses() {
        assert!(build_filter("0x1234", None, None, None).is_err());
        assert!(build_filter(BENTO, None, Some("nope".to_string()), None).is_err());
    }
}
