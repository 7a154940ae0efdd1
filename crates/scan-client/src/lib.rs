//! scan-client: Etherscan-style block explorer API client
//!
//! Every call goes through a shared sliding-window throttle and is retried
//! while the explorer reports its rate limit or the transport fails.
//! Results that can never change are kept in a [`PermanentCache`].

pub mod cache;
pub mod queries;
pub mod throttle;

use std::sync::Arc;
use std::time::Duration;

use kashi_core::{Address, AppConfig, BlockNumber, NetworkConfig, ScanError, ThrottleConfig};
use serde::Deserialize;

pub use cache::PermanentCache;
pub use queries::{
    borrowers_from_logs, decode_deployment, events, Log, LogData, LogFilter, PairDeployment,
    Transaction, TxRef,
};
pub use throttle::Throttle;

/// Per-request timeout; a hung request is retried like a failed one
const SCAN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const NO_RECORDS: [&str; 2] = ["No records found", "No transactions found"];
const RATE_LIMITED: &str = "Max rate limit reached";

/// Result type for scan API operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// What to do with a response
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Records(serde_json::Value),
    RateLimited,
    Failed(String),
}

impl ScanResponse {
    pub fn classify(self) -> Outcome {
        if self.status == "1" || (self.status == "0" && NO_RECORDS.contains(&self.message.as_str())) {
            return Outcome::Records(self.result);
        }
        if self.result.as_str() == Some(RATE_LIMITED) {
            return Outcome::RateLimited;
        }
        let detail = match &self.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Outcome::Failed(format!("{} {}", self.message, detail).trim().to_string())
    }
}

/// Throttled client for one explorer
#[derive(Clone)]
pub struct ScanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    throttle: Arc<Throttle>,
    max_attempts: u32,
}

impl ScanClient {
    /// Client for the explorer of the configured network
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_options(
            &config.network.scan_api_url,
            &config.scan_api_key,
            config.network.scan_throttle,
            config.max_scan_attempts,
        )
    }

    pub fn with_options(
        base_url: &str,
        api_key: &str,
        throttle: ThrottleConfig,
        max_attempts: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("kashi-monitor")
            .timeout(SCAN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScanError::Unreachable {
                url: format!("{base_url}: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            throttle: Arc::new(Throttle::new(throttle)),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Event logs matching `filter`
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let value = self.fetch(&filter.query_params()).await?;
        let logs: Vec<Log> = records(value)?;
        let total = logs.len();
        let logs: Vec<Log> = logs.into_iter().filter(|log| filter.matches(log)).collect();
        tracing::debug!(fetched = total, kept = logs.len(), "Fetched logs");
        Ok(logs)
    }

    /// Logs of one mined transaction, served from `cache` when seen before
    pub async fn get_logs_cached(
        &self,
        filter: &LogFilter,
        cache: &PermanentCache<Vec<Log>>,
    ) -> kashi_core::Result<Vec<Log>> {
        match filter.cache_key() {
            Some(key) => {
                cache
                    .get_or_try_insert_with(&key, || async {
                        Ok::<_, kashi_core::Error>(self.get_logs(filter).await?)
                    })
                    .await
            }
            // Unpinned queries can gain logs with every block
            None => Ok(self.get_logs(filter).await?),
        }
    }

    /// Successful transactions sent to or from `address`, oldest first
    pub async fn get_address_transactions(
        &self,
        address: &Address,
        start_block: BlockNumber,
    ) -> Result<Vec<Transaction>> {
        let params = [
            ("module", "account".to_string()),
            ("action", "txlist".to_string()),
            ("address", address.to_string()),
            ("startblock", start_block.to_string()),
            ("endblock", "latest".to_string()),
            ("sort", "asc".to_string()),
        ];
        let txs: Vec<Transaction> = records(self.fetch(&params).await?)?;
        Ok(txs.into_iter().filter(Transaction::succeeded).collect())
    }

    /// Pair clones of the Kashi master contract deployed through BentoBox
    pub async fn get_deployed_pairs(&self, network: &NetworkConfig) -> Result<Vec<PairDeployment>> {
        let filter = LogFilter::new(Address::new(network.bento_box_v1_address.as_str()))
            .event(events::LOG_DEPLOY)
            .address1(&Address::new(network.kashi_pair_master_address.as_str()));
        let logs = self.get_logs(&filter).await?;

        Ok(logs
            .iter()
            .filter_map(|log| {
                let deployment = decode_deployment(log);
                if deployment.is_none() {
                    tracing::warn!(tx = %log.transaction_hash, "Undecodable LogDeploy");
                }
                deployment
            })
            .collect())
    }

    /// Everyone who ever borrowed from `pair`
    pub async fn get_borrowers(&self, pair: &Address) -> Result<Vec<Address>> {
        let filter = LogFilter::new(pair.clone()).event(events::LOG_BORROW);
        let logs = self.get_logs(&filter).await?;
        Ok(borrowers_from_logs(&logs))
    }

    /// One API call with throttling and bounded retries
    async fn fetch(&self, params: &[(&'static str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}/api", self.base_url);
        let module = params.iter().find(|(k, _)| *k == "module").map(|(_, v)| v.as_str());
        let action = params.iter().find(|(k, _)| *k == "action").map(|(_, v)| v.as_str());
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            self.throttle.acquire().await;

            let response = self
                .http
                .get(&url)
                .query(params)
                .query(&[("apikey", self.api_key.as_str())])
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(url = %url, attempt, error = %e, "Scan API request failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            let envelope: ScanResponse = response
                .json()
                .await
                .map_err(|e| ScanError::ParseError(e.to_string()))?;

            match envelope.classify() {
                Outcome::Records(value) => return Ok(value),
                Outcome::RateLimited => {
                    tracing::debug!(attempt, "Scan API rate limit reached, retrying");
                    last_error = RATE_LIMITED.to_string();
                }
                Outcome::Failed(message) => {
                    tracing::error!(url = %url, ?module, ?action, message = %message, "Scan API error");
                    return Err(ScanError::ApiError { message });
                }
            }
        }

        Err(ScanError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

/// Deserialize a record list; a `null` result counts as empty
fn records<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<Vec<T>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| ScanError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn envelope(value: serde_json::Value) -> ScanResponse {
        serde_json::from_value(value).unwrap()
    }

    /// Serve one canned JSON body per connection, recording request lines
    async fn serve(bodies: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 16 * 1024];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                seen.lock().unwrap().push(request.lines().next().unwrap_or_default().to_string());

                let reply = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (url, requests)
    }

    fn client(url: &str, attempts: u32) -> ScanClient {
        ScanClient::with_options(url, "KEY", ThrottleConfig::new(100, 1_000), attempts).unwrap()
    }

    fn log_json(tx: &str, topics: &[&str]) -> serde_json::Value {
        json!({
            "address": "0xpair",
            "topics": topics,
            "data": "0x",
            "blockNumber": "0x10",
            "transactionHash": tx,
        })
    }

    #[test]
    fn test_classify() {
        let ok = envelope(json!({"status": "1", "message": "OK", "result": [1]}));
        assert_eq!(ok.classify(), Outcome::Records(json!([1])));

        let empty = envelope(json!({"status": "0", "message": "No records found", "result": []}));
        assert_eq!(empty.classify(), Outcome::Records(json!([])));

        let no_txs = envelope(json!({"status": "0", "message": "No transactions found", "result": []}));
        assert_eq!(no_txs.classify(), Outcome::Records(json!([])));

        let limited = envelope(json!({"status": "0", "message": "NOTOK", "result": "Max rate limit reached"}));
        assert_eq!(limited.classify(), Outcome::RateLimited);

        let failed = envelope(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}));
        assert_eq!(failed.classify(), Outcome::Failed("NOTOK Invalid API Key".to_string()));
    }

    #[tokio::test]
    async fn test_get_logs_retries_rate_limit_and_filters() {
        let limited = json!({"status": "0", "message": "NOTOK", "result": RATE_LIMITED}).to_string();
        let logs = json!({
            "status": "1",
            "message": "OK",
            "result": [log_json("0xaaa", &[events::LOG_BORROW]), log_json("0xbbb", &[events::LOG_BORROW])],
        })
        .to_string();
        let (url, requests) = serve(vec![limited, logs]).await;

        let filter = LogFilter::new(Address::new("0xpair"))
            .event(events::LOG_BORROW)
            .in_tx(TxRef {
                block_number: 16,
                hash: "0xbbb".to_string(),
            });
        let result = client(&url, 3).get_logs(&filter).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].transaction_hash, "0xbbb");

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("GET /api?module=logs&action=getLogs&fromBlock=16&toBlock=16"));
        assert!(requests[1].contains("apikey=KEY"));
    }

    #[tokio::test]
    async fn test_api_error_is_not_retried() {
        let failed = json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}).to_string();
        let (url, requests) = serve(vec![failed]).await;

        let err = client(&url, 5)
            .get_borrowers(&Address::new("0xpair"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ApiError { .. }));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_attempts() {
        // Nothing listens on a port we just released
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&url, 2)
            .get_address_transactions(&Address::new("0xabc"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::RetriesExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_transactions_drop_failed() {
        let body = json!({
            "status": "1",
            "message": "OK",
            "result": [
                {"hash": "0x1", "from": "0xa", "to": "0xb", "isError": "0"},
                {"hash": "0x2", "from": "0xa", "to": "0xb", "isError": "1"},
                {"hash": "0x3", "from": "0xa", "to": "0xb"},
            ],
        })
        .to_string();
        let (url, requests) = serve(vec![body]).await;

        let txs = client(&url, 1)
            .get_address_transactions(&Address::new("0xabc"), 100)
            .await
            .unwrap();
        let hashes: Vec<&str> = txs.iter().map(|tx| tx.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x3"]);

        let requests = requests.lock().unwrap();
        assert!(requests[0].contains("action=txlist"));
        assert!(requests[0].contains("startblock=100&endblock=latest&sort=asc"));
    }

    #[tokio::test]
    async fn test_no_records_is_empty() {
        let body = json!({"status": "0", "message": "No records found", "result": []}).to_string();
        let (url, _) = serve(vec![body]).await;
        let borrowers = client(&url, 1).get_borrowers(&Address::new("0xpair")).await.unwrap();
        assert!(borrowers.is_empty());
    }

    #[tokio::test]
    async fn test_pinned_logs_are_cached() {
        let body = json!({
            "status": "1",
            "message": "OK",
            "result": [log_json("0xaaa", &[events::LOG_BORROW])],
        })
        .to_string();
        // Only one response: a second request would hang the test
        let (url, requests) = serve(vec![body]).await;
        let dir = tempfile::tempdir().unwrap();
        let cache = PermanentCache::open(dir.path(), "txLogs").unwrap();

        let filter = LogFilter::new(Address::new("0xpair")).in_tx(TxRef {
            block_number: 16,
            hash: "0xaaa".to_string(),
        });
        let scan = client(&url, 1);
        let first = scan.get_logs_cached(&filter, &cache).await.unwrap();
        let second = scan.get_logs_cached(&filter, &cache).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(requests.lock().unwrap().len(), 1);
    }
}
