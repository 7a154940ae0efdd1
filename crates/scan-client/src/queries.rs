//! Log and transaction queries against the scan API
//!
//! Filters render to the explorer's query parameters; what the explorer
//! cannot filter (transaction hash, data payload) is applied to the results.

use kashi_core::{Address, BlockNumber};
use serde::{Deserialize, Serialize};

/// keccak256 of the Kashi/BentoBox event signatures we query
pub mod events {
    /// `LogDeploy(address,bytes,address)` emitted by BentoBox for every pair clone
    pub const LOG_DEPLOY: &str =
        "0xd62166f3c2149208e51788b1401cc356bf5da1fc6c7886a32e18570f57d88b3b";

    /// `LogBorrow(address,address,uint256,uint256,uint256)` emitted by a pair
    pub const LOG_BORROW: &str =
        "0x3a5151e57d3bc9798e7853034ac52293d1a0e12a2b44725e75b03b21f86477a6";
}

/// An event log as returned by `module=logs&action=getLogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(default)]
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(default)]
    pub block_number: String,
    pub transaction_hash: String,
}

/// A normal transaction as returned by `module=account&action=txlist`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub block_number: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub is_error: Option<String>,
}

impl Transaction {
    /// Explorers omit `isError` for some chains; only an explicit non-zero
    /// flag marks a failure
    pub fn succeeded(&self) -> bool {
        self.is_error.as_deref().map_or(true, |flag| flag == "0")
    }
}

/// Transaction a log query is pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRef {
    pub block_number: BlockNumber,
    pub hash: String,
}

/// Expected log payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogData {
    Hex(String),
    /// A single uint256 word
    Number(u64),
}

impl LogData {
    pub fn to_hex(&self) -> String {
        match self {
            Self::Hex(hex) => hex.clone(),
            Self::Number(n) => format!("0x{n:064x}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub tx: Option<TxRef>,
    pub address: Option<Address>,
    pub topic0: Option<String>,
    pub topic1: Option<String>,
    pub topic2: Option<String>,
    pub data: Option<LogData>,
}

impl LogFilter {
    /// Logs emitted by `address`
    pub fn new(address: Address) -> Self {
        Self {
            address: Some(address),
            ..Self::default()
        }
    }

    /// Only logs of the event with this signature hash
    pub fn event(mut self, topic0: impl Into<String>) -> Self {
        self.topic0 = Some(topic0.into());
        self
    }

    /// First indexed parameter is `address`
    pub fn address1(mut self, address: &Address) -> Self {
        self.topic1 = Some(address.to_topic());
        self
    }

    /// Second indexed parameter is `address`
    pub fn address2(mut self, address: &Address) -> Self {
        self.topic2 = Some(address.to_topic());
        self
    }

    /// Only logs of one transaction
    pub fn in_tx(mut self, tx: TxRef) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn with_data(mut self, data: LogData) -> Self {
        self.data = Some(data);
        self
    }

    /// Query string parameters, excluding the API key
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("module", "logs".to_string()), ("action", "getLogs".to_string())];
        if let Some(tx) = &self.tx {
            params.push(("fromBlock", tx.block_number.to_string()));
            params.push(("toBlock", tx.block_number.to_string()));
        }
        if let Some(address) = &self.address {
            params.push(("address", address.to_string()));
        }
        for (name, topic) in [("topic0", &self.topic0), ("topic1", &self.topic1), ("topic2", &self.topic2)] {
            if let Some(topic) = topic {
                params.push((name, topic.clone()));
            }
        }
        params
    }

    /// Conditions the explorer cannot evaluate
    pub fn matches(&self, log: &Log) -> bool {
        if let Some(tx) = &self.tx {
            if !log.transaction_hash.eq_ignore_ascii_case(&tx.hash) {
                return false;
            }
        }
        match &self.data {
            Some(data) => log.data.eq_ignore_ascii_case(&data.to_hex()),
            None => true,
        }
    }

    /// Stable identifier for caching the result of a pinned query
    pub fn cache_key(&self) -> Option<String> {
        let tx = self.tx.as_ref()?;
        let mut key = format!("{}@{}", tx.hash, tx.block_number);
        for part in [
            self.address.as_ref().map(|a| a.as_str().to_string()),
            self.topic0.clone(),
            self.topic1.clone(),
            self.topic2.clone(),
            self.data.as_ref().map(LogData::to_hex),
        ] {
            key.push(':');
            key.push_str(part.as_deref().unwrap_or("-"));
        }
        Some(key.to_lowercase())
    }
}

/// Borrower addresses from `LogBorrow` logs, first occurrence order
pub fn borrowers_from_logs(logs: &[Log]) -> Vec<Address> {
    let mut borrowers: Vec<Address> = Vec::new();
    for log in logs {
        let Some(borrower) = log.topics.get(1).and_then(|t| Address::from_topic(t)) else {
            tracing::warn!(tx = %log.transaction_hash, "LogBorrow without borrower topic");
            continue;
        };
        if !borrowers.contains(&borrower) {
            borrowers.push(borrower);
        }
    }
    borrowers
}

/// A Kashi pair clone deployed through BentoBox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairDeployment {
    pub pair: Address,
    pub collateral: Address,
    pub asset: Address,
    pub oracle: Address,
}

const WORD: usize = 32;

/// Decode a `LogDeploy` log
///
/// topics: `[signature, masterContract, cloneAddress]`; data is the ABI
/// encoding of `bytes`, whose payload starts with
/// `(collateral, asset, oracle, ...)`.
pub fn decode_deployment(log: &Log) -> Option<PairDeployment> {
    let pair = Address::from_topic(log.topics.get(2)?)?;
    let bytes = hex::decode(log.data.strip_prefix("0x")?).ok()?;

    let offset_word: [u8; 8] = bytes.get(WORD - 8..WORD)?.try_into().ok()?;
    let offset = usize::try_from(u64::from_be_bytes(offset_word)).ok()?;
    // Skip the length word in front of the payload
    let payload = bytes.get(offset.checked_add(WORD)?..)?;
    let address_at = |i: usize| {
        payload
            .get(i * WORD + 12..(i + 1) * WORD)
            .map(|b| Address::new(format!("0x{}", hex::encode(b))))
    };

    Some(PairDeployment {
        pair,
        collateral: address_at(0)?,
        asset: address_at(1)?,
        oracle: address_at(2)?,
    })
}
