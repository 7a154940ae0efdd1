//! Core type definitions for the Kashi monitor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ProtocolError;

/// EVM account or contract address (20 bytes, `0x`-prefixed hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Parse and validate a `0x`-prefixed 20-byte hex address
    pub fn parse(addr: &str) -> Result<Self, ProtocolError> {
        let digits = addr
            .strip_prefix("0x")
            .or_else(|| addr.strip_prefix("0X"))
            .ok_or_else(|| ProtocolError::InvalidInput {
                message: format!("address {addr} is missing the 0x prefix"),
            })?;
        let bytes = hex::decode(digits).map_err(|e| ProtocolError::InvalidInput {
            message: format!("address {addr} is not hex: {e}"),
        })?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(ProtocolError::InvalidInput {
                message: format!("address {addr} has {} bytes, expected 20", bytes.len()),
            });
        }
        Ok(Self(addr.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Left-pad to a 32-byte indexed event topic
    pub fn to_topic(&self) -> String {
        let digits = self.0.get(2..).unwrap_or_default();
        format!("0x{}{}", "0".repeat(TOPIC_HEX_LEN.saturating_sub(digits.len())), digits)
    }

    /// Recover the address stored in an indexed event topic
    pub fn from_topic(topic: &str) -> Option<Self> {
        topic.get(TOPIC_ADDRESS_OFFSET..).map(|a| Self(format!("0x{a}")))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const ADDRESS_BYTES: usize = 20;
const TOPIC_HEX_LEN: usize = 64;
/// `0x` plus 24 hex digits of zero padding
const TOPIC_ADDRESS_OFFSET: usize = 26;

/// Supported deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Kovan,
    Polygon,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Ethereum, Network::Kovan, Network::Polygon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Kovan => "kovan",
            Self::Polygon => "polygon",
        }
    }

    /// Short name used on the command line
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Ethereum => "ether",
            Self::Kovan => "kovan",
            Self::Polygon => "polygon",
        }
    }
}

impl FromStr for Network {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ether" | "ethereum" => Ok(Self::Ethereum),
            "kovan" => Ok(Self::Kovan),
            "polygon" => Ok(Self::Polygon),
            _ => Err(ProtocolError::NetworkNotSupported {
                network: format!("{s} (variants are: ether, polygon, kovan)"),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block number
pub type BlockNumber = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "0x2cBA6Ab6574646Badc84F0544d05059e57a5dc42";

    #[test]
    fn test_address_parse() {
        assert!(Address::parse(MASTER).is_ok());
        assert!(Address::parse("2cBA6Ab6574646Badc84F0544d05059e57a5dc42").is_err());
        assert!(Address::parse("0x2cBA6A").is_err());
        assert!(Address::parse("0xzzBA6Ab6574646Badc84F0544d05059e57a5dc42").is_err());
    }

    #[test]
    fn test_address_topic_roundtrip() {
        let addr = Address::new(MASTER);
        let topic = addr.to_topic();
        assert_eq!(topic.len(), 66);
        assert!(topic.starts_with("0x000000000000000000000000"));
        assert_eq!(Address::from_topic(&topic), Some(addr));
    }

    #[test]
    fn test_network_names() {
        assert_eq!("ether".parse::<Network>().unwrap(), Network::Ethereum);
        assert_eq!("Polygon".parse::<Network>().unwrap(), Network::Polygon);
        assert_eq!(Network::Kovan.as_str(), "kovan");
        assert_eq!(Network::Ethereum.cli_name(), "ether");

        let err = "bsc".parse::<Network>().unwrap_err();
        assert_eq!(err.error_code(), "network_not_supported");
    }
}
