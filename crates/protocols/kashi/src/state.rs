//! Kashi State Types
//!
//! Data structures for vault totals, pair state and allocation results.

use std::collections::HashMap;

use kashi_core::{ProtocolError, Timestamp};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Share <-> amount conversion rate at one point in time
///
/// `elastic` is the real asset amount, `base` the number of shares
/// representing it. Both zero means nothing was deposited yet and
/// conversions pass values through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rebase {
    #[serde(with = "decimal")]
    pub elastic: BigUint,
    #[serde(with = "decimal")]
    pub base: BigUint,
}

impl Rebase {
    pub fn new(elastic: impl Into<BigUint>, base: impl Into<BigUint>) -> Self {
        Self {
            elastic: elastic.into(),
            base: base.into(),
        }
    }

    /// Empty vault (no deposits yet)
    pub fn is_empty(&self) -> bool {
        self.elastic.is_zero() && self.base.is_zero()
    }

    /// Reject half-empty totals, which would make one conversion direction
    /// divide by zero
    pub fn validate(&self, context: &str) -> Result<(), ProtocolError> {
        if self.elastic.is_zero() != self.base.is_zero() {
            return Err(ProtocolError::InvalidRebase {
                context: context.to_string(),
                elastic: self.elastic.to_string(),
                base: self.base.to_string(),
            });
        }
        Ok(())
    }

    /// Convert an elastic amount into base units (amount -> shares)
    pub fn to_base(&self, elastic: &BigUint) -> BigUint {
        if self.elastic.is_zero() {
            return elastic.clone();
        }
        elastic * &self.base / &self.elastic
    }

    /// Convert base units into an elastic amount (shares -> amount)
    pub fn to_elastic(&self, base: &BigUint) -> BigUint {
        if self.base.is_zero() {
            return base.clone();
        }
        base * &self.elastic / &self.base
    }
}

/// On-chain state of one lending pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KashiPair {
    pub address: String,
    /// Lent assets; `elastic` is measured in vault shares
    pub total_asset: Rebase,
    /// Outstanding loans; `elastic` is the borrowed amount
    pub total_borrow: Rebase,
    #[serde(default)]
    pub interest_per_second: u64,
}

/// Pair state normalized to plain asset amounts
#[derive(Debug, Clone, PartialEq)]
pub struct PairAmounts {
    pub address: String,
    /// Idle liquidity plus outstanding loans
    pub lended: f64,
    pub borrowed: f64,
    pub interest_per_second: f64,
}

impl PairAmounts {
    /// Borrowed / lent, 0 for a pair with nothing lent
    pub fn utilization(&self) -> f64 {
        if self.lended == 0.0 {
            0.0
        } else {
            self.borrowed / self.lended
        }
    }
}

/// Pair address -> vault shares to deposit. Only positive entries are present.
pub type Distribution = HashMap<String, BigUint>;

/// Interest accrual bookkeeping of a pair (`accrueInfo()`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrueInfo {
    /// Per-second rate scaled by 1e18
    pub interest_per_second: u64,
    pub last_accrued: Timestamp,
    #[serde(with = "decimal", default)]
    pub fees_earned_fraction: BigUint,
}

impl AccrueInfo {
    /// Seconds since the last on-chain accrual; 0 if `now` is behind it
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_accrued)
    }
}

/// Serde adapter writing big integers as decimal strings.
/// Plain JSON integers are accepted on input.
pub mod decimal {
    use std::fmt;

    use num_bigint::BigUint;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = BigUint;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
            Ok(BigUint::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
            u64::try_from(v)
                .map(BigUint::from)
                .map_err(|_| E::custom(format!("negative value {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
            v.trim()
                .parse::<BigUint>()
                .map_err(|e| E::custom(format!("invalid integer {v:?}: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_conversions() {
        // 2 shares per unit of asset
        let total = Rebase::new(1_000u64, 2_000u64);
        assert_eq!(total.to_elastic(&BigUint::from(500u64)), BigUint::from(250u64));
        assert_eq!(total.to_base(&BigUint::from(250u64)), BigUint::from(500u64));
    }

    #[test]
    fn test_rebase_conversions_round_down() {
        let total = Rebase::new(2u64, 3u64);
        // 10 * 2 / 3 = 6.66 -> 6
        assert_eq!(total.to_elastic(&BigUint::from(10u64)), BigUint::from(6u64));
    }

    #[test]
    fn test_empty_rebase_is_identity() {
        let total = Rebase::default();
        assert!(total.is_empty());
        assert!(total.validate("vault").is_ok());
        let value = BigUint::from(12_345u64);
        assert_eq!(total.to_elastic(&value), value);
        assert_eq!(total.to_base(&value), value);
    }

    #[test]
    fn test_half_empty_rebase_rejected() {
        let err = Rebase::new(0u64, 5u64).validate("vault").unwrap_err();
        assert_eq!(err.error_code(), "invalid_rebase");
        assert!(Rebase::new(5u64, 0u64).validate("pair").is_err());
    }

    #[test]
    fn test_utilization() {
        let pair = PairAmounts {
            address: "pair".to_string(),
            lended: 200.0,
            borrowed: 50.0,
            interest_per_second: 0.0,
        };
        assert_eq!(pair.utilization(), 0.25);

        let empty = PairAmounts {
            lended: 0.0,
            borrowed: 0.0,
            ..pair
        };
        assert_eq!(empty.utilization(), 0.0);
    }

    #[test]
    fn test_accrue_info_elapsed() {
        let info = AccrueInfo {
            interest_per_second: 10,
            last_accrued: 1_000,
            fees_earned_fraction: BigUint::zero(),
        };
        assert_eq!(info.elapsed_since(1_600), 600);
        assert_eq!(info.elapsed_since(900), 0);
    }

    #[test]
    fn test_pair_json_uses_decimal_strings() {
        let pair = KashiPair {
            address: "0xpair".to_string(),
            total_asset: Rebase::new(2_050_874u64, 2_100_643u64),
            total_borrow: Rebase::new(560_000u64, 500_432u64),
            interest_per_second: 10,
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["total_asset"]["elastic"], "2050874");

        let parsed: KashiPair = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, pair);
    }

    #[test]
    fn test_rebase_accepts_plain_numbers_and_huge_strings() {
        let json = r#"{"elastic": 1050874, "base": "340282366920938463463374607431768211455"}"#;
        let total: Rebase = serde_json::from_str(json).unwrap();
        assert_eq!(total.elastic, BigUint::from(1_050_874u64));
        assert_eq!(total.base, BigUint::from(u128::MAX));

        assert!(serde_json::from_str::<Rebase>(r#"{"elastic": -1, "base": 1}"#).is_err());
    }
}
