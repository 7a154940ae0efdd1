//! Borrower Coverage Report
//!
//! Ranks borrowers of Kashi pairs by how much of their collateral their debt
//! consumes. Coverage is debt valued in collateral / collateral * 100, so
//! 100% is the point where the position is worth nothing to its owner.

use std::fmt;

use kashi_core::{ProtocolError, Timestamp};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::calculator::{accrued_total_borrow_at, big_to_f64};
use crate::constants::{report::AMOUNT_PRECISION, scale};
use crate::state::{decimal, AccrueInfo, Rebase};

/// ERC-20 metadata needed for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

/// One borrower's raw position in a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerPosition {
    pub address: String,
    /// `userBorrowPart`, in borrow base units
    #[serde(with = "decimal")]
    pub borrow_part: BigUint,
    /// `userCollateralShare`, in collateral vault shares
    #[serde(with = "decimal")]
    pub collateral_share: BigUint,
}

/// Pair state needed to value its borrowers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub address: String,
    pub collateral: TokenInfo,
    pub asset: TokenInfo,
    #[serde(default)]
    pub oracle: String,
    pub total_borrow: Rebase,
    /// When present, `total_borrow` is accrued to the snapshot time
    #[serde(default)]
    pub accrue_info: Option<AccrueInfo>,
    /// Collateral per asset, scaled by 1e18
    #[serde(with = "decimal")]
    pub exchange_rate: BigUint,
    /// Vault totals of the collateral token
    pub collateral_vault: Rebase,
    #[serde(default)]
    pub borrowers: Vec<BorrowerPosition>,
}

/// Input of the borrowers report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BorrowersSnapshot {
    /// Unix time the state was read at
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub pairs: Vec<PairSnapshot>,
}

/// Coverage and debt of one position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coverage {
    /// Percent of collateral consumed by debt
    pub coverage: f64,
    /// Debt in asset base units
    pub borrow_amount: f64,
}

/// A report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerInfo {
    pub address: String,
    pub pair: String,
    pub collateral_symbol: String,
    pub asset_symbol: String,
    pub asset_decimals: u8,
    pub coverage: f64,
    pub borrow_amount: f64,
}

impl BorrowerInfo {
    /// Debt in whole asset tokens, rounded to a few significant digits
    pub fn display_amount(&self) -> f64 {
        let unit = 10f64.powi(i32::from(self.asset_decimals));
        number_precision(self.borrow_amount / unit, AMOUNT_PRECISION)
    }
}

impl fmt::Display for BorrowerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={} {} -> {}, coverage={}%, borrowAmount={}{}",
            self.address,
            self.collateral_symbol,
            self.asset_symbol,
            self.coverage.round(),
            self.display_amount(),
            self.asset_symbol
        )
    }
}

/// Value one position against its collateral
pub fn borrower_coverage(
    position: &BorrowerPosition,
    total_borrow: &Rebase,
    exchange_rate: &BigUint,
    collateral_vault: &Rebase,
) -> Result<Coverage, ProtocolError> {
    collateral_vault.validate("collateral vault")?;

    let collateral_used = &position.collateral_share * BigUint::from(scale::E18);
    let collateral_amount = big_to_f64(&collateral_vault.to_elastic(&collateral_used))?;

    let (cost_in_collateral, borrow_amount) = if total_borrow.base.is_zero() {
        (0.0, 0.0)
    } else {
        let debt = &position.borrow_part * &total_borrow.elastic;
        (
            big_to_f64(&(&debt * exchange_rate / &total_borrow.base))?,
            big_to_f64(&(debt / &total_borrow.base))?,
        )
    };

    let coverage = if collateral_amount == 0.0 {
        if cost_in_collateral > 0.0 {
            f64::MAX
        } else {
            0.0
        }
    } else {
        cost_in_collateral / collateral_amount * 100.0
    };

    Ok(Coverage {
        coverage,
        borrow_amount,
    })
}

/// Report rows for every borrower of one pair
pub fn pair_borrowers(
    pair: &PairSnapshot,
    now: Option<Timestamp>,
) -> Result<Vec<BorrowerInfo>, ProtocolError> {
    let total_borrow = match (&pair.accrue_info, now) {
        (Some(info), Some(now)) => accrued_total_borrow_at(&pair.total_borrow, info, now),
        _ => pair.total_borrow.clone(),
    };

    tracing::debug!(
        pair = %pair.address,
        collateral = %pair.collateral.symbol,
        asset = %pair.asset.symbol,
        borrowers = pair.borrowers.len(),
        "Checking pair"
    );

    pair.borrowers
        .iter()
        .map(|position| {
            let Coverage {
                coverage,
                borrow_amount,
            } = borrower_coverage(
                position,
                &total_borrow,
                &pair.exchange_rate,
                &pair.collateral_vault,
            )?;
            Ok(BorrowerInfo {
                address: position.address.clone(),
                pair: pair.address.clone(),
                collateral_symbol: pair.collateral.symbol.clone(),
                asset_symbol: pair.asset.symbol.clone(),
                asset_decimals: pair.asset.decimals,
                coverage,
                borrow_amount,
            })
        })
        .collect()
}

/// Keep borrowers at or above `min_coverage`, most at risk first
pub fn rank_borrowers(infos: Vec<BorrowerInfo>, min_coverage: f64) -> Vec<BorrowerInfo> {
    let mut ranked: Vec<BorrowerInfo> = infos
        .into_iter()
        .filter(|info| info.coverage >= min_coverage)
        .collect();
    ranked.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
    ranked
}

/// Full report over a snapshot
///
/// A pair whose state cannot be valued is skipped with a warning so one bad
/// pair does not hide the rest.
pub fn borrowers_report(snapshot: &BorrowersSnapshot, min_coverage: f64) -> Vec<BorrowerInfo> {
    let mut infos = Vec::new();
    for pair in &snapshot.pairs {
        match pair_borrowers(pair, snapshot.timestamp) {
            Ok(rows) => infos.extend(rows),
            Err(e) => tracing::warn!(pair = %pair.address, error = %e, "Skipping pair"),
        }
    }
    rank_borrowers(infos, min_coverage)
}

/// Round to `precision` significant digits
///
/// Numbers with at least `precision` integer digits are rounded to an
/// integer instead.
pub fn number_precision(n: f64, precision: u32) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let digits = n.log10().ceil() as i32;
    let precision = precision as i32;
    if digits >= precision {
        return n.round();
    }
    let shift = 10f64.powi(precision - digits);
    (n * shift).round() / shift
}
