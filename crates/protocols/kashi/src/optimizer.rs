//! Deposit Allocation
//!
//! Splits a deposit of the vault asset across Kashi pairs. The most utilized
//! pairs are topped up first until the touched group shares one utilization,
//! bounded by how many pairs the per-pair deposit cost justifies.
//!
//! Ranking and the greedy steps run on f64 amounts; the final bookkeeping is
//! done in vault shares with big integers so the result sums to the deposit
//! exactly.

use std::collections::HashSet;

use kashi_core::ProtocolError;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::calculator::{amount_to_shares, big_to_f64, float_to_big_uint, pair_to_amounts, shares_to_amount};
use crate::constants::optimizer::*;
use crate::state::{decimal, Distribution, KashiPair, PairAmounts, Rebase};

/// Inputs of one allocation, as read from a state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Deposit in vault shares
    #[serde(with = "decimal")]
    pub deposit_shares: BigUint,
    /// Vault totals of the deposited asset
    pub vault: Rebase,
    pub pairs: Vec<KashiPair>,
    /// Overhead of touching one more pair, in asset units
    pub pair_deposit_cost: f64,
}

impl AllocationRequest {
    pub fn allocate(&self) -> Result<Distribution, ProtocolError> {
        add_liquidity(&self.deposit_shares, &self.pairs, &self.vault, self.pair_deposit_cost)
    }
}

/// Split `deposit_shares` across `pairs`
///
/// Returns pair address -> shares. Values are strictly positive and sum to
/// `deposit_shares` exactly; pairs receiving nothing are absent.
pub fn add_liquidity(
    deposit_shares: &BigUint,
    pairs: &[KashiPair],
    vault: &Rebase,
    pair_deposit_cost: f64,
) -> Result<Distribution, ProtocolError> {
    if !pair_deposit_cost.is_finite() || pair_deposit_cost <= 0.0 {
        return Err(ProtocolError::InvalidInput {
            message: format!("pair deposit cost must be positive, got {pair_deposit_cost}"),
        });
    }
    vault.validate("vault")?;
    check_unique_addresses(pairs)?;

    if pairs.is_empty() || deposit_shares.is_zero() {
        return Ok(Distribution::new());
    }

    let amounts = pairs
        .iter()
        .map(|pair| pair_to_amounts(pair, vault))
        .collect::<Result<Vec<_>, _>>()?;
    let deposit_amount = shares_to_amount(deposit_shares, vault)?;

    let allocation = distribute_amount(deposit_amount, &amounts, pair_deposit_cost)?;
    if allocation.is_empty() {
        // Deposit worth less than one asset unit: nothing to equalize
        let top = rank_pairs(&amounts)[0].index;
        tracing::debug!(pair = %amounts[top].address, "Dust deposit goes to the most utilized pair");
        return Ok(Distribution::from([(amounts[top].address.clone(), deposit_shares.clone())]));
    }

    let distribution = to_distribution(&allocation, &amounts, vault, deposit_shares)?;
    tracing::debug!(
        deposit = %deposit_shares,
        pairs = pairs.len(),
        touched = distribution.len(),
        "Allocated deposit"
    );
    Ok(distribution)
}

/// Number of pairs the deposit can afford to touch
///
/// `round(amount * MAX_GAS_SHARE / cost)`, clamped to `1..=pair_count`.
pub fn max_pairs(deposit_amount: f64, pair_deposit_cost: f64, pair_count: usize) -> usize {
    let affordable = (deposit_amount * MAX_GAS_SHARE / pair_deposit_cost).round();
    // Saturating cast; NaN becomes 0 and is clamped up
    (affordable as usize).clamp(1, pair_count.max(1))
}

fn check_unique_addresses(pairs: &[KashiPair]) -> Result<(), ProtocolError> {
    let mut seen = HashSet::with_capacity(pairs.len());
    for pair in pairs {
        if !seen.insert(pair.address.as_str()) {
            return Err(ProtocolError::InvalidInput {
                message: format!("pair {} listed twice", pair.address),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct RankedPair {
    /// Position in the input slice
    index: usize,
    utilization: f64,
}

/// Amount assigned to one input pair
#[derive(Debug, Clone, Copy, PartialEq)]
struct Allocation {
    index: usize,
    amount: f64,
}

/// Sort by descending utilization; ties keep input order
fn rank_pairs(pairs: &[PairAmounts]) -> Vec<RankedPair> {
    let mut ranked: Vec<RankedPair> = pairs
        .iter()
        .enumerate()
        .map(|(index, pair)| RankedPair {
            index,
            utilization: pair.utilization(),
        })
        .collect();
    ranked.sort_by(|a, b| b.utilization.total_cmp(&a.utilization));
    ranked
}

/// Split a plain amount across pairs, in ranking order
fn distribute_amount(
    amount: f64,
    pairs: &[PairAmounts],
    pair_deposit_cost: f64,
) -> Result<Vec<Allocation>, ProtocolError> {
    if pairs.is_empty() || amount <= 0.0 {
        return Ok(Vec::new());
    }
    if pairs.len() == 1 {
        return Ok(vec![Allocation { index: 0, amount }]);
    }

    let limit = max_pairs(amount, pair_deposit_cost, pairs.len());
    let ranked = rank_pairs(pairs);
    let mut utilizations: Vec<f64> = ranked.iter().map(|r| r.utilization).collect();
    utilizations.push(MIN_SIGNIFICANT_UTILIZATION);

    let mut outcome = equalize(pairs, &ranked, &utilizations, amount, limit)?;
    check_conservation(&outcome, amount)?;
    check_equalized(&outcome, pairs, &ranked)?;

    tracing::debug!(
        max_pairs = limit,
        admitted = outcome.admitted,
        remaining = outcome.remaining,
        "Equalized utilization"
    );
    spread_residual(&mut outcome.amounts, outcome.remaining);

    Ok(ranked
        .iter()
        .zip(outcome.amounts)
        .map(|(r, amount)| Allocation { index: r.index, amount })
        .collect())
}

#[derive(Debug)]
struct Equalized {
    /// Amount per ranked slot, `max_pairs` long
    amounts: Vec<f64>,
    /// Pairs that took part in equalization
    admitted: usize,
    remaining: f64,
}

/// Greedy walk down the ranking
///
/// Step `i` admits pair `i` and adds exactly what brings the admitted group
/// down to the next utilization tier (never below the floor), split in
/// proportion to borrowed amounts so every admitted pair lands on the same
/// utilization.
fn equalize(
    pairs: &[PairAmounts],
    ranked: &[RankedPair],
    utilizations: &[f64],
    amount: f64,
    limit: usize,
) -> Result<Equalized, ProtocolError> {
    let mut amounts = vec![0.0; limit];
    let mut remaining = amount;
    let mut lend_acc = 0.0;
    let mut borrow_acc = 0.0;
    let mut admitted = 0;

    for i in 0..limit {
        if remaining <= 0.0 || utilizations[i] < MIN_SIGNIFICANT_UTILIZATION {
            break;
        }
        let target = utilizations[i + 1].max(MIN_SIGNIFICANT_UTILIZATION);
        let pair = &pairs[ranked[i].index];
        lend_acc += pair.lended;
        borrow_acc += pair.borrowed;
        admitted += 1;

        let required = borrow_acc / target - lend_acc;
        if required < -STEP_TOLERANCE * lend_acc {
            return Err(ProtocolError::InternalConsistency {
                message: format!(
                    "step {i}: lowering utilization to {target} needs {required}, lent {lend_acc}"
                ),
            });
        }
        let step = required.max(0.0).min(remaining);

        for (slot, r) in amounts.iter_mut().zip(ranked).take(i + 1) {
            *slot += pairs[r.index].borrowed * step / borrow_acc;
        }
        lend_acc += step;
        remaining -= step;
    }

    Ok(Equalized {
        amounts,
        admitted,
        remaining,
    })
}

fn check_conservation(outcome: &Equalized, amount: f64) -> Result<(), ProtocolError> {
    let allocated: f64 = outcome.amounts.iter().sum();
    let drift = (allocated + outcome.remaining - amount).abs();
    if drift > CONSERVATION_TOLERANCE * amount {
        return Err(ProtocolError::InternalConsistency {
            message: format!("allocated {allocated} + remaining {} != deposit {amount}", outcome.remaining),
        });
    }
    Ok(())
}

fn check_equalized(
    outcome: &Equalized,
    pairs: &[PairAmounts],
    ranked: &[RankedPair],
) -> Result<(), ProtocolError> {
    let after = |slot: usize| {
        let pair = &pairs[ranked[slot].index];
        pair.borrowed / (pair.lended + outcome.amounts[slot])
    };
    if outcome.admitted == 0 {
        return Ok(());
    }
    let first = after(0);
    for slot in 1..outcome.admitted {
        let utilization = after(slot);
        if (utilization / first - 1.0).abs() > EQUALIZATION_TOLERANCE {
            return Err(ProtocolError::InternalConsistency {
                message: format!(
                    "pair {} ends at utilization {utilization}, group is at {first}",
                    pairs[ranked[slot].index].address
                ),
            });
        }
    }
    Ok(())
}

/// Split what equalization left over evenly across all affordable slots
fn spread_residual(amounts: &mut [f64], remaining: f64) {
    if remaining <= 0.0 || amounts.is_empty() {
        return;
    }
    let part = remaining / amounts.len() as f64;
    for amount in amounts.iter_mut() {
        *amount += part;
    }
}

/// Convert amounts back to shares
///
/// Per-pair rounding leaves the total a few shares off the deposit. The pair
/// with the largest allocation absorbs that residual, provided it stays
/// within tolerance.
fn to_distribution(
    allocation: &[Allocation],
    pairs: &[PairAmounts],
    vault: &Rebase,
    deposit_shares: &BigUint,
) -> Result<Distribution, ProtocolError> {
    let mut shares = Vec::with_capacity(allocation.len());
    let mut distributed = BigUint::zero();
    let mut largest: Option<(usize, f64)> = None;

    for (pos, entry) in allocation.iter().enumerate() {
        let converted = amount_to_shares(entry.amount, vault)?;
        distributed += &converted;
        shares.push(converted);
        if largest.map_or(true, |(_, amount)| entry.amount > amount) {
            largest = Some((pos, entry.amount));
        }
    }
    let (largest, _) = largest.ok_or_else(|| ProtocolError::InternalConsistency {
        message: "no allocation to absorb rounding".to_string(),
    })?;

    let residual = if distributed >= *deposit_shares {
        &distributed - deposit_shares
    } else {
        deposit_shares - &distributed
    };
    let tolerance = residual_tolerance(deposit_shares, vault, allocation.len())?;
    if residual > tolerance {
        return Err(ProtocolError::InternalConsistency {
            message: format!(
                "converted shares {distributed} differ from deposit {deposit_shares} by {residual} (tolerance {tolerance})"
            ),
        });
    }

    if distributed < *deposit_shares {
        shares[largest] += residual;
    } else if shares[largest] >= residual {
        shares[largest] -= &residual;
    } else {
        return Err(ProtocolError::InternalConsistency {
            message: format!(
                "pair {} cannot absorb an excess of {residual} shares",
                pairs[allocation[largest].index].address
            ),
        });
    }

    Ok(allocation
        .iter()
        .zip(shares)
        .filter(|(_, value)| !value.is_zero())
        .map(|(entry, value)| (pairs[entry.index].address.clone(), value))
        .collect())
}

/// Largest rounding residual the conversion can legitimately produce
///
/// Every share conversion loses under one share-per-unit plus one share, and
/// the deposit itself was floored once on the way to amounts. On top of that
/// float summation drifts relative to the deposit size.
fn residual_tolerance(
    deposit_shares: &BigUint,
    vault: &Rebase,
    touched: usize,
) -> Result<BigUint, ProtocolError> {
    let shares_per_unit = if vault.elastic.is_zero() {
        1.0
    } else {
        big_to_f64(&vault.base)? / big_to_f64(&vault.elastic)?
    };
    let bound = (touched as f64 + 1.0) * (shares_per_unit.ceil() + 1.0)
        + big_to_f64(deposit_shares)? * RESIDUAL_REL_TOLERANCE;
    Ok(float_to_big_uint(bound)?.max(BigUint::from(RESIDUAL_ABS_TOLERANCE)))
}
