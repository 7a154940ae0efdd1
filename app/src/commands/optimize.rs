//! `optimize`: deposit allocation over a state snapshot

use std::collections::BTreeMap;
use std::path::Path;

use kashi::{AllocationRequest, Distribution};
use serde::Serialize;

use super::load_json;

#[derive(Debug, Serialize)]
pub struct OptimizeOutput {
    pub deposit_shares: String,
    pub pairs_considered: usize,
    /// Pair address -> shares, sorted by address
    pub distribution: BTreeMap<String, String>,
}

pub fn build_output(request: &AllocationRequest, distribution: &Distribution) -> OptimizeOutput {
    OptimizeOutput {
        deposit_shares: request.deposit_shares.to_string(),
        pairs_considered: request.pairs.len(),
        distribution: distribution
            .iter()
            .map(|(pair, shares)| (pair.clone(), shares.to_string()))
            .collect(),
    }
}

pub fn run(snapshot: &Path) -> anyhow::Result<()> {
    let request: AllocationRequest = load_json(snapshot)?;
    let distribution = request.allocate()?;
    tracing::info!(
        pairs = request.pairs.len(),
        touched = distribution.len(),
        "Deposit allocated"
    );

    let output = build_output(&request, &distribution);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
