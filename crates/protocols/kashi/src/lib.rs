//! Kashi Lending Pair Implementation
//!
//! Pure math for Kashi lending pairs that share one BentoBox vault.
//!
//! # Overview
//!
//! Every pair tracks lent assets as vault shares and outstanding loans as a
//! pair-local rebase. This crate converts that state into comparable amounts,
//! splits a new deposit across pairs so that utilization is equalized
//! (`optimizer`), and reports how well borrowers are covered by collateral
//! (`report`).
//!
//! No I/O happens here; callers supply one consistent snapshot of state.

pub mod calculator;
pub mod constants;
pub mod optimizer;
pub mod report;
pub mod state;

// Re-exports
pub use calculator::*;
pub use optimizer::{add_liquidity, max_pairs, AllocationRequest};
pub use report::*;
pub use state::*;
