//! Kashi Protocol Constants
//!
//! Tuning constants for deposit allocation and fixed-point scales used by
//! the on-chain contracts.

/// Deposit allocation tuning
pub mod optimizer {
    /// Fraction of a deposit that may be spent on per-pair transaction overhead
    pub const MAX_GAS_SHARE: f64 = 0.005;

    /// Utilization below which a pair is not worth equalizing
    pub const MIN_SIGNIFICANT_UTILIZATION: f64 = 0.0025;

    /// Relative slack on the greedy step invariant `borrow/target - lend >= 0`
    pub const STEP_TOLERANCE: f64 = 1e-9;

    /// Relative slack when checking that allocated + remaining equals the deposit
    pub const CONSERVATION_TOLERANCE: f64 = 1e-9;

    /// Relative slack when checking that touched pairs end at one utilization
    pub const EQUALIZATION_TOLERANCE: f64 = 1e-6;

    /// Share residuals up to this size are always accepted
    pub const RESIDUAL_ABS_TOLERANCE: u64 = 10;

    /// Share residuals relative to the deposit that are always accepted
    pub const RESIDUAL_REL_TOLERANCE: f64 = 1e-9;
}

/// Fixed-point scales
pub mod scale {
    /// 1e18, the contracts' fixed-point unit for rates and collateral shares
    pub const E18: u64 = 1_000_000_000_000_000_000;

    /// Largest integer an f64 represents exactly (2^53 - 1)
    pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    /// Mantissa bits kept when converting large floats to integers
    pub const MANTISSA_BITS: i32 = 52;
}

/// Borrower report defaults
pub mod report {
    /// Default minimum coverage (percent) for a borrower to be listed
    pub const DEFAULT_MIN_COVERAGE: f64 = 50.0;

    /// Significant digits shown for borrow amounts
    pub const AMOUNT_PRECISION: u32 = 3;
}
