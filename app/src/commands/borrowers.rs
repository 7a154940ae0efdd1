//! `borrowers`: coverage report over a state snapshot

use std::path::Path;

use kashi::{borrowers_report, BorrowersSnapshot};

use super::load_json;

pub fn run(snapshot: &Path, min_coverage: f64) -> anyhow::Result<()> {
    let snapshot: BorrowersSnapshot = load_json(snapshot)?;
    let borrowers: usize = snapshot.pairs.iter().map(|p| p.borrowers.len()).sum();
    tracing::info!(pairs = snapshot.pairs.len(), borrowers, min_coverage, "Checking borrowers");

    let report = borrowers_report(&snapshot, min_coverage);
    for row in &report {
        println!("{row}");
    }
    tracing::info!(listed = report.len(), "Borrower report done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_on_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("borrowers.json");
        std::fs::write(&path, r#"{"pairs": []}"#).unwrap();
        assert!(run(&path, 50.0).is_ok());
    }

    #[test]
    fn test_run_rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("borrowers.json");
        std::fs::write(&path, r#"{"pairs": [{"address": "0xpair"}]}"#).unwrap();
        assert!(run(&path, 50.0).is_err());
    }
}
