//! Sub-command handlers

pub mod borrowers;
pub mod logs;
pub mod networks;
pub mod optimize;
pub mod pairs;

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Read a JSON snapshot file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kashi::Rebase;

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, r#"{"elastic": "10", "base": "20"}"#).unwrap();

        let vault: Rebase = load_json(&path).unwrap();
        assert_eq!(vault, Rebase::new(10u64, 20u64));
    }

    #[test]
    fn test_load_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = load_json::<Rebase>(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        let err = load_json::<Rebase>(&broken).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}
