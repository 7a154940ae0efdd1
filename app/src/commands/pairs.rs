//! `pairs`: Kashi pairs deployed through BentoBox

use kashi_core::AppConfig;
use scan_client::{PairDeployment, ScanClient};

pub fn format_row(deployment: &PairDeployment) -> String {
    format!(
        "pair={} collateral={} asset={} oracle={}",
        deployment.pair, deployment.collateral, deployment.asset, deployment.oracle
    )
}

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let client = ScanClient::new(config)?;
    let pairs = client.get_deployed_pairs(&config.network).await?;
    tracing::info!(network = %config.network.name, count = pairs.len(), "Found Kashi pairs");

    for deployment in &pairs {
        println!("{}", format_row(deployment));
    }
    Ok(())
}
