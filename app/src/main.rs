use clap::Parser;
use kashi_monitor::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; keys may come from the real environment
    dotenvy::dotenv().ok();
    kashi_monitor::init_tracing()?;

    kashi_monitor::run(Cli::parse()).await
}
