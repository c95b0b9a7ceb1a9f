use clap::Parser;
use dkp_ledger::{Env, launch, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Env::parse().into_config();
    setup_tracing(&config.log_level);
    launch(config).await
}
