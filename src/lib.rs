use tracing::info;

pub mod api;
mod attendance;
mod call;
mod census;
pub mod env;
pub mod error;
mod event;
mod ledger;
pub mod wholog;

#[cfg(test)]
pub mod test_utils;

use crate::env::Config;

pub use crate::env::{Env, LogLevel, setup_tracing};

pub async fn launch(config: Config) -> anyhow::Result<()> {
    let pool = config.get_sqlite_pool().await?;
    sqlx::migrate!().run(&pool).await?;

    let rocket_config = rocket::Config::figment()
        .merge(("port", config.server_port))
        .merge(("address", "0.0.0.0"));

    info!(port = config.server_port, "starting ledger server");

    rocket::custom(rocket_config)
        .mount("/", api::routes())
        .manage(pool)
        .launch()
        .await?;

    info!("Shutdown complete");
    Ok(())
}
