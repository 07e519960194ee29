use anyhow::Result;
use gate_bridge::device::{SerialConfig, SerialLink};
use gate_bridge::firebase::rtdb::{self, RtdbConfig};
use gate_bridge::firebase::Credentials;
use gate_bridge::listener;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let credentials = Credentials::from_env()?;
    info!("Gate listener starting: project {}", credentials.project_id());

    let rtdb_config = RtdbConfig::for_project(credentials.project_id());
    let mut events = rtdb::subscribe(rtdb_config, credentials.access_token.clone());

    let serial_config = SerialConfig::from_env(115_200);
    let mut device = SerialLink::open(&serial_config).await?;

    // Runs until the subscription channel closes or a serial write fails;
    // the port is released by process exit
    listener::run(&mut events, &mut device).await
}
