use anyhow::Result;
use gate_bridge::device::{SerialConfig, SerialLink};
use gate_bridge::firebase::firestore::{FirestoreClient, FirestoreConfig};
use gate_bridge::firebase::Credentials;
use gate_bridge::poller::{Poller, PollerConfig};

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
    info!("Gate poller starting: project {}", credentials.project_id());

    let store = FirestoreClient::new(&credentials, FirestoreConfig::default())?;

    let serial_config = SerialConfig::from_env(9600);
    let device = SerialLink::open(&serial_config).await?;

    let mut poller = Poller::new(store, device, PollerConfig::default());

    tokio::select! {
        result = poller.run() => result,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the poller releases the serial handle
            info!("Exiting");
            Ok(())
        }
    }
}
