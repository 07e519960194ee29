//! Gate flag polling loop
//!
//! Once per interval: observe the gate document, and when the flag is set,
//! trigger the device and clear the flag in the same cycle. The write happens
//! before the clear, so a crash between the two re-triggers rather than
//! drops.

use crate::device::DeviceLink;
use crate::firebase::firestore::{ClearOutcome, GateStore};
use anyhow::Result;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between polls
    pub interval: Duration,
    /// The byte sent to the device when the flag is observed set
    pub trigger_byte: u8,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            trigger_byte: b'1',
        }
    }
}

/// Outcome of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Flag was set: device triggered, clear attempted
    Triggered,
    /// Flag was not set
    Idle,
    /// Document does not exist
    Missing,
}

/// Drives the observe-trigger-clear cycle against a store and a device
pub struct Poller<S, D> {
    store: S,
    device: D,
    config: PollerConfig,
}

impl<S: GateStore, D: DeviceLink> Poller<S, D> {
    pub fn new(store: S, device: D, config: PollerConfig) -> Self {
        Self {
            store,
            device,
            config,
        }
    }

    /// Run one poll cycle
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        let snapshot = match self.store.fetch().await? {
            None => {
                info!("Gate document not found");
                return Ok(PollOutcome::Missing);
            }
            Some(snapshot) => snapshot,
        };

        if !snapshot.gate_closed {
            debug!("No trigger yet");
            return Ok(PollOutcome::Idle);
        }

        info!("Gate closed! Triggering device");
        self.device.send(&[self.config.trigger_byte]).await?;

        match self.store.clear(&snapshot).await? {
            ClearOutcome::Cleared => debug!("Gate flag cleared"),
            ClearOutcome::Superseded => {
                warn!("Gate flag changed after observation; clear skipped")
            }
        }

        Ok(PollOutcome::Triggered)
    }

    /// Poll until an error escapes a cycle
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(self.config.interval);
        loop {
            ticker.tick().await;
            self.poll_once().await?;
        }
    }
}
