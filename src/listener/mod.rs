//! Command forward loop
//!
//! Consumes the subscription channel and relays command values to the device.
//! De-duplication state is a plain `Option<String>` threaded through the loop;
//! a restarted listener starts with no history.

use crate::device::DeviceLink;
use crate::firebase::rtdb::{CommandEventReceiver, RtdbEvent};
use anyhow::{bail, Result};
use tracing::{info, warn};

/// Forward a command if it is non-empty and differs from the last forwarded
/// value; returns the updated de-duplication state
pub async fn forward<D: DeviceLink>(
    device: &mut D,
    last: Option<String>,
    command: String,
) -> Result<Option<String>> {
    if command.is_empty() || last.as_deref() == Some(command.as_str()) {
        return Ok(last);
    }

    let mut payload = command.clone().into_bytes();
    payload.push(b'\n');
    device.send(&payload).await?;

    info!("Command forwarded to device: {command}");
    Ok(Some(command))
}

/// Consume subscription events until the channel closes
pub async fn run<D: DeviceLink>(events: &mut CommandEventReceiver, device: &mut D) -> Result<()> {
    let mut last: Option<String> = None;

    loop {
        match events.recv().await {
            Some(RtdbEvent::Connected) => {
                info!("Listening for commands from Firebase");
            }
            Some(RtdbEvent::Disconnected { reason }) => {
                warn!("Command stream disconnected: {reason}");
            }
            Some(RtdbEvent::Command(command)) => {
                last = forward(device, last, command).await?;
            }
            None => {
                bail!("command subscription channel closed");
            }
        }
    }
}
