//! Serial link to the gate controller board
//!
//! The board is a small microcontroller on a USB serial adapter. It takes
//! either a single trigger byte (poller variant) or newline-terminated ASCII
//! command lines (listener variant).

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::info;

/// A writable link to the physical gate controller
#[async_trait]
pub trait DeviceLink: Send {
    /// Write the full payload to the device
    async fn send(&mut self, payload: &[u8]) -> Result<()>;
}

/// Configuration for the serial link
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial device path (e.g. "/dev/ttyACM0")
    pub port: String,
    /// Baud rate (9600 for the poller board, 115200 for the listener board)
    pub baud: u32,
    /// How long to wait after opening; the board resets when the port opens
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud: 9600,
            settle: Duration::from_secs(2),
        }
    }
}

impl SerialConfig {
    /// Build a config from the environment, falling back to `default_baud`
    /// when `GATE_SERIAL_BAUD` is unset or unparsable
    pub fn from_env(default_baud: u32) -> Self {
        let defaults = Self::default();
        let port = std::env::var("GATE_SERIAL_PORT").unwrap_or(defaults.port);
        let baud = std::env::var("GATE_SERIAL_BAUD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_baud);
        Self {
            port,
            baud,
            settle: defaults.settle,
        }
    }
}

/// Exclusive owner of the serial port for the lifetime of the process
///
/// The port is closed when the link is dropped.
pub struct SerialLink {
    stream: SerialStream,
    port: String,
}

impl SerialLink {
    /// Open the port, wait out the board reset, and discard any stale bytes
    pub async fn open(config: &SerialConfig) -> Result<Self> {
        let stream = tokio_serial::new(&config.port, config.baud)
            .timeout(Duration::from_secs(1))
            .open_native_async()
            .with_context(|| format!("failed to open serial port {}", config.port))?;

        tokio::time::sleep(config.settle).await;
        stream
            .clear(ClearBuffer::All)
            .with_context(|| format!("failed to clear buffers on {}", config.port))?;

        info!("Serial link ready: {} @ {} baud", config.port, config.baud);

        Ok(Self {
            stream,
            port: config.port.clone(),
        })
    }
}

#[async_trait]
impl DeviceLink for SerialLink {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.stream
            .write_all(payload)
            .await
            .with_context(|| format!("serial write to {} failed", self.port))?;
        self.stream
            .flush()
            .await
            .with_context(|| format!("serial flush to {} failed", self.port))?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.baud, 9600);
        assert_eq!(config.settle, Duration::from_secs(2));
    }

    #[test]
    fn test_from_env_uses_variant_baud() {
        // No env vars set in the test runner for these keys by default
        let config = SerialConfig::from_env(115_200);
        assert_eq!(config.baud, 115_200);
    }

    #[tokio::test]
    async fn test_recording_link_captures_writes() {
        let mut link = testing::RecordingLink::default();
        link.send(b"open\n").await.unwrap();
        assert_eq!(link.writes, vec![b"open\n".to_vec()]);
    }
}
