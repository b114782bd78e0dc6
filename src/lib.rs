//! HECP: async client for HDMI capture/encoder appliances
//!
//! This library discovers HECP-speaking encoders on the local network and
//! remotely controls them over their framed binary command protocol:
//! streaming target and key, colour settings, input source, bitrate,
//! picture size, and streaming start/stop.
//!
//! ```no_run
//! use std::time::Duration;
//! use hecp::{discover, ClientConfig, DeviceHandle};
//!
//! # async fn run() -> hecp::Result<()> {
//! let devices = discover(Duration::from_secs(2)).await?;
//! let handle = DeviceHandle::new(devices[0].clone(), ClientConfig::default());
//! handle.connect().await?;
//! handle.set("rtmp_url", "rtmp://live.example.com/app").await?;
//! handle.set("rtmp_key", "s3cret").await?;
//! handle.start_streaming().await?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod params;
pub mod protocol;

mod device;
mod network;

// Re-export commonly used items
pub use core::{ClientConfig, ConnectionState, DeviceAddress, Error, Result};
pub use device::DeviceHandle;
pub use network::{discover, discover_with};
pub use params::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
