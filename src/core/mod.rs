//! Core types for the HECP client
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{ClientConfig, ConnectionState, DeviceAddress};

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Well-known UDP port for device discovery
pub const DISCOVERY_PORT: u16 = 8086;

/// Well-known TCP port for the control connection
pub const CONTROL_PORT: u16 = 8087;
