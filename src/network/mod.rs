//! Device discovery and the control connection
//!
//! This module handles the broadcast discovery channel, the per-device
//! control connection, and request/response dispatch over it.

mod connection;
mod discovery;
mod dispatch;

pub use self::connection::Connection;
pub use self::discovery::{discover, discover_with};
pub use self::dispatch::CommandDispatcher;
