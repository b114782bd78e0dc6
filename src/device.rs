//! Public device handle
//!
//! One handle owns at most one control connection and its dispatcher. A
//! physical device should have a single owning handle inside the process;
//! sharing a device between handles would collide on sequence ids.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::{ClientConfig, ConnectionState, DeviceAddress, Error, Result};
use crate::network::{CommandDispatcher, Connection};
use crate::params::{self, Value};
use crate::protocol::Opcode;

struct Inner {
    state: ConnectionState,
    dispatcher: Option<Arc<CommandDispatcher>>,
}

/// Handle to one HDMI encoder appliance.
///
/// State machine: DISCONNECTED --connect--> CONNECTING --> CONNECTED
/// --(disconnect | connection failure)--> DISCONNECTED. A failed connect
/// moves the handle to FAILED, which is terminal: construct a new handle to
/// retry. All command operations require CONNECTED.
pub struct DeviceHandle {
    address: DeviceAddress,
    config: ClientConfig,
    inner: Mutex<Inner>,
}

impl DeviceHandle {
    /// Creates a disconnected handle for a device.
    pub fn new(address: DeviceAddress, config: ClientConfig) -> Self {
        DeviceHandle {
            address,
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                dispatcher: None,
            }),
        }
    }

    /// Returns the device this handle controls.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Opens the control connection.
    ///
    /// A no-op when already connected. Fails with a connect error if the
    /// transport cannot be established, after which the handle is FAILED
    /// and cannot be reused.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            match inner.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(Error::connect("connect already in progress"))
                }
                ConnectionState::Failed => {
                    return Err(Error::connect(
                        "handle has failed; create a new handle to retry",
                    ))
                }
                ConnectionState::Disconnected => inner.state = ConnectionState::Connecting,
            }
        }

        match Connection::open(self.address.control_addr(), &self.config).await {
            Ok((connection, inbound)) => {
                let mut inner = self.inner.lock().await;
                inner.dispatcher = Some(Arc::new(CommandDispatcher::new(connection, inbound)));
                inner.state = ConnectionState::Connected;
                info!(device = %self.address, "connected");
                Ok(())
            }
            Err(e) => {
                self.inner.lock().await.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Closes the control connection, failing any pending commands.
    /// Idempotent.
    pub async fn disconnect(&self) {
        let dispatcher = {
            let mut inner = self.inner.lock().await;
            if inner.state == ConnectionState::Connected {
                inner.state = ConnectionState::Disconnected;
            }
            inner.dispatcher.take()
        };

        if let Some(dispatcher) = dispatcher {
            dispatcher.close().await;
            info!(device = %self.address, "disconnected");
        }
    }

    /// Reads a parameter by name.
    pub async fn get(&self, name: &str) -> Result<Value> {
        let param = params::lookup(name)?;
        let payload = self.request(Opcode::Get, param.id, Bytes::new()).await?;
        param.decode(&payload)
    }

    /// Writes a parameter by name.
    ///
    /// The value is validated against the parameter descriptor before
    /// anything is sent to the device.
    pub async fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let param = params::lookup(name)?;
        let payload = param.validate_and_encode(&value.into())?;
        self.request(Opcode::Set, param.id, payload).await?;
        Ok(())
    }

    /// Starts streaming to the configured RTMP target.
    pub async fn start_streaming(&self) -> Result<()> {
        self.toggle_streaming(true).await
    }

    /// Stops streaming.
    pub async fn stop_streaming(&self) -> Result<()> {
        self.toggle_streaming(false).await
    }

    async fn toggle_streaming(&self, enable: bool) -> Result<()> {
        let param = params::lookup("streaming")?;
        let payload = Bytes::copy_from_slice(&[u8::from(enable)]);
        self.request(Opcode::StreamToggle, param.id, payload).await?;
        Ok(())
    }

    /// Runs one command exchange on the current connection.
    async fn request(&self, opcode: Opcode, parameter_id: u8, payload: Bytes) -> Result<Bytes> {
        let dispatcher = {
            let inner = self.inner.lock().await;
            match (&inner.state, &inner.dispatcher) {
                (ConnectionState::Connected, Some(dispatcher)) => Arc::clone(dispatcher),
                _ => return Err(Error::NotConnected),
            }
        };

        let result = dispatcher
            .call(opcode, parameter_id, payload, self.config.request_timeout)
            .await;

        if matches!(result, Err(Error::ConnectionClosed)) {
            // The connection died underneath us; reflect that in the state
            // so later calls report NotConnected instead of racing a dead
            // dispatcher.
            let mut inner = self.inner.lock().await;
            if inner.state == ConnectionState::Connected {
                inner.state = ConnectionState::Disconnected;
                inner.dispatcher = None;
            }
        }

        result
    }
}
