use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::core::{ClientConfig, Error, Result};
use crate::protocol::{CommandFrame, FrameCodec};

/// Depth of the outbound and inbound frame queues
const FRAME_QUEUE_DEPTH: usize = 32;

/// A control connection to one device.
///
/// Opening a connection spawns a single I/O task that owns the socket. The
/// task writes frames queued through [`Connection::send`] and forwards every
/// decoded inbound frame to the channel handed out by [`Connection::open`].
/// When the remote closes the stream or framing is lost, the task ends and
/// the inbound channel closes, which is how the dispatcher observes
/// connection closure.
pub struct Connection {
    frame_tx: mpsc::Sender<CommandFrame>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Opens a control connection to `addr`.
    ///
    /// Returns the connection plus the inbound frame channel. Fails with a
    /// connect error if the OS rejects the connection or the configured
    /// connect deadline passes.
    pub async fn open(
        addr: SocketAddr,
        config: &ClientConfig,
    ) -> Result<(Connection, mpsc::Receiver<CommandFrame>)> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::connect(format!("timed out connecting to {}", addr)))?
            .map_err(|e| Error::connect(format!("can't connect to {}: {}", addr, e)))?;

        // Command frames are tiny; don't let the kernel batch them.
        stream.set_nodelay(true)?;
        info!(%addr, "control connection established");

        let framed = Framed::new(stream, FrameCodec::new());
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);

        let task = tokio::spawn(run_io(framed, frame_rx, inbound_tx));

        Ok((Connection { frame_tx, task }, inbound_rx))
    }

    /// Queues a frame for sending.
    ///
    /// Fails with `ConnectionClosed` once the I/O task has ended.
    pub async fn send(&self, frame: CommandFrame) -> Result<()> {
        self.frame_tx
            .send(frame)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the connection, releasing the socket. Idempotent.
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// I/O loop owning the framed socket.
async fn run_io(
    mut framed: Framed<TcpStream, FrameCodec>,
    mut outbound: mpsc::Receiver<CommandFrame>,
    inbound: mpsc::Sender<CommandFrame>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = framed.send(frame).await {
                            warn!(error = %e, "send failed, closing connection");
                            break;
                        }
                    }
                    // All senders dropped; the owner is gone.
                    None => break,
                }
            }

            frame = framed.next() => {
                match frame {
                    Some(Ok(frame)) => {
                        debug!(seq = frame.sequence_id, opcode = ?frame.opcode, "frame received");
                        if inbound.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        // Framing lost; nothing after this point can be
                        // trusted to start on a frame boundary.
                        warn!(error = %e, "unrecoverable decode error, closing connection");
                        break;
                    }
                    None => {
                        info!("connection closed by remote");
                        break;
                    }
                }
            }
        }
    }
    // Dropping `framed` releases the socket; dropping `inbound` signals
    // closure to the dispatcher.
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;
    use crate::protocol::Opcode;

    #[tokio::test]
    async fn test_open_send_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo device: replies to each frame with the same sequence id.
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::new());
            while let Some(Ok(frame)) = framed.next().await {
                framed.send(frame).await.unwrap();
            }
        });

        let config = ClientConfig::default();
        let (conn, mut inbound) = Connection::open(addr, &config).await.unwrap();

        let frame = CommandFrame::new(Opcode::Get, 2, 7, Bytes::new());
        conn.send(frame.clone()).await.unwrap();

        let echoed = inbound.recv().await.unwrap();
        assert_eq!(echoed, frame);
    }

    #[tokio::test]
    async fn test_open_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::default();
        let result = Connection::open(addr, &config).await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_remote_close_ends_inbound() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let config = ClientConfig::default();
        let (_conn, mut inbound) = Connection::open(addr, &config).await.unwrap();
        assert!(inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let config = ClientConfig::default();
        let (conn, _inbound) = Connection::open(addr, &config).await.unwrap();
        conn.close();
        conn.close();
    }
}
