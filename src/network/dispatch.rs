use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Instant};
use tracing::{debug, warn};

use super::connection::Connection;
use crate::core::{Error, Result};
use crate::protocol::{CommandFrame, Opcode};

/// How often abandoned pending entries are checked for eviction
const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// A request in flight: where to deliver the response, and until when the
/// sequence id stays reserved.
struct PendingRequest {
    deadline: Instant,
    complete: oneshot::Sender<CommandFrame>,
}

/// Mutable dispatcher state, shared between the dispatcher task and callers.
/// Every access goes through the mutex.
struct PendingState {
    slots: HashMap<u16, PendingRequest>,
    next_seq: u16,
    closed: bool,
}

impl PendingState {
    fn new() -> Self {
        PendingState {
            slots: HashMap::new(),
            // 0 is reserved for discovery frames
            next_seq: 1,
            closed: false,
        }
    }

    /// Allocates the next free sequence id, skipping 0 and ids still in
    /// flight. Wraps over the u16 space.
    fn allocate(&mut self) -> Result<u16> {
        let start = self.next_seq;
        loop {
            let seq = self.next_seq;
            self.next_seq = if self.next_seq == u16::MAX { 1 } else { self.next_seq + 1 };
            if !self.slots.contains_key(&seq) {
                return Ok(seq);
            }
            if self.next_seq == start {
                return Err(Error::protocol("sequence id space exhausted"));
            }
        }
    }

    /// Fails every pending request and refuses further calls. Dropping the
    /// completion senders wakes the waiting callers.
    fn fail_all(&mut self) {
        self.closed = true;
        self.slots.clear();
    }
}

/// Serializes outbound command frames and matches inbound frames to pending
/// requests by sequence id.
///
/// One dispatcher exists per control connection. Concurrent callers are
/// safe: each call gets its own sequence id and completion slot, and every
/// wait is deadline-bounded. There is no automatic retry at this layer;
/// commands are not guaranteed idempotent.
pub struct CommandDispatcher {
    shared: Arc<Mutex<PendingState>>,
    connection: Connection,
    task: JoinHandle<()>,
}

impl CommandDispatcher {
    /// Creates a dispatcher bound to an open connection and its inbound
    /// frame channel.
    pub fn new(connection: Connection, inbound: mpsc::Receiver<CommandFrame>) -> Self {
        let shared = Arc::new(Mutex::new(PendingState::new()));
        let task = tokio::spawn(run_dispatch(Arc::clone(&shared), inbound));

        CommandDispatcher {
            shared,
            connection,
            task,
        }
    }

    /// Sends one command and waits for the matching response payload.
    ///
    /// Returns `Timeout` if no response arrives within `window` (the
    /// pending entry is removed; a later response is dropped as unmatched)
    /// and `ConnectionClosed` if the connection dies before or while the
    /// request is in flight.
    pub async fn call(
        &self,
        opcode: Opcode,
        parameter_id: u8,
        payload: Bytes,
        window: Duration,
    ) -> Result<Bytes> {
        let deadline = Instant::now() + window;
        let (complete, response) = oneshot::channel();

        let seq = {
            let mut state = self.shared.lock().await;
            if state.closed {
                return Err(Error::ConnectionClosed);
            }
            let seq = state.allocate()?;
            state.slots.insert(seq, PendingRequest { deadline, complete });
            seq
        };

        let frame = CommandFrame::new(opcode, parameter_id, seq, payload);
        if self.connection.send(frame).await.is_err() {
            self.shared.lock().await.slots.remove(&seq);
            return Err(Error::ConnectionClosed);
        }

        match timeout_at(deadline, response).await {
            Ok(Ok(frame)) => Ok(frame.payload),
            // Completion sender dropped without a response: closure.
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.shared.lock().await.slots.remove(&seq);
                Err(Error::Timeout)
            }
        }
    }

    /// Closes the connection, failing every pending call with
    /// `ConnectionClosed` and rejecting further calls. Idempotent.
    pub async fn close(&self) {
        self.shared.lock().await.fail_all();
        self.connection.close();
    }

    /// Whether the dispatcher has reached its terminal closed state.
    pub async fn is_closed(&self) -> bool {
        self.shared.lock().await.closed
    }

    #[cfg(test)]
    async fn pending_count(&self) -> usize {
        self.shared.lock().await.slots.len()
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Dispatcher task: sole consumer of inbound frames. Completes matching
/// pending requests, drops unmatched frames, sweeps entries abandoned by
/// cancelled callers, and fails everything on connection closure.
async fn run_dispatch(shared: Arc<Mutex<PendingState>>, mut inbound: mpsc::Receiver<CommandFrame>) {
    let mut sweep = interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            frame = inbound.recv() => {
                match frame {
                    Some(frame) => {
                        let mut state = shared.lock().await;
                        match state.slots.remove(&frame.sequence_id) {
                            Some(pending) => {
                                if pending.complete.send(frame).is_err() {
                                    // Caller cancelled; response consumed and discarded.
                                    debug!("response for cancelled request discarded");
                                }
                            }
                            None => {
                                warn!(seq = frame.sequence_id, "dropping unmatched response");
                            }
                        }
                    }
                    None => break,
                }
            }

            _ = sweep.tick() => {
                let now = Instant::now();
                let mut state = shared.lock().await;
                // Live callers remove their own entry when they time out;
                // this only reclaims ids whose caller went away.
                state.slots.retain(|seq, pending| {
                    let expired = pending.deadline <= now && pending.complete.is_closed();
                    if expired {
                        debug!(seq, "evicting abandoned request");
                    }
                    !expired
                });
            }
        }
    }

    shared.lock().await.fail_all();
}
