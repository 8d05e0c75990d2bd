use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stun::agent::TransactionId;
use stun::error_code::ErrorCodeAttribute;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::{
    is_message, Getter, Message, Setter, CLASS_ERROR_RESPONSE, CLASS_REQUEST,
    CLASS_SUCCESS_RESPONSE,
};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use util::sync::Mutex as SyncMutex;
use util::Conn;

use crate::agent::ConnectionInternal;
use crate::candidate::Candidate;
use crate::error::{Error, Result};

pub(crate) const RECEIVE_MTU: usize = 8192;

/// First retransmission timeout, doubled after every send (RFC 5389 7.2.1).
const RETRY_RTO: Duration = Duration::from_millis(500);
/// Default number of retransmissions after the initial send.
const RETRY_MAX: usize = 6;

static ENDPOINT_ID: AtomicUsize = AtomicUsize::new(0);

type TransactionMap = HashMap<TransactionId, oneshot::Sender<(Message, SocketAddr)>>;

/// Removes a pending transaction on exit, whether the request completed,
/// failed or was cancelled mid-flight.
struct TransactionGuard {
    transactions: Arc<SyncMutex<TransactionMap>>,
    id: TransactionId,
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        self.transactions.lock().remove(&self.id);
    }
}

/// The STUN endpoint backing one local candidate.
///
/// It owns the UDP transport (a plain socket, or the relayed transport of a
/// TURN allocation) and demultiplexes every inbound datagram into a pending
/// transaction response, an inbound request, or application data.
pub struct StunEndpoint {
    id: usize,
    local_candidate: Candidate,
    conn: Arc<dyn Conn + Send + Sync>,
    relay_client: Option<Arc<turn::client::Client>>,
    transactions: Arc<SyncMutex<TransactionMap>>,
    closed_ch: SyncMutex<Option<broadcast::Sender<()>>>,
    demux_handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl StunEndpoint {
    /// Creates the endpoint and spawns its read loop.
    pub(crate) fn start(
        local_candidate: Candidate,
        conn: Arc<dyn Conn + Send + Sync>,
        relay_client: Option<Arc<turn::client::Client>>,
        receiver: Arc<ConnectionInternal>,
    ) -> Arc<Self> {
        let (closed_tx, closed_rx) = broadcast::channel(1);
        let endpoint = Arc::new(Self {
            id: ENDPOINT_ID.fetch_add(1, Ordering::SeqCst),
            local_candidate,
            conn,
            relay_client,
            transactions: Arc::new(SyncMutex::new(HashMap::new())),
            closed_ch: SyncMutex::new(Some(closed_tx)),
            demux_handle: SyncMutex::new(None),
        });

        let ep = Arc::clone(&endpoint);
        let handle = tokio::spawn(async move {
            StunEndpoint::demux_loop(ep, receiver, closed_rx).await;
        });
        *endpoint.demux_handle.lock() = Some(handle);

        endpoint
    }

    pub fn local_candidate(&self) -> &Candidate {
        &self.local_candidate
    }

    pub(crate) fn component(&self) -> u16 {
        self.local_candidate.component
    }

    async fn demux_loop(
        endpoint: Arc<Self>,
        receiver: Arc<ConnectionInternal>,
        mut closed_rx: broadcast::Receiver<()>,
    ) {
        let mut buf = vec![0u8; RECEIVE_MTU];
        loop {
            let (n, addr) = tokio::select! {
                _ = closed_rx.recv() => break,
                result = endpoint.conn.recv_from(&mut buf) => match result {
                    Ok(v) => v,
                    Err(err) => {
                        log::debug!("[endpoint {}]: read loop ended: {}", endpoint.id, err);
                        break;
                    }
                },
            };

            let data = &buf[..n];
            if !is_message(data) {
                receiver.data_received(data.to_vec(), endpoint.component());
                continue;
            }

            let mut message = Message::new();
            message.raw = data.to_vec();
            if message.decode().is_err() {
                // Magic cookie but no valid STUN frame, treat as data.
                receiver.data_received(data.to_vec(), endpoint.component());
                continue;
            }
            log::trace!("[endpoint {}]: < {} {}", endpoint.id, addr, message);

            if message.typ.class == CLASS_SUCCESS_RESPONSE
                || message.typ.class == CLASS_ERROR_RESPONSE
            {
                let transaction = endpoint.transactions.lock().remove(&message.transaction_id);
                match transaction {
                    Some(tx) => {
                        let _ = tx.send((message, addr));
                    }
                    None => log::debug!(
                        "[endpoint {}]: discard response from {}, unknown transaction",
                        endpoint.id,
                        addr
                    ),
                }
            } else if message.typ.class == CLASS_REQUEST {
                receiver.request_received(message, addr, &endpoint).await;
            }
        }

        receiver.connection_lost();
    }

    /// Executes a STUN transaction against `addr`, driving the retransmission
    /// timer until a response arrives or the attempts are exhausted.
    ///
    /// An error response is surfaced as [`Error::ErrTransactionFailed`] with
    /// the ERROR-CODE it carried.
    pub async fn request(
        &self,
        mut request: Message,
        addr: SocketAddr,
        integrity_key: Option<&str>,
        retransmissions: Option<usize>,
    ) -> Result<(Message, SocketAddr)> {
        if let Some(key) = integrity_key {
            MessageIntegrity::new_short_term_integrity(key.to_owned()).add_to(&mut request)?;
            FINGERPRINT.add_to(&mut request)?;
        }

        let (tx, mut rx) = oneshot::channel();
        let id = request.transaction_id;
        self.transactions.lock().insert(id, tx);
        let _guard = TransactionGuard {
            transactions: Arc::clone(&self.transactions),
            id,
        };

        let tries_max = 1 + retransmissions.unwrap_or(RETRY_MAX);
        let mut rto = RETRY_RTO;
        for _ in 0..tries_max {
            log::trace!("[endpoint {}]: > {} {}", self.id, addr, request);
            self.conn.send_to(&request.raw, addr).await?;

            tokio::select! {
                result = &mut rx => {
                    let (response, from) = result.map_err(|_| Error::ErrClosed)?;
                    if response.typ.class == CLASS_ERROR_RESPONSE {
                        let mut code = ErrorCodeAttribute::default();
                        let _ = code.get_from(&response);
                        return Err(Error::ErrTransactionFailed(code.code.0));
                    }
                    return Ok((response, from));
                }
                _ = sleep(rto) => {
                    rto *= 2;
                }
            }
        }

        Err(Error::ErrTransactionTimeout)
    }

    /// Sends an application datagram.
    pub async fn send_data(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.conn.send_to(data, addr).await?;
        Ok(())
    }

    /// Sends an already-built STUN message.
    pub async fn send_stun(&self, message: &Message, addr: SocketAddr) -> Result<()> {
        log::trace!("[endpoint {}]: > {} {}", self.id, addr, message);
        self.conn.send_to(&message.raw, addr).await?;
        Ok(())
    }

    /// Tears down the transport and waits for the read loop to finish.
    pub async fn close(&self) -> Result<()> {
        {
            let mut closed_ch = self.closed_ch.lock();
            if closed_ch.is_none() {
                return Err(Error::ErrClosed);
            }
            closed_ch.take();
        }

        if let Some(relay_client) = &self.relay_client {
            let _ = relay_client.close().await;
        }
        let _ = self.conn.close().await;

        let handle = self.demux_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pending_transactions(&self) -> usize {
        self.transactions.lock().len()
    }
}
