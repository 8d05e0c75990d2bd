#[cfg(test)]
mod mdns_test;

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;
use mdns::config::Config;
use mdns::conn::{DnsConn, DEFAULT_DEST_ADDR};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

use crate::error::Result;

const MDNS_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// The process-wide resolver shared between connections, created on first
/// use and torn down when the last subscriber unregisters.
#[derive(Default)]
struct SharedResolver {
    conn: Option<Arc<DnsConn>>,
    subscribers: HashSet<usize>,
}

lazy_static! {
    static ref SHARED_RESOLVER: Mutex<SharedResolver> = Mutex::new(SharedResolver::default());
}

/// Returns whether a candidate host name must go through mDNS resolution.
pub fn is_mdns_hostname(host: &str) -> bool {
    host.ends_with(".local")
}

/// Acquires the shared resolver, registering `subscriber`.
pub(crate) async fn acquire(subscriber: usize) -> Result<Arc<DnsConn>> {
    let mut shared = SHARED_RESOLVER.lock().await;
    let conn = match &shared.conn {
        Some(conn) => Arc::clone(conn),
        None => {
            let addr = if cfg!(target_os = "linux") {
                SocketAddr::from_str(DEFAULT_DEST_ADDR)?
            } else {
                SocketAddr::from_str("0.0.0.0:5353")?
            };
            let conn = Arc::new(DnsConn::server(addr, Config::default())?);
            shared.conn = Some(Arc::clone(&conn));
            conn
        }
    };
    shared.subscribers.insert(subscriber);
    Ok(conn)
}

/// Unregisters a subscriber, shutting the resolver down when none remain.
pub(crate) async fn release(subscriber: usize) {
    let mut shared = SHARED_RESOLVER.lock().await;
    shared.subscribers.remove(&subscriber);
    if shared.subscribers.is_empty() {
        if let Some(conn) = shared.conn.take() {
            if let Err(err) = conn.close().await {
                log::warn!("failed to close mDNS conn: {}", err);
            }
        }
    }
}

/// Resolves an mDNS host name, returning `None` on failure or timeout.
pub(crate) async fn resolve(conn: &Arc<DnsConn>, host: &str) -> Option<IpAddr> {
    let (_close_query_signal_tx, close_query_signal_rx) = mpsc::channel(1);
    match timeout(MDNS_QUERY_TIMEOUT, conn.query(host, close_query_signal_rx)).await {
        Ok(Ok((_, src))) => Some(src.ip()),
        _ => None,
    }
}
