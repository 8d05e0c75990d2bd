use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use stun::agent::TransactionId;
use stun::message::{Getter, Message, BINDING_REQUEST};
use stun::xoraddr::XorMappedAddress;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use util::Conn;
use waitgroup::WaitGroup;

use crate::candidate::Candidate;
use crate::endpoint::StunEndpoint;
use crate::error::{Error, Result};
use crate::util::{bind_udp, host_addresses};

use super::{ConnectionInternal, TransportPolicy};

/// Deadline for server-reflexive and relayed discovery.
const GATHER_TIMEOUT: Duration = Duration::from_secs(5);

impl ConnectionInternal {
    pub(crate) async fn gather_candidates(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.gather_started {
                return Ok(());
            }
            state.gather_started = true;
        }

        let addresses = host_addresses(&self.net, self.use_ipv4, self.use_ipv6).await;
        let components: Vec<u16> = {
            let state = self.state.lock().await;
            state.components.iter().copied().collect()
        };

        let mut handles = vec![];
        for component in components {
            let internal = match self.upgrade() {
                Some(internal) => internal,
                None => break,
            };
            let addresses = addresses.clone();
            handles.push(tokio::spawn(async move {
                internal
                    .gather_component_candidates(component, addresses)
                    .await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.state.lock().await.gather_done = true;
        Ok(())
    }

    async fn gather_component_candidates(self: Arc<Self>, component: u16, addresses: Vec<IpAddr>) {
        // host candidates, one endpoint per address
        let mut host_endpoints = vec![];
        for address in addresses {
            let conn = match bind_udp(&self.net, address, &self.ephemeral_ports).await {
                Ok(conn) => conn,
                Err(err) => {
                    log::info!("[{}]: could not bind to {}: {}", self.name, address, err);
                    continue;
                }
            };
            let local_addr = match conn.local_addr() {
                Ok(addr) => addr,
                Err(err) => {
                    log::warn!("[{}]: could not get local addr: {}", self.name, err);
                    continue;
                }
            };

            let candidate = Candidate::new_host(component, local_addr.ip(), local_addr.port());
            let endpoint = StunEndpoint::start(candidate.clone(), conn, None, Arc::clone(&self));
            host_endpoints.push(Arc::clone(&endpoint));

            let mut state = self.state.lock().await;
            state.endpoints.push(endpoint);
            // under the relay policy host candidates back the STUN machinery
            // but are not published
            if self.transport_policy == TransportPolicy::All {
                state.local_candidates.push(candidate);
            }
        }

        // server-reflexive and relayed candidates in parallel, under a
        // shared deadline; what does not finish in time is cancelled
        let wg = WaitGroup::new();
        let (results_tx, mut results_rx) =
            mpsc::channel::<(Candidate, Option<Arc<StunEndpoint>>)>(host_endpoints.len() + 1);
        let mut tasks: Vec<JoinHandle<()>> = vec![];

        if let Some(stun_server) = &self.stun_server {
            for endpoint in &host_endpoints {
                // server-reflexive discovery is IPv4 only
                let is_ipv4 = matches!(endpoint.local_candidate().addr(), Ok(a) if a.is_ipv4());
                if !is_ipv4 {
                    continue;
                }

                let internal = Arc::clone(&self);
                let endpoint = Arc::clone(endpoint);
                let stun_server = stun_server.clone();
                let results_tx = results_tx.clone();
                let worker = wg.worker();
                tasks.push(tokio::spawn(async move {
                    let _worker = worker;
                    match internal
                        .server_reflexive_candidate(&endpoint, &stun_server)
                        .await
                    {
                        Ok(candidate) => {
                            let _ = results_tx.send((candidate, None)).await;
                        }
                        Err(err) => log::info!(
                            "[{}]: could not get server reflexive address from {}: {}",
                            internal.name,
                            stun_server,
                            err
                        ),
                    }
                }));
            }
        }

        if self.turn_server.is_some() {
            let internal = Arc::clone(&self);
            let results_tx = results_tx.clone();
            let worker = wg.worker();
            tasks.push(tokio::spawn(async move {
                let _worker = worker;
                match internal.relayed_candidate(component).await {
                    Ok((candidate, endpoint)) => {
                        let _ = results_tx.send((candidate, Some(endpoint))).await;
                    }
                    Err(err) => log::info!("[{}]: TURN allocation failed: {}", internal.name, err),
                }
            }));
        }
        drop(results_tx);

        if tasks.is_empty() {
            return;
        }
        if timeout(GATHER_TIMEOUT, wg.wait()).await.is_err() {
            for task in &tasks {
                task.abort();
            }
        }
        while let Ok((candidate, endpoint)) = results_rx.try_recv() {
            let mut state = self.state.lock().await;
            if let Some(endpoint) = endpoint {
                state.endpoints.push(endpoint);
            }
            state.local_candidates.push(candidate);
        }
    }

    /// Queries the STUN server through an existing host endpoint to learn a
    /// server-reflexive candidate.
    async fn server_reflexive_candidate(
        &self,
        endpoint: &Arc<StunEndpoint>,
        stun_server: &str,
    ) -> Result<Candidate> {
        let server_addr = self.net.resolve_addr(true, stun_server).await?;

        let mut request = Message::new();
        request.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])?;
        let (response, _) = endpoint.request(request, server_addr, None, None).await?;

        let mut mapped = XorMappedAddress::default();
        mapped.get_from(&response)?;

        let local = endpoint.local_candidate();
        Ok(Candidate::new_server_reflexive(
            local.component,
            mapped.ip,
            mapped.port,
            local,
        ))
    }

    /// Allocates a relayed transport on the TURN server and wraps it in an
    /// endpoint whose candidate advertises the relayed address.
    async fn relayed_candidate(&self, component: u16) -> Result<(Candidate, Arc<StunEndpoint>)> {
        let turn_server = self
            .turn_server
            .clone()
            .ok_or_else(|| Error::Other("no TURN server configured".to_owned()))?;
        if self.turn_ssl || self.turn_transport != "udp" {
            return Err(Error::Other(format!(
                "unsupported TURN transport {}{}",
                self.turn_transport,
                if self.turn_ssl { " over TLS" } else { "" }
            )));
        }

        let loc_conn = self.net.bind(SocketAddr::from_str("0.0.0.0:0")?).await?;
        let fallback_related = loc_conn.local_addr().ok();

        let config = turn::client::ClientConfig {
            stun_serv_addr: turn_server.clone(),
            turn_serv_addr: turn_server,
            username: self.turn_username.clone().unwrap_or_default(),
            password: self.turn_password.clone().unwrap_or_default(),
            realm: String::new(),
            software: String::new(),
            rto_in_ms: 0,
            conn: loc_conn,
            vnet: Some(Arc::clone(&self.net)),
        };
        let client = Arc::new(turn::client::Client::new(config).await?);
        if let Err(err) = client.listen().await {
            let _ = client.close().await;
            return Err(err.into());
        }

        let relay_conn: Arc<dyn Conn + Send + Sync> = match client.allocate().await {
            Ok(conn) => Arc::new(conn),
            Err(err) => {
                let _ = client.close().await;
                return Err(err.into());
            }
        };
        let relayed_addr = relay_conn.local_addr()?;

        // the related address is the server-reflexive one when the TURN
        // server will tell us, the local base otherwise
        let related_addr = match client.send_binding_request().await {
            Ok(addr) => Some(addr),
            Err(_) => fallback_related,
        };

        let candidate = Candidate::new_relay(
            component,
            relayed_addr.ip(),
            relayed_addr.port(),
            related_addr,
        );
        let receiver = self.upgrade().ok_or(Error::ErrClosed)?;
        let endpoint = StunEndpoint::start(candidate.clone(), relay_conn, Some(client), receiver);
        Ok((candidate, endpoint))
    }
}
