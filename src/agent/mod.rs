#[cfg(test)]
mod agent_test;

pub mod config;

mod checks;
mod consent;
mod gather;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use mdns::conn::DnsConn;
use rand::{thread_rng, Rng};
use stun::attributes::{ATTR_ICE_CONTROLLED, ATTR_ICE_CONTROLLING, ATTR_USERNAME};
use stun::error_code::{ErrorCode, ErrorCodeAttribute, CODE_BAD_REQUEST, CODE_ROLE_CONFLICT};
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::{Getter, Message, BINDING_ERROR, BINDING_SUCCESS, METHOD_BINDING};
use stun::textattrs::Username;
use stun::xoraddr::XorMappedAddress;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use util::sync::Mutex as SyncMutex;
use util::vnet::net::Net;

use crate::attributes::{AttrControlled, AttrControlling};
use crate::candidate::{validate_remote_candidate, Candidate, CandidatePair};
use crate::endpoint::StunEndpoint;
use crate::error::{Error, Result};
use config::{validate_password, validate_username, ConnectionConfig, TransportPolicy};

pub use checks::CHECK_INTERVAL;
pub use consent::{CONSENT_FAILURES, CONSENT_INTERVAL};

/// Check-list terminal results.
pub const ICE_COMPLETED: u8 = 1;
pub const ICE_FAILED: u8 = 2;

/// Capacity of the inbound datagram queue.
const QUEUE_CAPACITY: usize = 512;

static CONNECTION_ID: AtomicUsize = AtomicUsize::new(0);

/// Events surfaced through [`Connection::get_event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection was closed, either locally or because consent expired.
    Closed,
}

/// One inbound datagram, or the transport-lost sentinel.
type QueueItem = (Option<Vec<u8>>, Option<u16>);

pub(crate) struct State {
    pub(crate) ice_controlling: bool,
    pub(crate) remote_username: Option<String>,
    pub(crate) remote_password: Option<String>,
    pub(crate) remote_is_lite: bool,

    pub(crate) components: BTreeSet<u16>,
    pub(crate) gather_started: bool,
    pub(crate) gather_done: bool,
    pub(crate) local_candidates: Vec<Candidate>,
    pub(crate) endpoints: Vec<Arc<StunEndpoint>>,

    pub(crate) remote_candidates: Vec<Candidate>,
    pub(crate) remote_candidates_end: bool,

    pub(crate) check_list: Vec<Arc<CandidatePair>>,
    pub(crate) check_list_done: bool,
    pub(crate) check_list_tx: mpsc::Sender<u8>,
    pub(crate) early_checks: Vec<(Message, SocketAddr, Arc<StunEndpoint>)>,
    pub(crate) early_checks_done: bool,
    pub(crate) nominated: HashMap<u16, Arc<CandidatePair>>,
    pub(crate) nominating: HashSet<u16>,

    pub(crate) mdns_conn: Option<Arc<DnsConn>>,
    pub(crate) event_waiter: Option<oneshot::Sender<ConnectionEvent>>,
    pub(crate) consent_task: Option<JoinHandle<()>>,
    pub(crate) closed: bool,
}

/// The state shared between the public handle, the endpoint read loops and
/// the check tasks. Cross-cutting agent state lives under a single mutex;
/// the RFC's updates span the check list, the nominated map and the role.
pub(crate) struct ConnectionInternal {
    pub(crate) id: usize,
    pub(crate) name: String,
    pub(crate) tie_breaker: u64,
    pub(crate) local_username: String,
    pub(crate) local_password: String,
    pub(crate) stun_server: Option<String>,
    pub(crate) turn_server: Option<String>,
    pub(crate) turn_username: Option<String>,
    pub(crate) turn_password: Option<String>,
    pub(crate) turn_ssl: bool,
    pub(crate) turn_transport: String,
    pub(crate) use_ipv4: bool,
    pub(crate) use_ipv6: bool,
    pub(crate) transport_policy: TransportPolicy,
    pub(crate) ephemeral_ports: Option<Vec<u16>>,
    pub(crate) net: Arc<Net>,

    pub(crate) state: Mutex<State>,
    queue_tx: mpsc::Sender<QueueItem>,
    queue_rx: Mutex<mpsc::Receiver<QueueItem>>,
    check_list_rx: Mutex<mpsc::Receiver<u8>>,
    weak_self: SyncMutex<Weak<ConnectionInternal>>,
}

impl ConnectionInternal {
    /// Returns an owning handle on the shared internal, used to hand the
    /// agent to spawned tasks. Fails only during teardown.
    pub(crate) fn upgrade(&self) -> Option<Arc<Self>> {
        self.weak_self.lock().upgrade()
    }

    /// Delivers inbound application data to the receive queue.
    ///
    /// The queue is bounded; datagrams arriving faster than the application
    /// reads are dropped.
    pub(crate) fn data_received(&self, data: Vec<u8>, component: u16) {
        if self.queue_tx.try_send((Some(data), Some(component))).is_err() {
            log::debug!("[{}]: receive queue full, dropping datagram", self.name);
        }
    }

    /// Posts the transport-lost sentinel so pending receivers unblock.
    pub(crate) fn connection_lost(&self) {
        if self.queue_tx.try_send((None, None)).is_err() {
            let queue_tx = self.queue_tx.clone();
            tokio::spawn(async move {
                let _ = queue_tx.send((None, None)).await;
            });
        }
    }

    /// Handles an inbound STUN binding request: authentication, role-conflict
    /// repair (RFC 5245 7.2.1.1), the binding response, and hand-off to the
    /// check list.
    pub(crate) async fn request_received(
        &self,
        message: Message,
        addr: SocketAddr,
        endpoint: &Arc<StunEndpoint>,
    ) {
        if message.typ.method != METHOD_BINDING {
            self.respond_error(&message, addr, endpoint, CODE_BAD_REQUEST, "Bad Request")
                .await;
            return;
        }

        let mut state = self.state.lock().await;

        if !self.authenticate(&state, &message) {
            drop(state);
            self.respond_error(&message, addr, endpoint, CODE_BAD_REQUEST, "Bad Request")
                .await;
            return;
        }

        if state.ice_controlling && message.contains(ATTR_ICE_CONTROLLING) {
            log::info!("[{}]: role conflict, expected to be controlling", self.name);
            let mut theirs = AttrControlling(0);
            let _ = theirs.get_from(&message);
            if self.tie_breaker >= theirs.0 {
                drop(state);
                self.respond_error(&message, addr, endpoint, CODE_ROLE_CONFLICT, "Role Conflict")
                    .await;
                return;
            }
            self.switch_role(&mut state, false);
        } else if !state.ice_controlling && message.contains(ATTR_ICE_CONTROLLED) {
            log::info!("[{}]: role conflict, expected to be controlled", self.name);
            let mut theirs = AttrControlled(0);
            let _ = theirs.get_from(&message);
            if self.tie_breaker < theirs.0 {
                drop(state);
                self.respond_error(&message, addr, endpoint, CODE_ROLE_CONFLICT, "Role Conflict")
                    .await;
                return;
            }
            self.switch_role(&mut state, true);
        }

        let mut response = Message::new();
        let result = response.build(&[
            Box::new(message.clone()),
            Box::new(BINDING_SUCCESS),
            Box::new(XorMappedAddress {
                ip: addr.ip(),
                port: addr.port(),
            }),
            Box::new(MessageIntegrity::new_short_term_integrity(
                self.local_password.clone(),
            )),
            Box::new(FINGERPRINT),
        ]);
        match result {
            Ok(()) => {
                let _ = endpoint.send_stun(&response, addr).await;
            }
            Err(err) => {
                log::warn!("[{}]: failed to build binding response: {}", self.name, err);
                return;
            }
        }

        if state.check_list.is_empty() && !state.early_checks_done {
            state.early_checks.push((message, addr, Arc::clone(endpoint)));
        } else {
            self.check_incoming(&mut state, &message, addr, endpoint);
        }
    }

    /// Re-parses the raw request bytes against the local password and checks
    /// the USERNAME when the remote ufrag is already known.
    fn authenticate(&self, state: &State, message: &Message) -> bool {
        let mut request = Message::new();
        request.raw = message.raw.clone();
        if request.decode().is_err() {
            return false;
        }
        let integrity = MessageIntegrity::new_short_term_integrity(self.local_password.clone());
        if let Err(err) = integrity.check(&mut request) {
            log::debug!("[{}]: integrity check failed: {}", self.name, err);
            return false;
        }

        if let Some(remote_username) = &state.remote_username {
            let expected = format!("{}:{}", self.local_username, remote_username);
            let mut username = Username::new(ATTR_USERNAME, String::new());
            if username.get_from(message).is_err() || username.to_string() != expected {
                log::debug!("[{}]: username mismatch", self.name);
                return false;
            }
        }
        true
    }

    pub(crate) async fn respond_error(
        &self,
        request: &Message,
        addr: SocketAddr,
        endpoint: &Arc<StunEndpoint>,
        code: ErrorCode,
        reason: &str,
    ) {
        let mut response = Message::new();
        let result = response.build(&[
            Box::new(request.clone()),
            Box::new(BINDING_ERROR),
            Box::new(ErrorCodeAttribute {
                code,
                reason: reason.as_bytes().to_vec(),
            }),
            Box::new(MessageIntegrity::new_short_term_integrity(
                self.local_password.clone(),
            )),
            Box::new(FINGERPRINT),
        ]);
        match result {
            Ok(()) => {
                let _ = endpoint.send_stun(&response, addr).await;
            }
            Err(err) => log::warn!("[{}]: failed to build error response: {}", self.name, err),
        }
    }

    async fn mdns_conn(&self) -> Result<Arc<DnsConn>> {
        {
            let state = self.state.lock().await;
            if let Some(conn) = &state.mdns_conn {
                return Ok(Arc::clone(conn));
            }
        }
        let conn = crate::mdns::acquire(self.id).await?;
        let mut state = self.state.lock().await;
        state.mdns_conn = Some(Arc::clone(&conn));
        Ok(conn)
    }

    pub(crate) async fn add_remote_candidate(&self, remote_candidate: Option<Candidate>) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.remote_candidates_end {
                return Err(Error::ErrEndOfCandidates);
            }
        }

        let mut remote_candidate = match remote_candidate {
            Some(c) => c,
            None => {
                // end-of-candidates: drop the components the remote never
                // referenced, they cannot be negotiated.
                let mut state = self.state.lock().await;
                let seen: BTreeSet<u16> =
                    state.remote_candidates.iter().map(|c| c.component).collect();
                let missing: Vec<u16> = state.components.difference(&seen).copied().collect();
                if !missing.is_empty() {
                    log::info!(
                        "[{}]: components {:?} have no candidate pairs",
                        self.name,
                        missing
                    );
                    let active: BTreeSet<u16> =
                        state.components.intersection(&seen).copied().collect();
                    state.components = active;
                }
                state.remote_candidates_end = true;
                return Ok(());
            }
        };

        if crate::mdns::is_mdns_hostname(&remote_candidate.host) {
            let conn = match self.mdns_conn().await {
                Ok(conn) => conn,
                Err(err) => {
                    log::info!("[{}]: mDNS resolver unavailable: {}", self.name, err);
                    return Ok(());
                }
            };
            match crate::mdns::resolve(&conn, &remote_candidate.host).await {
                Some(ip) => {
                    log::info!(
                        "[{}]: remote candidate \"{}\" resolved to {}",
                        self.name,
                        remote_candidate.host,
                        ip
                    );
                    remote_candidate.host = ip.to_string();
                }
                None => {
                    log::info!(
                        "[{}]: remote candidate \"{}\" could not be resolved",
                        self.name,
                        remote_candidate.host
                    );
                    return Ok(());
                }
            }
        }

        if let Err(err) = validate_remote_candidate(&remote_candidate) {
            log::info!(
                "[{}]: remote candidate \"{}\" is not valid: {}",
                self.name,
                remote_candidate.host,
                err
            );
            return Ok(());
        }

        let mut state = self.state.lock().await;
        state.remote_candidates.push(remote_candidate.clone());
        self.pair_remote_candidate(&mut state, &remote_candidate);
        self.sort_check_list(&mut state);
        Ok(())
    }

    /// Performs the ICE handshake; see [`Connection::connect`].
    pub(crate) async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.gather_done {
                return Err(Error::ErrGatheringNotDone);
            }
            if state.remote_username.is_none() || state.remote_password.is_none() {
                return Err(Error::ErrRemoteCredentials);
            }

            // 5.7.1. Forming Candidate Pairs
            let remote_candidates = state.remote_candidates.clone();
            for remote_candidate in &remote_candidates {
                self.pair_remote_candidate(&mut state, remote_candidate);
            }
            self.sort_check_list(&mut state);
            self.unfreeze_initial(&mut state);

            // replay the checks that arrived before the check list existed
            let early_checks = std::mem::take(&mut state.early_checks);
            state.early_checks_done = true;
            for (message, addr, endpoint) in early_checks {
                self.check_incoming(&mut state, &message, addr, &endpoint);
            }
        }

        loop {
            let keep_going = {
                let mut state = self.state.lock().await;
                self.check_periodic(&mut state)
            };
            if !keep_going {
                break;
            }
            tokio::time::sleep(CHECK_INTERVAL).await;
        }

        let res = {
            let check_list_empty = { self.state.lock().await.check_list.is_empty() };
            if check_list_empty {
                ICE_FAILED
            } else {
                let mut check_list_rx = self.check_list_rx.lock().await;
                check_list_rx.recv().await.unwrap_or(ICE_FAILED)
            }
        };

        // cancel the remaining in-flight checks
        let tasks: Vec<JoinHandle<()>> = {
            let state = self.state.lock().await;
            state
                .check_list
                .iter()
                .filter_map(|pair| pair.task.lock().take())
                .collect()
        };
        for task in tasks {
            task.abort();
        }

        if res != ICE_COMPLETED {
            return Err(Error::ErrNegotiationFailed);
        }

        // start consent freshness tests
        if let Some(internal) = self.upgrade() {
            let task = tokio::spawn(async move { internal.query_consent().await });
            self.state.lock().await.consent_task = Some(task);
        }
        Ok(())
    }

    pub(crate) async fn close(&self) -> Result<()> {
        let consent_task = {
            let mut state = self.state.lock().await;
            state.consent_task.take()
        };
        if let Some(task) = consent_task {
            task.abort();
            let _ = task.await;
        }

        let (endpoints, tasks, had_mdns) = {
            let mut state = self.state.lock().await;
            if !state.check_list.is_empty() && !state.check_list_done {
                let _ = state.check_list_tx.try_send(ICE_FAILED);
            }
            let tasks: Vec<JoinHandle<()>> = state
                .check_list
                .iter()
                .filter_map(|pair| pair.task.lock().take())
                .collect();
            state.nominated.clear();
            state.local_candidates.clear();
            let endpoints = std::mem::take(&mut state.endpoints);
            let had_mdns = state.mdns_conn.take().is_some();
            (endpoints, tasks, had_mdns)
        };

        for task in tasks {
            task.abort();
        }
        if had_mdns {
            crate::mdns::release(self.id).await;
        }
        for endpoint in endpoints {
            let _ = endpoint.close().await;
        }

        let mut state = self.state.lock().await;
        if !state.closed {
            state.closed = true;
            if let Some(waiter) = state.event_waiter.take() {
                let _ = waiter.send(ConnectionEvent::Closed);
            }
        }
        Ok(())
    }

    pub(crate) async fn get_event(&self) -> Result<Option<ConnectionEvent>> {
        let event_rx = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Ok(None);
            }
            if let Some(waiter) = &state.event_waiter {
                if !waiter.is_closed() {
                    return Err(Error::ErrAlreadyAwaitingEvent);
                }
            }
            let (tx, rx) = oneshot::channel();
            state.event_waiter = Some(tx);
            rx
        };

        match event_rx.await {
            Ok(event) => Ok(Some(event)),
            Err(_) => Ok(None),
        }
    }

    pub(crate) async fn sendto(&self, data: &[u8], component: u16) -> Result<()> {
        let (endpoint, remote_addr) = {
            let state = self.state.lock().await;
            match state.nominated.get(&component) {
                Some(pair) => (Arc::clone(&pair.endpoint), pair.remote_addr()),
                None => return Err(Error::ErrNotConnected),
            }
        };
        endpoint.send_data(data, remote_addr).await
    }

    pub(crate) async fn recvfrom(&self) -> Result<(Vec<u8>, u16)> {
        {
            let state = self.state.lock().await;
            if state.nominated.is_empty() {
                return Err(Error::ErrNotConnected);
            }
        }
        let mut queue_rx = self.queue_rx.lock().await;
        match queue_rx.recv().await {
            Some((Some(data), Some(component))) => Ok((data, component)),
            _ => Err(Error::ErrConnectionLost),
        }
    }

    pub(crate) async fn set_selected_pair(
        &self,
        component: u16,
        local_foundation: &str,
        remote_foundation: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let endpoint = state
            .endpoints
            .iter()
            .find(|e| {
                e.component() == component && e.local_candidate().foundation == local_foundation
            })
            .cloned()
            .ok_or(Error::ErrCandidateNotFound)?;
        let remote_candidate = state
            .remote_candidates
            .iter()
            .find(|c| c.component == component && c.foundation == remote_foundation)
            .cloned()
            .ok_or(Error::ErrCandidateNotFound)?;

        let pair = Arc::new(CandidatePair::new(endpoint, remote_candidate)?);
        state.nominated.insert(component, pair);
        Ok(())
    }
}

/// An ICE connection for a single media stream.
///
/// The usual life cycle is: construct, [`gather_candidates`], exchange
/// candidates and credentials over signaling, [`connect`], then [`send`]
/// and [`recv`] application datagrams until [`close`].
///
/// [`gather_candidates`]: Connection::gather_candidates
/// [`connect`]: Connection::connect
/// [`send`]: Connection::send
/// [`recv`]: Connection::recv
/// [`close`]: Connection::close
pub struct Connection {
    pub(crate) internal: Arc<ConnectionInternal>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.components < 1 || config.components > 256 {
            return Err(Error::ErrInvalidComponents);
        }

        let local_username = match config.local_username {
            Some(username) => {
                validate_username(&username)?;
                username
            }
            None => crate::rand::generate_ufrag(),
        };
        let local_password = match config.local_password {
            Some(password) => {
                validate_password(&password)?;
                password
            }
            None => crate::rand::generate_pwd(),
        };

        if config.stun_server.is_none()
            && config.turn_server.is_none()
            && config.transport_policy == TransportPolicy::Relay
        {
            return Err(Error::ErrRelayPolicyRequiresServer);
        }

        let id = CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (check_list_tx, check_list_rx) = mpsc::channel(4);

        let internal = Arc::new(ConnectionInternal {
            id,
            name: format!("ice-{}", id),
            tie_breaker: thread_rng().gen::<u64>(),
            local_username,
            local_password,
            stun_server: config.stun_server,
            turn_server: config.turn_server,
            turn_username: config.turn_username,
            turn_password: config.turn_password,
            turn_ssl: config.turn_ssl,
            turn_transport: config.turn_transport,
            use_ipv4: config.use_ipv4,
            use_ipv6: config.use_ipv6,
            transport_policy: config.transport_policy,
            ephemeral_ports: config.ephemeral_ports,
            net: Arc::new(Net::new(None)),
            state: Mutex::new(State {
                ice_controlling: config.ice_controlling,
                remote_username: None,
                remote_password: None,
                remote_is_lite: false,
                components: (1..=config.components).collect(),
                gather_started: false,
                gather_done: false,
                local_candidates: vec![],
                endpoints: vec![],
                remote_candidates: vec![],
                remote_candidates_end: false,
                check_list: vec![],
                check_list_done: false,
                check_list_tx,
                early_checks: vec![],
                early_checks_done: false,
                nominated: HashMap::new(),
                nominating: HashSet::new(),
                mdns_conn: None,
                event_waiter: None,
                consent_task: None,
                closed: false,
            }),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            check_list_rx: Mutex::new(check_list_rx),
            weak_self: SyncMutex::new(Weak::new()),
        });
        *internal.weak_self.lock() = Arc::downgrade(&internal);

        Ok(Self { internal })
    }

    /// Local username fragment, fixed at construction time.
    pub fn local_username(&self) -> &str {
        &self.internal.local_username
    }

    /// Local password, fixed at construction time.
    pub fn local_password(&self) -> &str {
        &self.internal.local_password
    }

    /// Local candidates, populated by [`gather_candidates`](Self::gather_candidates).
    pub async fn local_candidates(&self) -> Vec<Candidate> {
        self.internal.state.lock().await.local_candidates.clone()
    }

    /// Remote candidates received through
    /// [`add_remote_candidate`](Self::add_remote_candidate), plus any
    /// peer-reflexive candidates learned from inbound checks.
    pub async fn remote_candidates(&self) -> Vec<Candidate> {
        self.internal.state.lock().await.remote_candidates.clone()
    }

    /// Sets the credentials of the remote agent.
    pub async fn set_remote_credentials(&self, username: &str, password: &str) {
        let mut state = self.internal.state.lock().await;
        state.remote_username = Some(username.to_owned());
        state.remote_password = Some(password.to_owned());
    }

    /// Declares whether the remote agent is an ICE Lite implementation.
    pub async fn set_remote_is_lite(&self, lite: bool) {
        self.internal.state.lock().await.remote_is_lite = lite;
    }

    /// Gathers local candidates. Must complete before [`connect`](Self::connect);
    /// only the first call does anything.
    pub async fn gather_candidates(&self) -> Result<()> {
        self.internal.gather_candidates().await
    }

    /// Returns the default local candidate for `component`, the one offered
    /// to peers that do not perform connectivity checks.
    pub async fn get_default_candidate(&self, component: u16) -> Option<Candidate> {
        let state = self.internal.state.lock().await;
        let mut candidates: Vec<&Candidate> = state
            .local_candidates
            .iter()
            .filter(|c| c.component == component)
            .collect();
        candidates.sort_by_key(|c| c.priority);
        candidates.first().map(|c| (*c).clone())
    }

    /// Adds a remote candidate, or signals end-of-candidates when given
    /// `None`. Fails once end-of-candidates has been signaled.
    pub async fn add_remote_candidate(&self, remote_candidate: Option<Candidate>) -> Result<()> {
        self.internal.add_remote_candidate(remote_candidate).await
    }

    /// Performs the ICE handshake: runs ordered connectivity checks until a
    /// pair is nominated for every active component, then starts consent
    /// freshness. Fails when the check list is exhausted first.
    pub async fn connect(&self) -> Result<()> {
        self.internal.connect().await
    }

    /// Closes the connection: stops consent, fails a pending handshake,
    /// releases the mDNS resolver and tears down every endpoint.
    pub async fn close(&self) -> Result<()> {
        self.internal.close().await
    }

    /// Sends a datagram on component 1.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.sendto(data, 1).await
    }

    /// Sends a datagram on the given component.
    pub async fn sendto(&self, data: &[u8], component: u16) -> Result<()> {
        self.internal.sendto(data, component).await
    }

    /// Receives the next datagram.
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let (data, _) = self.recvfrom().await?;
        Ok(data)
    }

    /// Receives the next datagram together with the component it arrived on.
    pub async fn recvfrom(&self) -> Result<(Vec<u8>, u16)> {
        self.internal.recvfrom().await
    }

    /// Returns the next connection event, or `None` once the connection is
    /// closed. Only one task may wait at a time.
    pub async fn get_event(&self) -> Result<Option<ConnectionEvent>> {
        self.internal.get_event().await
    }

    /// Forces the selected pair for `component`, bypassing negotiation.
    /// Meant for peers that do not speak ICE.
    pub async fn set_selected_pair(
        &self,
        component: u16,
        local_foundation: &str,
        remote_foundation: &str,
    ) -> Result<()> {
        self.internal
            .set_selected_pair(component, local_foundation, remote_foundation)
            .await
    }
}
