#[cfg(test)]
mod candidate_test;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crc::{Crc, CRC_32_ISCSI};
use serde::Serialize;
use tokio::task::JoinHandle;
use util::sync::Mutex as SyncMutex;

use crate::endpoint::StunEndpoint;
use crate::error::{Error, Result};
use crate::rand::generate_foundation;

/// The local preference used when a component has a single address per type.
pub(crate) const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

/// Represents the type of a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CandidateType {
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relay,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
        };
        write!(f, "{}", s)
    }
}

impl CandidateType {
    /// Returns the preference weight of a candidate type.
    ///
    /// RFC 5245 section 4.1.2.2: the RECOMMENDED values are 126 for host
    /// candidates, 110 for peer reflexive candidates, 100 for server
    /// reflexive candidates, and 0 for relayed candidates.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay => 0,
        }
    }
}

/// Computes the priority of a candidate (RFC 5245 section 4.1.2.1).
pub fn candidate_priority(
    component: u16,
    candidate_type: CandidateType,
    local_preference: u16,
) -> u32 {
    (1 << 24) * u32::from(candidate_type.preference())
        + (1 << 8) * u32::from(local_preference)
        + (256 - u32::from(component))
}

/// Derives the foundation of a candidate: two candidates share a foundation
/// iff they share a type, a base address and a transport (RFC 5245 4.1.1.3).
pub fn candidate_foundation(
    candidate_type: CandidateType,
    transport: &str,
    base_address: &str,
) -> String {
    let mut buf = vec![];
    buf.extend_from_slice(candidate_type.to_string().as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(transport.as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(base_address.as_bytes());

    let checksum = Crc::<u32>::new(&CRC_32_ISCSI).checksum(&buf);
    format!("{}", checksum)
}

/// One transport address the agent may use, as exchanged over signaling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub foundation: String,
    pub component: u16,
    pub transport: String,
    pub priority: u32,
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: CandidateType,
    pub related_address: Option<String>,
    pub related_port: Option<u16>,
}

impl Candidate {
    pub(crate) fn new_host(component: u16, ip: IpAddr, port: u16) -> Self {
        let host = ip.to_string();
        Self {
            foundation: candidate_foundation(CandidateType::Host, "udp", &host),
            component,
            transport: "udp".to_owned(),
            priority: candidate_priority(component, CandidateType::Host, DEFAULT_LOCAL_PREFERENCE),
            host,
            port,
            candidate_type: CandidateType::Host,
            related_address: None,
            related_port: None,
        }
    }

    pub(crate) fn new_server_reflexive(
        component: u16,
        ip: IpAddr,
        port: u16,
        base: &Candidate,
    ) -> Self {
        Self {
            foundation: candidate_foundation(CandidateType::ServerReflexive, "udp", &base.host),
            component,
            transport: "udp".to_owned(),
            priority: candidate_priority(
                component,
                CandidateType::ServerReflexive,
                DEFAULT_LOCAL_PREFERENCE,
            ),
            host: ip.to_string(),
            port,
            candidate_type: CandidateType::ServerReflexive,
            related_address: Some(base.host.clone()),
            related_port: Some(base.port),
        }
    }

    pub(crate) fn new_relay(
        component: u16,
        ip: IpAddr,
        port: u16,
        related: Option<SocketAddr>,
    ) -> Self {
        let host = ip.to_string();
        Self {
            foundation: candidate_foundation(CandidateType::Relay, "udp", &host),
            component,
            transport: "udp".to_owned(),
            priority: candidate_priority(component, CandidateType::Relay, DEFAULT_LOCAL_PREFERENCE),
            host,
            port,
            candidate_type: CandidateType::Relay,
            related_address: related.map(|a| a.ip().to_string()),
            related_port: related.map(|a| a.port()),
        }
    }

    /// Builds a candidate learned from an inbound check (RFC 5245 7.2.1.3).
    pub(crate) fn new_peer_reflexive(component: u16, addr: SocketAddr, priority: u32) -> Self {
        Self {
            foundation: generate_foundation(),
            component,
            transport: "udp".to_owned(),
            priority,
            host: addr.ip().to_string(),
            port: addr.port(),
            candidate_type: CandidateType::PeerReflexive,
            related_address: None,
            related_port: None,
        }
    }

    /// Returns the resolved transport address of the candidate.
    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Returns whether a local candidate may form a pair with a remote one:
    /// same component, same transport, same address family.
    pub fn can_pair_with(&self, other: &Candidate) -> bool {
        let (local, remote) = match (self.addr(), other.addr()) {
            (Ok(l), Ok(r)) => (l, r),
            _ => return false,
        };
        self.component == other.component
            && self.transport.eq_ignore_ascii_case(&other.transport)
            && local.is_ipv4() == remote.is_ipv4()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(addr), Some(port)) = (&self.related_address, self.related_port) {
            write!(
                f,
                "{} {}:{} related {}:{}",
                self.candidate_type, self.host, self.port, addr, port
            )
        } else {
            write!(f, "{} {}:{}", self.candidate_type, self.host, self.port)
        }
    }
}

/// Checks that a remote candidate can take part in connectivity checks.
pub(crate) fn validate_remote_candidate(candidate: &Candidate) -> Result<()> {
    match candidate.candidate_type {
        CandidateType::Host | CandidateType::ServerReflexive | CandidateType::Relay => {}
        CandidateType::PeerReflexive => return Err(Error::ErrUnsupportedCandidateType),
    }
    let _: IpAddr = candidate.host.parse()?;
    Ok(())
}

/// Represents the check state of a candidate pair (RFC 5245 5.7.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CandidatePairState {
    #[serde(rename = "frozen")]
    Frozen = 0,
    #[serde(rename = "waiting")]
    Waiting = 1,
    #[serde(rename = "in-progress")]
    InProgress = 2,
    #[serde(rename = "succeeded")]
    Succeeded = 3,
    #[serde(rename = "failed")]
    Failed = 4,
}

impl From<u8> for CandidatePairState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Waiting,
            2 => Self::InProgress,
            3 => Self::Succeeded,
            4 => Self::Failed,
            _ => Self::Frozen,
        }
    }
}

impl fmt::Display for CandidatePairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Frozen => "frozen",
            Self::Waiting => "waiting",
            Self::InProgress => "in-progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A local endpoint paired with a remote candidate: the unit of the check
/// list. The local candidate is read through the endpoint, so it stays
/// valid for as long as the endpoint lives.
pub struct CandidatePair {
    pub(crate) endpoint: Arc<StunEndpoint>,
    pub(crate) remote_candidate: Candidate,
    remote_addr: SocketAddr,
    state: AtomicU8,
    nominated: AtomicBool,
    remote_nominated: AtomicBool,
    pub(crate) task: SyncMutex<Option<JoinHandle<()>>>,
}

impl CandidatePair {
    pub(crate) fn new(endpoint: Arc<StunEndpoint>, remote_candidate: Candidate) -> Result<Self> {
        let remote_addr = remote_candidate.addr()?;
        Ok(Self {
            endpoint,
            remote_candidate,
            remote_addr,
            state: AtomicU8::new(CandidatePairState::Frozen as u8),
            nominated: AtomicBool::new(false),
            remote_nominated: AtomicBool::new(false),
            task: SyncMutex::new(None),
        })
    }

    pub fn local_candidate(&self) -> &Candidate {
        self.endpoint.local_candidate()
    }

    pub fn component(&self) -> u16 {
        self.local_candidate().component
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn state(&self) -> CandidatePairState {
        CandidatePairState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: CandidatePairState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn nominated(&self) -> bool {
        self.nominated.load(Ordering::SeqCst)
    }

    pub(crate) fn set_nominated(&self, nominated: bool) {
        self.nominated.store(nominated, Ordering::SeqCst);
    }

    pub(crate) fn remote_nominated(&self) -> bool {
        self.remote_nominated.load(Ordering::SeqCst)
    }

    pub(crate) fn set_remote_nominated(&self, nominated: bool) {
        self.remote_nominated.store(nominated, Ordering::SeqCst);
    }
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.local_candidate();
        write!(
            f,
            "{}:{} -> {}:{}",
            local.host, local.port, self.remote_candidate.host, self.remote_candidate.port
        )
    }
}

/// Computes a pair priority under the given role (RFC 5245 5.7.2).
pub fn candidate_pair_priority(local: &Candidate, remote: &Candidate, ice_controlling: bool) -> u64 {
    let (g, d) = if ice_controlling {
        (local.priority, remote.priority)
    } else {
        (remote.priority, local.priority)
    };
    (1u64 << 32) * u64::from(g.min(d)) + 2 * u64::from(g.max(d)) + u64::from(g > d)
}

/// Re-orders a check list by descending pair priority under the given role.
pub(crate) fn sort_candidate_pairs(pairs: &mut Vec<Arc<CandidatePair>>, ice_controlling: bool) {
    pairs.sort_by(|a, b| {
        let pa = candidate_pair_priority(a.local_candidate(), &a.remote_candidate, ice_controlling);
        let pb = candidate_pair_priority(b.local_candidate(), &b.remote_candidate, ice_controlling);
        pb.cmp(&pa)
    });
}
