use crate::error::{Error, Result};

/// Restricts which candidates may be used for connectivity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportPolicy {
    /// All candidate types are considered.
    All,
    /// Only candidates whose addresses pass through a STUN or TURN server
    /// are published; host candidates stay internal.
    Relay,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self::All
    }
}

/// Collects the options for a [`Connection`](crate::agent::Connection).
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Whether the local agent takes the controlling role.
    pub ice_controlling: bool,
    /// Number of components to negotiate, numbered from 1.
    pub components: u16,
    /// STUN server as a `host:port` pair, queried for server-reflexive
    /// candidates.
    pub stun_server: Option<String>,
    /// TURN server as a `host:port` pair, used to allocate a relayed
    /// candidate.
    pub turn_server: Option<String>,
    pub turn_username: Option<String>,
    pub turn_password: Option<String>,
    pub turn_ssl: bool,
    pub turn_transport: String,
    pub use_ipv4: bool,
    pub use_ipv6: bool,
    pub transport_policy: TransportPolicy,
    /// Local username fragment; a random one is generated when absent.
    pub local_username: Option<String>,
    /// Local password; a random one is generated when absent.
    pub local_password: Option<String>,
    /// Allowed local UDP ports; any ephemeral port when absent.
    pub ephemeral_ports: Option<Vec<u16>>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_controlling: false,
            components: 1,
            stun_server: None,
            turn_server: None,
            turn_username: None,
            turn_password: None,
            turn_ssl: false,
            turn_transport: "udp".to_owned(),
            use_ipv4: true,
            use_ipv6: true,
            transport_policy: TransportPolicy::default(),
            local_username: None,
            local_password: None,
            ephemeral_ports: None,
        }
    }
}

fn is_ice_chars(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/'))
}

/// Checks a username against RFC 5245 section 15.4: 4*256ice-char.
pub(crate) fn validate_username(value: &str) -> Result<()> {
    if value.len() < 4 || value.len() > 256 || !is_ice_chars(value) {
        return Err(Error::ErrInvalidUsername);
    }
    Ok(())
}

/// Checks a password against RFC 5245 section 15.4: 22*256ice-char.
pub(crate) fn validate_password(value: &str) -> Result<()> {
    if value.len() < 22 || value.len() > 256 || !is_ice_chars(value) {
        return Err(Error::ErrInvalidPassword);
    }
    Ok(())
}
