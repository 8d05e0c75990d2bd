
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use util::vnet::net::*;
use util::Conn;

use crate::error::{Error, Result};

/// Returns the addresses of the non-loopback local adapters, honoring the
/// IPv4/IPv6 switches.
pub(crate) async fn host_addresses(net: &Arc<Net>, use_ipv4: bool, use_ipv6: bool) -> Vec<IpAddr> {
    let mut addresses = vec![];
    for iface in net.get_interfaces().await {
        for ipnet in iface.addrs() {
            let ip = ipnet.addr();
            if ip.is_loopback() {
                continue;
            }
            if (ip.is_ipv4() && use_ipv4) || (ip.is_ipv6() && use_ipv6) {
                addresses.push(ip);
            }
        }
    }
    addresses
}

/// Binds a UDP socket on `ip`, trying the allowed ports in order when an
/// ephemeral port list is configured.
pub(crate) async fn bind_udp(
    net: &Arc<Net>,
    ip: IpAddr,
    ephemeral_ports: &Option<Vec<u16>>,
) -> Result<Arc<dyn Conn + Send + Sync>> {
    let ports = match ephemeral_ports {
        Some(ports) => ports,
        None => return Ok(net.bind(SocketAddr::new(ip, 0)).await?),
    };

    for &port in ports {
        match net.bind(SocketAddr::new(ip, port)).await {
            Ok(conn) => return Ok(conn),
            Err(err) => log::debug!("failed to listen {}:{}: {}", ip, port, err),
        }
    }
    Err(Error::ErrPort)
}
