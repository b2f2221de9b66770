//! Resolution of the address other devices on the LAN can reach us on.
//!
//! Download links are encoded into QR codes and usually scanned by a phone, so
//! a link pointing at `localhost` is useless. When a request arrives on a
//! loopback host, the host part is swapped for the machine's LAN address as
//! reported by an `AddressResolver`.

use std::{
    fmt,
    net::{IpAddr, ToSocketAddrs, UdpSocket},
};

/// Source of the LAN-reachable address of this machine.
pub trait AddressResolver: Send + Sync + fmt::Debug {
    /// Returns `None` when no usable address can be determined.
    fn lan_address(&self) -> Option<IpAddr>;
}

/// Looks the address up from the host environment.
///
/// Tries the machine hostname first, then the local address the kernel would
/// pick for outbound traffic. Both are blocking calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAddressResolver;

impl AddressResolver for SystemAddressResolver {
    fn lan_address(&self) -> Option<IpAddr> {
        hostname_address().or_else(outbound_address)
    }
}

/// Always answers with the same value.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticAddressResolver(pub Option<IpAddr>);

impl AddressResolver for StaticAddressResolver {
    fn lan_address(&self) -> Option<IpAddr> {
        self.0
    }
}

fn hostname_address() -> Option<IpAddr> {
    let name = hostname::get().ok()?.into_string().ok()?;
    (name.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .map(|addr| addr.ip())
        .find(|ip| ip.is_ipv4() && !ip.is_loopback() && !ip.is_unspecified())
}

/// Connecting a UDP socket sends nothing; it only selects a route.
fn outbound_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// Compute the authority (`host[:port]`) to embed in download links.
///
/// - `public_host` wins when set. If it carries no port, the request port is kept.
/// - A loopback request host is replaced by the resolver's address.
/// - Anything else is returned unchanged.
pub fn public_authority(
    request_authority: &str,
    public_host: Option<&str>,
    resolver: &dyn AddressResolver,
) -> String {
    let (host, port) = split_authority(request_authority);

    if let Some(public) = public_host.filter(|p| !p.is_empty()) {
        let (public_host, public_port) = split_authority(public);
        return join_authority(public_host, public_port.or(port));
    }

    if is_loopback_host(host) {
        if let Some(ip) = resolver.lan_address() {
            return join_authority(&ip.to_string(), port);
        }
    }

    request_authority.to_string()
}

/// Absolute download link for a stored file.
pub fn download_url(authority: &str, file_id: impl fmt::Display) -> String {
    format!("http://{}/api/files/{}", authority, file_id)
}

fn split_authority(authority: &str) -> (&str, Option<&str>) {
    if let Some(rest) = authority.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            return (host, tail.strip_prefix(':').filter(|p| !p.is_empty()));
        }
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (authority, None),
    }
}

fn join_authority(host: &str, port: Option<&str>) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

fn is_loopback_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}
