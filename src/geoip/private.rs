use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

/// Loopback and RFC 1918 ranges treated as private
static PRIVATE_NETS: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    [
        (Ipv4Addr::new(10, 0, 0, 0), 8),
        (Ipv4Addr::new(172, 16, 0, 0), 12),
        (Ipv4Addr::new(192, 168, 0, 0), 16),
        (Ipv4Addr::new(127, 0, 0, 0), 8),
    ]
    .into_iter()
    .filter_map(|(addr, prefix_len)| Ipv4Net::new(addr, prefix_len).ok())
    .collect()
});

/// Check whether an address falls in one of the private ranges.
///
/// IPv4-mapped IPv6 addresses are checked against their embedded IPv4
/// address; any other IPv6 address is public.
pub fn is_private_ip(ip: IpAddr) -> bool {
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4,
            None => return false,
        },
    };
    PRIVATE_NETS.iter().any(|net| net.contains(&v4))
}
