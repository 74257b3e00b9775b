use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Length of the identity token carried in every header
pub const IDENTITY_LEN: usize = 16;

/// Raw 16-byte identity token
pub type IdentityBytes = [u8; IDENTITY_LEN];

/// Address type byte: IPv4
pub const ATYP_IPV4: u8 = 0x01;

/// Address type byte: domain name
pub const ATYP_DOMAIN: u8 = 0x02;

/// Address type byte: IPv6
pub const ATYP_IPV6: u8 = 0x03;

/// Destination decoded from a tunnel header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddress {
    Ipv4(Ipv4Addr),
    /// Domain name, resolved by the outbound connector
    Domain(String),
    Ipv6(Ipv6Addr),
}

impl TargetAddress {
    /// Wire value of the address type
    pub fn address_type(&self) -> u8 {
        match self {
            Self::Ipv4(_) => ATYP_IPV4,
            Self::Domain(_) => ATYP_DOMAIN,
            Self::Ipv6(_) => ATYP_IPV6,
        }
    }
}

/// Renders the host the way the protocol describes it: dotted decimal for
/// IPv4, the verbatim name for domains, and eight uncompressed lowercase hex
/// groups for IPv6.
impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(addr) => write!(f, "{}", addr),
            Self::Domain(name) => f.write_str(name),
            Self::Ipv6(addr) => {
                let parts: Vec<String> = addr
                    .segments()
                    .iter()
                    .map(|segment| format!("{:x}", segment))
                    .collect();
                f.write_str(&parts.join(":"))
            }
        }
    }
}
