//! Tunnel header decoding
//!
//! The first message of every session starts with a fixed binary prologue:
//!
//! ```text
//! VER (1) | ID (16) | ADDON_LEN (1) | ADDON (ADDON_LEN) | CMD (1)
//!         | PORT (2, big-endian) | ATYP (1) | ADDR (variable) | payload...
//! ```
//!
//! `ADDR` is 4 bytes for IPv4, 16 bytes for IPv6, or a length byte followed
//! by that many bytes of UTF-8 for a domain name. Whatever follows the
//! address is application data destined for the outbound stream.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::{
    HeaderError, IdentityBytes, TargetAddress, ATYP_DOMAIN, ATYP_IPV4, ATYP_IPV6, IDENTITY_LEN,
};

/// Fields decoded from the first inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Protocol version, echoed back in the acknowledgement
    pub version: u8,
    /// Identity token claimed by the peer
    pub identity: IdentityBytes,
    /// Length of the skipped addon region
    pub addon_len: u8,
    /// Command byte (recorded, not interpreted)
    pub command: u8,
    /// Destination port
    pub port: u16,
    /// Destination address
    pub address: TargetAddress,
    /// Index into the message where application data begins
    pub payload_offset: usize,
}

impl ParsedHeader {
    /// Application data that trails the header in `msg`.
    ///
    /// `msg` must be the message this header was decoded from.
    pub fn payload<'a>(&self, msg: &'a [u8]) -> &'a [u8] {
        msg.get(self.payload_offset..).unwrap_or(&[])
    }
}

/// Bounds-checked forward cursor over the header bytes
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], HeaderError> {
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or(HeaderError::Truncated {
            field,
            need: end,
            have: self.buf.len(),
        })?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, HeaderError> {
        Ok(self.take(1, field)?[0])
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], HeaderError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }
}

/// Decode the tunnel header at the start of `msg`.
///
/// Pure: no I/O, no allocation beyond the domain string. Any field that would
/// read past the end of `msg`, an unknown address type, or an unusable domain
/// name yields an error and no header.
pub fn decode_header(msg: &[u8]) -> Result<ParsedHeader, HeaderError> {
    let mut cur = Cursor::new(msg);

    let version = cur.u8("version")?;
    let identity: IdentityBytes = cur.array::<IDENTITY_LEN>("identity")?;
    let addon_len = cur.u8("addon length")?;
    cur.take(addon_len as usize, "addon")?;
    let command = cur.u8("command")?;
    let port = u16::from_be_bytes(cur.array::<2>("port")?);

    let address = match cur.u8("address type")? {
        ATYP_IPV4 => TargetAddress::Ipv4(Ipv4Addr::from(cur.array::<4>("ipv4 address")?)),
        ATYP_DOMAIN => {
            let len = cur.u8("domain length")? as usize;
            if len == 0 {
                return Err(HeaderError::EmptyDomain);
            }
            let raw = cur.take(len, "domain")?;
            let name = std::str::from_utf8(raw).map_err(|_| HeaderError::InvalidDomain)?;
            TargetAddress::Domain(name.to_string())
        }
        ATYP_IPV6 => TargetAddress::Ipv6(Ipv6Addr::from(cur.array::<16>("ipv6 address")?)),
        other => return Err(HeaderError::UnknownAddressType(other)),
    };

    Ok(ParsedHeader {
        version,
        identity,
        addon_len,
        command,
        port,
        address,
        payload_offset: cur.pos,
    })
}
