//! Peer authentication
//!
//! The expected identity is derived once from a UUID-like token. Hyphens are
//! ignored and the remaining 32 characters are decoded as hex.

use std::fmt;
use std::str::FromStr;

use subtle::ConstantTimeEq;

use crate::{IdentityBytes, Result, TunnelError, IDENTITY_LEN};

/// Built-in token used when none is configured.
///
/// Publicly known, so anyone can authenticate against a server using it.
/// Testing only.
pub const DEFAULT_TOKEN: &str = "a530341a-2b1e-4e2f-b196-bf2aca5b755f";

/// Expected identity for every session on this server.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    bytes: IdentityBytes,
}

impl Identity {
    /// Parse a token such as `a530341a-2b1e-4e2f-b196-bf2aca5b755f`
    pub fn from_token(token: &str) -> Result<Self> {
        let digits: String = token.chars().filter(|c| *c != '-').collect();
        let raw = hex::decode(&digits).map_err(|e| TunnelError::InvalidIdentity(e.to_string()))?;
        let bytes: IdentityBytes = raw.try_into().map_err(|raw: Vec<u8>| {
            TunnelError::InvalidIdentity(format!(
                "expected {} bytes, got {}",
                IDENTITY_LEN,
                raw.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: IdentityBytes) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &IdentityBytes {
        &self.bytes
    }

    /// Whether this is the publicly known default token
    pub fn is_default(&self) -> bool {
        Self::from_token(DEFAULT_TOKEN)
            .map(|default| default == *self)
            .unwrap_or(false)
    }

    /// Check a claimed identity in constant time.
    pub fn verify(&self, claimed: &IdentityBytes) -> Result<()> {
        if bool::from(self.bytes[..].ct_eq(&claimed[..])) {
            Ok(())
        } else {
            Err(TunnelError::AuthenticationFailed)
        }
    }
}

impl FromStr for Identity {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s)
    }
}

// Never print the secret.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Identity(<redacted>)")
    }
}
