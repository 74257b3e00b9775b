//! TunnelGate Core Types
//!
//! Wire-level pieces of the tunnel protocol: header decoding, the identity
//! check, the connect acknowledgement, and the shared error taxonomy.

mod error;
mod header;
mod identity;
mod tunnel;
mod types;

pub use error::*;
pub use header::{decode_header, ParsedHeader};
pub use identity::{Identity, DEFAULT_TOKEN};
pub use tunnel::*;
pub use types::*;
