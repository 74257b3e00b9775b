//! TunnelGate Exit
//!
//! Server-side tunnel endpoint: authenticates the first message of an
//! inbound connection, dials the requested destination, and relays bytes
//! both ways until either side goes away.
//!
//! ## Responsibilities
//!
//! 1. Decode the tunnel header and check the peer's identity
//! 2. Open the outbound TCP stream and acknowledge the result
//! 3. Relay inbound messages and outbound reads concurrently
//! 4. Tear both endpoints down exactly once

mod connector;
mod relay;
mod session;
mod transport;

pub use connector::{Connect, TcpConnector, DEFAULT_CONNECT_TIMEOUT};
pub use relay::{relay, RelayEnd, RelayReport, Teardown, RELAY_BUFFER_SIZE};
pub use session::{SessionHandler, SessionOutcome, SessionState, SessionSummary};
pub use transport::{
    CloseNotice, Frame, CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, MAX_CLOSE_REASON_LEN,
};
