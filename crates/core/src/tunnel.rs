//! Connect acknowledgement
//!
//! After the outbound connect attempt resolves the server answers with two
//! bytes: the version byte from the request header and a status byte.

/// Acknowledgement status: outbound stream connected
pub const STATUS_OK: u8 = 0x00;

/// Acknowledgement status: outbound connect failed
pub const STATUS_ERROR: u8 = 0x01;

/// Two-byte reply sent once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub version: u8,
    pub status: u8,
}

impl Ack {
    pub fn ok(version: u8) -> Self {
        Self { version, status: STATUS_OK }
    }

    pub fn error(version: u8) -> Self {
        Self { version, status: STATUS_ERROR }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.version, self.status]
    }
}
