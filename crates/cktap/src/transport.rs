//! Transport layer for card communication
//!
//! The protocol engine only needs to hand a command name plus argument map to the card
//! and get a status word plus response map back. Readers, emulators and test doubles
//! implement [`CardTransport`].

use std::fmt;

use async_trait::async_trait;

use crate::constants::SW_OKAY;
use crate::message::Message;

/// Status Word (SW1-SW2) trailing every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// The one status word meaning success (90 00)
    pub const OK: Self = Self(SW_OKAY);

    /// Create from the two trailing response bytes
    pub const fn from_bytes(sw1: u8, sw2: u8) -> Self {
        Self(((sw1 as u16) << 8) | (sw2 as u16))
    }

    /// Check if this status word indicates success
    pub const fn is_success(&self) -> bool {
        self.0 == SW_OKAY
    }

    /// SW1 and SW2 as bytes
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// One request/response round-trip
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Status word trailing the response
    pub status: StatusWord,
    /// Decoded response map
    pub response: Message,
}

impl Exchange {
    /// Successful exchange with the given response
    pub const fn ok(response: Message) -> Self {
        Self {
            status: StatusWord::OK,
            response,
        }
    }
}

/// Transport error type
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the card
    #[error("Failed to connect to card")]
    Connection,

    /// Transport used before `connect`
    #[error("Not connected")]
    NotConnected,

    /// Failed to exchange data
    #[error("Failed to transmit data")]
    Transmission,

    /// Command frame too large for a short APDU
    #[error("Command too long: {0} bytes")]
    CommandTooLong(usize),

    /// Frame could not be encoded/decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// I/O error from the underlying link
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

/// Trait for card transport connections
///
/// A transport carries exactly one exchange at a time.
#[async_trait]
pub trait CardTransport: fmt::Debug + Send {
    /// Open the link to the card
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Release the link
    async fn disconnect(&mut self);

    /// Select the applet; the card answers with its status map
    async fn select(&mut self) -> Result<Exchange, TransportError>;

    /// Send one command with its arguments and wait for the response
    async fn transceive(
        &mut self,
        command: &str,
        args: Message,
    ) -> Result<Exchange, TransportError>;
}
