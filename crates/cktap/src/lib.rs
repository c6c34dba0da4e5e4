//! Coinkite Tap protocol for SATSCARD and TAPSIGNER cards.
//!
//! [`CardSession`] drives a card over any [`CardTransport`]. [`CborTransport`] adapts a
//! byte level [`ApduLink`] (an NFC reader or, with the `emulator` feature, the desktop
//! emulator socket) into one.

mod card;
pub mod codec;
pub mod commands;
mod config;
mod constants;
pub mod crypto;
mod error;
mod message;
mod session;
mod transport;
mod types;
mod validation;
pub mod verify;

pub use card::CardSession;
pub use codec::{ApduLink, CborTransport, Framing};
#[cfg(all(feature = "emulator", unix))]
pub use codec::{DEFAULT_EMULATOR_PIPE, SocketLink};
pub use config::{AddressMode, FactoryRoot, SessionConfig};
pub use error::{
    CapabilityError, CardError, Error, ProtocolError, Result, ValidationError, VerificationError,
};
pub use message::Message;
pub use session::{AuthArgs, SessionKey, derive_session_key};
pub use transport::{CardTransport, Exchange, StatusWord, TransportError};
pub use types::*;
pub use validation::{
    Cvc, parse_path, path_to_string, validate_derivation_path, validate_digest, validate_subpath,
};

pub use constants::*;
