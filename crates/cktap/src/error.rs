use crate::transport::{StatusWord, TransportError};
use crate::types::CardKind;

/// Result type for card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reader/NFC failure, surfaced unmodified
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The card broke the protocol; the session should be abandoned
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Command not available for this card or slot state
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Caller input rejected before talking to the card
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A cryptographic proof from the card did not hold up
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Application level error reported by the card
    #[error(transparent)]
    Card(#[from] CardError),

    /// `sign_digest` gave up
    #[error("Failed to sign digest after {attempts} attempts, try again")]
    SigningExhausted {
        /// Number of attempts made
        attempts: usize,
    },
}

impl Error {
    /// Error code reported by the card, if any
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Card(e) => Some(e.code),
            _ => None,
        }
    }

    /// Raw status word of the failed exchange, if any
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Card(e) => e.status,
            Self::Protocol(ProtocolError::UnexpectedStatus { status, .. }) => Some(*status),
            _ => None,
        }
    }

    pub(crate) const fn is_card_code(&self, code: u16) -> bool {
        matches!(self, Self::Card(e) if e.code == code)
    }
}

/// Error reported by the card in the `error`/`code` fields of a response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} on {command}: {message}")]
pub struct CardError {
    /// Command that failed
    pub command: String,
    /// Numeric error code (HTTP-like, e.g. 401 bad auth)
    pub code: u16,
    /// Human readable message sent by the card
    pub message: String,
    /// Status word, when it was not the success value
    pub status: Option<StatusWord>,
}

/// Protocol violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Command issued before `select_app`
    #[error("No card session, select the applet first")]
    NotSelected,

    /// Status word other than 90 00 without an error payload
    #[error("Unexpected status word {status} on {command}")]
    UnexpectedStatus {
        /// Command that failed
        command: String,
        /// Status word received
        status: StatusWord,
    },

    /// A field the protocol requires was absent or of the wrong type
    #[error("Missing or malformed field `{field}` in {command} response")]
    MissingField {
        /// Command whose response was malformed
        command: &'static str,
        /// Field name
        field: &'static str,
    },

    /// A field had the wrong length or could not be parsed
    #[error("Invalid field `{field}` in {command} response: {reason}")]
    InvalidField {
        /// Command whose response was malformed
        command: &'static str,
        /// Field name
        field: &'static str,
        /// Details
        reason: &'static str,
    },

    /// Only protocol version 1 is known
    #[error("Unknown card protocol version {0}")]
    UnsupportedProtocol(u64),

    /// The card has set its tamper flag
    #[error("Card has set tampered flag")]
    Tampered,

    /// The card changed identity mid-session
    #[error("Card changed from {was} to {now} during the session")]
    CardKindChanged {
        /// Kind seen on the first status
        was: CardKind,
        /// Kind now reported
        now: CardKind,
    },

    /// The card public key changed mid-session
    #[error("Card public key changed during the session")]
    CardReplaced,

    /// Active slot outside of the slot range
    #[error("Active slot {active} out of range ({count} slots)")]
    SlotOutOfRange {
        /// Reported active slot
        active: u8,
        /// Reported slot count
        count: u8,
    },

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Command/card mismatch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Command only exists on the other card type
    #[error("{command} is a {required} only command")]
    WrongCardKind {
        /// Command attempted
        command: &'static str,
        /// Card type the command needs
        required: CardKind,
    },

    /// TAPSIGNER has no key yet
    #[error("Card not setup yet")]
    NotSetUp,

    /// Slot has no key yet
    #[error("Slot {0} is not yet setup")]
    SlotUnused(u8),

    /// Slot still sealed
    #[error("Slot {0} is not yet unsealed")]
    SlotSealed(u8),

    /// Slot already unsealed
    #[error("Slot {0} has already been unsealed")]
    SlotUnsealed(u8),

    /// Slot holds a key and must be unsealed before moving on
    #[error("Slot {0} is already used, unseal it and move to next")]
    SlotInUse(u8),

    /// All slots consumed
    #[error("All {0} slots have been used")]
    SlotsExhausted(u8),

    /// The card did not report the state of a slot
    #[error("Unknown state for slot {0}")]
    UnknownSlotState(u8),

    /// Pubkey only available for the active slot
    #[error("Can only get pubkey on current slot")]
    PubkeyNotOnCurrentSlot,
}

/// Caller input rejected locally
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// CVC length out of bounds
    #[error("CVC must be {min} to {max} characters long, got {actual}")]
    CvcLength {
        /// Minimum length
        min: usize,
        /// Maximum length
        max: usize,
        /// Actual length
        actual: usize,
    },

    /// Command needs the CVC on this card
    #[error("{0} requires the CVC on this card")]
    CvcRequired(&'static str),

    /// Digest not 32 bytes
    #[error("Digest must be exactly 32 bytes, got {0}")]
    DigestLength(usize),

    /// Derivation path could not be parsed
    #[error("Invalid derivation path `{0}`")]
    InvalidPath(String),

    /// Derivation path too deep
    #[error("No more than {max} path components allowed, got {actual}")]
    PathTooDeep {
        /// Maximum components
        max: usize,
        /// Actual components
        actual: usize,
    },

    /// Derivation path component not hardened where it must be
    #[error("All path components must be hardened")]
    PathNotHardened,

    /// Subpath has hardened components
    #[error("Subpath `{0}` contains hardened components")]
    SubpathHardened(String),

    /// Subpath requested on a SATSCARD
    #[error("Cannot use subpath option for SATSCARD")]
    SubpathOnSatsCard,

    /// Chain code needed for slot zero
    #[error("Chain code required for slot zero setup")]
    ChainCodeRequired,

    /// Slot index beyond the card's slots
    #[error("Slot {slot} out of range ({count} slots)")]
    SlotOutOfRange {
        /// Requested slot
        slot: u8,
        /// Number of slots
        count: u8,
    },
}

/// Cryptographic verification failure; never downgrade these
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Card could not prove possession of its own key
    #[error("Bad signature in certificate check")]
    CheckSignature,

    /// Certificate chain did not end at a factory root
    #[error("Root cert is not from Coinkite, card is counterfeit")]
    UnknownRoot,

    /// A certificate in the chain could not be recovered
    #[error("Invalid certificate at position {0}")]
    InvalidCertificate(usize),

    /// Chain shorter than the protocol minimum
    #[error("Certificate chain too short ({0} entries)")]
    ChainTooShort(usize),

    /// The signature over the read nonce did not verify
    #[error("Bad signature over read nonce")]
    ReadSignature,

    /// The address computed from the card key does not match the status response
    #[error("Address from card key does not match the one reported by status")]
    AddressMismatch,

    /// The derive response was not signed by the claimed key
    #[error("Bad signature in derive response")]
    DeriveSignature,

    /// Off-card derivation disagrees with what the card disclosed
    #[error("Card did not derive address as expected")]
    DerivedAddressMismatch,

    /// No recovery id reproduces the card pubkey
    #[error("Signature does not recover to the card pubkey")]
    Unrecoverable,

    /// Invalid public key bytes from the card
    #[error("Invalid public key from card")]
    InvalidPublicKey,

    /// Invalid private key bytes from the card
    #[error("Invalid private key from card")]
    InvalidPrivateKey,

    /// Invalid signature encoding from the card
    #[error("Invalid signature encoding from card")]
    InvalidSignature,

    /// BIP-32 child derivation hit an invalid key
    #[error("BIP-32 derivation produced an invalid key")]
    Derivation,
}
