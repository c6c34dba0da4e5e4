use derive_more::Display;
use k256::PublicKey;

use crate::constants::CARD_NONCE_SIZE;
use crate::crypto::parse_pubkey;
use crate::error::{Error, ProtocolError};
use crate::message::Message;

/// Card product, each with its own command set
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    /// Multi-slot bearer card
    #[display("SATSCARD")]
    SatsCard,
    /// Single key, HD signing card
    #[display("TAPSIGNER")]
    TapSigner,
}

/// Decoded `status` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStatus {
    /// Protocol version (only 1 is known)
    pub proto: u64,
    /// Applet version string
    pub applet_version: String,
    /// Block height at manufacture
    pub birth_height: Option<u64>,
    /// SATSCARD or TAPSIGNER
    pub kind: CardKind,
    /// Card public key
    pub pubkey: PublicKey,
    /// Fresh card nonce
    pub card_nonce: [u8; CARD_NONCE_SIZE],
    /// `(active_slot, slot_count)`
    pub slots: (u8, u8),
    /// Censored address of the active slot, present while it is sealed
    pub addr: Option<String>,
    /// Current derivation path (TAPSIGNER)
    pub path: Option<Vec<u32>>,
    /// Number of backups made (TAPSIGNER)
    pub num_backups: Option<u64>,
    /// Card is on testnet
    pub testnet: bool,
    /// Seconds of delay pending before CVC commands work again
    pub auth_delay: u64,
    /// Tamper flag
    pub tampered: bool,
}

impl CardStatus {
    /// Active slot index
    pub const fn active_slot(&self) -> u8 {
        self.slots.0
    }

    /// Number of slots
    pub const fn slot_count(&self) -> u8 {
        self.slots.1
    }
}

impl TryFrom<&Message> for CardStatus {
    type Error = Error;

    fn try_from(msg: &Message) -> Result<Self, Self::Error> {
        const CMD: &str = "status";

        let pubkey = parse_pubkey(msg.require_bytes(CMD, "pubkey")?)?;
        let card_nonce = msg.card_nonce().ok_or(ProtocolError::MissingField {
            command: CMD,
            field: "card_nonce",
        })?;

        let kind = if msg.bool("tapsigner").unwrap_or(false) {
            CardKind::TapSigner
        } else {
            CardKind::SatsCard
        };

        let slots = match msg.int_list("slots").as_deref() {
            Some([active, count]) => (
                u8::try_from(*active).map_err(|_| invalid("slots"))?,
                u8::try_from(*count).map_err(|_| invalid("slots"))?,
            ),
            Some(_) => return Err(invalid("slots").into()),
            None => (0, 1),
        };

        let path = match msg.int_list("path") {
            Some(components) => Some(
                components
                    .into_iter()
                    .map(u32::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| invalid("path"))?,
            ),
            None => None,
        };

        Ok(Self {
            proto: msg.require_int(CMD, "proto")?,
            applet_version: msg.text("ver").unwrap_or_default().to_string(),
            birth_height: msg.int("birth"),
            kind,
            pubkey,
            card_nonce,
            slots,
            addr: msg.text("addr").map(str::to_string),
            path,
            num_backups: msg.int("num_backups"),
            testnet: msg.bool("testnet").unwrap_or(false),
            auth_delay: msg.int("auth_delay").unwrap_or(0),
            tampered: msg.bool("tampered").unwrap_or(false),
        })
    }
}

const fn invalid(field: &'static str) -> ProtocolError {
    ProtocolError::InvalidField {
        command: "status",
        field,
        reason: "out of range",
    }
}
