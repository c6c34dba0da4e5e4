use super::CardCommand;
use crate::message::Message;
use crate::types::SlotState;

/// `dump`: slot details; the private key of an unsealed slot only with the CVC
#[derive(Debug, Clone, Copy)]
pub struct DumpCommand {
    slot: u8,
}

impl DumpCommand {
    /// Create a `dump` of the given slot
    pub const fn with_slot(slot: u8) -> Self {
        Self { slot }
    }
}

impl CardCommand for DumpCommand {
    const NAME: &'static str = "dump";

    fn args(&self) -> Message {
        Message::new().with_int("slot", u64::from(self.slot))
    }
}

/// Response to `dump`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResponse {
    /// `false` when no key has been picked
    pub used: Option<bool>,
    /// `true` while sealed, `false` once unsealed
    pub sealed: Option<bool>,
    /// Full address of an unsealed slot
    pub addr: Option<String>,
    /// Masked private key (authenticated dump of an unsealed slot)
    pub privkey: Option<Vec<u8>>,
    /// Slot public key of an unsealed slot
    pub pubkey: Option<Vec<u8>>,
}

impl DumpResponse {
    /// Slot state, `None` when the card did not say
    pub fn state(&self) -> Option<SlotState> {
        match (self.sealed, self.used) {
            (Some(true), _) => Some(SlotState::Sealed),
            (Some(false), _) => Some(SlotState::Unsealed),
            (None, _) if self.privkey.is_some() => Some(SlotState::Unsealed),
            (None, Some(false)) => Some(SlotState::Unused),
            _ => None,
        }
    }
}

impl From<&Message> for DumpResponse {
    fn from(resp: &Message) -> Self {
        let bytes = |field: &str| resp.bytes(field).map(<[u8]>::to_vec);
        Self {
            used: resp.bool("used"),
            sealed: resp.bool("sealed"),
            addr: resp.text("addr").map(str::to_string),
            privkey: bytes("privkey"),
            pubkey: bytes("pubkey"),
        }
    }
}
