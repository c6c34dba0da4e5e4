use super::CardCommand;
use crate::error::ProtocolError;
use crate::message::Message;

/// `unseal`: release the active slot's private key
#[derive(Debug, Clone, Copy)]
pub struct UnsealCommand {
    slot: u8,
}

impl UnsealCommand {
    /// Create an `unseal` of the active slot
    pub const fn with_slot(slot: u8) -> Self {
        Self { slot }
    }
}

impl CardCommand for UnsealCommand {
    const NAME: &'static str = "unseal";

    fn args(&self) -> Message {
        Message::new().with_int("slot", u64::from(self.slot))
    }
}

/// Response to `unseal`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsealResponse {
    /// Slot unsealed
    pub slot: u8,
    /// Private key, masked with the session key
    pub privkey: [u8; 32],
    /// Slot public key
    pub pubkey: [u8; 33],
}

impl TryFrom<&Message> for UnsealResponse {
    type Error = ProtocolError;

    fn try_from(resp: &Message) -> Result<Self, Self::Error> {
        const CMD: &str = UnsealCommand::NAME;
        let slot = resp.require_int(CMD, "slot")?;
        Ok(Self {
            slot: u8::try_from(slot).map_err(|_| ProtocolError::InvalidField {
                command: CMD,
                field: "slot",
                reason: "out of range",
            })?,
            privkey: resp.require_array(CMD, "privkey")?,
            pubkey: resp.require_array(CMD, "pubkey")?,
        })
    }
}
