use super::CardCommand;
use crate::message::Message;

/// `new`: pick a key for a slot (SATSCARD) or the card (TAPSIGNER)
#[derive(Debug, Clone)]
pub struct NewCommand {
    slot: u8,
    chain_code: Option<[u8; 32]>,
}

impl NewCommand {
    /// Create a `new` for the slot with an optional host chain code
    pub const fn with(slot: u8, chain_code: Option<[u8; 32]>) -> Self {
        Self { slot, chain_code }
    }
}

impl CardCommand for NewCommand {
    const NAME: &'static str = "new";

    fn args(&self) -> Message {
        let msg = Message::new().with_int("slot", u64::from(self.slot));
        match &self.chain_code {
            Some(cc) => msg.with_bytes("chain_code", cc),
            None => msg,
        }
    }
}
