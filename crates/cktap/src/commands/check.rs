use super::CardCommand;
use crate::constants::USER_NONCE_SIZE;
use crate::message::Message;

/// `check`: prove possession of the card key over our nonce
#[derive(Debug, Clone)]
pub struct CheckCommand {
    nonce: [u8; USER_NONCE_SIZE],
}

impl CheckCommand {
    /// Create a `check` with our nonce
    pub const fn with_nonce(nonce: [u8; USER_NONCE_SIZE]) -> Self {
        Self { nonce }
    }
}

impl CardCommand for CheckCommand {
    const NAME: &'static str = "check";

    fn args(&self) -> Message {
        Message::new().with_bytes("nonce", &self.nonce)
    }
}
