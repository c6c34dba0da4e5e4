use super::CardCommand;
use crate::constants::USER_NONCE_SIZE;
use crate::message::Message;

/// `read`: the card signs our nonce with the active slot key (SATSCARD, no CVC) or the
/// derived key (TAPSIGNER, CVC, pubkey masked)
#[derive(Debug, Clone)]
pub struct ReadCommand {
    nonce: [u8; USER_NONCE_SIZE],
}

impl ReadCommand {
    /// Create a `read` with our nonce
    pub const fn with_nonce(nonce: [u8; USER_NONCE_SIZE]) -> Self {
        Self { nonce }
    }
}

impl CardCommand for ReadCommand {
    const NAME: &'static str = "read";

    fn args(&self) -> Message {
        Message::new().with_bytes("nonce", &self.nonce)
    }
}
