use super::CardCommand;
use crate::message::Message;

/// `status`: card metadata and a fresh nonce
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCommand;

impl CardCommand for StatusCommand {
    const NAME: &'static str = "status";

    fn args(&self) -> Message {
        Message::new()
    }
}
