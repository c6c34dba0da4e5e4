use super::CardCommand;
use crate::message::Message;

/// `change`: replace the CVC
#[derive(Debug, Clone)]
pub struct ChangeCommand {
    data: Vec<u8>,
}

impl ChangeCommand {
    /// Create a `change`; the new CVC must already be masked with the session key
    pub fn with_masked(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl CardCommand for ChangeCommand {
    const NAME: &'static str = "change";

    fn args(&self) -> Message {
        Message::new().with_bytes("data", &self.data)
    }
}
