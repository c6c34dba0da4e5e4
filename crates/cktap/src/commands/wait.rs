use super::CardCommand;
use crate::message::Message;

/// `wait`: burn one second of the auth delay
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitCommand;

impl CardCommand for WaitCommand {
    const NAME: &'static str = "wait";

    fn args(&self) -> Message {
        Message::new()
    }
}

/// Response to `wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitResponse {
    /// Command accepted
    pub success: bool,
    /// Remaining delay
    pub auth_delay: u64,
}

impl From<&Message> for WaitResponse {
    fn from(resp: &Message) -> Self {
        Self {
            success: resp.bool("success").unwrap_or(false),
            auth_delay: resp.int("auth_delay").unwrap_or(0),
        }
    }
}
