use super::CardCommand;
use crate::error::ProtocolError;
use crate::message::Message;

/// `backup`: encrypted backup of the TAPSIGNER master key
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupCommand;

impl CardCommand for BackupCommand {
    const NAME: &'static str = "backup";

    fn args(&self) -> Message {
        Message::new()
    }
}

/// Opaque backup blob from the response
pub fn parse_backup(resp: &Message) -> Result<Vec<u8>, ProtocolError> {
    resp.require_bytes(BackupCommand::NAME, "data")
        .map(<[u8]>::to_vec)
}
