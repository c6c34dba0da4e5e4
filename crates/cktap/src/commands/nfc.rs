use super::CardCommand;
use crate::error::ProtocolError;
use crate::message::Message;

/// `nfc`: the URL the card would give over NDEF right now
#[derive(Debug, Clone, Copy, Default)]
pub struct NfcCommand;

impl CardCommand for NfcCommand {
    const NAME: &'static str = "nfc";

    fn args(&self) -> Message {
        Message::new()
    }
}

/// Parse the `url` field
pub fn parse_nfc_url(resp: &Message) -> Result<String, ProtocolError> {
    resp.text("url")
        .map(str::to_string)
        .ok_or(ProtocolError::MissingField {
            command: NfcCommand::NAME,
            field: "url",
        })
}
