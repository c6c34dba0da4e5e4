use super::CardCommand;
use crate::error::ProtocolError;
use crate::message::Message;

/// `xpub`: BIP-32 serialized master or derived public key
#[derive(Debug, Clone, Copy)]
pub struct XpubCommand {
    master: bool,
}

impl XpubCommand {
    /// Ask for the master (`true`) or derived (`false`) key
    pub const fn with_master(master: bool) -> Self {
        Self { master }
    }
}

impl CardCommand for XpubCommand {
    const NAME: &'static str = "xpub";

    fn args(&self) -> Message {
        Message::new().with_bool("master", self.master)
    }
}

/// Raw 78 byte xpub from the response
pub fn parse_xpub(resp: &Message) -> Result<Vec<u8>, ProtocolError> {
    resp.require_bytes(XpubCommand::NAME, "xpub")
        .map(<[u8]>::to_vec)
}
