use super::CardCommand;
use crate::error::ProtocolError;
use crate::message::Message;

/// `sign`: sign a (masked) 32 byte digest
#[derive(Debug, Clone)]
pub struct SignCommand {
    slot: u8,
    digest: Vec<u8>,
    subpath: Option<Vec<u32>>,
}

impl SignCommand {
    /// Create a `sign`; the digest must already be masked with the session key
    pub fn with(slot: u8, masked_digest: &[u8], subpath: Option<&[u32]>) -> Self {
        Self {
            slot,
            digest: masked_digest.to_vec(),
            subpath: subpath.map(<[u32]>::to_vec),
        }
    }
}

impl CardCommand for SignCommand {
    const NAME: &'static str = "sign";

    fn args(&self) -> Message {
        let msg = Message::new()
            .with_int("slot", u64::from(self.slot))
            .with_bytes("digest", &self.digest);
        match &self.subpath {
            Some(subpath) => msg.with_path("subpath", subpath),
            None => msg,
        }
    }
}

/// Response to `sign`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    /// Compact `(r, s)`
    pub sig: [u8; 64],
    /// Key that signed
    pub pubkey: [u8; 33],
}

impl TryFrom<&Message> for SignResponse {
    type Error = ProtocolError;

    fn try_from(resp: &Message) -> Result<Self, Self::Error> {
        Ok(Self {
            sig: resp.require_array(SignCommand::NAME, "sig")?,
            pubkey: resp.require_array(SignCommand::NAME, "pubkey")?,
        })
    }
}
