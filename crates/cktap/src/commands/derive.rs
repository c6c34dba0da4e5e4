use super::CardCommand;
use crate::constants::USER_NONCE_SIZE;
use crate::error::ProtocolError;
use crate::message::Message;

/// `derive`: SATSCARD discloses the slot master key and chain code; TAPSIGNER moves to a
/// new hardened path (CVC required)
#[derive(Debug, Clone)]
pub struct DeriveCommand {
    nonce: [u8; USER_NONCE_SIZE],
    path: Option<Vec<u32>>,
}

impl DeriveCommand {
    /// SATSCARD form: just our nonce
    pub const fn with_nonce(nonce: [u8; USER_NONCE_SIZE]) -> Self {
        Self { nonce, path: None }
    }

    /// TAPSIGNER form: nonce and new path
    pub fn with_path(nonce: [u8; USER_NONCE_SIZE], path: &[u32]) -> Self {
        Self {
            nonce,
            path: Some(path.to_vec()),
        }
    }
}

impl CardCommand for DeriveCommand {
    const NAME: &'static str = "derive";

    fn args(&self) -> Message {
        let msg = Message::new().with_bytes("nonce", &self.nonce);
        match &self.path {
            Some(path) => msg.with_path("path", path),
            None => msg,
        }
    }
}

/// Response to `derive`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveResponse {
    /// Signature over `OPENDIME || card_nonce || nonce || chain_code`
    pub sig: Vec<u8>,
    /// Chain code
    pub chain_code: [u8; 32],
    /// Master public key
    pub master_pubkey: Vec<u8>,
    /// Derived public key (TAPSIGNER, absent at `m`)
    pub pubkey: Option<Vec<u8>>,
}

impl TryFrom<&Message> for DeriveResponse {
    type Error = ProtocolError;

    fn try_from(resp: &Message) -> Result<Self, Self::Error> {
        const CMD: &str = DeriveCommand::NAME;
        Ok(Self {
            sig: resp.require_bytes(CMD, "sig")?.to_vec(),
            chain_code: resp.require_array(CMD, "chain_code")?,
            master_pubkey: resp.require_bytes(CMD, "master_pubkey")?.to_vec(),
            pubkey: resp.bytes("pubkey").map(<[u8]>::to_vec),
        })
    }
}
