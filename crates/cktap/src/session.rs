//! Per-command session keys.
//!
//! Every authenticated command carries a fresh ephemeral public key and the CVC
//! XOR-ed with a mask bound to the card nonce and the command name. The shared
//! secret doubles as the session key used to mask the sensitive fields of that
//! one command and its response.

use k256::PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{ecdh, ephemeral_secret, sec1, sha256, xor_bytes};
use crate::constants::CARD_NONCE_SIZE;
use crate::validation::Cvc;

/// Authentication arguments sent along with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthArgs {
    /// Ephemeral public key, compressed
    pub epubkey: [u8; 33],
    /// CVC masked for this command
    pub xcvc: Vec<u8>,
}

/// Shared secret between the app and the card for exactly one command
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Raw key bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// XOR `data` with the key; output is truncated to 32 bytes at most
    pub fn mask(&self, data: &[u8]) -> Vec<u8> {
        xor_bytes(data, &self.0)
    }

    /// Inverse of [`Self::mask`]
    pub fn unmask(&self, data: &[u8]) -> Vec<u8> {
        self.mask(data)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Compute the session key and auth arguments for `command`.
///
/// The mask is `SHA256(card_nonce || command)` XOR the session key, cut to the CVC length.
pub fn derive_session_key(
    command: &str,
    card_nonce: &[u8; CARD_NONCE_SIZE],
    card_pubkey: &PublicKey,
    cvc: &Cvc,
) -> (SessionKey, AuthArgs) {
    let eph = ephemeral_secret();
    let session_key = SessionKey(ecdh(&eph, card_pubkey));

    let mut md_input = Vec::with_capacity(CARD_NONCE_SIZE + command.len());
    md_input.extend_from_slice(card_nonce);
    md_input.extend_from_slice(command.as_bytes());
    let md = sha256(&md_input);

    let mut mask = xor_bytes(session_key.as_bytes(), &md);
    mask.truncate(cvc.len());
    let xcvc = xor_bytes(cvc.as_bytes(), &mask);
    mask.zeroize();

    let auth = AuthArgs {
        epubkey: sec1(&eph.public_key()),
        xcvc,
    };
    (session_key, auth)
}
