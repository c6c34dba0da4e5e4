use k256::PublicKey;

use crate::crypto::{base58check, derive_path_pubkey, hash160, parse_pubkey};
use crate::error::VerificationError;

use super::SlotAddress;

/// Length of a BIP-32 serialized extended key
const XPUB_LENGTH: usize = 78;

/// BIP-32 serialized extended public key, as returned by the `xpub` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPubKey {
    raw: [u8; XPUB_LENGTH],
    pubkey: PublicKey,
}

impl ExtendedPubKey {
    /// Parse the 78 raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationError> {
        let raw: [u8; XPUB_LENGTH] = bytes
            .try_into()
            .map_err(|_| VerificationError::InvalidPublicKey)?;
        let pubkey = parse_pubkey(&raw[45..])?;
        Ok(Self { raw, pubkey })
    }

    /// Depth in the tree
    pub const fn depth(&self) -> u8 {
        self.raw[4]
    }

    /// Chain code
    pub fn chain_code(&self) -> [u8; 32] {
        let mut cc = [0u8; 32];
        cc.copy_from_slice(&self.raw[13..45]);
        cc
    }

    /// Public key
    pub const fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    /// Fingerprint of this key (first four bytes of HASH160 of the pubkey)
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&hash160(&self.raw[45..])[..4]);
        fp
    }

    /// base58check string, e.g. `xpub6...`
    pub fn to_base58(&self) -> String {
        base58check(&self.raw)
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; XPUB_LENGTH] {
        &self.raw
    }

    /// Derive an unhardened subpath off-card
    pub fn derive(&self, subpath: &[u32]) -> Result<PublicKey, VerificationError> {
        derive_path_pubkey(&self.chain_code(), &self.pubkey, subpath).map(|(key, _)| key)
    }
}

/// Result of a TAPSIGNER `set_derivation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    /// The path now in use
    pub path: Vec<u32>,
    /// Chain code at that path
    pub chain_code: [u8; 32],
    /// Master public key
    pub master_pubkey: PublicKey,
    /// Public key at the path (absent at `m`)
    pub pubkey: Option<PublicKey>,
}

/// Result of `get_pubkey`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyInfo {
    /// The public key
    pub pubkey: PublicKey,
    /// Payment address (SATSCARD only)
    pub address: Option<String>,
}

/// Where the chain code for `setup` comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainCodeSource {
    /// Let the card pick (SATSCARD slots after the first). On a TAPSIGNER the host picks.
    #[default]
    Card,
    /// Host picks `SHA256(SHA256(128 random bytes))`
    Random,
    /// Caller supplied
    Provided([u8; 32]),
}

/// Result of `setup`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// TAPSIGNER now has a key
    TapSigner,
    /// SATSCARD slot picked a key; its verified address
    SatsCard(SlotAddress),
}
