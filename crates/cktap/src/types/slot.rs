use derive_more::Display;
use k256::{PublicKey, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Lifecycle of a SATSCARD slot; only ever moves forward
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotState {
    /// No key picked yet
    #[display("UNUSED")]
    Unused,
    /// Key picked, private key still on the card
    #[display("SEALED")]
    Sealed,
    /// Private key has been released
    #[display("UNSEALED")]
    Unsealed,
}

/// Address of a slot as reported by `address`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAddress {
    /// Slot index
    pub slot: u8,
    /// bech32 payment address
    pub address: String,
    /// Slot pubkey, only on request and only for the active slot
    pub pubkey: Option<PublicKey>,
}

/// Result of `get_slot_usage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUsage {
    /// Slot index
    pub slot: u8,
    /// Current state
    pub state: SlotState,
    /// Address, when the card disclosed enough to know it
    pub address: Option<String>,
}

/// A released slot private key, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub(crate) const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw scalar
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// As a `k256` secret key
    pub fn to_secret_key(&self) -> Option<SecretKey> {
        SecretKey::from_slice(&self.0).ok()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Result of `unseal_slot`
#[derive(Debug, Clone)]
pub struct UnsealedSlot {
    /// The slot that was unsealed
    pub slot: u8,
    /// Its private key
    pub privkey: PrivateKey,
    /// Address the key pays to
    pub address: String,
}
