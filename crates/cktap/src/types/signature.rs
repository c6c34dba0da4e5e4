use derive_more::Deref;
use k256::ecdsa::Signature;

use crate::error::VerificationError;

/// Recoverable ECDSA signature: `header || r || s`
///
/// The header is `39 + recovery_id` (BIP-137, P2WPKH).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deref)]
pub struct RecoverableSignature([u8; 65]);

impl RecoverableSignature {
    pub(crate) const fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Header byte
    pub const fn header(&self) -> u8 {
        self.0[0]
    }

    /// Recovery id, 0 to 3
    pub const fn recovery_id(&self) -> u8 {
        (self.0[0] - 27) & 0x03
    }

    /// The `r` scalar
    pub fn r(&self) -> &[u8] {
        &self.0[1..33]
    }

    /// The `s` scalar
    pub fn s(&self) -> &[u8] {
        &self.0[33..]
    }

    /// All 65 bytes
    pub const fn to_bytes(&self) -> [u8; 65] {
        self.0
    }

    /// DER encoding of `(r, s)`, as XRPL and Hedera expect
    pub fn to_der(&self) -> Result<Vec<u8>, VerificationError> {
        let sig =
            Signature::from_slice(&self.0[1..]).map_err(|_| VerificationError::InvalidSignature)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for RecoverableSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<RecoverableSignature> for [u8; 65] {
    fn from(sig: RecoverableSignature) -> Self {
        sig.0
    }
}
