use k256::PublicKey;

/// Outcome of a successful certificate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCertificate {
    /// Card public key proven by the chain
    pub card_pubkey: PublicKey,
    /// Label of the factory root the chain ends at
    pub root_label: String,
    /// The factory root key
    pub root_pubkey: PublicKey,
}
