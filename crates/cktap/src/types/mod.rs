mod certificate;
mod keys;
mod signature;
mod slot;
mod status;

pub use certificate::VerifiedCertificate;
pub use keys::{ChainCodeSource, DerivedKey, ExtendedPubKey, PubkeyInfo, SetupOutcome};
pub use signature::RecoverableSignature;
pub use slot::{PrivateKey, SlotAddress, SlotState, SlotUsage, UnsealedSlot};
pub use status::{CardKind, CardStatus};
