//! Input validation for card operations
//!
//! Everything here runs before a command reaches the card, so a bad argument
//! never costs a CVC attempt or a card nonce.

use std::str::FromStr;

use coins_bip32::path::DerivationPath;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    CVC_MAX_LENGTH, CVC_MIN_LENGTH, DERIVE_MAX_BIP32_PATH_DEPTH, HARDENED, SIGN_MAX_SUBPATH_DEPTH,
};
use crate::error::ValidationError;

/// Card Verification Code (the spending code printed on the card)
///
/// Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Cvc(Vec<u8>);

impl Cvc {
    /// Validate and wrap a CVC
    ///
    /// # Errors
    /// [`ValidationError::CvcLength`] unless the CVC is 6 to 32 characters long.
    pub fn new(cvc: &str) -> Result<Self, ValidationError> {
        let actual = cvc.len();
        if !(CVC_MIN_LENGTH..=CVC_MAX_LENGTH).contains(&actual) {
            warn!("Rejecting CVC of length {}", actual);
            return Err(ValidationError::CvcLength {
                min: CVC_MIN_LENGTH,
                max: CVC_MAX_LENGTH,
                actual,
            });
        }
        Ok(Self(cvc.as_bytes().to_vec()))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated CVC
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Cvc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cvc(******)")
    }
}

impl FromStr for Cvc {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Validate a digest to sign
pub fn validate_digest(digest: &[u8]) -> Result<[u8; 32], ValidationError> {
    digest
        .try_into()
        .map_err(|_| ValidationError::DigestLength(digest.len()))
}

/// Parse a BIP-32 path such as `m/84h/0h/0h` or `0/5`.
///
/// Hardened components may be marked with `'`, `h` or `H`.
pub fn parse_path(path: &str) -> Result<Vec<u32>, ValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "m" {
        return Ok(Vec::new());
    }

    let normalized = trimmed.replace(['h', 'H'], "'");
    let normalized = if normalized.starts_with('m') {
        normalized
    } else {
        format!("m/{normalized}")
    };

    let parsed = DerivationPath::from_str(&normalized)
        .map_err(|_| ValidationError::InvalidPath(path.to_string()))?;
    Ok(parsed.iter().copied().collect())
}

/// Render a path with `h` marking hardened components, e.g. `m/84h/0h/0h`
pub fn path_to_string(path: &[u32]) -> String {
    let mut out = String::from("m");
    for component in path {
        if component & HARDENED != 0 {
            out.push_str(&format!("/{}h", component & !HARDENED));
        } else {
            out.push_str(&format!("/{component}"));
        }
    }
    out
}

/// Path accepted by the TAPSIGNER `derive` command: at most 8 components, all hardened
pub fn validate_derivation_path(path: &str) -> Result<Vec<u32>, ValidationError> {
    let components = parse_path(path)?;
    if components.len() > DERIVE_MAX_BIP32_PATH_DEPTH {
        return Err(ValidationError::PathTooDeep {
            max: DERIVE_MAX_BIP32_PATH_DEPTH,
            actual: components.len(),
        });
    }
    if components.iter().any(|c| c & HARDENED == 0) {
        return Err(ValidationError::PathNotHardened);
    }
    Ok(components)
}

/// Subpath accepted by `sign`: at most 2 unhardened components
pub fn validate_subpath(subpath: &str) -> Result<Vec<u32>, ValidationError> {
    let components = parse_path(subpath)?;
    if components.len() > SIGN_MAX_SUBPATH_DEPTH {
        return Err(ValidationError::PathTooDeep {
            max: SIGN_MAX_SUBPATH_DEPTH,
            actual: components.len(),
        });
    }
    if components.iter().any(|c| c & HARDENED != 0) {
        return Err(ValidationError::SubpathHardened(subpath.to_string()));
    }
    Ok(components)
}
