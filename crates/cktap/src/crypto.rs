use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::RngCore;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::constants::{HARDENED, USER_NONCE_SIZE};
use crate::error::VerificationError;
use crate::types::RecoverableSignature;

type HmacSha512 = Hmac<Sha512>;

/// BIP-137 header base for P2WPKH recoverable signatures
const RECOVERABLE_HEADER_P2WPKH: u8 = 39;

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub(crate) fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// XOR two byte strings over the length of the shorter one.
///
/// The output is truncated to `min(a.len(), b.len())`; the card relies on this.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Pick a fresh app nonce; the card rejects nonces made of a single repeated byte.
pub fn pick_nonce() -> [u8; USER_NONCE_SIZE] {
    let mut nonce = [0u8; USER_NONCE_SIZE];
    loop {
        rand::rng().fill_bytes(&mut nonce);
        if nonce.iter().any(|b| *b != nonce[0]) {
            return nonce;
        }
    }
}

/// Host-picked chain code: SHA256d over 128 random bytes
pub fn random_chain_code() -> [u8; 32] {
    let mut entropy = [0u8; 128];
    rand::rng().fill_bytes(&mut entropy);
    sha256d(&entropy)
}

/// Generate an ephemeral keypair for one authenticated command
pub(crate) fn ephemeral_secret() -> SecretKey {
    SecretKey::random(&mut rand_v8::thread_rng())
}

/// ECDH as done by libsecp256k1: SHA256 over the compressed shared point.
pub(crate) fn ecdh(secret: &SecretKey, public: &PublicKey) -> [u8; 32] {
    let shared = (public.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    sha256(shared.to_encoded_point(true).as_bytes())
}

/// Compressed SEC1 encoding
pub fn sec1(pubkey: &PublicKey) -> [u8; 33] {
    let point = pubkey.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

pub(crate) fn parse_pubkey(bytes: &[u8]) -> Result<PublicKey, VerificationError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| VerificationError::InvalidPublicKey)
}

pub(crate) fn parse_secret(bytes: &[u8]) -> Result<SecretKey, VerificationError> {
    SecretKey::from_slice(bytes).map_err(|_| VerificationError::InvalidPrivateKey)
}

fn parse_signature(sig: &[u8]) -> Result<Signature, VerificationError> {
    let sig = Signature::from_slice(sig).map_err(|_| VerificationError::InvalidSignature)?;
    // k256 only accepts low-S, the card does not promise it
    Ok(sig.normalize_s().unwrap_or(sig))
}

/// Verify a 64 byte compact signature over a 32 byte digest
pub fn verify_digest(pubkey: &PublicKey, digest: &[u8; 32], sig: &[u8]) -> bool {
    match parse_signature(sig) {
        Ok(sig) => VerifyingKey::from(pubkey).verify_prehash(digest, &sig).is_ok(),
        Err(_) => false,
    }
}

/// Recover the signer of a 65 byte recoverable signature (`header || r || s`)
pub fn recover_signer(digest: &[u8; 32], sig: &[u8]) -> Result<PublicKey, VerificationError> {
    if sig.len() != 65 {
        return Err(VerificationError::InvalidSignature);
    }
    let header = sig[0];
    if !(27..=42).contains(&header) {
        return Err(VerificationError::InvalidSignature);
    }
    let mut recid = (header - 27) & 0x03;
    let mut compact =
        Signature::from_slice(&sig[1..]).map_err(|_| VerificationError::InvalidSignature)?;
    // negating s flips the parity of R
    if let Some(low) = compact.normalize_s() {
        compact = low;
        recid ^= 1;
    }
    let recid = RecoveryId::from_byte(recid).ok_or(VerificationError::InvalidSignature)?;
    let vk = VerifyingKey::recover_from_prehash(digest, &compact, recid)
        .map_err(|_| VerificationError::Unrecoverable)?;
    Ok(PublicKey::from(vk))
}

/// Attach a recovery id to a compact signature known to come from `expected`.
///
/// The header is `39 + recid` (BIP-137, P2WPKH).
pub fn make_recoverable_sig(
    digest: &[u8; 32],
    sig: &[u8],
    expected: &PublicKey,
) -> Result<RecoverableSignature, VerificationError> {
    let compact = parse_signature(sig)?;
    let rs: [u8; 64] = compact.to_bytes().into();
    for recid in 0..4u8 {
        let mut candidate = [0u8; 65];
        candidate[0] = RECOVERABLE_HEADER_P2WPKH + recid;
        candidate[1..].copy_from_slice(&rs);
        match recover_signer(digest, &candidate) {
            Ok(pubkey) if pubkey == *expected => return Ok(RecoverableSignature::new(candidate)),
            _ => continue,
        }
    }
    Err(VerificationError::Unrecoverable)
}

/// Render the bech32 P2WPKH address of a public key
pub fn render_address(pubkey: &PublicKey, testnet: bool) -> String {
    let program = hash160(&sec1(pubkey));
    let hrp = if testnet {
        bech32::hrp::TB
    } else {
        bech32::hrp::BC
    };
    // a 20 byte v0 program always encodes
    bech32::segwit::encode_v0(hrp, &program).expect("valid witness program")
}

/// Human readable card identity: base32 of SHA256(pubkey) minus its first 8 bytes,
/// first 20 characters in groups of five, e.g. `ABCDE-FGHIJ-KLMNO-PQRST`.
pub fn card_pubkey_to_ident(card_pubkey: &PublicKey) -> String {
    let md = sha256(&sec1(card_pubkey));
    let encoded = BASE32.encode(&md[8..]);
    encoded
        .as_bytes()
        .chunks(5)
        .take(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// base58check encoding (used for BIP-32 serialized keys)
pub fn base58check(data: &[u8]) -> String {
    bs58::encode(data).with_check().into_string()
}

/// BIP-32 public child derivation (CKDpub), unhardened indexes only.
///
/// Returns the child key and its chain code.
pub fn derive_child_pubkey(
    chain_code: &[u8; 32],
    parent: &PublicKey,
    index: u32,
) -> Result<(PublicKey, [u8; 32]), VerificationError> {
    if index & HARDENED != 0 {
        return Err(VerificationError::Derivation);
    }
    let mut mac =
        HmacSha512::new_from_slice(chain_code).map_err(|_| VerificationError::Derivation)?;
    mac.update(&sec1(parent));
    mac.update(&index.to_be_bytes());
    let i = mac.finalize().into_bytes();
    let (il, ir) = i.split_at(32);

    let tweak = SecretKey::from_slice(il).map_err(|_| VerificationError::Derivation)?;
    let child = tweak.public_key().to_projective() + parent.to_projective();
    let child =
        PublicKey::from_affine(child.to_affine()).map_err(|_| VerificationError::Derivation)?;

    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(ir);
    Ok((child, child_chain_code))
}

/// Derive along a path of unhardened components
pub fn derive_path_pubkey(
    chain_code: &[u8; 32],
    parent: &PublicKey,
    path: &[u32],
) -> Result<(PublicKey, [u8; 32]), VerificationError> {
    path.iter()
        .try_fold((*parent, *chain_code), |(key, cc), index| {
            derive_child_pubkey(&cc, &key, *index)
        })
}
