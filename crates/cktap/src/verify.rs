//! Proofs the card hands back: factory certificate chain, key possession over a fresh
//! nonce, and derivations that can be recomputed off-card.

use k256::PublicKey;
use tracing::{debug, warn};

use crate::config::FactoryRoot;
use crate::constants::{CARD_NONCE_SIZE, OPENDIME, USER_NONCE_SIZE};
use crate::crypto::{
    derive_child_pubkey, parse_pubkey, recover_signer, render_address, sec1, sha256, verify_digest,
};
use crate::error::{ProtocolError, Result, VerificationError};
use crate::message::Message;
use crate::session::SessionKey;
use crate::types::{CardStatus, VerifiedCertificate};

/// `"OPENDIME" || card_nonce || my_nonce || extra`
fn nonce_message(
    card_nonce: &[u8; CARD_NONCE_SIZE],
    my_nonce: &[u8; USER_NONCE_SIZE],
    extra: &[u8],
) -> [u8; 32] {
    let mut msg =
        Vec::with_capacity(OPENDIME.len() + CARD_NONCE_SIZE + USER_NONCE_SIZE + extra.len());
    msg.extend_from_slice(OPENDIME);
    msg.extend_from_slice(card_nonce);
    msg.extend_from_slice(my_nonce);
    msg.extend_from_slice(extra);
    sha256(&msg)
}

/// Verify that the card owns its key and that the key chains up to a factory root.
///
/// `card_nonce` is the nonce the card held when `check` was sent. On a SATSCARD with a
/// sealed active slot the slot pubkey is part of the signed message.
pub fn verify_certificate_chain(
    status: &CardStatus,
    check: &Message,
    certs: &Message,
    card_nonce: &[u8; CARD_NONCE_SIZE],
    my_nonce: &[u8; USER_NONCE_SIZE],
    slot_pubkey: Option<&PublicKey>,
    roots: &[FactoryRoot],
) -> Result<VerifiedCertificate> {
    let auth_sig = check.require_bytes("check", "auth_sig")?;
    let extra = slot_pubkey.map(sec1);
    let digest = nonce_message(card_nonce, my_nonce, extra.as_ref().map_or(&[][..], |k| k));
    if !verify_digest(&status.pubkey, &digest, auth_sig) {
        warn!("Card failed to prove possession of its key");
        return Err(VerificationError::CheckSignature.into());
    }

    let chain = certs
        .array("cert_chain")
        .ok_or(ProtocolError::MissingField {
            command: "certs",
            field: "cert_chain",
        })?;
    if chain.len() < 2 {
        return Err(VerificationError::ChainTooShort(chain.len()).into());
    }

    let mut pubkey = status.pubkey;
    for (i, cert) in chain.iter().enumerate() {
        let sig = cert
            .as_bytes()
            .ok_or(VerificationError::InvalidCertificate(i))?;
        pubkey = recover_signer(&sha256(&sec1(&pubkey)), sig)
            .map_err(|_| VerificationError::InvalidCertificate(i))?;
    }

    let root_bytes = sec1(&pubkey);
    let root = roots
        .iter()
        .find(|root| root.pubkey == root_bytes)
        .ok_or_else(|| {
            warn!(root = %hex::encode(root_bytes), "Certificate chain ends at an unknown root");
            VerificationError::UnknownRoot
        })?;

    debug!(root = %root.label, "Certificate chain verified");
    Ok(VerifiedCertificate {
        card_pubkey: status.pubkey,
        root_label: root.label.clone(),
        root_pubkey: pubkey,
    })
}

/// SATSCARD `read`: check the slot key signed our nonce, and that its address matches
/// the censored one from `status`.
pub fn recover_address(
    status: &CardStatus,
    read: &Message,
    card_nonce: &[u8; CARD_NONCE_SIZE],
    my_nonce: &[u8; USER_NONCE_SIZE],
) -> Result<(PublicKey, String)> {
    let pubkey = parse_pubkey(read.require_bytes("read", "pubkey")?)?;
    let sig = read.require_bytes("read", "sig")?;

    let digest = nonce_message(card_nonce, my_nonce, &[status.active_slot()]);
    if !verify_digest(&pubkey, &digest, sig) {
        return Err(VerificationError::ReadSignature.into());
    }

    let addr = render_address(&pubkey, status.testnet);
    let expect = status.addr.as_deref().ok_or(ProtocolError::MissingField {
        command: "status",
        field: "addr",
    })?;
    if !censored_matches(expect, &addr) {
        return Err(VerificationError::AddressMismatch.into());
    }
    Ok((pubkey, addr))
}

/// Censored addresses keep a prefix and a suffix around underscores
fn censored_matches(censored: &str, addr: &str) -> bool {
    let left = censored.find('_').map_or(censored, |i| &censored[..i]);
    let right = censored.rfind('_').map_or(censored, |i| &censored[i + 1..]);
    addr.starts_with(left) && addr.ends_with(right)
}

/// TAPSIGNER `read`: unmask the pubkey and check it signed our nonce
pub fn recover_pubkey(
    read: &Message,
    card_nonce: &[u8; CARD_NONCE_SIZE],
    my_nonce: &[u8; USER_NONCE_SIZE],
    session_key: &SessionKey,
) -> Result<PublicKey> {
    let masked: [u8; 33] = read.require_array("read", "pubkey")?;
    let sig = read.require_bytes("read", "sig")?;

    let mut raw = Vec::with_capacity(33);
    raw.push(masked[0]);
    raw.extend(session_key.unmask(&masked[1..]));
    let pubkey = parse_pubkey(&raw)?;

    let digest = nonce_message(card_nonce, my_nonce, &[0]);
    if !verify_digest(&pubkey, &digest, sig) {
        return Err(VerificationError::ReadSignature.into());
    }
    Ok(pubkey)
}

/// Check a `derive` response was signed over both nonces and the chain code
pub fn verify_master_pubkey(
    master_pubkey: &[u8],
    sig: &[u8],
    chain_code: &[u8; 32],
    my_nonce: &[u8; USER_NONCE_SIZE],
    card_nonce: &[u8; CARD_NONCE_SIZE],
) -> Result<PublicKey> {
    let master = parse_pubkey(master_pubkey)?;
    verify_derive_signature(&master, sig, chain_code, my_nonce, card_nonce)?;
    Ok(master)
}

pub(crate) fn verify_derive_signature(
    signer: &PublicKey,
    sig: &[u8],
    chain_code: &[u8; 32],
    my_nonce: &[u8; USER_NONCE_SIZE],
    card_nonce: &[u8; CARD_NONCE_SIZE],
) -> std::result::Result<(), VerificationError> {
    let digest = nonce_message(card_nonce, my_nonce, chain_code);
    if verify_digest(signer, &digest, sig) {
        Ok(())
    } else {
        Err(VerificationError::DeriveSignature)
    }
}

/// Recompute the SATSCARD slot key `m/0` off-card and render its address
pub fn verify_derive_address(
    chain_code: &[u8; 32],
    master_pub: &PublicKey,
    is_testnet: bool,
) -> std::result::Result<(String, PublicKey), VerificationError> {
    let (child, _) = derive_child_pubkey(chain_code, master_pub, 0)?;
    Ok((render_address(&child, is_testnet), child))
}
