//! Card session: the command surface of SATSCARD and TAPSIGNER
//!
//! A [`CardSession`] owns the transport and the card nonce. It starts `Unselected`,
//! becomes `Selected` once [`CardSession::select_app`] has read the first status, and
//! goes back to `Unselected` on [`CardSession::end`]. Every response that carries a new
//! card nonce updates the session before any error in that response is raised.

use k256::PublicKey;
use tracing::{debug, info, trace, warn};

use crate::commands::{
    BackupCommand, CardCommand, CertsCommand, ChangeCommand, CheckCommand, DeriveCommand,
    DeriveResponse, DumpCommand, DumpResponse, NewCommand, NfcCommand, ReadCommand, SignCommand,
    SignResponse, StatusCommand, UnsealCommand, UnsealResponse, WaitCommand, WaitResponse,
    XpubCommand, parse_backup, parse_nfc_url, parse_xpub,
};
use crate::config::{AddressMode, SessionConfig};
use crate::constants::{
    CARD_NONCE_SIZE, CODE_BAD_STATE, CODE_RATE_LIMITED, CODE_UNLUCKY_NUMBER,
};
use crate::crypto::{
    card_pubkey_to_ident, make_recoverable_sig, parse_pubkey, parse_secret, pick_nonce,
    random_chain_code, render_address, verify_digest,
};
use crate::error::{
    CapabilityError, CardError, Error, ProtocolError, Result, ValidationError, VerificationError,
};
use crate::message::Message;
use crate::session::{AuthArgs, SessionKey, derive_session_key};
use crate::transport::{CardTransport, Exchange, StatusWord};
use crate::types::{
    CardKind, CardStatus, ChainCodeSource, DerivedKey, ExtendedPubKey, PrivateKey, PubkeyInfo,
    RecoverableSignature, SetupOutcome, SlotAddress, SlotState, SlotUsage, UnsealedSlot,
    VerifiedCertificate,
};
use crate::validation::{
    Cvc, path_to_string, validate_derivation_path, validate_digest, validate_subpath,
};
use crate::verify::{
    recover_address, recover_pubkey, verify_certificate_chain, verify_derive_address,
    verify_derive_signature, verify_master_pubkey,
};

/// What the session knows about the card once selected
#[derive(Debug, Clone)]
struct Selected {
    card_nonce: [u8; CARD_NONCE_SIZE],
    card_pubkey: PublicKey,
    card_ident: String,
    kind: CardKind,
    proto: u64,
    applet_version: String,
    birth_height: Option<u64>,
    is_testnet: bool,
    auth_delay: u64,
    derivation_path: Option<Vec<u32>>,
    num_backups: Option<u64>,
    active_slot: u8,
    slot_count: u8,
    certificate: Option<VerifiedCertificate>,
}

#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Unselected,
    Selected(Box<Selected>),
}

/// Session with one SATSCARD or TAPSIGNER
#[derive(Debug)]
pub struct CardSession<T: CardTransport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
}

impl<T: CardTransport> CardSession<T> {
    /// Create a session over a transport; nothing is sent until [`Self::select_app`]
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Unselected,
        }
    }

    /// Create a session with the default configuration
    pub fn with_transport(transport: T) -> Self {
        Self::new(transport, SessionConfig::default())
    }

    /// The transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether `select_app` has succeeded
    pub const fn is_selected(&self) -> bool {
        matches!(self.state, SessionState::Selected(_))
    }

    fn selected(&self) -> Result<&Selected> {
        match &self.state {
            SessionState::Selected(sel) => Ok(&**sel),
            SessionState::Unselected => Err(ProtocolError::NotSelected.into()),
        }
    }

    fn selected_mut(&mut self) -> Result<&mut Selected> {
        match &mut self.state {
            SessionState::Selected(sel) => Ok(&mut **sel),
            SessionState::Unselected => Err(ProtocolError::NotSelected.into()),
        }
    }

    fn require_kind(&self, command: &'static str, required: CardKind) -> Result<&Selected> {
        let sel = self.selected()?;
        if sel.kind != required {
            return Err(CapabilityError::WrongCardKind { command, required }.into());
        }
        Ok(sel)
    }

    /// Current card nonce
    pub fn card_nonce(&self) -> Option<[u8; CARD_NONCE_SIZE]> {
        self.selected().ok().map(|sel| sel.card_nonce)
    }

    /// Card public key
    pub fn card_pubkey(&self) -> Option<PublicKey> {
        self.selected().ok().map(|sel| sel.card_pubkey)
    }

    /// Human readable card identity, e.g. `ABCDE-FGHIJ-KLMNO-PQRST`
    pub fn card_ident(&self) -> Option<&str> {
        self.selected().ok().map(|sel| sel.card_ident.as_str())
    }

    /// SATSCARD or TAPSIGNER
    pub fn kind(&self) -> Option<CardKind> {
        self.selected().ok().map(|sel| sel.kind)
    }

    /// Whether the card is a TAPSIGNER
    pub fn is_tapsigner(&self) -> bool {
        self.kind() == Some(CardKind::TapSigner)
    }

    /// Whether the card is on testnet
    pub fn is_testnet(&self) -> bool {
        self.selected().is_ok_and(|sel| sel.is_testnet)
    }

    /// Protocol version
    pub fn protocol_version(&self) -> Option<u64> {
        self.selected().ok().map(|sel| sel.proto)
    }

    /// Applet version
    pub fn applet_version(&self) -> Option<&str> {
        self.selected().ok().map(|sel| sel.applet_version.as_str())
    }

    /// Block height at manufacture
    pub fn birth_height(&self) -> Option<u64> {
        self.selected().ok().and_then(|sel| sel.birth_height)
    }

    /// Auth delay last reported by the card
    pub fn auth_delay(&self) -> Option<u64> {
        self.selected().ok().map(|sel| sel.auth_delay)
    }

    /// TAPSIGNER backup count
    pub fn num_backups(&self) -> Option<u64> {
        self.selected().ok().and_then(|sel| sel.num_backups)
    }

    /// TAPSIGNER derivation path as last reported
    pub fn derivation_path(&self) -> Option<&[u32]> {
        self.selected().ok().and_then(|sel| sel.derivation_path.as_deref())
    }

    /// Active SATSCARD slot
    pub fn active_slot(&self) -> Option<u8> {
        self.selected().ok().map(|sel| sel.active_slot)
    }

    /// Number of SATSCARD slots
    pub fn slot_count(&self) -> Option<u8> {
        self.selected().ok().map(|sel| sel.slot_count)
    }

    /// Whether the certificate chain has been verified this session
    pub fn certificate_verified(&self) -> bool {
        self.selected().is_ok_and(|sel| sel.certificate.is_some())
    }

    /// Connect, select the applet and read the first status.
    pub async fn select_app(&mut self) -> Result<CardStatus> {
        self.transport.connect().await?;
        let Exchange { status, response } = self.transport.select().await?;
        debug!(status = %status, "Applet selected");
        check_response("app-select", status, &response)?;

        self.state = SessionState::Unselected;
        self.refresh_status().await
    }

    /// Release the transport; the session goes back to `Unselected`
    pub async fn end(&mut self) {
        self.transport.disconnect().await;
        self.state = SessionState::Unselected;
        debug!("Card session ended");
    }

    /// Send a command and return the response map.
    ///
    /// The card nonce is captured before the status word and `error` field are checked.
    async fn send_raw(&mut self, command: &'static str, args: Message) -> Result<Message> {
        let Exchange { status, response } = self.transport.transceive(command, args).await?;
        debug!(command, status = %status, "Exchange complete");

        if let Some(nonce) = response.card_nonce() {
            if let SessionState::Selected(sel) = &mut self.state {
                trace!(nonce = %hex::encode(nonce), "Card nonce rotated");
                sel.card_nonce = nonce;
            }
        }

        check_response(command, status, &response)?;
        Ok(response)
    }

    async fn send<C: CardCommand>(&mut self, cmd: &C) -> Result<Message> {
        self.send_raw(C::NAME, cmd.args()).await
    }

    async fn send_authed<C: CardCommand>(
        &mut self,
        cmd: &C,
        auth: Option<&AuthArgs>,
    ) -> Result<Message> {
        self.send_raw(C::NAME, cmd.args().with_auth(auth)).await
    }

    /// Session key and auth arguments for `command`, bound to the current nonce
    fn auth(&self, command: &'static str, cvc: &Cvc) -> Result<(SessionKey, AuthArgs)> {
        let sel = self.selected()?;
        trace!(command, "Deriving session key");
        Ok(derive_session_key(
            command,
            &sel.card_nonce,
            &sel.card_pubkey,
            cvc,
        ))
    }

    async fn send_auth<C: CardCommand>(
        &mut self,
        cmd: &C,
        cvc: &Cvc,
    ) -> Result<(SessionKey, Message)> {
        let (session_key, auth) = self.auth(C::NAME, cvc)?;
        let resp = self.send_authed(cmd, Some(&auth)).await?;
        Ok((session_key, resp))
    }

    async fn refresh_status(&mut self) -> Result<CardStatus> {
        let resp = self.send(&StatusCommand).await?;
        let status = CardStatus::try_from(&resp)?;
        self.apply_status(&status)?;
        Ok(status)
    }

    fn apply_status(&mut self, status: &CardStatus) -> Result<()> {
        if status.proto != 1 {
            return Err(ProtocolError::UnsupportedProtocol(status.proto).into());
        }
        if status.tampered {
            warn!("Card has set tampered flag");
            return Err(ProtocolError::Tampered.into());
        }
        let (active_slot, slot_count) = status.slots;
        if active_slot >= slot_count {
            return Err(ProtocolError::SlotOutOfRange {
                active: active_slot,
                count: slot_count,
            }
            .into());
        }

        match &mut self.state {
            SessionState::Selected(sel) => {
                if sel.kind != status.kind {
                    return Err(ProtocolError::CardKindChanged {
                        was: sel.kind,
                        now: status.kind,
                    }
                    .into());
                }
                if sel.card_pubkey != status.pubkey {
                    return Err(ProtocolError::CardReplaced.into());
                }
                sel.card_nonce = status.card_nonce;
                sel.proto = status.proto;
                sel.applet_version.clone_from(&status.applet_version);
                sel.birth_height = status.birth_height;
                sel.is_testnet = status.testnet;
                sel.auth_delay = status.auth_delay;
                sel.derivation_path.clone_from(&status.path);
                sel.num_backups = status.num_backups;
                sel.active_slot = active_slot;
                sel.slot_count = slot_count;
            }
            SessionState::Unselected => {
                let card_ident = card_pubkey_to_ident(&status.pubkey);
                info!(ident = %card_ident, kind = %status.kind, version = %status.applet_version, "Card selected");
                self.state = SessionState::Selected(Box::new(Selected {
                    card_nonce: status.card_nonce,
                    card_pubkey: status.pubkey,
                    card_ident,
                    kind: status.kind,
                    proto: status.proto,
                    applet_version: status.applet_version.clone(),
                    birth_height: status.birth_height,
                    is_testnet: status.testnet,
                    auth_delay: status.auth_delay,
                    derivation_path: status.path.clone(),
                    num_backups: status.num_backups,
                    active_slot,
                    slot_count,
                    certificate: None,
                }));
            }
        }
        Ok(())
    }

    /// Refresh the nonce and card metadata
    pub async fn status(&mut self) -> Result<CardStatus> {
        self.selected()?;
        self.refresh_status().await
    }

    /// Verify the card was made by Coinkite; runs once per session.
    pub async fn certificate_check(&mut self) -> Result<VerifiedCertificate> {
        if let Some(cert) = &self.selected()?.certificate {
            return Ok(cert.clone());
        }
        self.certificate_check_forced().await
    }

    /// Verify the certificate chain again even if it was verified before
    pub async fn certificate_check_forced(&mut self) -> Result<VerifiedCertificate> {
        let st = self.refresh_status().await?;
        // a sealed SATSCARD slot signs into the check message
        let slot_pubkey = if st.kind == CardKind::SatsCard && st.addr.is_some() {
            Some(self.read_slot(&st).await?.0)
        } else {
            None
        };
        self.run_certificate_check(&st, slot_pubkey.as_ref()).await
    }

    async fn run_certificate_check(
        &mut self,
        st: &CardStatus,
        slot_pubkey: Option<&PublicKey>,
    ) -> Result<VerifiedCertificate> {
        let certs = self.send(&CertsCommand).await?;
        let my_nonce = pick_nonce();
        let card_nonce = self.selected()?.card_nonce;
        let check = self.send(&CheckCommand::with_nonce(my_nonce)).await?;

        let cert = verify_certificate_chain(
            st,
            &check,
            &certs,
            &card_nonce,
            &my_nonce,
            slot_pubkey,
            &self.config.factory_roots,
        )?;
        info!(root = %cert.root_label, "Card certificate verified");
        self.selected_mut()?.certificate = Some(cert.clone());
        Ok(cert)
    }

    /// Unauthenticated SATSCARD `read` of the active slot
    async fn read_slot(&mut self, st: &CardStatus) -> Result<(PublicKey, String)> {
        let my_nonce = pick_nonce();
        let card_nonce = self.selected()?.card_nonce;
        let read = self.send(&ReadCommand::with_nonce(my_nonce)).await?;
        recover_address(st, &read, &card_nonce, &my_nonce)
    }

    /// SATSCARD payment address of a slot, checked as configured
    pub async fn address(&mut self, slot: Option<u8>, include_pubkey: bool) -> Result<SlotAddress> {
        let mode = self.config.address_mode;
        self.address_with_mode(mode, slot, include_pubkey).await
    }

    /// SATSCARD payment address of a slot (the active one by default).
    ///
    /// [`AddressMode::Full`] also checks the certificate chain (once per session) and
    /// re-derives the slot key from the master key the card discloses. Other slots are
    /// answered from `dump` and cannot carry a pubkey.
    pub async fn address_with_mode(
        &mut self,
        mode: AddressMode,
        slot: Option<u8>,
        include_pubkey: bool,
    ) -> Result<SlotAddress> {
        self.require_kind("address", CardKind::SatsCard)?;
        let st = self.refresh_status().await?;
        let current = st.active_slot();
        let slot = slot.unwrap_or(current);
        check_slot(slot, st.slot_count())?;

        if slot != current {
            let dump = DumpResponse::from(&self.send(&DumpCommand::with_slot(slot)).await?);
            if dump.used == Some(false) {
                return Err(CapabilityError::SlotUnused(slot).into());
            }
            if include_pubkey {
                return Err(CapabilityError::PubkeyNotOnCurrentSlot.into());
            }
            let address = dump.addr.ok_or(ProtocolError::MissingField {
                command: DumpCommand::NAME,
                field: "addr",
            })?;
            return Ok(SlotAddress {
                slot,
                address,
                pubkey: None,
            });
        }

        if st.addr.is_none() {
            return Err(CapabilityError::SlotUnused(slot).into());
        }

        let (pubkey, address) = self.read_slot(&st).await?;

        if mode == AddressMode::Full {
            if self.selected()?.certificate.is_none() {
                self.run_certificate_check(&st, Some(&pubkey)).await?;
            }

            let my_nonce = pick_nonce();
            let card_nonce = self.selected()?.card_nonce;
            let resp = self.send(&DeriveCommand::with_nonce(my_nonce)).await?;
            let derive = DeriveResponse::try_from(&resp)?;
            let master = verify_master_pubkey(
                &derive.master_pubkey,
                &derive.sig,
                &derive.chain_code,
                &my_nonce,
                &card_nonce,
            )?;
            let (derived, _) = verify_derive_address(&derive.chain_code, &master, st.testnet)?;
            if derived != address {
                warn!(slot, "Card did not derive address as expected");
                return Err(VerificationError::DerivedAddressMismatch.into());
            }
        }

        Ok(SlotAddress {
            slot,
            address,
            pubkey: include_pubkey.then_some(pubkey),
        })
    }

    /// TAPSIGNER: current derivation path, e.g. `m/84h/0h/0h`
    pub async fn get_derivation(&mut self) -> Result<String> {
        self.require_kind("get_derivation", CardKind::TapSigner)?;
        let st = self.refresh_status().await?;
        let path = st.path.ok_or(CapabilityError::NotSetUp)?;
        Ok(path_to_string(&path))
    }

    /// TAPSIGNER: switch to a new derivation path (at most 8 hardened components)
    pub async fn set_derivation(&mut self, path: &str, cvc: &Cvc) -> Result<DerivedKey> {
        self.require_kind("set_derivation", CardKind::TapSigner)?;
        let path = validate_derivation_path(path)?;

        let my_nonce = pick_nonce();
        let card_nonce = self.selected()?.card_nonce;
        let cmd = DeriveCommand::with_path(my_nonce, &path);
        let (_, resp) = self.send_auth(&cmd, cvc).await?;
        let derive = DeriveResponse::try_from(&resp)?;

        let master_pubkey = parse_pubkey(&derive.master_pubkey)?;
        let pubkey = derive.pubkey.as_deref().map(parse_pubkey).transpose()?;
        verify_derive_signature(
            pubkey.as_ref().unwrap_or(&master_pubkey),
            &derive.sig,
            &derive.chain_code,
            &my_nonce,
            &card_nonce,
        )?;

        debug!(path = %path_to_string(&path), "Derivation path set");
        self.selected_mut()?.derivation_path = Some(path.clone());
        Ok(DerivedKey {
            path,
            chain_code: derive.chain_code,
            master_pubkey,
            pubkey,
        })
    }

    /// TAPSIGNER: master (`true`) or derived extended public key
    pub async fn xpub(&mut self, cvc: &Cvc, master: bool) -> Result<ExtendedPubKey> {
        self.require_kind("xpub", CardKind::TapSigner)?;
        let (_, resp) = self.send_auth(&XpubCommand::with_master(master), cvc).await?;
        Ok(ExtendedPubKey::from_bytes(&parse_xpub(&resp)?)?)
    }

    /// TAPSIGNER: base58check xpub, master or derived
    pub async fn get_xpub(&mut self, cvc: &Cvc, master: bool) -> Result<String> {
        Ok(self.xpub(cvc, master).await?.to_base58())
    }

    /// TAPSIGNER: master key fingerprint
    pub async fn get_xfp(&mut self, cvc: &Cvc) -> Result<[u8; 4]> {
        Ok(self.xpub(cvc, true).await?.fingerprint())
    }

    /// Public key of the current slot (SATSCARD) or derived path (TAPSIGNER).
    ///
    /// A TAPSIGNER needs the CVC and may apply an unhardened `subpath` off-card. A
    /// SATSCARD whose current slot holds no sealed key yields `None`.
    pub async fn get_pubkey(
        &mut self,
        cvc: Option<&Cvc>,
        subpath: Option<&str>,
    ) -> Result<Option<PubkeyInfo>> {
        let kind = self.selected()?.kind;
        match kind {
            CardKind::TapSigner => {
                let cvc = cvc.ok_or(ValidationError::CvcRequired("get_pubkey"))?;
                let subpath = subpath.map(validate_subpath).transpose()?;
                let st = self.refresh_status().await?;
                if st.path.is_none() {
                    return Err(CapabilityError::NotSetUp.into());
                }

                let pubkey = match subpath {
                    Some(subpath) => self.xpub(cvc, false).await?.derive(&subpath)?,
                    None => {
                        let my_nonce = pick_nonce();
                        let card_nonce = self.selected()?.card_nonce;
                        let (session_key, read) =
                            self.send_auth(&ReadCommand::with_nonce(my_nonce), cvc).await?;
                        recover_pubkey(&read, &card_nonce, &my_nonce, &session_key)?
                    }
                };
                Ok(Some(PubkeyInfo {
                    pubkey,
                    address: None,
                }))
            }
            CardKind::SatsCard => {
                if subpath.is_some() {
                    return Err(ValidationError::SubpathOnSatsCard.into());
                }
                let st = self.refresh_status().await?;
                match self.read_slot(&st).await {
                    Ok((pubkey, address)) => Ok(Some(PubkeyInfo {
                        pubkey,
                        address: Some(address),
                    })),
                    // no sealed key in the current slot
                    Err(e) if e.is_card_code(CODE_BAD_STATE) => Ok(None),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Sign a 32 byte digest; returns `header || r || s`.
    ///
    /// The card picks its signing nonce at random and now and then produces a value it
    /// refuses (code 205) or a signature that does not verify. Both are retried with a
    /// fresh session key, up to the configured attempt budget.
    pub async fn sign_digest(
        &mut self,
        cvc: &Cvc,
        slot: u8,
        digest: &[u8],
        subpath: Option<&str>,
    ) -> Result<RecoverableSignature> {
        let digest = validate_digest(digest)?;
        let sel = self.selected()?;
        let (kind, slot_count) = (sel.kind, sel.slot_count);

        let (slot, subpath) = match kind {
            CardKind::SatsCard => {
                if subpath.is_some() {
                    return Err(ValidationError::SubpathOnSatsCard.into());
                }
                check_slot(slot, slot_count)?;
                (slot, None)
            }
            CardKind::TapSigner => {
                let subpath = subpath.map(validate_subpath).transpose()?;
                (0, Some(subpath.unwrap_or_default()))
            }
        };

        let attempts = self.config.sign_attempts.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let (session_key, auth) = self.auth(SignCommand::NAME, cvc)?;
            let masked = session_key.mask(&digest);
            let cmd = SignCommand::with(slot, &masked, subpath.as_deref());

            match self.send_authed(&cmd, Some(&auth)).await {
                Ok(resp) => {
                    let signed = SignResponse::try_from(&resp)?;
                    let pubkey = parse_pubkey(&signed.pubkey)?;
                    if !verify_digest(&pubkey, &digest, &signed.sig) {
                        warn!(attempt, reason = "bad_signature", "Card signature did not verify, retrying");
                        continue;
                    }
                    debug!(attempt, "Digest signed");
                    return Ok(make_recoverable_sig(&digest, &signed.sig, &pubkey)?);
                }
                Err(e) if e.is_card_code(CODE_UNLUCKY_NUMBER) => {
                    warn!(attempt, reason = "unlucky_number", "Card picked an unusable nonce, retrying");
                    self.refresh_status().await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::SigningExhausted { attempts })
    }

    /// SATSCARD: unseal the active slot and return its private key
    pub async fn unseal_slot(&mut self, cvc: &Cvc) -> Result<UnsealedSlot> {
        let target = self.require_kind("unseal", CardKind::SatsCard)?.active_slot;

        let dump = DumpResponse::from(&self.send(&DumpCommand::with_slot(target)).await?);
        match dump.sealed {
            Some(true) => {}
            Some(false) => return Err(CapabilityError::SlotUnsealed(target).into()),
            None => return Err(CapabilityError::SlotUnused(target).into()),
        }

        let (session_key, resp) = self
            .send_auth(&UnsealCommand::with_slot(target), cvc)
            .await?;
        let unsealed = UnsealResponse::try_from(&resp)?;
        let privkey = unmask_privkey(&session_key, &unsealed.privkey)?;

        let pubkey = parse_pubkey(&unsealed.pubkey)?;
        let secret = parse_secret(privkey.as_bytes())?;
        if secret.public_key() != pubkey {
            return Err(VerificationError::InvalidPrivateKey.into());
        }

        let address = render_address(&pubkey, self.is_testnet());
        info!(slot = unsealed.slot, "Slot unsealed");
        // the card moves on to the next slot, if any; the key is out either way
        if let Err(e) = self.refresh_status().await {
            warn!(error = %e, "Status refresh after unseal failed");
            let sel = self.selected_mut()?;
            if target + 1 < sel.slot_count {
                sel.active_slot = target + 1;
            }
        }

        Ok(UnsealedSlot {
            slot: unsealed.slot,
            privkey,
            address,
        })
    }

    /// SATSCARD: private key of an already unsealed slot
    pub async fn get_privkey(&mut self, cvc: &Cvc, slot: u8) -> Result<PrivateKey> {
        let sel = self.require_kind("dump", CardKind::SatsCard)?;
        check_slot(slot, sel.slot_count)?;

        let (session_key, resp) = self.send_auth(&DumpCommand::with_slot(slot), cvc).await?;
        let dump = DumpResponse::from(&resp);
        match &dump.privkey {
            Some(masked) => {
                let privkey = unmask_privkey(&session_key, masked)?;
                if let Some(pubkey) = &dump.pubkey {
                    let secret = parse_secret(privkey.as_bytes())?;
                    if secret.public_key() != parse_pubkey(pubkey)? {
                        return Err(VerificationError::InvalidPrivateKey.into());
                    }
                }
                Ok(privkey)
            }
            None if dump.used == Some(false) => Err(CapabilityError::SlotUnused(slot).into()),
            None if dump.sealed == Some(true) => Err(CapabilityError::SlotSealed(slot).into()),
            None => Err(CapabilityError::UnknownSlotState(slot).into()),
        }
    }

    /// SATSCARD: state and address of any slot; the CVC reveals unsealed keys
    pub async fn get_slot_usage(&mut self, slot: u8, cvc: Option<&Cvc>) -> Result<SlotUsage> {
        let sel = self.require_kind("dump", CardKind::SatsCard)?;
        check_slot(slot, sel.slot_count)?;
        let (active, testnet) = (sel.active_slot, sel.is_testnet);

        let cmd = DumpCommand::with_slot(slot);
        let (session_key, resp) = match cvc {
            Some(cvc) => {
                let (key, resp) = self.send_auth(&cmd, cvc).await?;
                (Some(key), resp)
            }
            None => (None, self.send(&cmd).await?),
        };
        let dump = DumpResponse::from(&resp);
        let state = dump.state().ok_or(CapabilityError::UnknownSlotState(slot))?;

        let address = match state {
            SlotState::Sealed if slot == active => Some(
                self.address_with_mode(AddressMode::Faster, None, false)
                    .await?
                    .address,
            ),
            SlotState::Unsealed => match (&dump.privkey, &session_key) {
                (Some(masked), Some(key)) => {
                    let privkey = unmask_privkey(key, masked)?;
                    let secret = parse_secret(privkey.as_bytes())?;
                    Some(render_address(&secret.public_key(), testnet))
                }
                _ => dump.addr,
            },
            SlotState::Sealed | SlotState::Unused => dump.addr,
        };

        Ok(SlotUsage {
            slot,
            state,
            address,
        })
    }

    /// Pick a key: TAPSIGNER once in its life, SATSCARD for the next unused slot.
    ///
    /// On a TAPSIGNER [`ChainCodeSource::Card`] means the host picks one.
    pub async fn setup(&mut self, cvc: &Cvc, chain_code: ChainCodeSource) -> Result<SetupOutcome> {
        let kind = self.selected()?.kind;
        let target = match kind {
            CardKind::TapSigner => 0,
            CardKind::SatsCard => {
                let st = self.refresh_status().await?;
                let target = st.active_slot();
                let dump = DumpResponse::from(&self.send(&DumpCommand::with_slot(target)).await?);
                match dump.state() {
                    Some(SlotState::Unused) => {}
                    Some(SlotState::Sealed) => {
                        return Err(CapabilityError::SlotInUse(target).into());
                    }
                    Some(SlotState::Unsealed) if target + 1 >= st.slot_count() => {
                        return Err(CapabilityError::SlotsExhausted(st.slot_count()).into());
                    }
                    Some(SlotState::Unsealed) => {
                        return Err(CapabilityError::SlotUnsealed(target).into());
                    }
                    None => return Err(CapabilityError::UnknownSlotState(target).into()),
                }
                target
            }
        };

        let chain_code = match (chain_code, kind) {
            (ChainCodeSource::Provided(cc), _) => Some(cc),
            (ChainCodeSource::Random, _) | (ChainCodeSource::Card, CardKind::TapSigner) => {
                Some(random_chain_code())
            }
            (ChainCodeSource::Card, CardKind::SatsCard) if target == 0 => {
                return Err(ValidationError::ChainCodeRequired.into());
            }
            (ChainCodeSource::Card, CardKind::SatsCard) => None,
        };

        let (_, resp) = self
            .send_auth(&NewCommand::with(target, chain_code), cvc)
            .await?;

        match kind {
            CardKind::TapSigner => {
                info!("TAPSIGNER ready for use");
                self.refresh_status().await?;
                Ok(SetupOutcome::TapSigner)
            }
            CardKind::SatsCard => {
                let slot = u8::try_from(resp.require_int(NewCommand::NAME, "slot")?).map_err(|_| {
                    ProtocolError::InvalidField {
                        command: NewCommand::NAME,
                        field: "slot",
                        reason: "out of range",
                    }
                })?;
                info!(slot, "SATSCARD slot ready for use");
                self.selected_mut()?.active_slot = slot;
                let address = self.address(None, false).await?;
                Ok(SetupOutcome::SatsCard(address))
            }
        }
    }

    /// Change the CVC; returns the new one once the card accepted it
    pub async fn change_cvc(&mut self, old_cvc: &Cvc, new_cvc: &str) -> Result<Cvc> {
        let new_cvc = Cvc::new(new_cvc)?;
        let (session_key, auth) = self.auth(ChangeCommand::NAME, old_cvc)?;
        let data = session_key.mask(new_cvc.as_bytes());
        self.send_authed(&ChangeCommand::with_masked(data), Some(&auth))
            .await?;
        info!("CVC changed");
        Ok(new_cvc)
    }

    /// TAPSIGNER: encrypted backup of the master key
    pub async fn make_backup(&mut self, cvc: &Cvc) -> Result<Vec<u8>> {
        self.require_kind("backup", CardKind::TapSigner)?;
        let (_, resp) = self.send_auth(&BackupCommand, cvc).await?;
        let data = parse_backup(&resp)?;
        // the card counts backups
        if let Err(e) = self.refresh_status().await {
            warn!(error = %e, "Status refresh after backup failed");
            let sel = self.selected_mut()?;
            sel.num_backups = Some(sel.num_backups.unwrap_or(0) + 1);
        }
        Ok(data)
    }

    /// Burn one unit of auth delay
    pub async fn wait(&mut self, cvc: Option<&Cvc>) -> Result<WaitResponse> {
        let resp = match cvc {
            Some(cvc) => self.send_auth(&WaitCommand, cvc).await?.1,
            None => {
                self.selected()?;
                self.send(&WaitCommand).await?
            }
        };
        let waited = WaitResponse::from(&resp);
        self.selected_mut()?.auth_delay = waited.auth_delay;
        Ok(waited)
    }

    /// The URL the card would hand out if tapped right now
    pub async fn get_nfc_url(&mut self) -> Result<String> {
        self.selected()?;
        let resp = self.send(&NfcCommand).await?;
        Ok(parse_nfc_url(&resp)?)
    }
}

/// Turn a response into an error if the card says so
fn check_response(command: &str, status: StatusWord, response: &Message) -> Result<()> {
    if let Some(message) = response.text("error") {
        let code = response
            .int("code")
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        if code == CODE_RATE_LIMITED {
            warn!(command, "Card is enforcing its auth delay");
        } else {
            debug!(command, code, error = message, "Card reported an error");
        }
        return Err(CardError {
            command: command.to_string(),
            code,
            message: message.to_string(),
            status: (!status.is_success()).then_some(status),
        }
        .into());
    }
    if !status.is_success() {
        return Err(ProtocolError::UnexpectedStatus {
            command: command.to_string(),
            status,
        }
        .into());
    }
    Ok(())
}

fn check_slot(slot: u8, count: u8) -> Result<()> {
    if slot >= count {
        return Err(ValidationError::SlotOutOfRange { slot, count }.into());
    }
    Ok(())
}

fn unmask_privkey(session_key: &SessionKey, masked: &[u8]) -> Result<PrivateKey> {
    let raw = session_key.unmask(masked);
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| ProtocolError::InvalidField {
        command: DumpCommand::NAME,
        field: "privkey",
        reason: "unexpected length",
    })?;
    Ok(PrivateKey::new(bytes))
}
