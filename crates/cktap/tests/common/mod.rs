//! Common test utilities: an in-memory SATSCARD/TAPSIGNER

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use ciborium::Value;
use hmac::{Hmac, Mac};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256, Sha512};

use nexum_cktap::crypto::{hash160, make_recoverable_sig, render_address, sec1, xor_bytes};
use nexum_cktap::{
    AddressMode, CardSession, CardTransport, Cvc, Exchange, FactoryRoot, HARDENED, Message,
    NUM_SLOTS, SessionConfig, StatusWord, TransportError,
};

/// CVC the simulated cards start with
pub const CVC: &str = "123456";

/// Path a fresh TAPSIGNER uses
pub const DEFAULT_PATH: [u32; 3] = [84 | HARDENED, HARDENED, HARDENED];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn cvc() -> Cvc {
    Cvc::new(CVC).unwrap()
}

pub fn key(seed: u8) -> SecretKey {
    SecretKey::from_slice(&[seed; 32]).unwrap()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sign(secret: &SecretKey, digest: &[u8; 32]) -> [u8; 64] {
    let sig: Signature = SigningKey::from(secret).sign_prehash(digest).unwrap();
    sig.to_bytes().into()
}

/// BIP-32 private child derivation
pub fn ckd_priv(parent: &SecretKey, chain_code: &[u8; 32], index: u32) -> (SecretKey, [u8; 32]) {
    let mut mac = Hmac::<Sha512>::new_from_slice(chain_code).unwrap();
    if index & HARDENED != 0 {
        mac.update(&[0]);
        mac.update(&parent.to_bytes());
    } else {
        mac.update(&sec1(&parent.public_key()));
    }
    mac.update(&index.to_be_bytes());
    let i = mac.finalize().into_bytes();

    let tweak = SecretKey::from_slice(&i[..32]).unwrap();
    let sum = *parent.to_nonzero_scalar() + *tweak.to_nonzero_scalar();
    let child = SecretKey::from_bytes(&sum.to_bytes()).unwrap();
    let mut cc = [0u8; 32];
    cc.copy_from_slice(&i[32..]);
    (child, cc)
}

pub fn ckd_path(master: &SecretKey, chain_code: &[u8; 32], path: &[u32]) -> (SecretKey, [u8; 32]) {
    path.iter()
        .fold((master.clone(), *chain_code), |(key, cc), index| {
            ckd_priv(&key, &cc, *index)
        })
}

fn nonce_digest(card_nonce: &[u8; 16], my_nonce: &[u8], extra: &[u8]) -> [u8; 32] {
    let mut msg = b"OPENDIME".to_vec();
    msg.extend_from_slice(card_nonce);
    msg.extend_from_slice(my_nonce);
    msg.extend_from_slice(extra);
    sha256(&msg)
}

fn certify(signer: &SecretKey, subject: &PublicKey) -> Vec<u8> {
    let digest = sha256(&sec1(subject));
    let sig = sign(signer, &digest);
    make_recoverable_sig(&digest, &sig, &signer.public_key())
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Root the simulated certificate chains end at
pub fn test_root() -> FactoryRoot {
    FactoryRoot::new("Test Root", sec1(&key(0x33).public_key()))
}

/// Config accepting the simulator's root, with no pause between signing attempts
pub fn test_config() -> SessionConfig {
    SessionConfig::new()
        .with_extra_root(test_root())
        .with_retry_delay(Duration::ZERO)
}

/// One SATSCARD slot
#[derive(Debug, Clone)]
pub struct SimSlot {
    pub master: Option<SecretKey>,
    pub chain_code: [u8; 32],
    pub sealed: bool,
}

impl SimSlot {
    const fn unused() -> Self {
        Self {
            master: None,
            chain_code: [0u8; 32],
            sealed: false,
        }
    }

    /// Payment key: `m/0` below the slot master
    pub fn key(&self) -> Option<SecretKey> {
        self.master
            .as_ref()
            .map(|master| ckd_priv(master, &self.chain_code, 0).0)
    }
}

#[derive(Debug, Clone)]
pub enum SimKind {
    SatsCard { slots: Vec<SimSlot>, active: usize },
    TapSigner {
        master: Option<SecretKey>,
        chain_code: [u8; 32],
        path: Option<Vec<u32>>,
        num_backups: u64,
    },
}

type Reply = Result<Message, (u16, &'static str)>;

/// Card double speaking the command/response maps directly
#[derive(Debug)]
pub struct SimCard {
    pub kind: SimKind,
    pub card_key: SecretKey,
    pub certs: Vec<Vec<u8>>,
    pub cvc: Vec<u8>,
    pub testnet: bool,
    pub auth_delay: u64,
    /// Upcoming `sign` commands answered with code 205
    pub unlucky: usize,
    /// Upcoming `sign` commands answered with a signature that does not verify
    pub bad_sigs: usize,
    /// Answer SATSCARD `derive` with a chain code other than the slot's
    pub lying_derive: bool,
    /// Protocol version reported by `status`
    pub proto: u64,
    /// Report the tamper flag in `status`
    pub tampered: bool,
    /// Drop the link on the `status` that directly follows this command
    pub fail_status_after: Option<&'static str>,
    /// Names of the commands received, in order
    pub log: Vec<String>,
    nonce: [u8; 16],
    counter: u64,
    connected: bool,
}

impl SimCard {
    fn new(kind: SimKind) -> Self {
        let (card, batch, root) = (key(0x11), key(0x22), key(0x33));
        let mut sim = Self {
            kind,
            certs: vec![
                certify(&batch, &card.public_key()),
                certify(&root, &batch.public_key()),
            ],
            card_key: card,
            cvc: CVC.as_bytes().to_vec(),
            testnet: false,
            auth_delay: 0,
            unlucky: 0,
            bad_sigs: 0,
            lying_derive: false,
            proto: 1,
            tampered: false,
            fail_status_after: None,
            log: Vec::new(),
            nonce: [0u8; 16],
            counter: 0,
            connected: false,
        };
        sim.rotate_nonce();
        sim
    }

    /// SATSCARD with slot 0 sealed
    pub fn satscard() -> Self {
        let mut slots = vec![SimSlot::unused(); NUM_SLOTS as usize];
        slots[0] = SimSlot {
            master: Some(key(0x50)),
            chain_code: [0x51; 32],
            sealed: true,
        };
        Self::new(SimKind::SatsCard { slots, active: 0 })
    }

    /// SATSCARD that never picked a key
    pub fn satscard_blank() -> Self {
        let slots = vec![SimSlot::unused(); NUM_SLOTS as usize];
        Self::new(SimKind::SatsCard { slots, active: 0 })
    }

    /// TAPSIGNER already set up at `m/84h/0h/0h`
    pub fn tapsigner() -> Self {
        Self::new(SimKind::TapSigner {
            master: Some(key(0x60)),
            chain_code: [0x61; 32],
            path: Some(DEFAULT_PATH.to_vec()),
            num_backups: 0,
        })
    }

    /// TAPSIGNER fresh from the factory
    pub fn tapsigner_blank() -> Self {
        Self::new(SimKind::TapSigner {
            master: None,
            chain_code: [0u8; 32],
            path: None,
            num_backups: 0,
        })
    }

    pub const fn nonce(&self) -> [u8; 16] {
        self.nonce
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn count(&self, command: &str) -> usize {
        self.log.iter().filter(|c| *c == command).count()
    }

    pub fn slot(&self, index: usize) -> &SimSlot {
        match &self.kind {
            SimKind::SatsCard { slots, .. } => &slots[index],
            SimKind::TapSigner { .. } => panic!("not a SATSCARD"),
        }
    }

    pub fn active_slot(&self) -> usize {
        match &self.kind {
            SimKind::SatsCard { active, .. } => *active,
            SimKind::TapSigner { .. } => 0,
        }
    }

    /// TAPSIGNER key at its current path, then `subpath`
    pub fn tapsigner_key(&self, subpath: &[u32]) -> (SecretKey, [u8; 32]) {
        match &self.kind {
            SimKind::TapSigner {
                master: Some(master),
                chain_code,
                path: Some(path),
                ..
            } => {
                let (key, cc) = ckd_path(master, chain_code, path);
                ckd_path(&key, &cc, subpath)
            }
            _ => panic!("not a set up TAPSIGNER"),
        }
    }

    pub fn tapsigner_master(&self) -> PublicKey {
        match &self.kind {
            SimKind::TapSigner {
                master: Some(master),
                ..
            } => master.public_key(),
            _ => panic!("not a set up TAPSIGNER"),
        }
    }

    fn rotate_nonce(&mut self) {
        self.counter += 1;
        let md = sha256(&self.counter.to_be_bytes());
        self.nonce.copy_from_slice(&md[..16]);
    }

    fn respond(&mut self, reply: Reply) -> Exchange {
        self.rotate_nonce();
        let response = match reply {
            Ok(msg) => msg,
            Err((code, error)) => Message::new()
                .with_int("code", u64::from(code))
                .with_text("error", error),
        }
        .with_bytes("card_nonce", &self.nonce);
        Exchange {
            status: StatusWord::OK,
            response,
        }
    }

    /// Session key of an authenticated command, if the CVC checks out
    fn authenticate(&self, command: &str, args: &Message) -> Result<[u8; 32], (u16, &'static str)> {
        let (Some(epubkey), Some(xcvc)) = (args.bytes("epubkey"), args.bytes("xcvc")) else {
            return Err((401, "auth required"));
        };
        if self.auth_delay > 0 {
            return Err((429, "auth delay"));
        }
        let epub = PublicKey::from_sec1_bytes(epubkey).map_err(|_| (400, "bad epubkey"))?;
        let shared = (epub.to_projective() * *self.card_key.to_nonzero_scalar()).to_affine();
        let session_key = sha256(shared.to_encoded_point(true).as_bytes());

        let mut md_input = self.nonce.to_vec();
        md_input.extend_from_slice(command.as_bytes());
        let mask = xor_bytes(&session_key, &sha256(&md_input));
        if xor_bytes(xcvc, &mask) != self.cvc || xcvc.len() != self.cvc.len() {
            return Err((401, "bad auth"));
        }
        Ok(session_key)
    }

    fn fresh_key(&mut self) -> SecretKey {
        self.counter += 1;
        let mut seed = b"key".to_vec();
        seed.extend_from_slice(&self.counter.to_be_bytes());
        SecretKey::from_slice(&sha256(&seed)).unwrap()
    }

    fn status(&self) -> Message {
        let msg = Message::new()
            .with_int("proto", self.proto)
            .with_text("ver", "1.0.3")
            .with_int("birth", 700_000)
            .with_bytes("pubkey", &sec1(&self.card_key.public_key()))
            .with_int("auth_delay", self.auth_delay);
        let msg = if self.testnet {
            msg.with_bool("testnet", true)
        } else {
            msg
        };
        let msg = if self.tampered {
            msg.with_bool("tampered", true)
        } else {
            msg
        };
        match &self.kind {
            SimKind::SatsCard { slots, active } => {
                let msg = msg.with_path("slots", &[*active as u32, NUM_SLOTS as u32]);
                let slot = &slots[*active];
                match slot.key() {
                    Some(key) if slot.sealed => {
                        let addr = render_address(&key.public_key(), self.testnet);
                        let censored =
                            format!("{}___{}", &addr[..12], &addr[addr.len() - 12..]);
                        msg.with_text("addr", &censored)
                    }
                    _ => msg,
                }
            }
            SimKind::TapSigner {
                path, num_backups, ..
            } => {
                let msg = msg
                    .with_bool("tapsigner", true)
                    .with_int("num_backups", *num_backups);
                match path {
                    Some(path) => msg.with_path("path", path),
                    None => msg,
                }
            }
        }
    }

    fn handle(&mut self, command: &str, args: &Message) -> Reply {
        match command {
            "status" => Ok(self.status()),
            "certs" => Ok(Message::new().with(
                "cert_chain",
                Value::Array(self.certs.iter().cloned().map(Value::Bytes).collect()),
            )),
            "check" => {
                let my_nonce = args.bytes("nonce").ok_or((400, "nonce required"))?;
                let extra = match &self.kind {
                    SimKind::SatsCard { slots, active } => match slots[*active].key() {
                        Some(key) if slots[*active].sealed => sec1(&key.public_key()).to_vec(),
                        _ => Vec::new(),
                    },
                    SimKind::TapSigner { .. } => Vec::new(),
                };
                let digest = nonce_digest(&self.nonce, my_nonce, &extra);
                Ok(Message::new().with_bytes("auth_sig", &sign(&self.card_key, &digest)))
            }
            "read" => self.read(args),
            "derive" => self.derive(args),
            "sign" => self.sign(args),
            "unseal" => self.unseal(args),
            "dump" => self.dump(args),
            "new" => self.new_key(args),
            "xpub" => self.xpub(args),
            "change" => {
                let session_key = self.authenticate(command, args)?;
                let data = args.bytes("data").ok_or((400, "data required"))?;
                let new_cvc = xor_bytes(data, &session_key);
                if !(6..=32).contains(&new_cvc.len()) {
                    return Err((400, "bad cvc length"));
                }
                self.cvc = new_cvc;
                Ok(Message::new().with_bool("success", true))
            }
            "backup" => {
                self.authenticate(command, args)?;
                match &mut self.kind {
                    SimKind::TapSigner { num_backups, .. } => *num_backups += 1,
                    SimKind::SatsCard { .. } => return Err((404, "unknown command")),
                }
                Ok(Message::new().with_bytes("data", &[0xb4; 100]))
            }
            "wait" => {
                self.auth_delay = self.auth_delay.saturating_sub(1);
                Ok(Message::new()
                    .with_bool("success", true)
                    .with_int("auth_delay", self.auth_delay))
            }
            "nfc" => Ok(Message::new().with_text("url", "getsatscard.com/start#u=S&o=0&r=a")),
            _ => Err((404, "unknown command")),
        }
    }

    fn read(&mut self, args: &Message) -> Reply {
        let my_nonce = args.bytes("nonce").ok_or((400, "nonce required"))?.to_vec();
        match &self.kind {
            SimKind::SatsCard { slots, active } => {
                let slot = &slots[*active];
                let key = match slot.key() {
                    Some(key) if slot.sealed => key,
                    _ => return Err((406, "slot not sealed")),
                };
                let digest = nonce_digest(&self.nonce, &my_nonce, &[*active as u8]);
                Ok(Message::new()
                    .with_bytes("sig", &sign(&key, &digest))
                    .with_bytes("pubkey", &sec1(&key.public_key())))
            }
            SimKind::TapSigner { path: None, .. } => Err((406, "not set up")),
            SimKind::TapSigner { .. } => {
                let session_key = self.authenticate("read", args)?;
                let (key, _) = self.tapsigner_key(&[]);
                let digest = nonce_digest(&self.nonce, &my_nonce, &[0]);
                let pubkey = sec1(&key.public_key());
                let mut masked = vec![pubkey[0]];
                masked.extend(xor_bytes(&pubkey[1..], &session_key));
                Ok(Message::new()
                    .with_bytes("sig", &sign(&key, &digest))
                    .with_bytes("pubkey", &masked))
            }
        }
    }

    fn derive(&mut self, args: &Message) -> Reply {
        let my_nonce = args.bytes("nonce").ok_or((400, "nonce required"))?.to_vec();
        match &self.kind {
            SimKind::SatsCard { slots, active } => {
                let slot = &slots[*active];
                let master = match &slot.master {
                    Some(master) if slot.sealed => master.clone(),
                    _ => return Err((406, "slot not sealed")),
                };
                let chain_code = if self.lying_derive {
                    [0x99; 32]
                } else {
                    slot.chain_code
                };
                let digest = nonce_digest(&self.nonce, &my_nonce, &chain_code);
                Ok(Message::new()
                    .with_bytes("sig", &sign(&master, &digest))
                    .with_bytes("chain_code", &chain_code)
                    .with_bytes("master_pubkey", &sec1(&master.public_key())))
            }
            SimKind::TapSigner { .. } => {
                self.authenticate("derive", args)?;
                let master = match &self.kind {
                    SimKind::TapSigner {
                        master: Some(master),
                        ..
                    } => master.clone(),
                    _ => return Err((406, "not set up")),
                };
                let path: Vec<u32> = args
                    .int_list("path")
                    .ok_or((400, "path required"))?
                    .into_iter()
                    .map(|c| c as u32)
                    .collect();
                if let SimKind::TapSigner { path: current, .. } = &mut self.kind {
                    *current = Some(path.clone());
                }
                let (key, chain_code) = self.tapsigner_key(&[]);
                let signer = if path.is_empty() { &master } else { &key };
                let digest = nonce_digest(&self.nonce, &my_nonce, &chain_code);
                let msg = Message::new()
                    .with_bytes("sig", &sign(signer, &digest))
                    .with_bytes("chain_code", &chain_code)
                    .with_bytes("master_pubkey", &sec1(&master.public_key()));
                Ok(if path.is_empty() {
                    msg
                } else {
                    msg.with_bytes("pubkey", &sec1(&key.public_key()))
                })
            }
        }
    }

    fn sign(&mut self, args: &Message) -> Reply {
        let session_key = self.authenticate("sign", args)?;
        if self.unlucky > 0 {
            self.unlucky -= 1;
            return Err((205, "unlucky number"));
        }
        let masked = args.bytes("digest").ok_or((400, "digest required"))?;
        let digest: [u8; 32] = xor_bytes(masked, &session_key)
            .try_into()
            .map_err(|_| (400, "bad digest"))?;

        let key = match &self.kind {
            SimKind::SatsCard { slots, .. } => {
                let index = args.int("slot").ok_or((400, "slot required"))? as usize;
                let slot = slots.get(index).ok_or((400, "bad slot"))?;
                match slot.key() {
                    Some(key) if !slot.sealed => key,
                    _ => return Err((406, "slot not unsealed")),
                }
            }
            SimKind::TapSigner { .. } => {
                let subpath: Vec<u32> = args
                    .int_list("subpath")
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| c as u32)
                    .collect();
                self.tapsigner_key(&subpath).0
            }
        };

        let sig = if self.bad_sigs > 0 {
            self.bad_sigs -= 1;
            sign(&key, &[0x42; 32])
        } else {
            sign(&key, &digest)
        };
        Ok(Message::new()
            .with_int("slot", args.int("slot").unwrap_or(0))
            .with_bytes("sig", &sig)
            .with_bytes("pubkey", &sec1(&key.public_key())))
    }

    fn unseal(&mut self, args: &Message) -> Reply {
        let session_key = self.authenticate("unseal", args)?;
        let requested = args.int("slot").ok_or((400, "slot required"))? as usize;
        let SimKind::SatsCard { slots, active } = &mut self.kind else {
            return Err((404, "unknown command"));
        };
        if requested != *active {
            return Err((400, "not the active slot"));
        }
        let slot = &mut slots[requested];
        let key = match slot.key() {
            Some(key) if slot.sealed => key,
            _ => return Err((406, "slot not sealed")),
        };
        slot.sealed = false;
        if *active + 1 < slots.len() {
            *active += 1;
        }
        Ok(Message::new()
            .with_int("slot", requested as u64)
            .with_bytes("privkey", &xor_bytes(&key.to_bytes(), &session_key))
            .with_bytes("pubkey", &sec1(&key.public_key())))
    }

    fn dump(&mut self, args: &Message) -> Reply {
        let session_key = if args.contains("epubkey") {
            Some(self.authenticate("dump", args)?)
        } else {
            None
        };
        let index = args.int("slot").ok_or((400, "slot required"))? as usize;
        let SimKind::SatsCard { slots, .. } = &self.kind else {
            return Err((404, "unknown command"));
        };
        let slot = slots.get(index).ok_or((400, "bad slot"))?;
        let msg = Message::new().with_int("slot", index as u64);
        let Some(key) = slot.key() else {
            return Ok(msg.with_bool("used", false));
        };
        if slot.sealed {
            return Ok(msg.with_bool("sealed", true));
        }
        let msg = msg
            .with_bool("sealed", false)
            .with_text("addr", &render_address(&key.public_key(), self.testnet))
            .with_bytes("pubkey", &sec1(&key.public_key()));
        Ok(match session_key {
            Some(session_key) => msg
                .with_bytes("privkey", &xor_bytes(&key.to_bytes(), &session_key))
                .with_bytes("chain_code", &slot.chain_code),
            None => msg,
        })
    }

    fn new_key(&mut self, args: &Message) -> Reply {
        self.authenticate("new", args)?;
        let requested = args.int("slot").ok_or((400, "slot required"))? as usize;
        let chain_code = match args.bytes("chain_code") {
            Some(cc) => Some(<[u8; 32]>::try_from(cc).map_err(|_| (400, "bad chain code"))?),
            None => None,
        };
        let master = self.fresh_key();
        let picked_cc = sha256(&master.to_bytes());

        match &mut self.kind {
            SimKind::SatsCard { slots, active } => {
                if requested != *active || slots[requested].master.is_some() {
                    return Err((406, "slot in use"));
                }
                slots[requested] = SimSlot {
                    master: Some(master),
                    chain_code: chain_code.unwrap_or(picked_cc),
                    sealed: true,
                };
            }
            SimKind::TapSigner {
                master: current,
                chain_code: cc,
                path,
                ..
            } => {
                if current.is_some() {
                    return Err((406, "already set up"));
                }
                *current = Some(master);
                *cc = chain_code.ok_or((400, "chain code required"))?;
                *path = Some(DEFAULT_PATH.to_vec());
            }
        }
        Ok(Message::new().with_int("slot", requested as u64))
    }

    fn xpub(&mut self, args: &Message) -> Reply {
        self.authenticate("xpub", args)?;
        let master_requested = args.bool("master").unwrap_or(false);
        let SimKind::TapSigner {
            master: Some(master),
            chain_code,
            path: Some(path),
            ..
        } = &self.kind
        else {
            return Err((406, "not set up"));
        };

        let mut raw = vec![0x04, 0x88, 0xB2, 0x1E];
        if master_requested || path.is_empty() {
            raw.extend_from_slice(&[0u8; 9]);
            raw.extend_from_slice(chain_code);
            raw.extend_from_slice(&sec1(&master.public_key()));
        } else {
            let (parent, _) = ckd_path(master, chain_code, &path[..path.len() - 1]);
            let (key, cc) = ckd_path(master, chain_code, path);
            raw.push(path.len() as u8);
            raw.extend_from_slice(&hash160(&sec1(&parent.public_key()))[..4]);
            raw.extend_from_slice(&path[path.len() - 1].to_be_bytes());
            raw.extend_from_slice(&cc);
            raw.extend_from_slice(&sec1(&key.public_key()));
        }
        Ok(Message::new().with_bytes("xpub", &raw))
    }
}

#[async_trait]
impl CardTransport for SimCard {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn select(&mut self) -> Result<Exchange, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(Exchange::ok(Message::new()))
    }

    async fn transceive(
        &mut self,
        command: &str,
        args: Message,
    ) -> Result<Exchange, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let previous = self.log.last().cloned();
        self.log.push(command.to_string());
        if command == "status"
            && self.fail_status_after.is_some()
            && self.fail_status_after == previous.as_deref()
        {
            self.fail_status_after = None;
            return Err(TransportError::Transmission);
        }
        let reply = self.handle(command, &args);
        Ok(self.respond(reply))
    }
}

/// Selected session over `sim` with the test config
pub async fn open(sim: SimCard) -> CardSession<SimCard> {
    init_tracing();
    let mut session = CardSession::new(sim, test_config());
    session.select_app().await.unwrap();
    session.transport_mut().clear_log();
    session
}

/// Same as [`open`] with `address` trusting `read` alone
pub async fn open_faster(sim: SimCard) -> CardSession<SimCard> {
    init_tracing();
    let mut session = CardSession::new(
        sim,
        test_config().with_address_mode(AddressMode::Faster),
    );
    session.select_app().await.unwrap();
    session.transport_mut().clear_log();
    session
}
