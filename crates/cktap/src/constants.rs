use hex_literal::hex;

/// Application ID of the Coinkite Tap applet (`\xf0CoinkiteCARDv1`)
pub const APP_ID: [u8; 15] = hex!("f0436f696e6b697465434152447631");

/// APDU header (CLA, INS, P1, P2) of the ISO 7816 SELECT used to pick the applet
pub const SELECT_CLA_INS_P1P2: [u8; 4] = [0x00, 0xA4, 0x04, 0x00];
/// APDU header (CLA, INS, P1, P2) of the single CBOR carrying command
pub const CBOR_CLA_INS_P1P2: [u8; 4] = [0x00, 0xCB, 0x00, 0x00];

/// Status word returned with every successful response
pub const SW_OKAY: u16 = 0x9000;

/// Size of the nonce picked by the card (bytes)
pub const CARD_NONCE_SIZE: usize = 16;
/// Size of the nonce picked by the app (bytes)
pub const USER_NONCE_SIZE: usize = 16;

/// Number of key slots on a SATSCARD
pub const NUM_SLOTS: u8 = 10;

/// Length of the CVC printed on the back of the card
pub const CVC_LENGTH: usize = 6;
/// Shortest CVC the card accepts
pub const CVC_MIN_LENGTH: usize = 6;
/// Longest CVC the card accepts
pub const CVC_MAX_LENGTH: usize = 32;

/// Maximum number of components accepted by the `derive` command
pub const DERIVE_MAX_BIP32_PATH_DEPTH: usize = 8;
/// Maximum number of components of a `sign` subpath
pub const SIGN_MAX_SUBPATH_DEPTH: usize = 2;

/// Characters kept on each side of the censored address in the status response
pub const ADDR_TRIM: usize = 12;

/// Prefix of every message the card signs to prove key possession
pub const OPENDIME: &[u8; 8] = b"OPENDIME";

/// Card error code: the picked value is not a valid key/nonce, retry
pub const CODE_UNLUCKY_NUMBER: u16 = 205;
/// Card error code: bad CVC
pub const CODE_BAD_AUTH: u16 = 401;
/// Card error code: command not valid in the current slot state
pub const CODE_BAD_STATE: u16 = 406;
/// Card error code: too many CVC attempts, `wait` required
pub const CODE_RATE_LIMITED: u16 = 429;

/// Number of attempts `sign_digest` makes before giving up
pub const SIGN_ATTEMPTS: usize = 4;

/// Hardened bit of a BIP-32 path component
pub const HARDENED: u32 = 0x8000_0000;

/// Published Coinkite factory root keys
pub mod roots {
    use super::hex;

    /// Production factory root
    pub const ROOT_FACTORY: [u8; 33] =
        hex!("03028a0e89e70d0ec0d932053a89ab1da7d9182bdc6d2f03e706ee99517d05d9e1");
    /// Root used for cards issued for testing
    pub const ROOT_FACTORY_TESTING: [u8; 33] =
        hex!("027722ef208e681bac05f1b4b3cc478d6bf353ac9a09ff0c843430138f65c27bab");
}
