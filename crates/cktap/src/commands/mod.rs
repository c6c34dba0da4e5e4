//! Card commands
//!
//! Each command builds its argument map and, where the response carries more than the
//! card nonce, parses it into a typed response. Authentication (`epubkey`/`xcvc`) and
//! argument masking are applied by the session, which owns the nonce.

pub mod backup;
pub use backup::*;
pub mod certs;
pub use certs::*;
pub mod change;
pub use change::*;
pub mod check;
pub use check::*;
pub mod derive;
pub use derive::*;
pub mod dump;
pub use dump::*;
pub mod new;
pub use new::*;
pub mod nfc;
pub use nfc::*;
pub mod read;
pub use read::*;
pub mod sign;
pub use sign::*;
pub mod status;
pub use status::*;
pub mod unseal;
pub use unseal::*;
pub mod wait;
pub use wait::*;
pub mod xpub;
pub use xpub::*;

use crate::message::Message;

/// A command understood by the card
pub trait CardCommand {
    /// Value of the `cmd` field
    const NAME: &'static str;

    /// Arguments, before authentication is attached
    fn args(&self) -> Message;
}
