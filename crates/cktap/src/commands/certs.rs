use super::CardCommand;
use crate::message::Message;

/// `certs`: the certificate chain from the card key up to a factory root
#[derive(Debug, Clone, Copy, Default)]
pub struct CertsCommand;

impl CardCommand for CertsCommand {
    const NAME: &'static str = "certs";

    fn args(&self) -> Message {
        Message::new()
    }
}
