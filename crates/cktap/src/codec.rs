//! CBOR codec between [`Message`]s and raw card frames
//!
//! A command is the CBOR map `{cmd, ..args}`. Readers need it wrapped in the single
//! ISO 7816 APDU the applet accepts (`00 CB 00 00 Lc data`); the desktop emulator takes
//! the bare CBOR. Either way the card answers with a CBOR map followed by SW1 SW2.

use std::fmt;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use ciborium::value::Value;
use tracing::{debug, trace};

use crate::constants::{APP_ID, CBOR_CLA_INS_P1P2, SELECT_CLA_INS_P1P2};
use crate::message::Message;
use crate::transport::{CardTransport, Exchange, StatusWord, TransportError};

/// Largest payload of a short APDU
const MAX_SHORT_APDU_DATA: usize = 255;

/// Byte level link to a card: an NFC reader, or the emulator socket
#[async_trait]
pub trait ApduLink: fmt::Debug + Send {
    /// Open the link
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Close the link
    async fn close(&mut self);

    /// Send one frame, return the full response including the status word
    async fn transmit(&mut self, frame: Bytes) -> Result<Bytes, TransportError>;
}

/// How commands are framed on the link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framing {
    /// ISO 7816 APDU around the CBOR (real cards)
    #[default]
    Apdu,
    /// CBOR only (emulator)
    Bare,
}

/// CBOR encode `{cmd: command, ..args}`
pub fn encode_command(command: &str, args: Message) -> Result<Bytes, TransportError> {
    let map = args.with_text("cmd", command).into_value();
    let mut out = Vec::new();
    ciborium::into_writer(&map, &mut out).map_err(|e| TransportError::Codec(e.to_string()))?;
    Ok(Bytes::from(out))
}

/// Wrap CBOR in the applet's command APDU
pub fn wrap_apdu(cbor: &[u8]) -> Result<Bytes, TransportError> {
    if cbor.len() > MAX_SHORT_APDU_DATA {
        return Err(TransportError::CommandTooLong(cbor.len()));
    }
    let mut buf = BytesMut::with_capacity(5 + cbor.len());
    buf.put_slice(&CBOR_CLA_INS_P1P2);
    buf.put_u8(cbor.len() as u8);
    buf.put_slice(cbor);
    Ok(buf.freeze())
}

/// ISO 7816 SELECT of the Coinkite applet
pub fn select_apdu() -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + APP_ID.len());
    buf.put_slice(&SELECT_CLA_INS_P1P2);
    buf.put_u8(APP_ID.len() as u8);
    buf.put_slice(&APP_ID);
    buf.freeze()
}

/// Split off the status word and decode the CBOR body
pub fn decode_response(raw: &[u8]) -> Result<Exchange, TransportError> {
    if raw.len() < 2 {
        debug!("Response too short: {} bytes", raw.len());
        return Err(TransportError::Codec(format!(
            "response too short: {} bytes",
            raw.len()
        )));
    }
    let (body, sw) = raw.split_at(raw.len() - 2);
    let status = StatusWord::from_bytes(sw[0], sw[1]);

    let response = if body.is_empty() {
        Message::new()
    } else {
        let value: Value =
            ciborium::from_reader(body).map_err(|e| TransportError::Codec(e.to_string()))?;
        Message::from_value(value).map_err(|e| TransportError::Codec(e.to_string()))?
    };

    Ok(Exchange { status, response })
}

/// [`CardTransport`] speaking CBOR over an [`ApduLink`]
#[derive(Debug)]
pub struct CborTransport<L> {
    link: L,
    framing: Framing,
    connected: bool,
}

impl<L: ApduLink> CborTransport<L> {
    /// Transport over a reader link
    pub const fn new(link: L) -> Self {
        Self {
            link,
            framing: Framing::Apdu,
            connected: false,
        }
    }

    /// Set the framing
    pub const fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// The underlying link
    pub const fn link(&self) -> &L {
        &self.link
    }

    async fn round_trip(&mut self, frame: Bytes) -> Result<Exchange, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        trace!(command = ?hex::encode(&frame), "Transmitting frame");
        let raw = self.link.transmit(frame).await.inspect_err(|e| {
            debug!(error = ?e, "Link error during transmission");
        })?;
        trace!(response = ?hex::encode(&raw), "Received frame");
        decode_response(&raw)
    }
}

#[async_trait]
impl<L: ApduLink> CardTransport for CborTransport<L> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.link.open().await?;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.link.close().await;
            self.connected = false;
        }
    }

    async fn select(&mut self) -> Result<Exchange, TransportError> {
        match self.framing {
            Framing::Apdu => self.round_trip(select_apdu()).await,
            // the emulator has no applet to select, status serves the same purpose
            Framing::Bare => self.transceive("status", Message::new()).await,
        }
    }

    async fn transceive(
        &mut self,
        command: &str,
        args: Message,
    ) -> Result<Exchange, TransportError> {
        let cbor = encode_command(command, args)?;
        let frame = match self.framing {
            Framing::Apdu => wrap_apdu(&cbor)?,
            Framing::Bare => cbor,
        };
        self.round_trip(frame).await
    }
}

#[cfg(all(feature = "emulator", unix))]
pub use socket::{DEFAULT_EMULATOR_PIPE, SocketLink};

#[cfg(all(feature = "emulator", unix))]
mod socket {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    use super::ApduLink;
    use crate::transport::TransportError;

    /// Default socket of the desktop card emulator
    pub const DEFAULT_EMULATOR_PIPE: &str = "/tmp/ecard-pipe";

    /// Unix socket link to the card emulator
    #[derive(Debug)]
    pub struct SocketLink {
        path: PathBuf,
        stream: Option<UnixStream>,
    }

    impl SocketLink {
        /// Link to the emulator at `path`
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                stream: None,
            }
        }
    }

    impl Default for SocketLink {
        fn default() -> Self {
            Self::new(DEFAULT_EMULATOR_PIPE)
        }
    }

    #[async_trait]
    impl ApduLink for SocketLink {
        async fn open(&mut self) -> Result<(), TransportError> {
            let stream = UnixStream::connect(&self.path).await?;
            self.stream = Some(stream);
            Ok(())
        }

        async fn close(&mut self) {
            if let Some(mut stream) = self.stream.take() {
                let _ = stream.shutdown().await;
            }
        }

        async fn transmit(&mut self, frame: Bytes) -> Result<Bytes, TransportError> {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            stream.write_all(&frame).await?;
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(TransportError::Transmission);
            }
            buf.truncate(n);
            Ok(Bytes::from(buf))
        }
    }
}
