//! Argument and response maps exchanged with the card
//!
//! Every command is a CBOR map with a `cmd` entry plus named arguments and every
//! response is a CBOR map. [`Message`] is the decoded form of either: a map from text
//! keys to [`ciborium::Value`] with typed accessors for the shapes the protocol uses.

use std::collections::BTreeMap;

use ciborium::value::{Integer, Value};

use crate::constants::CARD_NONCE_SIZE;
use crate::error::ProtocolError;
use crate::session::AuthArgs;

/// Decoded CBOR map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message(BTreeMap<String, Value>);

impl Message {
    /// Create an empty message
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a raw value
    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Builder style [`Self::insert`]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a byte string
    pub fn with_bytes(self, key: &str, bytes: &[u8]) -> Self {
        self.with(key, Value::Bytes(bytes.to_vec()))
    }

    /// Add an unsigned integer
    pub fn with_int(self, key: &str, value: u64) -> Self {
        self.with(key, Value::Integer(Integer::from(value)))
    }

    /// Add a boolean
    pub fn with_bool(self, key: &str, value: bool) -> Self {
        self.with(key, Value::Bool(value))
    }

    /// Add a text string
    pub fn with_text(self, key: &str, value: &str) -> Self {
        self.with(key, Value::Text(value.to_string()))
    }

    /// Add a list of BIP-32 path components
    pub fn with_path(self, key: &str, path: &[u32]) -> Self {
        let components = path
            .iter()
            .map(|c| Value::Integer(Integer::from(*c)))
            .collect();
        self.with(key, Value::Array(components))
    }

    /// Attach the `epubkey`/`xcvc` authentication pair, if any
    pub fn with_auth(self, auth: Option<&AuthArgs>) -> Self {
        match auth {
            Some(auth) => self
                .with_bytes("epubkey", &auth.epubkey)
                .with_bytes("xcvc", &auth.xcvc),
            None => self,
        }
    }

    /// Raw value lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Byte string lookup
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key) {
            Some(Value::Bytes(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// Text lookup
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Boolean lookup
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Unsigned integer lookup
    pub fn int(&self, key: &str) -> Option<u64> {
        match self.get(key) {
            Some(Value::Integer(i)) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Array lookup
    pub fn array(&self, key: &str) -> Option<&[Value]> {
        match self.get(key) {
            Some(Value::Array(values)) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// List of unsigned integers, e.g. a derivation path or the slot pair
    pub fn int_list(&self, key: &str) -> Option<Vec<u64>> {
        self.array(key)?
            .iter()
            .map(|v| match v {
                Value::Integer(i) => u64::try_from(*i).ok(),
                _ => None,
            })
            .collect()
    }

    /// The fresh card nonce carried by (almost) every response
    pub fn card_nonce(&self) -> Option<[u8; CARD_NONCE_SIZE]> {
        self.bytes("card_nonce")?.try_into().ok()
    }

    /// Required byte string
    pub(crate) fn require_bytes(
        &self,
        command: &'static str,
        field: &'static str,
    ) -> Result<&[u8], ProtocolError> {
        self.bytes(field)
            .ok_or(ProtocolError::MissingField { command, field })
    }

    /// Required byte string of an exact length
    pub(crate) fn require_array<const N: usize>(
        &self,
        command: &'static str,
        field: &'static str,
    ) -> Result<[u8; N], ProtocolError> {
        self.require_bytes(command, field)?
            .try_into()
            .map_err(|_| ProtocolError::InvalidField {
                command,
                field,
                reason: "unexpected length",
            })
    }

    /// Required unsigned integer
    pub(crate) fn require_int(
        &self,
        command: &'static str,
        field: &'static str,
    ) -> Result<u64, ProtocolError> {
        self.int(field)
            .ok_or(ProtocolError::MissingField { command, field })
    }

    /// Convert into a CBOR map value
    pub fn into_value(self) -> Value {
        Value::Map(
            self.0
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect(),
        )
    }

    /// Build from a CBOR map value; non-text keys are rejected
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| match k {
                    Value::Text(k) => Ok((k, v)),
                    other => Err(ProtocolError::Malformed(format!(
                        "non-text map key {other:?}"
                    ))),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self),
            other => Err(ProtocolError::Malformed(format!(
                "expected a map, got {other:?}"
            ))),
        }
    }
}
