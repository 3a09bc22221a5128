//! Data packets and their payloads.

use super::attributes::AttributeBag;
use crate::errors::AttributeError;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The opaque data carried by a packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No data.
    #[default]
    Empty,
    /// A byte string.
    Bytes(Vec<u8>),
    /// Text.
    Text(String),
    /// A structured value.
    Value(Value),
    /// A list of packet handles, e.g. a tank window.
    Packets(Vec<Packet>),
}

impl Payload {
    /// Returns the payload length: bytes for byte strings and text, elements
    /// for arrays and packet lists, zero for `Empty` and one for any other value.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Bytes(b) => b.len(),
            Self::Text(t) => t.len(),
            Self::Value(Value::Array(items)) => items.len(),
            Self::Value(Value::Null) => 0,
            Self::Value(_) => 1,
            Self::Packets(p) => p.len(),
        }
    }

    /// Returns true if the payload has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw bytes of a byte string or text payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(t) => Some(t.as_bytes()),
            _ => None,
        }
    }

    /// Returns the text of a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the packet handles of a packet-list payload.
    #[must_use]
    pub fn as_packets(&self) -> Option<&[Packet]> {
        match self {
            Self::Packets(p) => Some(p),
            _ => None,
        }
    }

    /// A short name for the payload variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Value(_) => "value",
            Self::Packets(_) => "packets",
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Vec<Packet>> for Payload {
    fn from(p: Vec<Packet>) -> Self {
        Self::Packets(p)
    }
}

/// The contents behind a packet handle.
#[derive(Debug, Clone, Default)]
pub struct PacketData {
    /// The payload.
    pub payload: Payload,
    /// The named attributes.
    pub attributes: AttributeBag,
}

/// A data-bearing unit travelling through the filter graph.
///
/// `Packet` is a handle: `Clone` hands out another reference to the *same*
/// packet, which is what a reference branch sends down both routes. Use
/// [`Packet::clone_packet`] for an independent copy.
#[derive(Clone, Default)]
pub struct Packet {
    inner: Arc<RwLock<PacketData>>,
}

impl Packet {
    /// Creates a packet with the given payload and no attributes.
    #[must_use]
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PacketData {
                payload: payload.into(),
                attributes: AttributeBag::new(),
            })),
        }
    }

    /// Sets an attribute, builder style.
    #[must_use]
    pub fn with_attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns an independent copy of this packet.
    ///
    /// All attributes are copied. The payload is replaced by `payload` when
    /// given, otherwise copied; the source packet is never mutated.
    #[must_use]
    pub fn clone_packet(&self, payload: Option<Payload>) -> Self {
        let data = self.inner.read();
        let copy = PacketData {
            payload: payload.unwrap_or_else(|| data.payload.clone()),
            attributes: data.attributes.clone(),
        };
        Self {
            inner: Arc::new(RwLock::new(copy)),
        }
    }

    /// Returns true if both handles refer to the same packet.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Always false: packets are data units.
    #[must_use]
    pub fn is_control(&self) -> bool {
        false
    }

    /// Returns a copy of the payload.
    #[must_use]
    pub fn payload(&self) -> Payload {
        self.inner.read().payload.clone()
    }

    /// Runs `f` against the payload without copying it.
    pub fn with_payload<R>(&self, f: impl FnOnce(&Payload) -> R) -> R {
        f(&self.inner.read().payload)
    }

    /// Replaces the payload.
    pub fn set_payload(&self, payload: impl Into<Payload>) {
        self.inner.write().payload = payload.into();
    }

    /// Returns the payload length.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.inner.read().payload.len()
    }

    /// Returns the text payload, if the payload is text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.inner.read().payload.as_text().map(str::to_string)
    }

    /// Gets an attribute, failing if it is absent.
    pub fn get(&self, name: &str) -> Result<Value, AttributeError> {
        self.inner.read().attributes.get(name).cloned()
    }

    /// Gets an attribute if present.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<Value> {
        self.inner.read().attributes.get_opt(name).cloned()
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.inner.read().attributes.contains_key(name)
    }

    /// Gets an integer attribute.
    pub fn get_i64(&self, name: &str) -> Result<i64, AttributeError> {
        let value = self.get(name)?;
        value
            .as_i64()
            .ok_or_else(|| AttributeError::wrong_type(name, "an integer", &value))
    }

    /// Gets a numeric attribute as a float.
    pub fn get_f64(&self, name: &str) -> Result<f64, AttributeError> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| AttributeError::wrong_type(name, "a number", &value))
    }

    /// Gets a string attribute.
    pub fn get_str(&self, name: &str) -> Result<String, AttributeError> {
        let value = self.get(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AttributeError::wrong_type(name, "a string", &value))
    }

    /// Sets an attribute, overwriting any previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.write().attributes.set(name, value.into());
    }

    /// Sets an attribute that must not exist yet.
    pub fn set_new(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), AttributeError> {
        self.inner.write().attributes.set_new(name, value.into())
    }

    /// Removes an attribute.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.write().attributes.remove(name)
    }

    /// Returns all attribute names, sorted.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        self.inner.read().attributes.keys()
    }

    /// Returns a copy of the attribute bag.
    #[must_use]
    pub fn attributes(&self) -> AttributeBag {
        self.inner.read().attributes.clone()
    }
}

/// Packets compare by identity.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.read();
        f.debug_struct("Packet")
            .field("payload", &data.payload.kind_name())
            .field("len", &data.payload.len())
            .field("attributes", &data.attributes.keys())
            .finish()
    }
}
