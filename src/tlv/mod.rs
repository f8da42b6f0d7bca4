//! Generic Tag-Length-Value message framework.
//!
//! A message is `version(1) | command_tag(2) | length(2 or 4) | parameters`,
//! each parameter being `tag(2) | length(2) | value`. A [`Protocol`] lists the
//! accepted parameters of each command, [`MessageFactory`] decodes and
//! validates raw messages against it, and [`Serializer`] writes them back.

mod error;
mod factory;
mod protocol;
mod serializer;

use std::any::Any;
use std::fmt::{Debug, Write as _};

use bytes::Bytes;

pub use error::TlvError;
pub use factory::{MessageFactory, Parameter};
pub use protocol::{ParameterConstraint, Protocol};
pub use serializer::Serializer;

pub type Tag = u16;
pub type Version = u8;

/// Width of the message length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U16,
    U32,
}

impl LengthWidth {
    pub fn size(self) -> usize {
        match self {
            LengthWidth::U16 => 2,
            LengthWidth::U32 => 4,
        }
    }
}

/// A typed message of some TLV protocol.
pub trait Message: Any + Debug {
    fn protocol_version(&self) -> Version;
    fn command_tag(&self) -> Tag;

    /// Write all parameters, in the protocol's canonical order.
    fn serialize_parameters(&self, ser: &mut Serializer);

    /// Multi-line human readable form, each line prefixed by `indent` spaces.
    fn dump(&self, indent: usize) -> String;

    fn as_any(&self) -> &dyn Any;
}

pub type MessagePtr = Box<dyn Message>;

/// Construction of a typed message from a validated factory.
pub trait FromFactory: Sized {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError>;
}

/// Dispatch helper: decode a concrete message type and box it.
pub fn build<M: FromFactory + Message>(fact: &MessageFactory) -> Result<MessagePtr, TlvError> {
    Ok(Box::new(M::from_factory(fact)?))
}

/// Protocol-specific glue between raw buffers and typed messages.
pub trait ProtocolHandler {
    fn protocol(&self) -> &Protocol;

    /// Build the typed message of a valid factory.
    fn factory(&self, fact: &MessageFactory) -> Result<MessagePtr, TlvError>;

    /// Build the error message to send back for an invalid factory.
    fn build_error_response(&self, fact: &MessageFactory) -> MessagePtr;

    fn decode(&self, buf: &[u8]) -> Result<MessagePtr, TlvError> {
        let fact = MessageFactory::new(buf, self.protocol());
        match fact.error() {
            Some(err) => Err(err.clone()),
            None => self.factory(&fact),
        }
    }

    /// Decode a message; on failure also return the error response to send.
    fn decode_with_response(&self, buf: &[u8]) -> Result<MessagePtr, (TlvError, MessagePtr)> {
        let fact = MessageFactory::new(buf, self.protocol());
        let result = match fact.error() {
            Some(err) => Err(err.clone()),
            None => self.factory(&fact),
        };
        result.map_err(|err| {
            log::debug!("building error response for {err}");
            let response = self.build_error_response(&fact);
            (err, response)
        })
    }

    fn encode(&self, msg: &dyn Message) -> Result<Bytes, TlvError> {
        self.protocol().serialize(msg)
    }
}

/// First lines of a message dump.
pub fn dump_header(indent: usize, name: &str, protocol_name: &str, version: Version, tag: Tag) -> String {
    let mut s = format!("{:indent$}{name} ({protocol_name})\n", "");
    s.push_str(&dump_hexa(indent, "protocol_version", version));
    s.push_str(&dump_hexa(indent, "message_type", tag));
    s
}

/// `name = 0x..` with as many digits as the type has nibbles.
pub fn dump_hexa<T: Copy + Into<u64>>(indent: usize, name: &str, value: T) -> String {
    let width = 2 * std::mem::size_of::<T>();
    format!("{:indent$}{name} = 0x{:0width$X}\n", "", Into::<u64>::into(value))
}

pub fn dump_decimal<T: std::fmt::Display>(indent: usize, name: &str, value: T) -> String {
    format!("{:indent$}{name} = {value}\n", "")
}

pub fn dump_optional_decimal<T: std::fmt::Display>(indent: usize, name: &str, value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| dump_decimal(indent, name, v))
        .unwrap_or_default()
}

pub fn dump_optional_hexa<T: Copy + Into<u64>>(indent: usize, name: &str, value: Option<T>) -> String {
    value.map(|v| dump_hexa(indent, name, v)).unwrap_or_default()
}

pub fn dump_vector<T: Copy + Into<u64>>(indent: usize, name: &str, values: &[T]) -> String {
    values.iter().map(|v| dump_hexa(indent, name, *v)).collect()
}

/// Hex dump, 16 bytes per line, under a `name (N bytes) =` line.
pub fn dump_bytes(indent: usize, name: &str, data: &[u8]) -> String {
    let mut s = format!("{:indent$}{name} ({} bytes) =\n", "", data.len());
    for chunk in data.chunks(16) {
        let _ = write!(s, "{:width$}", "", width = indent + 2);
        for (i, b) in chunk.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            let _ = write!(s, "{b:02X}");
        }
        s.push('\n');
    }
    s
}

pub fn dump_optional_bytes(indent: usize, name: &str, data: Option<&Bytes>) -> String {
    data.map(|d| dump_bytes(indent, name, d)).unwrap_or_default()
}
