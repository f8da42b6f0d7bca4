//! Generic decoder from raw TLV messages to validated parameter lists.

use std::collections::BTreeMap;

use bytes::{Buf, Bytes};

use super::{LengthWidth, Protocol, Tag, TlvError, Version};

/// One parameter occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub tag: Tag,
    pub value: Bytes,
}

/// Decoded message: header, parameters grouped by tag, and the first error.
///
/// Parameters collected before an error stay available, so that an error
/// response can still pick up context values such as a channel id.
#[derive(Debug, Clone)]
pub struct MessageFactory {
    protocol_version: Version,
    command_tag: Tag,
    error: Option<TlvError>,
    params: BTreeMap<Tag, Vec<Bytes>>,
}

impl MessageFactory {
    pub fn new(buf: &[u8], protocol: &Protocol) -> Self {
        let mut fact = Self {
            protocol_version: 0,
            command_tag: 0,
            error: None,
            params: BTreeMap::new(),
        };
        if let Err(err) = fact.analyze(Bytes::copy_from_slice(buf), protocol) {
            log::debug!(
                "rejected TLV message 0x{:04X} ({} bytes): {}",
                fact.command_tag,
                buf.len(),
                err
            );
            fact.error = Some(err);
        }
        fact
    }

    fn analyze(&mut self, data: Bytes, protocol: &Protocol) -> Result<(), TlvError> {
        let header_size = protocol.header_size();
        if data.len() < header_size {
            return Err(TlvError::InvalidMessage { offset: data.len() });
        }

        let mut hdr = data.slice(..header_size);
        self.protocol_version = hdr.get_u8();
        self.command_tag = hdr.get_u16();
        let length = match protocol.length_width() {
            LengthWidth::U16 => hdr.get_u16() as usize,
            LengthWidth::U32 => hdr.get_u32() as usize,
        };

        if self.protocol_version != protocol.version() {
            return Err(TlvError::UnsupportedVersion(self.protocol_version));
        }
        if !protocol.has_command(self.command_tag) {
            return Err(TlvError::UnknownCommandTag(self.command_tag));
        }
        if length != data.len() - header_size {
            return Err(TlvError::InvalidMessage { offset: 3 });
        }

        let mut offset = header_size;
        while offset < data.len() {
            if data.len() - offset < 4 {
                return Err(TlvError::InvalidMessage { offset });
            }
            let mut p = data.slice(offset..offset + 4);
            let tag = p.get_u16();
            let len = p.get_u16() as usize;
            let start = offset + 4;
            if start + len > data.len() {
                return Err(TlvError::InvalidMessage { offset });
            }
            let constraint = protocol
                .constraint(self.command_tag, tag)
                .ok_or(TlvError::UnknownParameterTag { tag, offset })?;
            if len < constraint.min_size || len > constraint.max_size {
                return Err(TlvError::InvalidParameterLength { tag, length: len, offset });
            }
            self.params
                .entry(tag)
                .or_default()
                .push(data.slice(start..start + len));
            offset = start + len;
        }

        for (tag, constraint) in protocol.parameters(self.command_tag) {
            let count = self.count(tag);
            if count == 0 && constraint.min_count > 0 {
                return Err(TlvError::MissingParameter(tag));
            }
            if count < constraint.min_count || count > constraint.max_count {
                return Err(TlvError::InvalidParameterCount { tag, count });
            }
        }
        Ok(())
    }

    pub fn error(&self) -> Option<&TlvError> {
        self.error.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// `error_information` value for an error response, 0 when valid.
    pub fn error_information(&self) -> u16 {
        self.error.as_ref().map_or(0, TlvError::error_information)
    }

    pub fn protocol_version(&self) -> Version {
        self.protocol_version
    }

    pub fn command_tag(&self) -> Tag {
        self.command_tag
    }

    pub fn count(&self, tag: Tag) -> usize {
        self.params.get(&tag).map_or(0, Vec::len)
    }

    /// All occurrences of a tag, in message order.
    pub fn params(&self, tag: Tag) -> Vec<Parameter> {
        self.params
            .get(&tag)
            .into_iter()
            .flatten()
            .map(|value| Parameter { tag, value: value.clone() })
            .collect()
    }

    /// First occurrence of a tag.
    pub fn get_param(&self, tag: Tag) -> Result<Parameter, TlvError> {
        self.params
            .get(&tag)
            .and_then(|v| v.first())
            .map(|value| Parameter { tag, value: value.clone() })
            .ok_or_else(|| TlvError::InternalError(format!("no parameter 0x{tag:04X} in message")))
    }

    fn fixed<const N: usize>(&self, tag: Tag) -> Result<[u8; N], TlvError> {
        let param = self.get_param(tag)?;
        fixed_value(&param.value, tag)
    }

    pub fn get_u8(&self, tag: Tag) -> Result<u8, TlvError> {
        self.fixed::<1>(tag).map(|b| b[0])
    }

    pub fn get_bool(&self, tag: Tag) -> Result<bool, TlvError> {
        self.get_u8(tag).map(|v| v != 0)
    }

    pub fn get_u16(&self, tag: Tag) -> Result<u16, TlvError> {
        self.fixed::<2>(tag).map(u16::from_be_bytes)
    }

    pub fn get_i16(&self, tag: Tag) -> Result<i16, TlvError> {
        self.fixed::<2>(tag).map(i16::from_be_bytes)
    }

    pub fn get_u32(&self, tag: Tag) -> Result<u32, TlvError> {
        self.fixed::<4>(tag).map(u32::from_be_bytes)
    }

    pub fn get_bytes(&self, tag: Tag) -> Result<Bytes, TlvError> {
        self.get_param(tag).map(|p| p.value)
    }

    pub fn get_opt_u16(&self, tag: Tag) -> Result<Option<u16>, TlvError> {
        self.optional(tag, Self::get_u16)
    }

    pub fn get_opt_i16(&self, tag: Tag) -> Result<Option<i16>, TlvError> {
        self.optional(tag, Self::get_i16)
    }

    pub fn get_opt_bytes(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        self.optional(tag, Self::get_bytes)
    }

    fn optional<T>(
        &self,
        tag: Tag,
        get: fn(&Self, Tag) -> Result<T, TlvError>,
    ) -> Result<Option<T>, TlvError> {
        if self.count(tag) == 0 {
            Ok(None)
        } else {
            get(self, tag).map(Some)
        }
    }

    /// All occurrences of a 16-bit parameter.
    pub fn get_u16_all(&self, tag: Tag) -> Result<Vec<u16>, TlvError> {
        self.params
            .get(&tag)
            .into_iter()
            .flatten()
            .map(|v| fixed_value::<2>(v, tag).map(u16::from_be_bytes))
            .collect()
    }

    pub fn get_bytes_all(&self, tag: Tag) -> Vec<Bytes> {
        self.params.get(&tag).cloned().unwrap_or_default()
    }
}

fn fixed_value<const N: usize>(value: &[u8], tag: Tag) -> Result<[u8; N], TlvError> {
    value.try_into().map_err(|_| {
        TlvError::InternalError(format!(
            "parameter 0x{tag:04X} has {} bytes, expected {N}",
            value.len()
        ))
    })
}
