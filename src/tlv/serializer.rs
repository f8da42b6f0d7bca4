//! Builder of TLV messages with back-patched lengths.

use bytes::{BufMut, Bytes, BytesMut};

use super::{LengthWidth, Tag, TlvError, Version};

/// Writes a message header and parameters. Each opened scope (message or
/// compound parameter) remembers where its length field sits and patches
/// it when closed.
///
/// A value or scope too long for its length field is not written; the
/// first such overflow is returned by [`Serializer::freeze`].
#[derive(Debug, Default)]
pub struct Serializer {
    buf: BytesMut,
    scopes: Vec<(usize, LengthWidth)>,
    error: Option<TlvError>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_message(&mut self, version: Version, command: Tag, width: LengthWidth) {
        self.buf.put_u8(version);
        self.buf.put_u16(command);
        self.open_length(width);
    }

    pub fn close_message(&mut self) {
        self.close_length();
    }

    /// Start a compound parameter; nested parameters follow.
    pub fn open_tlv(&mut self, tag: Tag) {
        self.buf.put_u16(tag);
        self.open_length(LengthWidth::U16);
    }

    pub fn close_tlv(&mut self) {
        self.close_length();
    }

    fn open_length(&mut self, width: LengthWidth) {
        self.scopes.push((self.buf.len(), width));
        match width {
            LengthWidth::U16 => self.buf.put_u16(0),
            LengthWidth::U32 => self.buf.put_u32(0),
        }
    }

    fn close_length(&mut self) {
        let Some((pos, width)) = self.scopes.pop() else {
            self.fail("close without matching open".to_string());
            return;
        };
        let len = self.buf.len() - pos - width.size();
        match width {
            LengthWidth::U16 => match u16::try_from(len) {
                Ok(len) => self.buf[pos..pos + 2].copy_from_slice(&len.to_be_bytes()),
                Err(_) => self.fail(format!("{len} bytes exceed a 16-bit length field")),
            },
            LengthWidth::U32 => match u32::try_from(len) {
                Ok(len) => self.buf[pos..pos + 4].copy_from_slice(&len.to_be_bytes()),
                Err(_) => self.fail(format!("{len} bytes exceed a 32-bit length field")),
            },
        }
    }

    fn fail(&mut self, reason: String) {
        log::debug!("TLV serializer: {reason}");
        if self.error.is_none() {
            self.error = Some(TlvError::InternalError(reason));
        }
    }

    pub fn put_u8(&mut self, tag: Tag, value: u8) {
        self.put_bytes(tag, &[value]);
    }

    pub fn put_bool(&mut self, tag: Tag, value: bool) {
        self.put_u8(tag, value as u8);
    }

    pub fn put_u16(&mut self, tag: Tag, value: u16) {
        self.put_bytes(tag, &value.to_be_bytes());
    }

    pub fn put_i16(&mut self, tag: Tag, value: i16) {
        self.put_bytes(tag, &value.to_be_bytes());
    }

    pub fn put_u32(&mut self, tag: Tag, value: u32) {
        self.put_bytes(tag, &value.to_be_bytes());
    }

    pub fn put_bytes(&mut self, tag: Tag, value: &[u8]) {
        let Ok(len) = u16::try_from(value.len()) else {
            self.fail(format!("parameter 0x{tag:04X} of {} bytes", value.len()));
            return;
        };
        self.buf.put_u16(tag);
        self.buf.put_u16(len);
        self.buf.put_slice(value);
    }

    /// One parameter per value, same tag.
    pub fn put_u16_vec(&mut self, tag: Tag, values: &[u16]) {
        for v in values {
            self.put_u16(tag, *v);
        }
    }

    pub fn put_opt_u16(&mut self, tag: Tag, value: Option<u16>) {
        if let Some(v) = value {
            self.put_u16(tag, v);
        }
    }

    pub fn put_opt_i16(&mut self, tag: Tag, value: Option<i16>) {
        if let Some(v) = value {
            self.put_i16(tag, v);
        }
    }

    pub fn put_opt_bytes(&mut self, tag: Tag, value: Option<&Bytes>) {
        if let Some(v) = value {
            self.put_bytes(tag, v);
        }
    }

    /// Untagged value inside a compound parameter.
    pub fn put_raw_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn put_raw_bytes(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The serialized bytes, or the first length overflow or scope error.
    pub fn freeze(self) -> Result<Bytes, TlvError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.scopes.is_empty() {
            return Err(TlvError::InternalError(format!("{} TLV scope(s) left open", self.scopes.len())));
        }
        Ok(self.buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_layout() {
        let mut ser = Serializer::new();
        ser.open_message(2, 0x0001, LengthWidth::U16);
        ser.put_u32(0x0001, 0x0102_0304);
        ser.put_u16(0x000E, 7);
        ser.close_message();
        let out = ser.freeze().unwrap();
        assert_eq!(
            hex::encode(&out),
            "020001000e0001000401020304000e00020007"
        );
    }

    #[test]
    fn test_nested_tlv() {
        let mut ser = Serializer::new();
        ser.open_message(1, 0x0201, LengthWidth::U32);
        ser.open_tlv(0x0014);
        ser.put_raw_u16(5);
        ser.put_raw_bytes(&[0xAA, 0xBB]);
        ser.close_tlv();
        ser.put_bool(0x0002, true);
        ser.close_message();
        let out = ser.freeze().unwrap();
        assert_eq!(hex::encode(&out), "0102010000000d001400040005aabb0002000101");
    }

    #[test]
    fn test_oversized_parameter_rejected() {
        let mut ser = Serializer::new();
        ser.open_message(2, 0x0202, LengthWidth::U16);
        ser.put_bytes(0x0015, &vec![0; 70000]);
        ser.close_message();
        assert!(ser.freeze().is_err_and(|e| e.is_internal()));
    }

    #[test]
    fn test_oversized_message_rejected() {
        // the value fits its own field, the enclosing message does not
        let mut ser = Serializer::new();
        ser.open_message(2, 0x0202, LengthWidth::U16);
        ser.put_u16(0x000E, 1);
        ser.put_bytes(0x0015, &vec![0; 0xFFFF]);
        ser.close_message();
        assert!(ser.freeze().is_err());

        // same content with a 32-bit message length is fine
        let mut ser = Serializer::new();
        ser.open_message(2, 0x0202, LengthWidth::U32);
        ser.put_bytes(0x0015, &vec![0; 0xFFFF]);
        ser.close_message();
        assert_eq!(ser.freeze().unwrap().len(), 7 + 4 + 0xFFFF);
    }

    #[test]
    fn test_unbalanced_scopes() {
        let mut ser = Serializer::new();
        ser.open_message(1, 0x0001, LengthWidth::U16);
        ser.open_tlv(0x0014);
        ser.close_tlv();
        assert!(ser.freeze().is_err());

        let mut ser = Serializer::new();
        ser.close_tlv();
        assert!(ser.freeze().is_err());
    }
}
