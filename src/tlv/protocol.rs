//! Protocol schema: allowed parameters per command.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::{LengthWidth, Message, MessageFactory, Serializer, Tag, TlvError, Version};

/// Size and occurrence bounds of one parameter within one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterConstraint {
    pub min_size: usize,
    pub max_size: usize,
    pub min_count: usize,
    pub max_count: usize,
}

/// Schema registry of a TLV protocol. Built once, then read-only.
#[derive(Debug, Clone)]
pub struct Protocol {
    version: Version,
    length_width: LengthWidth,
    commands: BTreeMap<Tag, BTreeMap<Tag, ParameterConstraint>>,
}

impl Protocol {
    pub fn new(version: Version, length_width: LengthWidth) -> Self {
        Self {
            version,
            length_width,
            commands: BTreeMap::new(),
        }
    }

    /// Register parameter `param` of command `cmd`. Re-adding replaces the constraint.
    pub fn add(
        &mut self,
        cmd: Tag,
        param: Tag,
        min_size: usize,
        max_size: usize,
        min_count: usize,
        max_count: usize,
    ) {
        self.commands.entry(cmd).or_default().insert(
            param,
            ParameterConstraint { min_size, max_size, min_count, max_count },
        );
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn length_width(&self) -> LengthWidth {
        self.length_width
    }

    /// version + command tag + message length
    pub fn header_size(&self) -> usize {
        1 + 2 + self.length_width.size()
    }

    pub fn has_command(&self, cmd: Tag) -> bool {
        self.commands.contains_key(&cmd)
    }

    pub fn commands(&self) -> impl Iterator<Item = Tag> + '_ {
        self.commands.keys().copied()
    }

    pub fn constraint(&self, cmd: Tag, param: Tag) -> Option<&ParameterConstraint> {
        self.commands.get(&cmd)?.get(&param)
    }

    /// Registered parameters of a command, in tag order.
    pub fn parameters(&self, cmd: Tag) -> impl Iterator<Item = (Tag, &ParameterConstraint)> {
        self.commands
            .get(&cmd)
            .into_iter()
            .flat_map(|params| params.iter().map(|(tag, c)| (*tag, c)))
    }

    /// Total size of the message starting at `buf`, once its header is available.
    /// Used to cut messages out of a byte stream.
    pub fn message_size(&self, buf: &[u8]) -> Option<usize> {
        if buf.len() < self.header_size() {
            return None;
        }
        let len = match self.length_width {
            LengthWidth::U16 => u16::from_be_bytes([buf[3], buf[4]]) as usize,
            LengthWidth::U32 => u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]) as usize,
        };
        Some(self.header_size() + len)
    }

    /// Serialize a complete message: header then parameters. Fails when a
    /// value or the whole message does not fit its length field.
    pub fn serialize(&self, msg: &dyn Message) -> Result<Bytes, TlvError> {
        let mut ser = Serializer::new();
        ser.open_message(msg.protocol_version(), msg.command_tag(), self.length_width);
        msg.serialize_parameters(&mut ser);
        ser.close_message();
        ser.freeze()
    }

    /// Run the decoder over a buffer and report its verdict.
    pub fn validate(&self, buf: &[u8]) -> Result<(), TlvError> {
        match MessageFactory::new(buf, self).error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut p = Protocol::new(2, LengthWidth::U16);
        p.add(0x0001, 0x000E, 2, 2, 1, 1);
        p.add(0x0001, 0x0001, 4, 4, 1, 1);
        assert!(p.has_command(0x0001));
        assert!(!p.has_command(0x0002));
        assert_eq!(p.constraint(0x0001, 0x0001).map(|c| c.min_size), Some(4));
        assert!(p.constraint(0x0001, 0x0099).is_none());
        let tags: Vec<Tag> = p.parameters(0x0001).map(|(t, _)| t).collect();
        assert_eq!(tags, vec![0x0001, 0x000E]);
        assert_eq!(p.parameters(0x0042).count(), 0);
    }

    #[test]
    fn test_message_size() {
        let p = Protocol::new(2, LengthWidth::U16);
        assert_eq!(p.header_size(), 5);
        assert_eq!(p.message_size(&[2, 0, 1, 0]), None);
        assert_eq!(p.message_size(&[2, 0, 1, 0x01, 0x02, 0xFF]), Some(5 + 0x0102));

        let p = Protocol::new(1, LengthWidth::U32);
        assert_eq!(p.header_size(), 7);
        assert_eq!(p.message_size(&[1, 0, 1, 0, 0, 0, 8]), Some(15));
    }
}
