//! Long sections with CRC-32 (MPEG-2) and multi-section tables.

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use bytes::Bytes;
use crc::{CRC_32_MPEG_2, Crc};
use thiserror::Error;

use crate::constants::{LONG_SECTION_HEADER_SIZE, MAX_PRIVATE_SECTION_SIZE, SECTION_CRC32_SIZE};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Bytes before `section_length` is known: table_id + flags/length.
const SHORT_HEADER_SIZE: usize = 3;

#[derive(Error, Debug)]
pub enum SectionError {
    #[error("empty payload")]
    Empty,

    #[error("truncated section: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("not a long section (section_syntax_indicator = 0)")]
    NotLongSection,

    #[error("invalid section_length {0}")]
    InvalidLength(usize),

    #[error("CRC-32 mismatch: section 0x{stored:08X}, computed 0x{computed:08X}")]
    CrcMismatch { stored: u32, computed: u32 },

    #[error("table id 0x{found:02X}, expected 0x{expected:02X}")]
    TableIdMismatch { expected: u8, found: u8 },

    #[error("section {number} inconsistent with table: {reason}")]
    Inconsistent { number: u8, reason: &'static str },

    #[error("incomplete table: {present}/{expected} sections")]
    Incomplete { present: usize, expected: usize },

    #[error("entry or payload of {size} bytes exceeds {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("table needs more than 256 sections")]
    TooManySections,

    #[error("bit I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// CRC-32/MPEG-2 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}

/// True when the last 4 bytes of `section` are the CRC of the bytes before.
pub fn verify_crc32(section: &[u8]) -> bool {
    if section.len() < SECTION_CRC32_SIZE {
        return false;
    }
    let (data, stored) = section.split_at(section.len() - SECTION_CRC32_SIZE);
    crc32(data).to_be_bytes() == stored
}

/// One long section, header fields decoded, payload between header and CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub table_id: u8,
    pub table_id_extension: u16,
    pub version: u8,
    pub is_current: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub payload: Bytes,
}

impl Section {
    pub fn new(table_id: u8, table_id_extension: u16, version: u8, is_current: bool, payload: Bytes) -> Self {
        Self {
            table_id,
            table_id_extension,
            version: version & 0x1F,
            is_current,
            section_number: 0,
            last_section_number: 0,
            payload,
        }
    }

    /// Size on the wire, CRC included.
    pub fn size(&self) -> usize {
        LONG_SECTION_HEADER_SIZE + self.payload.len() + SECTION_CRC32_SIZE
    }

    /// Decode one section at the start of `data`. Trailing bytes (stuffing or
    /// following sections) are ignored; use [`Section::size`] to skip over it.
    pub fn parse(data: &[u8]) -> Result<Self, SectionError> {
        if data.len() < SHORT_HEADER_SIZE {
            return Err(SectionError::Truncated { needed: SHORT_HEADER_SIZE, available: data.len() });
        }

        let mut r = BitReader::endian(data, BigEndian);
        let table_id = r.read::<8, u8>()?;
        let syntax = r.read::<1, u8>()?;
        r.skip(3)?; // private_indicator + reserved
        let section_length = r.read::<12, u16>()? as usize;

        if syntax == 0 {
            return Err(SectionError::NotLongSection);
        }
        let total = SHORT_HEADER_SIZE + section_length;
        if total < LONG_SECTION_HEADER_SIZE + SECTION_CRC32_SIZE || total > MAX_PRIVATE_SECTION_SIZE {
            return Err(SectionError::InvalidLength(section_length));
        }
        if total > data.len() {
            return Err(SectionError::Truncated { needed: total, available: data.len() });
        }

        let table_id_extension = r.read::<16, u16>()?;
        r.skip(2)?;
        let version = r.read::<5, u8>()?;
        let is_current = r.read::<1, u8>()? != 0;
        let section_number = r.read::<8, u8>()?;
        let last_section_number = r.read::<8, u8>()?;

        let raw = &data[..total];
        if !verify_crc32(raw) {
            let split = total - SECTION_CRC32_SIZE;
            let stored = u32::from_be_bytes([raw[split], raw[split + 1], raw[split + 2], raw[split + 3]]);
            return Err(SectionError::CrcMismatch { stored, computed: crc32(&raw[..split]) });
        }

        Ok(Self {
            table_id,
            table_id_extension,
            version,
            is_current,
            section_number,
            last_section_number,
            payload: Bytes::copy_from_slice(&raw[LONG_SECTION_HEADER_SIZE..total - SECTION_CRC32_SIZE]),
        })
    }

    /// Decode the section starting in a TS packet payload (PUSI set):
    /// skips the pointer field first.
    pub fn from_ts_payload(payload: &[u8]) -> Result<Self, SectionError> {
        let Some((&pointer, rest)) = payload.split_first() else {
            return Err(SectionError::Empty);
        };
        let start = pointer as usize;
        if start > rest.len() {
            return Err(SectionError::Truncated { needed: 1 + start, available: payload.len() });
        }
        Self::parse(&rest[start..])
    }

    /// Full binary section: header, payload, CRC.
    pub fn to_bytes(&self) -> Result<Bytes, SectionError> {
        let total = self.size();
        if total > MAX_PRIVATE_SECTION_SIZE {
            return Err(SectionError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PRIVATE_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE,
            });
        }

        let mut w = BitWriter::endian(Vec::with_capacity(total), BigEndian);
        w.write::<8, u8>(self.table_id)?;
        w.write::<1, u8>(1)?; // section_syntax_indicator
        w.write::<1, u8>(0)?; // private_indicator
        w.write::<2, u8>(0b11)?;
        w.write::<12, u16>((total - SHORT_HEADER_SIZE) as u16)?;
        w.write::<16, u16>(self.table_id_extension)?;
        w.write::<2, u8>(0b11)?;
        w.write::<5, u8>(self.version & 0x1F)?;
        w.write::<1, u8>(u8::from(self.is_current))?;
        w.write::<8, u8>(self.section_number)?;
        w.write::<8, u8>(self.last_section_number)?;

        let mut buf = w.into_writer();
        buf.extend_from_slice(&self.payload);
        let crc = crc32(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        Ok(Bytes::from(buf))
    }
}

/// Sections of one table instance, indexed by section number.
#[derive(Debug, Clone, Default)]
pub struct BinaryTable {
    sections: Vec<Option<Section>>,
}

impl BinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a section. The first one fixes table id, extension, version and
    /// section count; the others must agree. A repeated section replaces the
    /// previous copy.
    pub fn add_section(&mut self, section: Section) -> Result<(), SectionError> {
        let number = section.section_number;
        if number > section.last_section_number {
            return Err(SectionError::Inconsistent { number, reason: "section_number > last_section_number" });
        }
        match self.first() {
            None => {
                self.sections = vec![None; section.last_section_number as usize + 1];
            }
            Some(first) => {
                if first.table_id != section.table_id {
                    return Err(SectionError::Inconsistent { number, reason: "table_id differs" });
                }
                if first.table_id_extension != section.table_id_extension {
                    return Err(SectionError::Inconsistent { number, reason: "table_id_extension differs" });
                }
                if first.version != section.version {
                    return Err(SectionError::Inconsistent { number, reason: "version differs" });
                }
                if first.last_section_number != section.last_section_number {
                    return Err(SectionError::Inconsistent { number, reason: "last_section_number differs" });
                }
            }
        }
        self.sections[number as usize] = Some(section);
        Ok(())
    }

    fn first(&self) -> Option<&Section> {
        self.sections.iter().flatten().next()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// Expected number of sections, 0 when empty.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.sections.is_empty() && self.sections.iter().all(Option::is_some)
    }

    pub fn table_id(&self) -> Option<u8> {
        self.first().map(|s| s.table_id)
    }

    pub fn table_id_extension(&self) -> Option<u16> {
        self.first().map(|s| s.table_id_extension)
    }

    pub fn version(&self) -> Option<u8> {
        self.first().map(|s| s.version)
    }

    pub fn section(&self, number: usize) -> Option<&Section> {
        self.sections.get(number).and_then(Option::as_ref)
    }

    /// Present sections in section number order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().flatten()
    }

    /// Binary form of every section, in order.
    pub fn to_bytes(&self) -> Result<Vec<Bytes>, SectionError> {
        self.sections().map(Section::to_bytes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // PAT: ts_id 1, program 1 on PID 0x1000
    const PAT_HEX: &str = "00b00d0001c100000001f0002ab104b2";

    #[test]
    fn test_crc32() {
        // CRC-32/MPEG-2 check value
        assert_eq!(crc32(b"123456789"), 0x0376_E6E7);
        let bytes = hex::decode(PAT_HEX).unwrap();
        assert!(verify_crc32(&bytes));
        assert!(!verify_crc32(&bytes[..bytes.len() - 1]));
        assert!(!verify_crc32(&[1, 2]));
    }

    #[test]
    fn test_parse_known_pat() {
        let bytes = hex::decode(PAT_HEX).unwrap();
        let sec = Section::parse(&bytes).unwrap();
        assert_eq!(sec.table_id, 0x00);
        assert_eq!(sec.table_id_extension, 1);
        assert_eq!(sec.version, 0);
        assert!(sec.is_current);
        assert_eq!((sec.section_number, sec.last_section_number), (0, 0));
        assert_eq!(&sec.payload[..], &[0x00, 0x01, 0xF0, 0x00]);
        assert_eq!(sec.size(), bytes.len());
        assert_eq!(sec.to_bytes().unwrap(), Bytes::from(bytes));
    }

    #[test]
    fn test_header_bits() {
        let sec = Section {
            section_number: 1,
            last_section_number: 2,
            ..Section::new(0x42, 0xABCD, 17, false, Bytes::from_static(&[9, 9]))
        };
        let bytes = sec.to_bytes().unwrap();
        assert_eq!(&bytes[..8], &[0x42, 0xB0, 0x0B, 0xAB, 0xCD, 0xE2, 0x01, 0x02]);
        assert_eq!(Section::parse(&bytes).unwrap(), sec);
    }

    #[test]
    fn test_parse_errors() {
        let bytes = hex::decode(PAT_HEX).unwrap();

        let mut bad = bytes.clone();
        bad[9] ^= 0xFF;
        assert!(matches!(Section::parse(&bad), Err(SectionError::CrcMismatch { .. })));

        assert!(matches!(
            Section::parse(&bytes[..10]),
            Err(SectionError::Truncated { needed: 16, available: 10 })
        ));
        assert!(matches!(Section::parse(&[0x00]), Err(SectionError::Truncated { .. })));

        let mut short = bytes.clone();
        short[1] = 0x30; // syntax indicator cleared
        assert!(matches!(Section::parse(&short), Err(SectionError::NotLongSection)));

        let mut tiny = bytes;
        tiny[2] = 0x05;
        assert!(matches!(Section::parse(&tiny), Err(SectionError::InvalidLength(5))));
    }

    #[test]
    fn test_from_ts_payload() {
        let mut payload = vec![2, 0xAA, 0xBB];
        payload.extend(hex::decode(PAT_HEX).unwrap());
        payload.resize(184, 0xFF);
        let sec = Section::from_ts_payload(&payload).unwrap();
        assert_eq!(sec.table_id_extension, 1);

        assert!(matches!(Section::from_ts_payload(&[]), Err(SectionError::Empty)));
        assert!(matches!(Section::from_ts_payload(&[10, 0]), Err(SectionError::Truncated { .. })));
    }

    #[test]
    fn test_binary_table() {
        let sec = |n: u8, last: u8, version: u8| Section {
            section_number: n,
            last_section_number: last,
            ..Section::new(0x00, 7, version, true, Bytes::new())
        };

        let mut table = BinaryTable::new();
        assert!(!table.is_complete());
        table.add_section(sec(1, 1, 3)).unwrap();
        assert!(!table.is_complete());
        assert_eq!(table.section_count(), 2);
        assert!(matches!(table.add_section(sec(0, 1, 4)), Err(SectionError::Inconsistent { .. })));
        assert!(matches!(table.add_section(sec(0, 2, 3)), Err(SectionError::Inconsistent { .. })));
        assert!(matches!(table.add_section(sec(3, 2, 3)), Err(SectionError::Inconsistent { .. })));
        table.add_section(sec(0, 1, 3)).unwrap();
        assert!(table.is_complete());
        assert_eq!(table.version(), Some(3));
        assert_eq!(table.sections().map(|s| s.section_number).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(table.to_bytes().unwrap().len(), 2);
    }
}
