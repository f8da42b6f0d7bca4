//! Generic long-section table: entry-wise serialization split over sections.

use bytes::{Bytes, BytesMut};

use super::section::{BinaryTable, Section, SectionError};
use crate::constants::MAX_PSI_LONG_SECTION_PAYLOAD_SIZE;

/// A table carried in one or more long sections sharing table id,
/// table id extension and version.
///
/// Implementors describe their content as a list of binary entries; the
/// provided [`LongTable::serialize`] packs as many entries per section as
/// [`LongTable::max_payload_size`] allows, never splitting an entry.
pub trait LongTable: Sized {
    const TABLE_ID: u8;

    /// Section payload limit. PSI tables are bound to 1024-byte sections.
    fn max_payload_size(&self) -> usize {
        MAX_PSI_LONG_SECTION_PAYLOAD_SIZE
    }

    fn table_id_extension(&self) -> u16;
    fn version(&self) -> u8;
    fn is_current(&self) -> bool;

    /// Content entries in wire order.
    fn serialize_entries(&self) -> Vec<Bytes>;

    /// Reset content before deserialization.
    fn clear_content(&mut self);

    fn set_header(&mut self, table_id_extension: u16, version: u8, is_current: bool);

    /// Append the content of one validated section.
    fn deserialize_payload(&mut self, section: &Section) -> Result<(), SectionError>;

    fn serialize(&self) -> Result<BinaryTable, SectionError> {
        let max = self.max_payload_size();
        let mut payloads = Vec::new();
        let mut current = BytesMut::new();

        for entry in self.serialize_entries() {
            if entry.len() > max {
                return Err(SectionError::PayloadTooLarge { size: entry.len(), max });
            }
            if !current.is_empty() && current.len() + entry.len() > max {
                payloads.push(current.split().freeze());
            }
            current.extend_from_slice(&entry);
        }
        // an empty table still has one (empty) section
        payloads.push(current.freeze());

        let last = u8::try_from(payloads.len() - 1).map_err(|_| SectionError::TooManySections)?;
        let mut table = BinaryTable::new();
        for (number, payload) in payloads.into_iter().enumerate() {
            let section = Section {
                section_number: number as u8,
                last_section_number: last,
                ..Section::new(
                    Self::TABLE_ID,
                    self.table_id_extension(),
                    self.version(),
                    self.is_current(),
                    payload,
                )
            };
            table.add_section(section)?;
        }
        log::trace!(
            "table 0x{:02X}: serialized into {} section(s)",
            Self::TABLE_ID,
            table.section_count()
        );
        Ok(table)
    }

    fn deserialize(&mut self, table: &BinaryTable) -> Result<(), SectionError> {
        if !table.is_complete() {
            return Err(SectionError::Incomplete {
                present: table.sections().count(),
                expected: table.section_count(),
            });
        }
        let mut sections = table.sections();
        let Some(first) = sections.next() else {
            return Err(SectionError::Incomplete { present: 0, expected: 0 });
        };
        if first.table_id != Self::TABLE_ID {
            return Err(SectionError::TableIdMismatch { expected: Self::TABLE_ID, found: first.table_id });
        }

        self.clear_content();
        self.set_header(first.table_id_extension, first.version, first.is_current);
        self.deserialize_payload(first)?;
        for section in sections {
            self.deserialize_payload(section)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE;

    /// Private table of opaque 1000-byte records.
    #[derive(Debug, Default, PartialEq)]
    struct Records {
        private: bool,
        version: u8,
        records: Vec<Bytes>,
    }

    impl LongTable for Records {
        const TABLE_ID: u8 = 0x80;

        fn max_payload_size(&self) -> usize {
            if self.private { MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE } else { MAX_PSI_LONG_SECTION_PAYLOAD_SIZE }
        }

        fn table_id_extension(&self) -> u16 {
            0x1234
        }

        fn version(&self) -> u8 {
            self.version
        }

        fn is_current(&self) -> bool {
            true
        }

        fn serialize_entries(&self) -> Vec<Bytes> {
            self.records.clone()
        }

        fn clear_content(&mut self) {
            self.records.clear();
        }

        fn set_header(&mut self, _ext: u16, version: u8, _is_current: bool) {
            self.version = version;
        }

        fn deserialize_payload(&mut self, section: &Section) -> Result<(), SectionError> {
            self.records.extend(section.payload.chunks(1000).map(Bytes::copy_from_slice));
            Ok(())
        }
    }

    fn records(private: bool, count: u8) -> Records {
        Records {
            private,
            version: 2,
            records: (0..count).map(|i| Bytes::from(vec![i; 1000])).collect(),
        }
    }

    #[test]
    fn test_psi_limit_one_entry_per_section() {
        let table = records(false, 3).serialize().unwrap();
        assert_eq!(table.section_count(), 3);
        assert!(table.sections().all(|s| s.payload.len() == 1000 && s.last_section_number == 2));
    }

    #[test]
    fn test_private_limit() {
        let src = records(true, 9);
        let table = src.serialize().unwrap();
        // 4 records per 4084-byte payload
        assert_eq!(table.section_count(), 3);
        assert_eq!(table.section(2).unwrap().payload.len(), 1000);
        assert!(table.to_bytes().unwrap().iter().all(|b| b.len() <= 4096));

        let mut back = Records { private: true, ..Default::default() };
        back.deserialize(&table).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_entry_too_large() {
        let big = Records { records: vec![Bytes::from(vec![0; 1013])], ..Default::default() };
        assert!(matches!(
            big.serialize(),
            Err(SectionError::PayloadTooLarge { size: 1013, max: 1012 })
        ));
    }
}
