//! Program Association Table.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::section::{BinaryTable, Section, SectionError};
use super::table::LongTable;
use crate::constants::{PID_NIT, TID_PAT};

/// Size of one PAT entry: program_number(16) + reserved(3) + PID(13).
const ENTRY_SIZE: usize = 4;

/// Program Association Table
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Pat {
    pub version: u8,
    pub is_current: bool,
    pub ts_id: u16,
    /// PID of the NIT, carried as program number 0.
    pub nit_pid: Option<u16>,
    /// service_id -> PMT PID
    pub pmts: BTreeMap<u16, u16>,
}

impl Default for Pat {
    fn default() -> Self {
        Self::new(0, true, 0)
    }
}

impl Pat {
    pub fn new(version: u8, is_current: bool, ts_id: u16) -> Self {
        Self {
            version,
            is_current,
            ts_id,
            nit_pid: Some(PID_NIT),
            pmts: BTreeMap::new(),
        }
    }

    /// Decode a binary table; fails on wrong table id or missing sections.
    pub fn from_table(table: &BinaryTable) -> Result<Self, SectionError> {
        let mut pat = Pat::default();
        pat.deserialize(table)?;
        Ok(pat)
    }

    /// Decode a single-section PAT starting in a TS packet payload.
    pub fn from_ts_payload(payload: &[u8]) -> Result<Self, SectionError> {
        let mut table = BinaryTable::new();
        table.add_section(Section::from_ts_payload(payload)?)?;
        Self::from_table(&table)
    }

    /// Text dump, one line per entry.
    pub fn display(&self) -> String {
        let mut s = format!(
            "PAT: version {}, {}, TS id 0x{:04X} ({})\n",
            self.version,
            if self.is_current { "current" } else { "next" },
            self.ts_id,
            self.ts_id
        );
        if let Some(pid) = self.nit_pid {
            let _ = writeln!(s, "  NIT PID: 0x{pid:04X} ({pid})");
        }
        for (service, pid) in &self.pmts {
            let _ = writeln!(s, "  service 0x{service:04X} ({service}): PMT PID 0x{pid:04X} ({pid})");
        }
        s
    }
}

fn entry(id: u16, pid: u16) -> Bytes {
    let mut b = BytesMut::with_capacity(ENTRY_SIZE);
    b.put_u16(id);
    b.put_u16(0xE000 | (pid & 0x1FFF));
    b.freeze()
}

impl LongTable for Pat {
    const TABLE_ID: u8 = TID_PAT;

    fn table_id_extension(&self) -> u16 {
        self.ts_id
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn serialize_entries(&self) -> Vec<Bytes> {
        self.nit_pid
            .map(|pid| entry(0, pid))
            .into_iter()
            .chain(self.pmts.iter().map(|(id, pid)| entry(*id, *pid)))
            .collect()
    }

    fn clear_content(&mut self) {
        self.nit_pid = None;
        self.pmts.clear();
    }

    fn set_header(&mut self, table_id_extension: u16, version: u8, is_current: bool) {
        self.ts_id = table_id_extension;
        self.version = version;
        self.is_current = is_current;
    }

    fn deserialize_payload(&mut self, section: &Section) -> Result<(), SectionError> {
        let mut data = section.payload.clone();
        while data.remaining() >= ENTRY_SIZE {
            let id = data.get_u16();
            let pid = data.get_u16() & 0x1FFF;
            if id == 0 {
                self.nit_pid = Some(pid);
            } else {
                self.pmts.insert(id, pid);
            }
        }
        if data.has_remaining() {
            log::debug!(
                "PAT section {}: {} trailing byte(s) ignored",
                section.section_number,
                data.remaining()
            );
        }
        Ok(())
    }
}
