//! Fixed 188-byte transport packet view and PID sets.

use thiserror::Error;

use crate::constants::*;

/// Errors raised when a byte slice cannot be viewed as a TS packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("invalid packet size: {0} bytes (expected {PKT_SIZE})")]
    InvalidSize(usize),

    #[error("invalid sync byte: 0x{0:02X}")]
    InvalidSync(u8),
}

/// One transport packet. Always exactly [`PKT_SIZE`] bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TsPacket {
    pub b: [u8; PKT_SIZE],
}

impl Default for TsPacket {
    fn default() -> Self {
        Self::null()
    }
}

impl std::fmt::Debug for TsPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsPacket")
            .field("pid", &self.pid())
            .field("cc", &self.cc())
            .field("pusi", &self.pusi())
            .field("has_af", &self.has_af())
            .field("has_payload", &self.has_payload())
            .finish()
    }
}

impl TsPacket {
    /// Null packet (PID 0x1FFF, payload only, filled with 0xFF).
    pub fn null() -> Self {
        let mut b = [0xFFu8; PKT_SIZE];
        b[0] = SYNC_BYTE;
        b[1] = (PID_NULL >> 8) as u8;
        b[2] = PID_NULL as u8;
        b[3] = 0x10;
        Self { b }
    }

    /// Build a payload-only packet. The payload is truncated or padded with 0xFF.
    pub fn new(pid: u16, cc: u8, payload: &[u8]) -> Self {
        let mut pkt = Self::null();
        pkt.set_pid(pid);
        pkt.set_cc(cc);
        let n = payload.len().min(PKT_SIZE - PKT_HEADER_SIZE);
        pkt.b[PKT_HEADER_SIZE..PKT_HEADER_SIZE + n].copy_from_slice(&payload[..n]);
        pkt
    }

    /// Copies a packet out of a slice, checking the size and the sync byte.
    pub fn from_slice(chunk: &[u8]) -> Result<Self, PacketError> {
        let b: [u8; PKT_SIZE] = chunk
            .try_into()
            .map_err(|_| PacketError::InvalidSize(chunk.len()))?;
        if b[0] != SYNC_BYTE {
            return Err(PacketError::InvalidSync(b[0]));
        }
        Ok(Self { b })
    }

    pub fn as_bytes(&self) -> &[u8; PKT_SIZE] {
        &self.b
    }

    pub fn has_valid_sync(&self) -> bool {
        self.b[0] == SYNC_BYTE
    }

    pub fn transport_error(&self) -> bool {
        self.b[1] & 0x80 != 0
    }

    pub fn set_transport_error(&mut self, on: bool) {
        set_bit(&mut self.b[1], 0x80, on);
    }

    /// Payload unit start indicator.
    pub fn pusi(&self) -> bool {
        self.b[1] & 0x40 != 0
    }

    pub fn set_pusi(&mut self, on: bool) {
        set_bit(&mut self.b[1], 0x40, on);
    }

    pub fn priority(&self) -> bool {
        self.b[1] & 0x20 != 0
    }

    pub fn set_priority(&mut self, on: bool) {
        set_bit(&mut self.b[1], 0x20, on);
    }

    pub fn pid(&self) -> u16 {
        (((self.b[1] & 0x1F) as u16) << 8) | (self.b[2] as u16)
    }

    pub fn set_pid(&mut self, pid: u16) {
        self.b[1] = (self.b[1] & 0xE0) | ((pid >> 8) as u8 & 0x1F);
        self.b[2] = pid as u8;
    }

    pub fn scrambling(&self) -> u8 {
        self.b[3] >> 6
    }

    pub fn set_scrambling(&mut self, sc: u8) {
        self.b[3] = (self.b[3] & 0x3F) | ((sc & 0x03) << 6);
    }

    pub fn has_af(&self) -> bool {
        self.b[3] & 0x20 != 0
    }

    pub fn has_payload(&self) -> bool {
        self.b[3] & 0x10 != 0
    }

    /// Continuity counter, 0..=15.
    pub fn cc(&self) -> u8 {
        self.b[3] & CC_MASK
    }

    pub fn set_cc(&mut self, cc: u8) {
        self.b[3] = (self.b[3] & 0xF0) | (cc & CC_MASK);
    }

    /// Adaptation field size, including its length byte. Zero without AF.
    pub fn af_size(&self) -> usize {
        if self.has_af() {
            1 + self.b[4] as usize
        } else {
            0
        }
    }

    /// Size of the TS header plus adaptation field, clamped to the packet size.
    pub fn header_size(&self) -> usize {
        (PKT_HEADER_SIZE + self.af_size()).min(PKT_SIZE)
    }

    /// Payload bytes. Empty when the payload flag is clear or the AF is malformed.
    pub fn payload(&self) -> &[u8] {
        if !self.has_payload() {
            return &[];
        }
        &self.b[self.header_size()..]
    }

    pub fn payload_size(&self) -> usize {
        self.payload().len()
    }

    /// Discontinuity indicator of the adaptation field.
    pub fn discontinuity_indicator(&self) -> bool {
        self.af_size() > 1 && self.b[5] & 0x80 != 0
    }
}

fn set_bit(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

/// Iterate over the 188-byte aligned packets of a buffer, skipping bad sync.
pub fn read_packets(buf: &[u8]) -> impl Iterator<Item = TsPacket> + '_ {
    buf.chunks_exact(PKT_SIZE)
        .filter_map(|chunk| TsPacket::from_slice(chunk).ok())
}

/// Set of PID values, one bit per PID.
#[derive(Clone, PartialEq, Eq)]
pub struct PidSet {
    bits: Box<[u64; PID_MAX / 64]>,
}

impl Default for PidSet {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for PidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl PidSet {
    pub fn none() -> Self {
        Self { bits: Box::new([0; PID_MAX / 64]) }
    }

    pub fn all() -> Self {
        Self { bits: Box::new([u64::MAX; PID_MAX / 64]) }
    }

    /// PIDs above 0x1FFF are ignored.
    pub fn set(&mut self, pid: u16) {
        let pid = pid as usize;
        if pid < PID_MAX {
            self.bits[pid / 64] |= 1u64 << (pid % 64);
        }
    }

    pub fn reset(&mut self, pid: u16) {
        let pid = pid as usize;
        if pid < PID_MAX {
            self.bits[pid / 64] &= !(1u64 << (pid % 64));
        }
    }

    pub fn test(&self, pid: u16) -> bool {
        let pid = pid as usize;
        pid < PID_MAX && self.bits[pid / 64] & (1u64 << (pid % 64)) != 0
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..PID_MAX as u16).filter(move |&pid| self.test(pid))
    }
}

impl FromIterator<u16> for PidSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut set = Self::none();
        for pid in iter {
            set.set(pid);
        }
        set
    }
}
