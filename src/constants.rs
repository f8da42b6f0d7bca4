//! Constants for MPEG-TS packets, PSI sections and continuity counters

/// MPEG-TS packet constants
pub const PKT_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;
pub const PKT_HEADER_SIZE: usize = 4;

/// PID constants
pub const PID_BITS: u32 = 13;
pub const PID_MAX: usize = 1 << PID_BITS; // 8192 PID values
pub const PID_PAT: u16 = 0x0000;
pub const PID_NIT: u16 = 0x0010; // DVB-reserved NIT PID
pub const PID_NULL: u16 = 0x1FFF;

/// Continuity counter constants
pub const CC_BITS: u32 = 4;
pub const CC_MASK: u8 = 0x0F;
pub const CC_MAX: u8 = 1 << CC_BITS; // 16 values, wraps
pub const INVALID_CC: u8 = 0xFF;
/// MPEG allows one duplicate packet per PID
pub const DEFAULT_MAX_DUPLICATES: usize = 1;

/// Long section constants
pub const LONG_SECTION_HEADER_SIZE: usize = 8;
pub const SECTION_CRC32_SIZE: usize = 4;
pub const MAX_PSI_SECTION_SIZE: usize = 1024;
pub const MAX_PRIVATE_SECTION_SIZE: usize = 4096;
/// 1024 - 8 - 4
pub const MAX_PSI_LONG_SECTION_PAYLOAD_SIZE: usize =
    MAX_PSI_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE;
/// 4096 - 8 - 4
pub const MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE: usize =
    MAX_PRIVATE_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE;

/// Table ids
pub const TID_PAT: u8 = 0x00;
