//! MPEG-TS continuity analysis, TLV protocol messages (DVB SimulCrypt
//! ECMG <=> SCS) and PSI long-section tables.

pub mod constants;
pub mod continuity;
pub mod ecmgscs;
pub mod network;
pub mod packet;
pub mod psi;
pub mod report;
pub mod tlv;

pub use continuity::{CcStatus, ContinuityAnalyzer, ContinuityOptions, ContinuityStats};
pub use packet::{PidSet, TsPacket};
pub use report::{Report, Severity};
