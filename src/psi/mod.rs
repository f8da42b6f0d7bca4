//! PSI long sections and tables.

mod pat;
mod section;
mod table;

pub use pat::Pat;
pub use section::{BinaryTable, Section, SectionError, crc32, verify_crc32};
pub use table::LongTable;
