//! Input boundary for head tables.
//!
//! Submodules:
//! - `table`: CSV loader producing typed head, difference and auxiliary series.

pub mod table;

pub use table::{load_table, parse_table, HeadRow, HeadTable};
