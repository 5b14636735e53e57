//! Repository methods on `VerdictService`, one module per table.

pub mod records;
pub mod sets;

pub use records::NewRecord;
