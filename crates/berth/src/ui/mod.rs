//! Terminal presentation helpers

pub mod spinner;
pub mod table;
