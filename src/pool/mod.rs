//! Append-only pools referenced by relative offset.
//!
//! Both pools hand out an item's final pool-relative offset at `put` time
//! from a running length counter, and copy nothing until `write`.  This lets
//! the table writer emit every row immediately while deferring payload
//! materialisation to one sequential pass at the end.

pub mod data_pool;
pub mod string_pool;

pub use data_pool::{DataPool, PoolItem, PoolSlot, ReadSeek};
pub use string_pool::{StringPool, UnencodableText, BLANK_STRING};
