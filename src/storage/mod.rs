//! Reference target store used by the CLI and the test-suite.

pub mod catalog;
pub mod connector;
pub mod memory;
pub mod persistence;
pub mod sql;
pub mod table;

pub use catalog::Catalog;
pub use connector::MemoryConnector;
pub use memory::{MemoryStore, MemoryTransaction};
pub use persistence::SnapshotFile;
pub use sql::SqlAdapter;
pub use table::{Column, Table, Value};
