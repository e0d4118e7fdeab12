pub mod error;

pub use error::{ErrorCategory, MigrationError, Result, StoreError, StoreResult};
