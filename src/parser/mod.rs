//! Changelog sources: turn a changelog location into declared changesets.

pub mod json;

pub use json::JsonChangelogParser;

use crate::core::Result;
use crate::model::Changeset;
use async_trait::async_trait;

#[async_trait]
pub trait ChangelogParser: Send + Sync {
    /// Declared changesets in declaration order.
    ///
    /// Failures are reported as [`MigrationError::ChangelogParse`](crate::core::MigrationError::ChangelogParse),
    /// before any validation runs.
    async fn parse(&self, location: &str) -> Result<Vec<Changeset>>;
}
