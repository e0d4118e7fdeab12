pub mod declared;
pub mod persisted;

pub use declared::DeclaredChangesetValidator;
pub use persisted::PersistedChangesetValidator;
