pub mod changeset;
pub mod persisted;
pub mod precondition;
pub mod predicates;

pub use changeset::{Changeset, checksum_of};
pub use persisted::PersistedChangeset;
pub use precondition::{Precondition, PreconditionPolicy, PreconditionQuery};
