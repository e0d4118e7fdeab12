pub mod executor;
pub mod printer;

pub use executor::{ChangesetState, PreconditionExecutor, PreconditionResult};
pub use printer::PreconditionPrinter;
