//! Task selection engine.
//!
//! Pure computation over in-memory records: eligibility filters, turn
//! resolution and held-tag mutation. Persistence stays in `db`.

pub mod filter;
pub mod mutation;
pub mod random;
pub mod resolver;

pub use filter::{eligible_tasks, FilterWarning};
pub use mutation::{apply_completion, completion_warnings, initial_tags};
pub use random::{RandomSource, ThreadRandom};
pub use resolver::TurnResolver;
