pub mod oracle;
pub mod oracle_fn;
pub mod oracle_memo;
pub mod progress;
pub mod reduce;
pub mod split;
pub mod types;

pub use oracle::Oracle;
pub use oracle_fn::FnOracle;
pub use oracle_memo::MemoOracle;
pub use progress::{NoProgress, Progress};
pub use reduce::{reduce, reduce_with_progress};
pub use types::{Reason, ReasonKind, Reduction, Stats, Status};
