pub mod feedback;
pub mod kind;
pub mod sql;

pub use feedback::{Correctness, FeedbackState, Transition, TransitionError, UnknownLabel, Verdict};
pub use kind::Kind;
pub use sql::extract_sql;
