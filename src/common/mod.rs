pub mod dyn_tracing;
pub mod error;

pub use error::{StackTooDeepError, YulError};
