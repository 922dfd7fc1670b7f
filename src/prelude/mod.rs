pub mod ast;
pub mod shared_strings;

pub use ast::*;
pub use shared_strings::YulString;
