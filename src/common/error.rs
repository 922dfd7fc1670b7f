use std::fmt::Display;

use crate::prelude::{SourceLocation, YulString};

/// Errors raised while turning source text into code.
///
/// `Parse` and `Analysis` are user errors. `Internal` means a pass or the
/// code generator broke one of its own invariants and the output can not be
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YulError {
    Parse { message: String, line: usize },
    Analysis { message: String, location: SourceLocation },
    Internal { message: String, location: SourceLocation },
}

impl YulError {
    pub fn internal(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            location,
        }
    }

    pub fn analysis(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
            location,
        }
    }
}

impl Display for YulError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YulError::Parse { message, line } => write!(f, "[line {line}] Parse error: {message}"),
            YulError::Analysis { message, location } => {
                write!(f, "[{location}] Analysis error: {message}")
            }
            YulError::Internal { message, location } => {
                write!(f, "[{location}] Internal compiler error: {message}")
            }
        }
    }
}

impl std::error::Error for YulError {}

/// A variable could not be reached with `DUP`/`SWAP` when it was needed.
///
/// Code generation records these and keeps going so that every offending
/// function is reported in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTooDeepError {
    pub function_name: YulString,
    pub variable: YulString,
    pub depth: i32,
}

impl Display for StackTooDeepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.variable.is_empty() {
            write!(f, "Stack too deep by {} slot(s)", self.depth)?;
        } else {
            write!(
                f,
                "Variable {} is {} slot(s) too deep inside the stack",
                self.variable, self.depth
            )?;
        }
        if !self.function_name.is_empty() {
            write!(f, " in function {}", self.function_name)?;
        }
        Ok(())
    }
}

impl std::error::Error for StackTooDeepError {}

/// Returns an internal error from the enclosing function unless `$cond` holds.
#[macro_export]
macro_rules! yul_assert {
    ($cond:expr, $location:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::common::error::YulError::internal($location, format!($($arg)+)).into());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_error_message_names_variable_and_function() {
        let error = StackTooDeepError {
            function_name: "f".into(),
            variable: "a".into(),
            depth: 3,
        };
        assert_eq!(
            error.to_string(),
            "Variable a is 3 slot(s) too deep inside the stack in function f"
        );
    }

    #[test]
    fn assert_macro_produces_internal_error() {
        fn check(value: usize) -> anyhow::Result<()> {
            yul_assert!(value < 2, SourceLocation { line: 4 }, "value {} out of range", value);
            Ok(())
        }
        assert!(check(1).is_ok());
        let error = check(5).unwrap_err();
        assert_eq!(
            error.downcast_ref::<YulError>(),
            Some(&YulError::internal(
                SourceLocation { line: 4 },
                "value 5 out of range"
            ))
        );
    }
}
