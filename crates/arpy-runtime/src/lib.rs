//! Embedded interpreter for packaged arpy modules.
//!
//! Packaged code is source text in a small, Python-compatible subset: the
//! lexer tracks indentation, the parser produces a [`CodeUnit`], and
//! [`execute`] runs a unit's statements against a [`Module`] namespace.
//! Everything outside the unit itself (resolving imports, writing output) goes
//! through the [`Host`] trait, which the loader session implements.

pub mod ast;
pub mod builtins;
pub mod interp;
pub mod lexer;
pub mod mock;
pub mod ops;
pub mod parser;
pub mod value;

pub use interp::{execute, Host};
pub use parser::{compile, CodeUnit};
pub use value::{argv_of, set_argv, sys_module, Builtin, Module, ModuleRef, Value};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("SyntaxError: {message} ({origin}, line {line})")]
    Syntax {
        origin: String,
        line: usize,
        message: String,
    },
    #[error("{error} ({origin}, line {line})")]
    Located {
        origin: String,
        line: usize,
        #[source]
        error: Box<RuntimeError>,
    },
    #[error("NameError: name '{0}' is not defined")]
    Name(String),
    #[error("AttributeError: {0}")]
    Attribute(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("IndexError: {0}")]
    Index(String),
    #[error("ZeroDivisionError: integer division or modulo by zero")]
    ZeroDivision,
    #[error("OverflowError: integer result out of range")]
    Overflow,
    #[error("MemoryError: {0}")]
    Memory(String),
    #[error("ImportError: {0}")]
    Import(String),
    #[error("SystemExit: {0}")]
    Exit(i32),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Attach the statement location an error was raised at. Errors that
    /// already carry a location, and `SystemExit`, pass through unchanged.
    pub fn at(self, origin: &str, line: usize) -> Self {
        match self {
            RuntimeError::Syntax { .. } | RuntimeError::Located { .. } | RuntimeError::Exit(_) => {
                self
            }
            other => RuntimeError::Located {
                origin: origin.to_owned(),
                line,
                error: Box::new(other),
            },
        }
    }

    /// The error with any location wrapper removed.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::Located { error, .. } => error.root(),
            other => other,
        }
    }

    /// The requested exit status when this is a `SystemExit`.
    pub fn exit_code(&self) -> Option<i32> {
        match self.root() {
            RuntimeError::Exit(code) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_error_display() {
        let e = RuntimeError::Name("x".into()).at("arpy://a.arpy#m.py", 3);
        assert_eq!(
            e.to_string(),
            "NameError: name 'x' is not defined (arpy://a.arpy#m.py, line 3)"
        );
        assert!(matches!(e.root(), RuntimeError::Name(_)));
    }

    #[test]
    fn location_is_attached_once() {
        let e = RuntimeError::ZeroDivision.at("inner", 1).at("outer", 9);
        match e {
            RuntimeError::Located { origin, line, .. } => {
                assert_eq!(origin, "inner");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exit_passes_through_location() {
        let e = RuntimeError::Exit(4).at("m", 2);
        assert_eq!(e.exit_code(), Some(4));
        assert!(matches!(e, RuntimeError::Exit(4)));
        assert_eq!(RuntimeError::Overflow.exit_code(), None);
    }
}
