use std::fmt;

use crate::insn::Label;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidDescriptor(String),
    UndefinedLabel(Label),
    DuplicateLabel(Label),
    StackUnderflow {
        index: usize,
    },
    StackMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    FallsOffEnd,
    TooManyLocals,
    MissingBody {
        method: String,
    },
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDescriptor(desc) => write!(f, "invalid descriptor: {desc}"),
            Error::UndefinedLabel(label) => write!(f, "reference to undefined label {label}"),
            Error::DuplicateLabel(label) => write!(f, "label {label} is bound twice"),
            Error::StackUnderflow { index } => {
                write!(f, "operand stack underflow at instruction {index}")
            }
            Error::StackMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "stack depth mismatch at instruction {index}: expected {expected}, found {found}"
            ),
            Error::FallsOffEnd => write!(f, "control flow falls off the end of the method"),
            Error::TooManyLocals => write!(f, "local variable slots exceed 65535"),
            Error::MissingBody { method } => write!(f, "method {method} has no code"),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}
