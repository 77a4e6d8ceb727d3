use std::fmt;

use thiserror::Error;

/// Which resource bound rejected or stopped a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Planned peak memory above the RAM ceiling.
    Memory,
    /// Output size above the disk ceiling.
    Disk,
    /// Live allocations crossed the ceiling while splitting.
    RuntimeMemory,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::RuntimeMemory => write!(f, "runtime memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{limit} limit exceeded: {requested} digits requested, at most {max_digits} digits fit")]
    ResourceExceeded {
        limit: Limit,
        requested: u64,
        max_digits: u64,
    },

    #[error("subtraction underflow in unsigned context")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("computation cancelled")]
    Cancelled,

    #[error("output sink failed: {0}")]
    Sink(String),
}

pub type Result<T, E = PiError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_message_names_limit_and_maximum() {
        let err = PiError::ResourceExceeded {
            limit: Limit::Disk,
            requested: 5_000,
            max_digits: 1_234,
        };
        let msg = err.to_string();
        assert!(msg.contains("disk"), "{msg}");
        assert!(msg.contains("1234"), "{msg}");
        assert!(msg.contains("5000"), "{msg}");
    }
}
