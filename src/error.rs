//! The flat error taxonomy shared by every fallible boundary in this crate.

use thiserror::Error;

/// A single, flat error type shared by the value tree, the codec, the class
/// registry and the dispatcher.
///
/// Variants are split along the same line the crate's own documentation
/// draws: some arise from untrusted input and are always returned to a
/// caller, others only ever occur on a registration path and are really
/// programming errors that a caller may choose to treat as fatal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not of the expected type")]
    Type(String),

    #[error("index {0} is out of range")]
    Index(i64),

    #[error("no such field or key: {0}")]
    Name(String),

    #[error("invalid value: {0}")]
    Value(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("argument error: {0}")]
    Argument(String),

    #[error("reflection error: {0}")]
    Reflection(String),

    #[error("serializer error: {0}")]
    Serializer(String),

    #[error("deserializer error: {0}")]
    Deserializer(String),

    #[error("buffer overflow: requested {requested} bytes, {available} available")]
    BufferOverflow { requested: usize, available: usize },

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("class already registered: {0}")]
    ClassDuplicated(String),

    #[error("backend not found: {0}")]
    BackendNotFound(String),

    #[error("backend already registered: {0}")]
    BackendDuplicated(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = Error::Index(-1);
        assert_eq!(err.to_string(), "index -1 is out of range");

        let err = Error::BufferOverflow {
            requested: 8,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "buffer overflow: requested 8 bytes, 3 available"
        );
    }
}
