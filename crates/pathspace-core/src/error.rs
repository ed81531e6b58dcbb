// SPDX-License-Identifier: Apache-2.0
//! Boundary error codes shared by every PathSpace-facing operation.

/// Machine-readable error codes surfaced at the PathSpace API boundary.
///
/// Errors are values, never exceptions: every public fallible operation in
/// this workspace returns `Result<T, Error>`. Variants map 1:1 onto the
/// boundary codes named by the external interface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Path failed syntax validation at the requested [`ValidationLevel`](crate::ValidationLevel).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A single path component failed validation (empty, `.`/`..`, illegal bytes).
    #[error("invalid path subcomponent: {0}")]
    InvalidPathSubcomponent(String),

    /// A value's shape failed structural validation (e.g. a snapshot bucket).
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// A layer provider forbids the attempted operation class entirely.
    #[error("invalid permissions: {0}")]
    InvalidPermissions(String),

    /// Input bytes/structure could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The queue at the resolved node is empty.
    #[error("no object found at path")]
    NoObjectFound,

    /// No node resolves for the given path.
    #[error("no such path: {0}")]
    NoSuchPath(String),

    /// The queue head's runtime type does not match the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the caller requested.
        expected: &'static str,
        /// The type actually stored at the head of the queue.
        found: &'static str,
    },

    /// A blocking operation's deadline elapsed before a match arrived.
    #[error("operation timed out")]
    Timeout,

    /// A malformed or inconsistent operation was attempted (e.g. double-start a facade).
    #[error("invalid operation: {0}")]
    InvalidError(String),

    /// Catch-all for conditions not covered by a more specific code.
    #[error("unknown error: {0}")]
    UnknownError(String),

    /// A value's type has no registered codec for this operation.
    #[error("unserializable type: {0}")]
    UnserializableType(String),

    /// A required serialization function was not supplied/registered.
    #[error("serialization function missing: {0}")]
    SerializationFunctionMissing(String),
}

/// Convenience alias used throughout the PathSpace crates.
pub type Result<T> = std::result::Result<T, Error>;
