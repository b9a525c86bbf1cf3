//! Save-state failures.

use thiserror::Error;

/// Convenience alias for state sync results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Reasons a state could not be written, read or applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The blob does not start with the state magic.
    #[error("not a save state (bad magic)")]
    BadMagic,
    /// The blob was written by an unknown format revision.
    #[error("unsupported save state version {0}")]
    UnsupportedVersion(u16),
    /// The payload does not match its recorded checksum.
    #[error("save state checksum mismatch")]
    ChecksumMismatch,
    /// The blob ended before the named field could be read.
    #[error("save state truncated while reading {field}")]
    Truncated {
        /// Field being read.
        field: String,
    },
    /// Bytes remain after the last field was read.
    #[error("save state has {remaining} unread bytes")]
    TrailingData {
        /// Unconsumed payload length.
        remaining: usize,
    },
    /// A section marker differs from the one the loader expects.
    #[error("expected section {expected:?}, found {found:?}")]
    SectionMismatch {
        /// Section the loading code opened.
        expected: String,
        /// Section recorded in the blob.
        found: String,
    },
    /// `end_section` without a matching `begin_section`, or a section left open.
    #[error("unbalanced state section {0:?}")]
    UnbalancedSection(String),
    /// The field sequence differs from the one that produced the blob.
    #[error("save state layout does not match this build")]
    LayoutMismatch,
    /// A field carried a value of a different type than the loader expects.
    #[error("field {field} has type tag {found}, expected {expected}")]
    TypeMismatch {
        /// Field path.
        field: String,
        /// Tag the loader expects.
        expected: u8,
        /// Tag recorded in the blob.
        found: u8,
    },
    /// A byte buffer differs in length from its destination.
    #[error("field {field} holds {found} bytes, expected {expected}")]
    LengthMismatch {
        /// Field path.
        field: String,
        /// Destination length.
        expected: usize,
        /// Recorded length.
        found: usize,
    },
    /// A decoded value is outside what the owning component accepts.
    #[error("field {field} has invalid value {value}")]
    InvalidValue {
        /// Field path.
        field: String,
        /// Offending value.
        value: i64,
    },
    /// A finishing call that does not match the session's direction.
    #[error("serializer is not in {0} mode")]
    WrongMode(&'static str),
}
