use std::path::PathBuf;

use thiserror::Error;

/// A structural violation found while parsing a dictionary file.
///
/// Fatal to that file's load; the caller decides whether to abort or carry
/// on with an empty dictionary.
#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    /// 1-based line number of the offending line.
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseErrorKind {
    #[error("expected a section header of the form `KIND: metadata`")]
    MalformedHeader,
    #[error("unrecognized section kind {0:?}")]
    UnknownKind(String),
    #[error("NATURAL header must have empty metadata")]
    NaturalMetadata,
    #[error("duplicate NATURAL section")]
    DuplicateNatural,
    #[error("file-type description is empty")]
    EmptyFiletypeName,
    #[error("duplicate file-type description {0:?}")]
    DuplicateFiletypeName(String),
    #[error("FILETYPE header is missing its extension list")]
    MissingExtensions,
    #[error("extension {0:?} does not begin with a period")]
    ExtensionMissingDot(String),
    #[error("duplicate extension {0:?}")]
    DuplicateExtension(String),
    #[error("{0:?} is not a valid file id")]
    InvalidFileId(String),
    #[error("duplicate file id {0:?}")]
    DuplicateFileId(String),
    #[error("FILETYPE header metadata must be `name; .ext1, .ext2, ...`")]
    MalformedFiletypeMetadata,
}

/// Errors surfaced by the store and the file-identity map.
///
/// Load-time parse failures abort the load; everything else aborts only the
/// operation that raised it, leaving the in-memory store usable.
/// [`StoreError::InternalConsistency`] is the exception: it signals a
/// defect, and callers should halt rather than continue.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dictionary parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("path {path} is not under the configured root {root}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    #[error("no root path configured; file-id operations are unavailable")]
    RootNotConfigured,

    #[error("cannot resolve {0:?} to a known file id or tracked file")]
    UnknownReference(String),

    #[error("{path} is already registered with file id {id}")]
    AlreadyRegistered { path: String, id: String },

    #[error("{0:?} is not a valid file id")]
    InvalidFileId(String),

    #[error("a file-type named {0:?} already exists")]
    FiletypeExists(String),

    #[error("extension {0:?} is already registered to a file-type")]
    ExtensionRegistered(String),

    #[error("extension {0:?} does not begin with a period")]
    InvalidExtension(String),

    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}
