//! Layered, file-persisted token dictionaries.
//!
//! This crate decides whether subtokens pulled out of source text are
//! "known" words. A [`CorporaFile`] aggregates three writable layers over
//! an ordered chain of read-only base dictionaries: a prefix-matched
//! natural-language dictionary, exact-matched per-filetype dictionaries
//! keyed by extension, and exact-matched per-file dictionaries keyed by
//! stable identifier. The [`FileIdentityMap`] sidecar keeps the
//! path-to-identifier association stable across renames.
//!
//! Everything lives in one multi-section text file (see [`format`]) plus
//! an optional JSON sidecar; both are read at open and rewritten atomically
//! at close only when dirty.
//!
//! # Example
//! ```no_run
//! use codelex_store::{CorporaFile, ScopeMask};
//!
//! # fn main() -> Result<(), codelex_store::StoreError> {
//! let mut dicts = CorporaFile::open("dictionary.txt")?;
//! if !dicts.matches("colour", "report.txt", None, ScopeMask::ALL) {
//!     dicts.add_natural("colour");
//! }
//! dicts.close()?;
//! # Ok(()) }
//! ```

pub mod corpus;
pub mod error;
pub mod format;
pub mod identity;
mod persist;
pub mod store;

pub use codelex_types::{DictKind, ScopeMask, valid_file_id};
pub use corpus::{ExactMatchCorpus, PrefixMatchCorpus};
pub use error::{ParseError, ParseErrorKind, StoreError};
pub use identity::FileIdentityMap;
pub use store::{BaseDict, CorporaFile};
