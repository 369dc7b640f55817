//! Shared leaf types for the codelex dictionary engine.
//!
//! A dictionary file is a sequence of sections, each tagged with a
//! [`DictKind`] (`NATURAL`, `FILETYPE`, `FILEID`). Matching consults one or
//! more of those layers, selected by a [`ScopeMask`]. File-specific
//! dictionaries are addressed by opaque identifier strings validated with
//! [`valid_file_id`].
//!
//! ```rust
//! use codelex_types::{DictKind, ScopeMask, valid_file_id};
//!
//! let kind = DictKind::from_keyword("FILETYPE").unwrap();
//! assert_eq!(kind.keyword(), "FILETYPE");
//!
//! let scope = ScopeMask::NATURAL | ScopeMask::FILEID;
//! assert!(scope.contains(ScopeMask::FILEID));
//! assert!(!scope.contains(ScopeMask::FILETYPE));
//!
//! assert!(valid_file_id("8f14e45f-ceea"));
//! assert!(!valid_file_id("no spaces"));
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Section kind marker as written in dictionary file headers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DictKind {
    /// Natural-language word list; prefix-matched.
    Natural,
    /// Dictionary tied to one or more filename extensions; exact-matched.
    Filetype,
    /// Dictionary private to one logical file; exact-matched.
    FileId,
}

impl DictKind {
    /// Parse a section header keyword into a kind.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "NATURAL" => Some(DictKind::Natural),
            "FILETYPE" => Some(DictKind::Filetype),
            "FILEID" => Some(DictKind::FileId),
            _ => None,
        }
    }

    /// Emit the keyword used in dictionary file headers.
    pub fn keyword(self) -> &'static str {
        match self {
            DictKind::Natural => "NATURAL",
            DictKind::Filetype => "FILETYPE",
            DictKind::FileId => "FILEID",
        }
    }
}

impl fmt::Display for DictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Bit set selecting which dictionary layers a match may consult.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ScopeMask(u8);

impl ScopeMask {
    pub const NATURAL: ScopeMask = ScopeMask(0x1);
    pub const FILETYPE: ScopeMask = ScopeMask(0x2);
    pub const FILEID: ScopeMask = ScopeMask(0x4);
    pub const ALL: ScopeMask = ScopeMask(0x7);

    /// True if every layer in `other` is enabled in `self`.
    pub fn contains(self, other: ScopeMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// The scope that matches a single dictionary kind.
    pub fn for_kind(kind: DictKind) -> ScopeMask {
        match kind {
            DictKind::Natural => ScopeMask::NATURAL,
            DictKind::Filetype => ScopeMask::FILETYPE,
            DictKind::FileId => ScopeMask::FILEID,
        }
    }
}

impl BitOr for ScopeMask {
    type Output = ScopeMask;

    fn bitor(self, rhs: ScopeMask) -> ScopeMask {
        ScopeMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScopeMask {
    fn bitor_assign(&mut self, rhs: ScopeMask) {
        self.0 |= rhs.0;
    }
}

/// True iff `s` is a well-formed file identifier: non-empty, only ASCII
/// alphanumerics, underscore, or hyphen.
pub fn valid_file_id(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
