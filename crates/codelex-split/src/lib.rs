//! Identifier decomposition for spell-checking source code.
//!
//! Scanners hand over whole alphanumeric tokens (`someVariable__Name104`);
//! dictionaries match individual words. [`decompose`] bridges the two: it
//! splits a token along underscore/digit runs and camelCase boundaries,
//! lowercases the pieces, and drops duplicates while preserving order.
//!
//! The function is total and allocation-only; it never fails and keeps no
//! state, so it can sit in the scanner's inner loop.
//!
//! ```rust
//! use codelex_split::decompose;
//!
//! assert_eq!(decompose("someVariable__Name104"), ["some", "variable", "name"]);
//! assert_eq!(decompose("HTTP_STATUS_CODE"), ["http", "status", "code"]);
//! ```

/// Divide a token into lowercase subtokens.
///
/// Underscore and digit runs act as separators and are discarded. If the
/// letters that remain are all uppercase, the token is treated as a
/// constant-style identifier (`SOME_DEFINE`) and each underscore-delimited
/// fragment stays whole; otherwise fragments are split further at camelCase
/// boundaries. Duplicate subtokens are removed, first occurrence wins.
pub fn decompose(token: &str) -> Vec<String> {
    let fragments: Vec<&str> = token
        .split(|c: char| c == '_' || c.is_ascii_digit())
        .filter(|frag| !frag.is_empty())
        .collect();

    let all_upper = !fragments.is_empty()
        && fragments
            .iter()
            .flat_map(|frag| frag.chars())
            .all(|c| c.is_uppercase());

    let mut out: Vec<String> = Vec::new();
    if all_upper {
        for frag in fragments {
            push_unique(&mut out, frag.to_lowercase());
        }
    } else {
        for frag in fragments {
            for piece in split_camel(frag) {
                push_unique(&mut out, piece.to_lowercase());
            }
        }
    }
    out
}

/// Recognize `0x`-prefixed hexadecimal literals, which look word-like
/// (`0xdeadbeef`) but are numeric and should not be matched as words.
/// The prefix is lowercase only; the digits may use either case.
pub fn is_hex_literal(token: &str) -> bool {
    token
        .strip_prefix("0x")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Split a letters-only fragment at camelCase boundaries. Each uppercase
/// letter begins a new piece; a leading lowercase run is its own piece.
fn split_camel(frag: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, c) in frag.char_indices() {
        if c.is_uppercase() && idx > start {
            pieces.push(&frag[start..idx]);
            start = idx;
        }
    }
    if start < frag.len() {
        pieces.push(&frag[start..]);
    }
    pieces
}

fn push_unique(out: &mut Vec<String>, piece: String) {
    if !out.contains(&piece) {
        out.push(piece);
    }
}
