//! Parser and serializer for the multi-section dictionary file.
//!
//! The file is a sequence of sections. Each section opens with a header
//! line `KIND: metadata` and runs until the next header (any line
//! containing `:`) or end of file; the body is one token per line, blank
//! lines ignored.
//!
//! ```text
//! FILETYPE: Python; .py
//! import
//! lambda
//!
//! FILEID: 8f14e45f
//! helloworld
//!
//! NATURAL:
//! color
//! colour
//! ```
//!
//! Parsing is a single left-to-right pass over the lines; every structural
//! violation carries the 1-based line number it was found on. Uniqueness of
//! filetype names, extensions, and file ids is checked against the sections
//! already parsed, so the reported line is always the second offender.
//!
//! Serialization is deterministic: filetype sections first (registration
//! order), then file-id sections (sorted by id), then the natural section
//! last, each followed by one blank line. See [`write_filetype_section`]
//! and friends; section order itself is the store's concern.

use std::collections::HashSet;
use std::io::{self, Write};

use codelex_types::{DictKind, valid_file_id};

use crate::error::{ParseError, ParseErrorKind};

/// One `FILETYPE` section: display name, extension list, token body.
#[derive(Debug)]
pub struct FiletypeSection {
    pub name: String,
    pub extensions: Vec<String>,
    pub tokens: Vec<String>,
}

/// One `FILEID` section: identifier and token body.
#[derive(Debug)]
pub struct FileIdSection {
    pub id: String,
    pub tokens: Vec<String>,
}

/// The typed result of parsing a whole dictionary file.
#[derive(Debug, Default)]
pub struct ParsedDictionary {
    pub natural: Option<Vec<String>>,
    pub filetypes: Vec<FiletypeSection>,
    pub file_ids: Vec<FileIdSection>,
}

/// Parse the full text of a dictionary file.
pub fn parse_dictionary(text: &str) -> Result<ParsedDictionary, ParseError> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_matches([' ', '\t', '\r'])).collect();
    let mut parsed = ParsedDictionary::default();
    let mut seen_extensions: HashSet<String> = HashSet::new();

    let mut offset = 0;
    while offset < lines.len() {
        if lines[offset].is_empty() {
            offset += 1;
            continue;
        }
        offset = parse_section(&lines, offset, &mut parsed, &mut seen_extensions)?;
    }
    Ok(parsed)
}

/// Parse one section whose header sits at `offset`; returns the offset of
/// the next header (or one past the end).
fn parse_section(
    lines: &[&str],
    offset: usize,
    parsed: &mut ParsedDictionary,
    seen_extensions: &mut HashSet<String>,
) -> Result<usize, ParseError> {
    let line_num = offset + 1;
    let fail = |kind| ParseError { line: line_num, kind };

    let Some((raw_kind, raw_meta)) = lines[offset].split_once(':') else {
        return Err(fail(ParseErrorKind::MalformedHeader));
    };
    let keyword = raw_kind.trim();
    let metadata = raw_meta.trim();
    let kind = DictKind::from_keyword(keyword)
        .ok_or_else(|| fail(ParseErrorKind::UnknownKind(keyword.to_owned())))?;

    let (next, tokens) = read_section_tokens(lines, offset);

    match kind {
        DictKind::Natural => {
            if !metadata.is_empty() {
                return Err(fail(ParseErrorKind::NaturalMetadata));
            }
            if parsed.natural.is_some() {
                return Err(fail(ParseErrorKind::DuplicateNatural));
            }
            parsed.natural = Some(tokens);
        }
        DictKind::Filetype => {
            let (name, extensions) = parse_filetype_metadata(metadata, line_num)?;
            if parsed.filetypes.iter().any(|ft| ft.name == name) {
                return Err(fail(ParseErrorKind::DuplicateFiletypeName(name)));
            }
            for ext in &extensions {
                if !seen_extensions.insert(ext.clone()) {
                    return Err(fail(ParseErrorKind::DuplicateExtension(ext.clone())));
                }
            }
            parsed.filetypes.push(FiletypeSection {
                name,
                extensions,
                tokens,
            });
        }
        DictKind::FileId => {
            if !valid_file_id(metadata) {
                return Err(fail(ParseErrorKind::InvalidFileId(metadata.to_owned())));
            }
            if parsed.file_ids.iter().any(|f| f.id == metadata) {
                return Err(fail(ParseErrorKind::DuplicateFileId(metadata.to_owned())));
            }
            parsed.file_ids.push(FileIdSection {
                id: metadata.to_owned(),
                tokens,
            });
        }
    }
    Ok(next)
}

/// Split `name; .ext1, .ext2` metadata for a FILETYPE header.
fn parse_filetype_metadata(
    metadata: &str,
    line_num: usize,
) -> Result<(String, Vec<String>), ParseError> {
    let fail = |kind| ParseError { line: line_num, kind };

    let Some((raw_name, raw_extensions)) = metadata.split_once(';') else {
        return Err(fail(ParseErrorKind::MalformedFiletypeMetadata));
    };
    // Exactly one `;`: a second one would smuggle it into an extension.
    if raw_extensions.contains(';') {
        return Err(fail(ParseErrorKind::MalformedFiletypeMetadata));
    }
    let name = raw_name.trim();
    if name.is_empty() {
        return Err(fail(ParseErrorKind::EmptyFiletypeName));
    }

    let extensions: Vec<String> = raw_extensions
        .split(',')
        .map(|ext| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    if extensions.is_empty() {
        return Err(fail(ParseErrorKind::MissingExtensions));
    }
    for ext in &extensions {
        if !ext.starts_with('.') {
            return Err(fail(ParseErrorKind::ExtensionMissingDot(ext.clone())));
        }
    }
    Ok((name.to_owned(), extensions))
}

/// Collect the token body following the header at `offset`; stops at the
/// next line containing `:` or end of input.
fn read_section_tokens(lines: &[&str], offset: usize) -> (usize, Vec<String>) {
    let mut tokens = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(offset + 1) {
        if line.contains(':') {
            return (i, tokens);
        }
        if !line.is_empty() {
            tokens.push((*line).to_owned());
        }
    }
    (lines.len(), tokens)
}

pub fn write_natural_section<'a>(
    w: &mut impl Write,
    tokens: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    writeln!(w, "{}:", DictKind::Natural.keyword())?;
    write_tokens(w, tokens)
}

pub fn write_filetype_section<'a>(
    w: &mut impl Write,
    name: &str,
    extensions: &[String],
    tokens: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    writeln!(
        w,
        "{}: {}; {}",
        DictKind::Filetype.keyword(),
        name,
        extensions.join(", ")
    )?;
    write_tokens(w, tokens)
}

pub fn write_file_id_section<'a>(
    w: &mut impl Write,
    id: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    writeln!(w, "{}: {}", DictKind::FileId.keyword(), id)?;
    write_tokens(w, tokens)
}

fn write_tokens<'a>(w: &mut impl Write, tokens: impl Iterator<Item = &'a str>) -> io::Result<()> {
    for token in tokens {
        writeln!(w, "{token}")?;
    }
    writeln!(w)
}
