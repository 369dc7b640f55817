//! Persistent registry associating stable file identifiers with files.
//!
//! Per-file dictionaries are keyed by an opaque identifier rather than a
//! path, so they survive renames. This map maintains the association in
//! both directions and keeps it a bijection-like invariant: every path
//! belongs to at most one identifier, every identifier owns a non-empty
//! sorted set of root-relative paths, and the two directions agree after
//! every operation.
//!
//! The map is persisted as a JSON sidecar next to the dictionary file
//! (`<dict>.fileids.json`), mapping identifier to a sorted array of
//! root-relative path strings. Loading is lenient: a missing sidecar is an
//! empty map, a malformed one is reported and ignored. All path arguments
//! are normalized against the configured root; a path outside the root is
//! an error on the requested operation, never silently accepted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use codelex_types::valid_file_id;

use crate::error::StoreError;
use crate::persist::replace_file;

/// On-disk shape of the sidecar: identifier to sorted path list.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct SidecarFile(BTreeMap<String, Vec<String>>);

#[derive(Debug)]
pub struct FileIdentityMap {
    root: PathBuf,
    sidecar: PathBuf,
    /// id -> sorted set of root-relative paths ('/'-separated).
    forward: BTreeMap<String, BTreeSet<String>>,
    /// Exact inverse of `forward`.
    reverse: HashMap<String, String>,
    dirty: bool,
}

impl FileIdentityMap {
    /// Create an empty map rooted at `root`, persisted to `sidecar`.
    pub fn empty(sidecar: PathBuf, root: &Path) -> Self {
        Self {
            root: clean_path(root),
            sidecar,
            forward: BTreeMap::new(),
            reverse: HashMap::new(),
            dirty: false,
        }
    }

    /// Load the sidecar if it exists. A missing file yields an empty map; a
    /// malformed one is reported with a warning and ignored, so an
    /// interrupted earlier session cannot brick the store.
    pub fn load(sidecar: PathBuf, root: &Path) -> Self {
        let mut map = Self::empty(sidecar, root);
        let text = match fs::read_to_string(&map.sidecar) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no file id mapping at {}", map.sidecar.display());
                return map;
            }
            Err(e) => {
                warn!(
                    "unable to read file id mapping {} (reason: {e}); continuing without it",
                    map.sidecar.display()
                );
                return map;
            }
        };
        let raw: SidecarFile = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "could not parse file id mapping {} (reason: {e}); continuing without it",
                    map.sidecar.display()
                );
                return map;
            }
        };
        for (id, paths) in raw.0 {
            if !valid_file_id(&id) {
                warn!("ignoring invalid file id {id:?} in {}", map.sidecar.display());
                continue;
            }
            for path in paths {
                if let Some(owner) = map.reverse.get(&path) {
                    warn!(
                        "path {path:?} listed under both {owner:?} and {id:?}; keeping {owner:?}"
                    );
                    continue;
                }
                map.reverse.insert(path.clone(), id.clone());
                map.forward.entry(id.clone()).or_default().insert(path);
            }
        }
        map.forward.retain(|_, paths| !paths.is_empty());
        map
    }

    /// Normalize a path argument to the root-relative, '/'-separated form
    /// used as a map key. Absolute paths must live under the root; relative
    /// paths are taken as root-relative and must not escape it.
    pub fn relativize(&self, path: &Path) -> Result<String, StoreError> {
        let outside = || StoreError::PathOutsideRoot {
            path: path.to_path_buf(),
            root: self.root.clone(),
        };

        let cleaned = clean_path(path);
        let rel = if cleaned.is_absolute() {
            cleaned.strip_prefix(&self.root).map_err(|_| outside())?
        } else {
            cleaned.as_path()
        };

        let mut parts: Vec<String> = Vec::new();
        for comp in rel.components() {
            match comp {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                // An escaping `..` survives cleaning only when it would
                // climb above the root.
                _ => return Err(outside()),
            }
        }
        if parts.is_empty() {
            return Err(outside());
        }
        Ok(parts.join("/"))
    }

    /// Register a fresh path under `id`. The path must not already carry an
    /// identifier.
    pub fn register(&mut self, path: &Path, id: &str) -> Result<(), StoreError> {
        if !valid_file_id(id) {
            return Err(StoreError::InvalidFileId(id.to_owned()));
        }
        let rel = self.relativize(path)?;
        if let Some(existing) = self.reverse.get(&rel) {
            return Err(StoreError::AlreadyRegistered {
                path: rel,
                id: existing.clone(),
            });
        }
        self.reverse.insert(rel.clone(), id.to_owned());
        self.forward.entry(id.to_owned()).or_default().insert(rel);
        self.dirty = true;
        Ok(())
    }

    /// Identifier for a path, if any. Errors only when the path falls
    /// outside the root.
    pub fn id_of(&self, path: &Path) -> Result<Option<&str>, StoreError> {
        let rel = self.relativize(path)?;
        Ok(self.id_of_rel(&rel))
    }

    pub fn id_of_rel(&self, rel: &str) -> Option<&str> {
        self.reverse.get(rel).map(String::as_str)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.forward.contains_key(id)
    }

    /// The sorted path set owned by `id`, if known.
    pub fn paths_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.forward.get(id)
    }

    /// Move every path of `from` under `to` and remove `from` entirely.
    /// Resolution of filename arguments and the corpus union live on the
    /// aggregator.
    pub fn merge_ids(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        if from == to {
            return Ok(());
        }
        let moved = self
            .forward
            .remove(from)
            .ok_or_else(|| StoreError::UnknownReference(from.to_owned()))?;
        if !self.forward.contains_key(to) {
            self.forward.insert(from.to_owned(), moved);
            return Err(StoreError::UnknownReference(to.to_owned()));
        }
        let target = self.forward.get_mut(to).expect("target id present");
        for path in moved {
            self.reverse.insert(path.clone(), to.to_owned());
            target.insert(path);
        }
        self.dirty = true;
        Ok(())
    }

    /// Re-associate `from_path`'s identifier with `to_path`. If `to_path`
    /// already had an identifier, that mapping is deleted first; when the
    /// deletion empties an identifier it is returned so the caller can drop
    /// the per-file corpus.
    pub fn rename(&mut self, from_path: &Path, to_path: &Path) -> Result<Option<String>, StoreError> {
        let from_rel = self.relativize(from_path)?;
        let to_rel = self.relativize(to_path)?;
        if !self.reverse.contains_key(&from_rel) {
            return Err(StoreError::UnknownReference(from_rel));
        }
        if from_rel == to_rel {
            return Ok(None);
        }

        let dropped = if self.reverse.contains_key(&to_rel) {
            self.remove_rel(&to_rel)
        } else {
            None
        };

        let id = self
            .reverse
            .remove(&from_rel)
            .expect("from path checked above");
        if let Some(paths) = self.forward.get_mut(&id) {
            paths.remove(&from_rel);
            paths.insert(to_rel.clone());
        }
        debug!("switching file id {id} from {from_rel} to {to_rel}");
        self.reverse.insert(to_rel, id);
        self.dirty = true;
        Ok(dropped)
    }

    /// Drop a path from its identifier's set. Returns the identifier when
    /// the removal emptied it (caller drops the corpus). Removing an
    /// untracked path is a quiet no-op.
    pub fn remove(&mut self, path: &Path) -> Result<Option<String>, StoreError> {
        let rel = self.relativize(path)?;
        if !self.reverse.contains_key(&rel) {
            debug!("no file id for {rel}");
            return Ok(None);
        }
        Ok(self.remove_rel(&rel))
    }

    /// Associate `to_path` with the same identifier as `from_path`, without
    /// touching any corpus. An existing mapping for `to_path` is replaced.
    pub fn copy(&mut self, from_path: &Path, to_path: &Path) -> Result<Option<String>, StoreError> {
        let from_rel = self.relativize(from_path)?;
        let to_rel = self.relativize(to_path)?;
        let id = self
            .reverse
            .get(&from_rel)
            .cloned()
            .ok_or(StoreError::UnknownReference(from_rel))?;
        if self.reverse.get(&to_rel) == Some(&id) {
            return Ok(None);
        }

        let dropped = if self.reverse.contains_key(&to_rel) {
            self.remove_rel(&to_rel)
        } else {
            None
        };
        self.reverse.insert(to_rel.clone(), id.clone());
        self.forward.entry(id).or_default().insert(to_rel);
        self.dirty = true;
        Ok(dropped)
    }

    fn remove_rel(&mut self, rel: &str) -> Option<String> {
        let id = self.reverse.remove(rel)?;
        self.dirty = true;
        let paths = self.forward.get_mut(&id)?;
        paths.remove(rel);
        if paths.is_empty() {
            self.forward.remove(&id);
            return Some(id);
        }
        None
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the sidecar atomically and mark the map clean.
    pub fn save(&mut self) -> io::Result<()> {
        let ordered = SidecarFile(
            self.forward
                .iter()
                .map(|(id, paths)| (id.clone(), paths.iter().cloned().collect()))
                .collect(),
        );
        let json =
            serde_json::to_string_pretty(&ordered).expect("string map serializes to json");
        replace_file(&self.sidecar, json.as_bytes())?;
        self.dirty = false;
        Ok(())
    }

    /// Check the bijection invariant; a violation is a programming defect.
    pub fn verify(&self) -> Result<(), StoreError> {
        for (id, paths) in &self.forward {
            if paths.is_empty() {
                return Err(StoreError::InternalConsistency(format!(
                    "file id {id:?} has an empty path set"
                )));
            }
            for path in paths {
                if self.reverse.get(path) != Some(id) {
                    return Err(StoreError::InternalConsistency(format!(
                        "path {path:?} in {id:?}'s set but reverse map disagrees"
                    )));
                }
            }
        }
        for (path, id) in &self.reverse {
            if !self.forward.get(id).is_some_and(|paths| paths.contains(path)) {
                return Err(StoreError::InternalConsistency(format!(
                    "reverse map sends {path:?} to {id:?} but the forward set lacks it"
                )));
            }
        }
        Ok(())
    }
}

/// Lexical path normalization: resolves `.` and `..` without touching the
/// filesystem, since identified files need not exist.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
