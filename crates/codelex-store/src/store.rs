//! The aggregating dictionary store.
//!
//! A [`CorporaFile`] owns one natural-language prefix corpus, any number of
//! per-filetype and per-file exact corpora, an ordered chain of read-only
//! base dictionaries consulted before its own layers, and (when a root path
//! is configured) the [`FileIdentityMap`] sidecar.
//!
//! Lifecycle: construct once per session with [`CorporaFile::open_with`],
//! accumulate `add_*` calls, then [`CorporaFile::close`]. Nothing touches
//! the filesystem in between, and close rewrites each file in a single
//! write-then-replace only when its contents actually changed. The store
//! assumes exclusive ownership of its files for the session; concurrent
//! sessions against the same dictionary are not supported.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use codelex_types::ScopeMask;

use crate::corpus::{ExactMatchCorpus, PrefixMatchCorpus};
use crate::error::StoreError;
use crate::format::{self, ParsedDictionary};
use crate::identity::FileIdentityMap;
use crate::persist::replace_file;

/// A filetype dictionary: display name, the extensions routed to it, and
/// its token set.
#[derive(Debug)]
struct FiletypeDict {
    name: String,
    extensions: Vec<String>,
    corpus: ExactMatchCorpus,
}

/// A read-only dictionary consulted before the writable layers. The
/// wrapper exposes matching only, so non-mutation is structural rather
/// than a convention.
#[derive(Debug)]
pub struct BaseDict {
    store: CorporaFile,
}

impl BaseDict {
    pub fn matches(
        &self,
        token: &str,
        filename: &str,
        file_id: Option<&str>,
        scope: ScopeMask,
    ) -> bool {
        self.store.matches(token, filename, file_id, scope)
    }

    /// A base must never accumulate changes; finding one dirty at close is
    /// a defect, not a recoverable condition.
    fn ensure_clean(&self) -> Result<(), StoreError> {
        if self.store.corpora_dirty() {
            return Err(StoreError::InternalConsistency(format!(
                "base dictionary {} is dirty at close",
                self.store.path.display()
            )));
        }
        for base in &self.store.bases {
            base.ensure_clean()?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CorporaFile {
    path: PathBuf,
    natural: PrefixMatchCorpus,
    filetypes: Vec<FiletypeDict>,
    /// extension -> index into `filetypes`.
    ext_index: HashMap<String, usize>,
    file_ids: BTreeMap<String, ExactMatchCorpus>,
    bases: Vec<BaseDict>,
    identity: Option<FileIdentityMap>,
    /// Set when a whole section was dropped (e.g. a per-file corpus whose
    /// identifier emptied), which no per-corpus dirty flag records.
    structure_dirty: bool,
}

impl CorporaFile {
    /// Open a dictionary with no base chain and no identity map.
    pub fn open(dict: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(dict, &[], None)
    }

    /// Open a dictionary, loading `base_dicts` read-only beneath it and,
    /// when `root` is given, the file-identity sidecar.
    ///
    /// An unreadable dictionary degrades to an empty natural corpus with a
    /// warning so the session can proceed; a malformed one is a
    /// [`StoreError::Parse`] and aborts the load.
    pub fn open_with(
        dict: impl AsRef<Path>,
        base_dicts: &[PathBuf],
        root: Option<&Path>,
    ) -> Result<Self, StoreError> {
        let path = dict.as_ref().to_path_buf();

        let mut bases = Vec::new();
        for base_path in base_dicts {
            // Bases load recursively, read-only, with no identity map.
            bases.push(BaseDict {
                store: Self::open_with(base_path, &[], None)?,
            });
        }

        let parsed = match fs::read_to_string(&path) {
            Ok(text) => format::parse_dictionary(&text)?,
            Err(e) => {
                warn!(
                    "unable to read dictionary file {} (reason: {e}); \
                     continuing with empty dictionary",
                    path.display()
                );
                ParsedDictionary::default()
            }
        };

        let natural = PrefixMatchCorpus::new(parsed.natural.unwrap_or_default());
        debug!("loaded natural dictionary with {} tokens", natural.len());

        let mut filetypes = Vec::new();
        let mut ext_index = HashMap::new();
        for section in parsed.filetypes {
            debug!(
                "loaded file-type dictionary {:?} with {} tokens",
                section.name,
                section.tokens.len()
            );
            for ext in &section.extensions {
                ext_index.insert(ext.clone(), filetypes.len());
            }
            filetypes.push(FiletypeDict {
                name: section.name,
                extensions: section.extensions,
                corpus: ExactMatchCorpus::new(section.tokens),
            });
        }

        let mut file_ids = BTreeMap::new();
        for section in parsed.file_ids {
            debug!(
                "loaded file-id dictionary {:?} with {} tokens",
                section.id,
                section.tokens.len()
            );
            file_ids.insert(section.id, ExactMatchCorpus::new(section.tokens));
        }

        let identity = root.map(|root| FileIdentityMap::load(sidecar_path(&path), root));

        info!(
            "opened dictionary {} ({} filetype, {} file-id sections, {} natural tokens, {} bases)",
            path.display(),
            filetypes.len(),
            file_ids.len(),
            natural.len(),
            bases.len()
        );

        Ok(Self {
            path,
            natural,
            filetypes,
            ext_index,
            file_ids,
            bases,
            identity,
            structure_dirty: false,
        })
    }

    /// True if any applicable corpus knows the token. Layers are consulted
    /// in order, first hit wins: each base (recursively, same scope), the
    /// natural corpus, the filetype corpus selected by `filename`'s
    /// extension, the per-file corpus selected by `file_id`.
    pub fn matches(
        &self,
        token: &str,
        filename: &str,
        file_id: Option<&str>,
        scope: ScopeMask,
    ) -> bool {
        for base in &self.bases {
            if base.matches(token, filename, file_id, scope) {
                return true;
            }
        }

        if scope.contains(ScopeMask::NATURAL) && self.natural.matches(token) {
            return true;
        }

        if scope.contains(ScopeMask::FILETYPE) {
            match self.filetype_for(filename) {
                Some(ft) => {
                    debug!("matching against filetype {:?}", ft.name);
                    if ft.corpus.matches(token) {
                        return true;
                    }
                }
                None => debug!("no filetype for {filename:?}"),
            }
        }

        if scope.contains(ScopeMask::FILEID)
            && let Some(id) = file_id
        {
            match self.file_ids.get(id) {
                Some(corpus) => {
                    debug!("matching against file-id {id:?}");
                    if corpus.matches(token) {
                        return true;
                    }
                }
                None => debug!("no file-id dictionary for {id:?}"),
            }
        }

        false
    }

    /// Add to the natural-language corpus.
    pub fn add_natural(&mut self, token: &str) {
        self.natural.add(token);
    }

    /// Add to the filetype corpus registered for `ext`. Returns false when
    /// no filetype covers the extension.
    pub fn add_by_extension(&mut self, token: &str, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self.ext_index.get(&ext) {
            Some(&idx) => {
                debug!("adding to filetype {:?}", self.filetypes[idx].name);
                self.filetypes[idx].corpus.add(token);
                true
            }
            None => {
                debug!("no filetype for extension {ext:?}");
                false
            }
        }
    }

    /// Add to the per-file corpus for `id`, creating it if this is the
    /// first token stored for that identifier.
    pub fn add_by_file_id(&mut self, token: &str, id: &str) -> Result<(), StoreError> {
        if !codelex_types::valid_file_id(id) {
            return Err(StoreError::InvalidFileId(id.to_owned()));
        }
        self.file_ids.entry(id.to_owned()).or_default().add(token);
        Ok(())
    }

    /// Display names of the registered filetype dictionaries.
    pub fn filetypes(&self) -> impl Iterator<Item = &str> {
        self.filetypes.iter().map(|ft| ft.name.as_str())
    }

    /// Create a new, empty filetype dictionary covering `extensions`.
    pub fn new_filetype(&mut self, name: &str, extensions: &[&str]) -> Result<(), StoreError> {
        if self.filetypes.iter().any(|ft| ft.name == name) {
            return Err(StoreError::FiletypeExists(name.to_owned()));
        }
        let extensions: Vec<String> = extensions
            .iter()
            .map(|ext| ext.trim().to_ascii_lowercase())
            .collect();
        for ext in &extensions {
            if !ext.starts_with('.') {
                return Err(StoreError::InvalidExtension(ext.clone()));
            }
            if self.ext_index.contains_key(ext) {
                return Err(StoreError::ExtensionRegistered(ext.clone()));
            }
        }

        let idx = self.filetypes.len();
        for ext in &extensions {
            self.ext_index.insert(ext.clone(), idx);
        }
        self.filetypes.push(FiletypeDict {
            name: name.to_owned(),
            extensions,
            corpus: ExactMatchCorpus::default(),
        });
        self.structure_dirty = true;
        Ok(())
    }

    /// Route an additional extension to the filetype named `name`.
    pub fn register_extension(&mut self, ext: &str, name: &str) -> Result<(), StoreError> {
        let ext = ext.trim().to_ascii_lowercase();
        if !ext.starts_with('.') {
            return Err(StoreError::InvalidExtension(ext));
        }
        if self.ext_index.contains_key(&ext) {
            return Err(StoreError::ExtensionRegistered(ext));
        }
        let Some(idx) = self.filetypes.iter().position(|ft| ft.name == name) else {
            return Err(StoreError::UnknownReference(name.to_owned()));
        };
        self.filetypes[idx].extensions.push(ext.clone());
        self.ext_index.insert(ext, idx);
        self.structure_dirty = true;
        Ok(())
    }

    /// Record that `path` is identified by `id`.
    pub fn register_new_file(&mut self, path: &Path, id: &str) -> Result<(), StoreError> {
        self.identity_mut()?.register(path, id)
    }

    /// The identifier for `path`, if tracked. `None` when no root is
    /// configured.
    pub fn file_id_of(&self, path: &Path) -> Result<Option<&str>, StoreError> {
        match &self.identity {
            Some(identity) => identity.id_of(path),
            None => Ok(None),
        }
    }

    /// Merge one per-file dictionary into another. Either argument may be
    /// a literal identifier or a filename resolved through the identity
    /// map. The target ends up with the union of both token sets; the
    /// source identifier disappears.
    pub fn merge(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        let to_id = self.resolve_reference(to)?;
        let from_id = self.resolve_reference(from)?;
        if from_id == to_id {
            debug!("merge of {from_id} into itself; nothing to do");
            return Ok(());
        }
        debug!("merging file id {from_id} into {to_id}");

        if let Some(from_corpus) = self.file_ids.remove(&from_id) {
            let target = self.file_ids.entry(to_id.clone()).or_default();
            for token in from_corpus.iter() {
                target.add(token);
            }
            self.structure_dirty = true;
        }
        self.identity_mut()?.merge_ids(&from_id, &to_id)
    }

    /// Re-associate `from`'s identifier with `to`. An existing mapping for
    /// `to` is overwritten; if that orphans an identifier, its per-file
    /// dictionary is dropped.
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<(), StoreError> {
        let dropped = self.identity_mut()?.rename(from, to)?;
        self.drop_file_id_corpus(dropped);
        Ok(())
    }

    /// Forget `path`. When it was the identifier's last file, the
    /// identifier and its per-file dictionary are removed entirely.
    pub fn delete(&mut self, path: &Path) -> Result<(), StoreError> {
        let dropped = self.identity_mut()?.remove(path)?;
        self.drop_file_id_corpus(dropped);
        Ok(())
    }

    /// Declare `to` a copy of `from`: both share one identifier and hence
    /// one per-file dictionary. No tokens are merged.
    pub fn copy(&mut self, from: &Path, to: &Path) -> Result<(), StoreError> {
        let dropped = self.identity_mut()?.copy(from, to)?;
        self.drop_file_id_corpus(dropped);
        Ok(())
    }

    /// Remove every token already covered by a base dictionary.
    ///
    /// A natural token goes only if a base matches it in NATURAL scope; a
    /// filetype token only if a base matches it in NATURAL or FILETYPE
    /// scope for one of the same extensions. The asymmetry keeps a word
    /// from vanishing because an unrelated base filetype dictionary happens
    /// to contain it. Per-file dictionaries are never filtered.
    pub fn filter_out_base_dicts(&mut self) {
        let Self {
            bases,
            natural,
            filetypes,
            ..
        } = self;

        natural.retain(|token| {
            !bases
                .iter()
                .any(|b| b.matches(token, "", None, ScopeMask::NATURAL))
        });

        for ft in filetypes.iter_mut() {
            let extensions = &ft.extensions;
            ft.corpus.retain(|token| {
                !extensions.iter().any(|ext| {
                    // Synthetic filename; only its extension is consulted.
                    let filename = format!("file{ext}");
                    bases.iter().any(|b| {
                        b.matches(
                            token,
                            &filename,
                            None,
                            ScopeMask::NATURAL | ScopeMask::FILETYPE,
                        )
                    })
                })
            });
        }
    }

    /// True if any corpus or the identity map has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.corpora_dirty() || self.identity.as_ref().is_some_and(FileIdentityMap::is_dirty)
    }

    /// Persist whatever changed, then verify the base chain stayed clean.
    ///
    /// Each file is serialized to memory and replaced in one rename, so a
    /// cancelled session observes either the old content or the new, never
    /// a torn write. Write failures are reported and swallowed: losing an
    /// update beats crashing out of the session.
    pub fn close(mut self) -> Result<(), StoreError> {
        if self.corpora_dirty() {
            let mut buf = Vec::new();
            self.serialize(&mut buf)
                .expect("in-memory serialization cannot fail");
            match replace_file(&self.path, &buf) {
                Ok(()) => {
                    info!("dictionary written to {}", self.path.display());
                    self.mark_all_clean();
                }
                Err(e) => warn!(
                    "unable to write dictionary file {} (reason: {e}); changes discarded",
                    self.path.display()
                ),
            }
        }

        if let Some(identity) = self.identity.as_mut()
            && identity.is_dirty()
        {
            if let Err(e) = identity.save() {
                warn!("unable to write file id mapping (reason: {e}); changes discarded");
            }
        }

        for base in &self.bases {
            base.ensure_clean()?;
        }
        Ok(())
    }

    /// Write the dictionary in its canonical section order: filetype
    /// sections first, then file-id sections, then the natural dictionary
    /// last (it is typically by far the largest).
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        for ft in &self.filetypes {
            format::write_filetype_section(w, &ft.name, &ft.extensions, ft.corpus.iter())?;
        }
        for (id, corpus) in &self.file_ids {
            format::write_file_id_section(w, id, corpus.iter())?;
        }
        format::write_natural_section(w, self.natural.iter())
    }

    fn corpora_dirty(&self) -> bool {
        self.structure_dirty
            || self.natural.is_dirty()
            || self.filetypes.iter().any(|ft| ft.corpus.is_dirty())
            || self.file_ids.values().any(ExactMatchCorpus::is_dirty)
    }

    fn mark_all_clean(&mut self) {
        self.structure_dirty = false;
        self.natural.mark_clean();
        for ft in &mut self.filetypes {
            ft.corpus.mark_clean();
        }
        for corpus in self.file_ids.values_mut() {
            corpus.mark_clean();
        }
    }

    fn drop_file_id_corpus(&mut self, id: Option<String>) {
        if let Some(id) = id
            && self.file_ids.remove(&id).is_some()
        {
            debug!("dropping per-file dictionary for {id:?}");
            self.structure_dirty = true;
        }
    }

    /// Interpret `reference` as a literal identifier first, then as a
    /// filename to resolve through the identity map.
    fn resolve_reference(&self, reference: &str) -> Result<String, StoreError> {
        let identity = self.identity()?;
        if identity.contains_id(reference) {
            return Ok(reference.to_owned());
        }
        let rel = identity.relativize(Path::new(reference))?;
        identity
            .id_of_rel(&rel)
            .map(str::to_owned)
            .ok_or_else(|| StoreError::UnknownReference(reference.to_owned()))
    }

    fn filetype_for(&self, filename: &str) -> Option<&FiletypeDict> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))?;
        let idx = *self.ext_index.get(&ext)?;
        self.filetypes.get(idx)
    }

    fn identity(&self) -> Result<&FileIdentityMap, StoreError> {
        self.identity.as_ref().ok_or(StoreError::RootNotConfigured)
    }

    fn identity_mut(&mut self) -> Result<&mut FileIdentityMap, StoreError> {
        self.identity.as_mut().ok_or(StoreError::RootNotConfigured)
    }
}

/// `dict.txt` -> `dict.txt.fileids.json`, beside the dictionary.
fn sidecar_path(dict: &Path) -> PathBuf {
    let mut name = OsString::from(dict.as_os_str());
    name.push(".fileids.json");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_store() -> CorporaFile {
        // A path that does not exist degrades to an empty store.
        CorporaFile::open("nonexistent-dictionary.txt").expect("open degrades, not fails")
    }

    #[test]
    fn natural_adds_are_immediately_matchable() {
        let mut store = empty_store();
        assert!(!store.matches("flourish", "x.txt", None, ScopeMask::ALL));
        store.add_natural("flourish");
        assert!(store.matches("flourish", "x.txt", None, ScopeMask::NATURAL));
        assert!(store.is_dirty());
    }

    #[test]
    fn filetype_routing_uses_the_lowercased_extension() {
        let mut store = empty_store();
        store.new_filetype("Python", &[".py", ".pyw"]).unwrap();
        assert!(store.add_by_extension("lambda", ".py"));
        assert!(!store.add_by_extension("lambda", ".rs"));

        assert!(store.matches("lambda", "app.py", None, ScopeMask::FILETYPE));
        assert!(store.matches("lambda", "APP.PY", None, ScopeMask::FILETYPE));
        assert!(store.matches("lambda", "gui.pyw", None, ScopeMask::FILETYPE));
        assert!(!store.matches("lambda", "app.rs", None, ScopeMask::FILETYPE));
        assert!(!store.matches("lambda", "app.py", None, ScopeMask::NATURAL));
    }

    #[test]
    fn filetype_name_and_extension_stay_unique() {
        let mut store = empty_store();
        store.new_filetype("Python", &[".py"]).unwrap();
        assert!(matches!(
            store.new_filetype("Python", &[".foo"]),
            Err(StoreError::FiletypeExists(_))
        ));
        assert!(matches!(
            store.new_filetype("Snake", &[".py"]),
            Err(StoreError::ExtensionRegistered(_))
        ));
        assert!(matches!(
            store.new_filetype("C", &["c"]),
            Err(StoreError::InvalidExtension(_))
        ));

        store.register_extension(".pyi", "Python").unwrap();
        assert!(store.add_by_extension("typing", ".pyi"));
        assert!(matches!(
            store.register_extension(".x", "Fortran"),
            Err(StoreError::UnknownReference(_))
        ));
    }

    #[test]
    fn file_id_corpora_are_created_lazily() {
        let mut store = empty_store();
        store.add_by_file_id("helloworld", "8f14e45f").unwrap();
        assert!(store.matches("helloworld", "x.c", Some("8f14e45f"), ScopeMask::FILEID));
        assert!(!store.matches("helloworld", "x.c", Some("other"), ScopeMask::FILEID));
        assert!(!store.matches("helloworld", "x.c", None, ScopeMask::FILEID));
        assert!(matches!(
            store.add_by_file_id("x", "bad id"),
            Err(StoreError::InvalidFileId(_))
        ));
    }

    #[test]
    fn file_id_operations_require_a_root() {
        let mut store = empty_store();
        assert!(matches!(
            store.register_new_file(Path::new("a.c"), "id-a"),
            Err(StoreError::RootNotConfigured)
        ));
        assert!(matches!(
            store.merge("a", "b"),
            Err(StoreError::RootNotConfigured)
        ));
        assert_eq!(store.file_id_of(Path::new("a.c")).unwrap(), None);
    }
}
