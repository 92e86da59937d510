use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::entry::EntryKind;

/// Accumulated state of one migration run.
///
/// Filled by the walk and read by every later stage; those stages must only
/// start once the walk has finished, because a partial identifier set
/// under-strips references to entries visited later.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    pub identifiers: BTreeSet<String>,
    pub notes: BTreeSet<PathBuf>,
    pub tables: BTreeSet<PathBuf>,
    pub attachment_dirs: BTreeSet<PathBuf>,
}

impl MigrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the token was already known.
    pub fn record_identifier(&mut self, identifier: &str) -> bool {
        self.identifiers.insert(identifier.to_string())
    }

    /// Attachments are tracked by their parent folder, not by file.
    pub fn record_file(&mut self, path: &Path, kind: EntryKind) {
        match kind {
            EntryKind::Note => {
                self.notes.insert(path.to_path_buf());
            }
            EntryKind::TabularExport => {
                self.tables.insert(path.to_path_buf());
            }
            EntryKind::Attachment => {
                if let Some(parent) = path.parent() {
                    self.attachment_dirs.insert(parent.to_path_buf());
                }
            }
        }
    }
}
