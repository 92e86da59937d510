use anyhow::{anyhow, Context as _, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

pub const NOTE_EXTENSION: &str = "md";
pub const TABULAR_EXTENSION: &str = "csv";

/// What a file is to the migration, decided by its extension alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Note,
    TabularExport,
    Attachment,
}

impl EntryKind {
    pub fn classify(path: &Path) -> Self {
        Self::from_extension(path.extension())
    }

    pub fn from_extension(extension: Option<&OsStr>) -> Self {
        let Some(ext) = extension else {
            return Self::Attachment;
        };
        let ext = ext.to_string_lossy().to_lowercase();
        match ext.as_str() {
            NOTE_EXTENSION => Self::Note,
            TABULAR_EXTENSION => Self::TabularExport,
            _ => Self::Attachment,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::TabularExport => "tabular_export",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryClass {
    Directory,
    File(EntryKind),
}

/// A filesystem node met during the walk, before it is renamed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub path: PathBuf,
    pub class: EntryClass,
    pub depth: usize,
}

impl WorkspaceEntry {
    pub fn from_dir_entry(dent: &fs::DirEntry, depth: usize) -> Result<Self> {
        let path = dent.path();
        let file_type = dent
            .file_type()
            .with_context(|| format!("read file type: {}", path.display()))?;
        let class = if file_type.is_dir() {
            EntryClass::Directory
        } else {
            EntryClass::File(EntryKind::classify(&path))
        };
        Ok(Self { path, class, depth })
    }

    pub fn raw_name(&self) -> Result<&str> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("entry name is not valid UTF-8: {}", self.path.display()))
    }

    /// Extension with its leading dot; empty for directories.
    pub fn dotted_extension(&self) -> String {
        match self.class {
            EntryClass::Directory => String::new(),
            EntryClass::File(_) => self
                .path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        is_hidden(&self.path)
    }
}

/// Dot-prefixed names (`.git`, `.obsidian`, `.DS_Store`) are never migrated.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_extension() {
        assert_eq!(EntryKind::classify(Path::new("a/b.md")), EntryKind::Note);
        assert_eq!(EntryKind::classify(Path::new("a/B.MD")), EntryKind::Note);
        assert_eq!(
            EntryKind::classify(Path::new("Tasks 1234.csv")),
            EntryKind::TabularExport
        );
        assert_eq!(
            EntryKind::classify(Path::new("img.png")),
            EntryKind::Attachment
        );
        assert_eq!(EntryKind::classify(Path::new("LICENSE")), EntryKind::Attachment);
    }

    #[test]
    fn hidden_names() {
        assert!(is_hidden(Path::new("/v/.obsidian")));
        assert!(is_hidden(Path::new("Photos/.DS_Store")));
        assert!(!is_hidden(Path::new("Photos/a.png")));
    }

    #[test]
    fn workspace_entry_reads_from_disk() {
        let root = std::env::temp_dir().join(format!(
            "vault_migrate_entry_from_disk_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("Folder abc")).expect("create dir");
        fs::write(root.join("Page abc.md"), "# Page").expect("write note");

        let mut entries: Vec<WorkspaceEntry> = fs::read_dir(&root)
            .expect("read dir")
            .map(|d| WorkspaceEntry::from_dir_entry(&d.expect("dent"), 3).expect("entry"))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(entries[0].class, EntryClass::Directory);
        assert_eq!(entries[0].dotted_extension(), "");
        assert_eq!(entries[1].class, EntryClass::File(EntryKind::Note));
        assert_eq!(entries[1].dotted_extension(), ".md");
        assert_eq!(entries[1].raw_name().unwrap(), "Page abc.md");
        assert_eq!(entries[1].depth, 3);

        let _ = fs::remove_dir_all(&root);
    }
}
