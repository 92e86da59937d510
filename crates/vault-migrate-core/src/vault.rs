use crate::entry::{is_hidden, EntryKind};
use crate::error::MigrateError;
use crate::paths::{to_posix_path, validate_folder_name};
use anyhow::{Context as _, Result};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// The exported workspace being migrated in place.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    attachments_folder_name: String,
}

/// Census of a vault after migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultScan {
    /// Notes sitting directly in the root, POSIX file names.
    pub root_notes: Vec<String>,
    /// Notes still below the root, vault-relative POSIX paths.
    pub nested_notes: Vec<String>,
    /// Files inside the attachments folder, vault-relative POSIX paths.
    pub attachments: Vec<String>,
}

impl Vault {
    pub fn open(root: impl Into<PathBuf>, attachments_folder_name: &str) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MigrateError::InvalidVault { path: root }.into());
        }
        validate_folder_name(attachments_folder_name)?;
        Ok(Self {
            root,
            attachments_folder_name: attachments_folder_name.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn attachments_folder_name(&self) -> &str {
        &self.attachments_folder_name
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.root.join(&self.attachments_folder_name)
    }

    pub fn ensure_attachments_dir(&self) -> Result<PathBuf> {
        let dir = self.attachments_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create attachments folder: {}", dir.display()))?;
        Ok(dir)
    }

    pub fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("read file: {}", path.display()))
    }

    /// Replace `path` with `content` without ever leaving a half-written file:
    /// the new text goes to a sibling temp file that is renamed over the original.
    pub fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .with_context(|| format!("write target has no file name: {}", path.display()))?;
        let tmp = path.with_file_name(format!(
            ".{}.vault-migrate.tmp",
            file_name.to_string_lossy()
        ));

        fs::write(&tmp, content).with_context(|| format!("write temp file: {}", tmp.display()))?;
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(err).with_context(|| format!("replace file: {}", path.display()));
        }
        Ok(())
    }

    /// Move a file, refusing to replace anything already at `to`.
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            return Err(MigrateError::RelocationCollision {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            }
            .into());
        }
        fs::rename(from, to)
            .with_context(|| format!("move {} -> {}", from.display(), to.display()))?;
        Ok(())
    }

    /// Remove directories emptied by flattening. The root, the attachments
    /// folder and hidden directories are kept. Returns how many directories were removed.
    pub fn prune_empty_dirs(&self) -> Result<usize> {
        let keep = self.attachments_dir();
        let mut removed = 0usize;
        for dent in fs::read_dir(&self.root)
            .with_context(|| format!("read dir: {}", self.root.display()))?
        {
            let dent = dent.with_context(|| format!("read dir: {}", self.root.display()))?;
            let path = dent.path();
            if path == keep || is_hidden(&path) || !dent.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            removed += prune_dir(&path)?;
        }
        Ok(removed)
    }

    pub fn scan(&self) -> Result<VaultScan> {
        let attachments_dir = self.attachments_dir();
        let mut scan = VaultScan::default();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .follow_links(false)
            .ignore(false)
            .git_ignore(false)
            .git_exclude(false)
            .git_global(false);

        for result in builder.build() {
            let dent = match result {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !dent.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = dent.path();
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_posix = to_posix_path(rel)?;

            if path.starts_with(&attachments_dir) {
                scan.attachments.push(rel_posix);
                continue;
            }
            if EntryKind::classify(path) != EntryKind::Note {
                continue;
            }
            if path.parent() == Some(self.root.as_path()) {
                scan.root_notes.push(rel_posix);
            } else {
                scan.nested_notes.push(rel_posix);
            }
        }

        scan.root_notes.sort();
        scan.nested_notes.sort();
        scan.attachments.sort();
        Ok(scan)
    }
}

fn prune_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0usize;
    let mut has_remaining = false;
    for dent in fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))? {
        let dent = dent.with_context(|| format!("read dir: {}", dir.display()))?;
        if is_hidden(&dent.path()) {
            has_remaining = true;
        } else if dent.file_type().is_ok_and(|t| t.is_dir()) {
            removed += prune_dir(&dent.path())?;
            if dent.path().exists() {
                has_remaining = true;
            }
        } else {
            has_remaining = true;
        }
    }

    if !has_remaining {
        fs::remove_dir(dir).with_context(|| format!("remove empty dir: {}", dir.display()))?;
        removed += 1;
    }
    Ok(removed)
}
