use anyhow::{Context as _, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::MigrationContext;
use crate::entry::{EntryClass, EntryKind, WorkspaceEntry};
use crate::error::MigrateError;
use crate::identifier::strip_identifier;
use crate::vault::Vault;

pub const MAX_DEPTH: usize = 100;

/// Depth-first rename pass over the exported tree.
///
/// Every directory, note and table export loses its identifier suffix in
/// place; attachments keep their names and only their folder is recorded.
pub struct TreeWalker<'a> {
    vault: &'a Vault,
    max_depth: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self {
            vault,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn walk(&self, ctx: &mut MigrationContext) -> Result<()> {
        self.traverse(ctx, self.vault.root(), 0)
    }

    pub fn traverse(&self, ctx: &mut MigrationContext, directory: &Path, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            warn!(
                "depth {depth} exceeds limit {}, not descending into {}",
                self.max_depth,
                directory.display()
            );
            return Ok(());
        }
        debug!("walking {} (depth {depth})", directory.display());

        let mut entries = Vec::new();
        for dent in fs::read_dir(directory)
            .with_context(|| format!("read dir: {} (depth {depth})", directory.display()))?
        {
            let dent = dent.with_context(|| format!("read dir: {}", directory.display()))?;
            entries.push(WorkspaceEntry::from_dir_entry(&dent, depth)?);
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let attachments_dir = self.vault.attachments_dir();
        for entry in entries {
            if entry.is_hidden() || entry.path == attachments_dir {
                debug!("skipping {}", entry.path.display());
                continue;
            }
            let path = entry.path.clone();
            self.visit(ctx, entry)
                .with_context(|| format!("walk {} (depth {depth})", path.display()))?;
        }
        Ok(())
    }

    fn visit(&self, ctx: &mut MigrationContext, entry: WorkspaceEntry) -> Result<()> {
        if entry.class == EntryClass::File(EntryKind::Attachment) {
            ctx.record_file(&entry.path, EntryKind::Attachment);
            return Ok(());
        }

        let stripped = strip_identifier(entry.raw_name()?, &entry.dotted_extension());
        if let Some(identifier) = &stripped.identifier {
            ctx.record_identifier(identifier);
        }
        let new_path = rename_entry(&entry.path, &stripped.name)?;
        debug!("renamed {} -> {}", entry.path.display(), stripped.name);

        match entry.class {
            EntryClass::Directory => self.traverse(ctx, &new_path, entry.depth + 1),
            EntryClass::File(kind) => {
                ctx.record_file(&new_path, kind);
                Ok(())
            }
        }
    }
}

fn rename_entry(from: &Path, new_name: &str) -> Result<PathBuf> {
    let to = from.with_file_name(new_name);
    if to == from {
        return Ok(to);
    }
    if to.exists() {
        return Err(MigrateError::RenameCollision {
            from: from.to_path_buf(),
            to,
        }
        .into());
    }
    fs::rename(from, &to)
        .with_context(|| format!("rename {} -> {}", from.display(), to.display()))?;
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const C: &str = "cccccccccccccccccccccccccccccccc";

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vault_migrate_walk_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create root");
        dir
    }

    #[test]
    fn renames_and_classifies_tree() {
        let root = temp_root("classify");
        fs::create_dir_all(root.join(format!("Projects {A}"))).unwrap();
        fs::write(root.join(format!("Projects {A}.md")), "# Projects").unwrap();
        fs::write(
            root.join(format!("Projects {A}/Tasks {B}.csv")),
            "Name,Status\n",
        )
        .unwrap();
        fs::create_dir_all(root.join(format!("Projects {A}/Tasks {B}"))).unwrap();
        fs::write(
            root.join(format!("Projects {A}/Tasks {B}/Write docs {C}.md")),
            "Status: Done\n",
        )
        .unwrap();
        fs::write(root.join(format!("Projects {A}/diagram.png")), [1u8, 2]).unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        TreeWalker::new(&vault).walk(&mut ctx).expect("walk");

        assert!(root.join("Projects.md").is_file());
        assert!(root.join("Projects/Tasks.csv").is_file());
        assert!(root.join("Projects/Tasks/Write docs.md").is_file());
        assert!(root.join("Projects/diagram.png").is_file());

        assert_eq!(
            ctx.identifiers.iter().cloned().collect::<Vec<_>>(),
            vec![A.to_string(), B.to_string(), C.to_string()]
        );
        assert!(ctx.notes.contains(&root.join("Projects.md")));
        assert!(ctx.notes.contains(&root.join("Projects/Tasks/Write docs.md")));
        assert_eq!(
            ctx.tables.iter().collect::<Vec<_>>(),
            vec![&root.join("Projects/Tasks.csv")]
        );
        assert_eq!(
            ctx.attachment_dirs.iter().collect::<Vec<_>>(),
            vec![&root.join("Projects")]
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn rename_collision_is_fatal() {
        let root = temp_root("collision");
        fs::write(root.join(format!("Untitled {A}.md")), "one").unwrap();
        fs::write(root.join(format!("Untitled {B}.md")), "two").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        let err = TreeWalker::new(&vault).walk(&mut ctx).expect_err("collision");

        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::RenameCollision { .. })
        ));
        assert_eq!(fs::read_to_string(root.join("Untitled.md")).unwrap(), "one");
        assert_eq!(
            fs::read_to_string(root.join(format!("Untitled {B}.md"))).unwrap(),
            "two"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn depth_limit_truncates_without_error() {
        let root = temp_root("depth");
        let deep = root.join(format!("L0 {A}")).join(format!("L1 {B}")).join(format!("L2 {C}"));
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join(format!("Leaf {A}.md")), "leaf").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        TreeWalker::new(&vault)
            .with_max_depth(1)
            .walk(&mut ctx)
            .expect("truncated walk is not an error");

        assert!(root.join("L0/L1").is_dir());
        assert!(root.join(format!("L0/L1/L2 {C}")).is_dir());
        assert!(ctx.notes.is_empty());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn skips_hidden_entries_and_attachments_folder() {
        let root = temp_root("skips");
        fs::create_dir_all(root.join("attachments")).unwrap();
        fs::write(root.join("attachments/keep me.png"), [0u8]).unwrap();
        fs::write(root.join(".DS_Store"), [0u8]).unwrap();
        fs::write(root.join(format!("Home {A}.md")), "# Home").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        TreeWalker::new(&vault).walk(&mut ctx).expect("walk");

        assert!(ctx.attachment_dirs.is_empty());
        assert!(root.join("attachments/keep me.png").is_file());
        assert!(root.join("Home.md").is_file());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn second_walk_strips_real_words() {
        let root = temp_root("rerun");
        fs::write(root.join(format!("Meeting Notes {A}.md")), "x").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut first = MigrationContext::new();
        TreeWalker::new(&vault).walk(&mut first).unwrap();
        assert!(root.join("Meeting Notes.md").is_file());

        let mut second = MigrationContext::new();
        TreeWalker::new(&vault).walk(&mut second).unwrap();
        assert!(root.join("Meeting.md").is_file());
        assert!(second.identifiers.contains("Notes"));

        let _ = fs::remove_dir_all(&root);
    }
}
