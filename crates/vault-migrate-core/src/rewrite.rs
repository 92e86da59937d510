use anyhow::{Context as _, Result};
use log::{debug, info};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::attachments::unique_destination;
use crate::context::MigrationContext;
use crate::entry::EntryKind;
use crate::error::MigrateError;
use crate::frontmatter::ensure_tag_block;
use crate::paths::{decode_link_segment, has_url_scheme};
use crate::tag::derive_tag;
use crate::vault::Vault;

/// `[label](target)`, optionally preceded by `!` for embeds. The target may
/// hold one level of balanced parentheses, as in `Trip%20(Rome)/a.png`.
pub(crate) static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[([^\]\n]*)\]\(((?:[^()\n]|\([^()\n]*\))+)\)").expect("valid link regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationStats {
    pub notes_relocated: usize,
    pub tables_relocated: usize,
    pub tags_added: usize,
}

/// Remove `%20<identifier>` for every known identifier.
pub fn strip_identifier_refs(text: &str, identifiers: &BTreeSet<String>) -> String {
    let mut out = text.to_string();
    for identifier in identifiers {
        let encoded = format!("%20{identifier}");
        if out.contains(&encoded) {
            out = out.replace(&encoded, "");
        }
    }
    out
}

/// Rewrite `[label](dir/Note.md)` to `[[Note]]`. Embeds, external URLs and
/// links to anything other than a note are left untouched, as is the text
/// around each match.
pub fn rewrite_note_links(text: &str) -> String {
    LINK_RE
        .replace_all(text, |caps: &Captures| {
            let whole = caps[0].to_string();
            if !caps[1].is_empty() {
                return whole;
            }
            let target = caps[3].trim();
            if has_url_scheme(target) {
                return whole;
            }

            let decoded = decode_link_segment(target);
            let last = decoded.rsplit('/').next().unwrap_or(decoded.as_str());
            let last = Path::new(last);
            match (EntryKind::classify(last), last.file_stem()) {
                (EntryKind::Note, Some(stem)) => format!("[[{}]]", stem.to_string_lossy()),
                _ => whole,
            }
        })
        .into_owned()
}

/// Pass A. Needs the identifier set of the complete walk.
pub fn strip_identifier_pass(vault: &Vault, ctx: &MigrationContext) -> Result<usize> {
    let mut changed = 0usize;
    for note in &ctx.notes {
        let text = vault.read_text(note)?;
        let stripped = strip_identifier_refs(&text, &ctx.identifiers);
        if stripped != text {
            vault.write_text(note, &stripped)?;
            changed += 1;
            debug!("stripped identifier references in {}", note.display());
        }
    }
    info!("stripped identifier references from {changed} notes");
    Ok(changed)
}

/// Pair every note with its root destination. Fails on the first clash
/// (two notes sharing a file name, or an untracked file already in the
/// root), so callers can check before touching anything on disk.
pub fn plan_note_relocations(
    vault: &Vault,
    ctx: &MigrationContext,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut claimed: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    let mut plan = Vec::with_capacity(ctx.notes.len());

    for note in &ctx.notes {
        let file_name = note
            .file_name()
            .with_context(|| format!("note has no file name: {}", note.display()))?;
        let dest = vault.root().join(file_name);

        let clashes_on_disk = dest != *note && dest.exists() && !ctx.notes.contains(&dest);
        if claimed.insert(dest.clone(), note.clone()).is_some() || clashes_on_disk {
            return Err(MigrateError::RelocationCollision {
                from: note.clone(),
                to: dest,
            }
            .into());
        }
        plan.push((note.clone(), dest));
    }
    Ok(plan)
}

/// Pass B: tag block, wiki links, then flatten notes into the root and move
/// table exports into the attachments folder. Runs after tables are converted
/// and attachments consolidated, since both read notes at their original paths.
pub fn finalize_pass(vault: &Vault, ctx: &MigrationContext) -> Result<RelocationStats> {
    let plan = plan_note_relocations(vault, ctx)?;
    let mut stats = RelocationStats::default();

    for (note, dest) in &plan {
        let text = vault.read_text(note)?;
        let tag = derive_tag(note, vault.root())?;
        let (text, tagged) = ensure_tag_block(&text, &tag);
        let text = rewrite_note_links(&text);
        vault.write_text(note, &text)?;
        if tagged {
            stats.tags_added += 1;
        }

        if dest != note {
            vault.move_file(note, dest)?;
            stats.notes_relocated += 1;
            debug!("relocated {} -> {}", note.display(), dest.display());
        }
    }

    if !ctx.tables.is_empty() {
        let attachments_dir = vault.ensure_attachments_dir()?;
        for table in &ctx.tables {
            let file_name = table
                .file_name()
                .with_context(|| format!("table has no file name: {}", table.display()))?;
            let dest = unique_destination(&attachments_dir, &file_name.to_string_lossy());
            vault.move_file(table, &dest)?;
            stats.tables_relocated += 1;
        }
    }

    info!(
        "relocated {} notes and {} table exports ({} tags added)",
        stats.notes_relocated, stats.tables_relocated, stats.tags_added
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    const ID: &str = "4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9c";

    #[test]
    fn strips_encoded_identifier_references() {
        let ids: BTreeSet<String> = [ID.to_string()].into_iter().collect();
        let text = format!("See [Plan](Plan%20{ID}.md) and ![x](Plan%20{ID}/a.png)\nplain {ID}\n");
        let out = strip_identifier_refs(&text, &ids);
        assert_eq!(out, format!("See [Plan](Plan.md) and ![x](Plan/a.png)\nplain {ID}\n"));
    }

    #[test]
    fn rewrites_note_link_to_wiki_link() {
        assert_eq!(
            rewrite_note_links("[See also](Other%20Note/Other Note.md)"),
            "[[Other Note]]"
        );
    }

    #[test]
    fn rewrite_keeps_surrounding_text() {
        let out = rewrite_note_links("Before [a](A.md) middle [b](dir/B%20C.md) after\n");
        assert_eq!(out, "Before [[A]] middle [[B C]] after\n");
    }

    #[test]
    fn rewrite_ignores_embeds_urls_and_other_files() {
        let text = "![img](Photos/a.png)\n[site](https://example.com/page.md)\n[sheet](Tasks.csv)\n";
        assert_eq!(rewrite_note_links(text), text);
    }

    #[test]
    fn finalize_tags_links_and_flattens() {
        let root = std::env::temp_dir().join(format!(
            "vault_migrate_rewrite_finalize_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("Work Area/Tasks")).unwrap();
        fs::write(root.join("Work Area/Plan.md"), "# Plan\n[Home](../Home.md)\n").unwrap();
        fs::write(root.join("Work Area/Tasks.csv"), "Name\n").unwrap();
        fs::write(
            root.join("Work Area/Tasks/Row.md"),
            "---\nstatus: Done\ntag: \"WorkArea/Tasks\"\n---\n",
        )
        .unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        ctx.record_file(&root.join("Work Area/Plan.md"), EntryKind::Note);
        ctx.record_file(&root.join("Work Area/Tasks/Row.md"), EntryKind::Note);
        ctx.record_file(&root.join("Work Area/Tasks.csv"), EntryKind::TabularExport);

        let stats = finalize_pass(&vault, &ctx).expect("finalize");

        assert_eq!(stats.notes_relocated, 2);
        assert_eq!(stats.tables_relocated, 1);
        assert_eq!(stats.tags_added, 1);
        assert_eq!(
            fs::read_to_string(root.join("Plan.md")).unwrap(),
            "---\ntag: \"WorkArea/Plan\"\n---\n# Plan\n[[Home]]\n"
        );
        assert!(fs::read_to_string(root.join("Row.md"))
            .unwrap()
            .starts_with("---\nstatus: Done"));
        assert!(root.join("attachments/Tasks.csv").is_file());
        assert!(!root.join("Work Area/Plan.md").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn finalize_refuses_to_overwrite_root_note() {
        let root: PathBuf = std::env::temp_dir().join(format!(
            "vault_migrate_rewrite_collision_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("A")).unwrap();
        fs::write(root.join("Same.md"), "root").unwrap();
        fs::write(root.join("A/Same.md"), "nested").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        ctx.record_file(&root.join("A/Same.md"), EntryKind::Note);
        ctx.record_file(&root.join("Same.md"), EntryKind::Note);

        let err = finalize_pass(&vault, &ctx).expect_err("collision");
        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::RelocationCollision { .. })
        ));
        // the clash is found before any note is rewritten or moved
        assert_eq!(fs::read_to_string(root.join("A/Same.md")).unwrap(), "nested");
        assert_eq!(fs::read_to_string(root.join("Same.md")).unwrap(), "root");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn plan_rejects_two_nested_notes_with_one_name() {
        let root = std::env::temp_dir().join(format!(
            "vault_migrate_rewrite_plan_dupes_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("Work")).unwrap();
        fs::create_dir_all(root.join("Home")).unwrap();
        fs::write(root.join("Work/Untitled.md"), "work").unwrap();
        fs::write(root.join("Home/Untitled.md"), "home").unwrap();
        fs::write(root.join("Work/Plan.md"), "plan").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        ctx.record_file(&root.join("Work/Untitled.md"), EntryKind::Note);
        ctx.record_file(&root.join("Home/Untitled.md"), EntryKind::Note);
        ctx.record_file(&root.join("Work/Plan.md"), EntryKind::Note);

        let err = plan_note_relocations(&vault, &ctx).expect_err("duplicate names");
        match err.downcast_ref::<MigrateError>() {
            Some(MigrateError::RelocationCollision { to, .. }) => {
                assert_eq!(to, &root.join("Untitled.md"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(finalize_pass(&vault, &ctx).is_err());
        assert!(root.join("Work/Plan.md").is_file());
        assert!(!root.join("Plan.md").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn same_named_table_exports_are_disambiguated() {
        let root = std::env::temp_dir().join(format!(
            "vault_migrate_rewrite_table_dupes_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("Home")).unwrap();
        fs::create_dir_all(root.join("Work")).unwrap();
        fs::write(root.join("Home/Tasks.csv"), "Home\n").unwrap();
        fs::write(root.join("Work/Tasks.csv"), "Work\n").unwrap();

        let vault = Vault::open(&root, "attachments").unwrap();
        let mut ctx = MigrationContext::new();
        ctx.record_file(&root.join("Home/Tasks.csv"), EntryKind::TabularExport);
        ctx.record_file(&root.join("Work/Tasks.csv"), EntryKind::TabularExport);

        let stats = finalize_pass(&vault, &ctx).expect("finalize");

        assert_eq!(stats.tables_relocated, 2);
        assert_eq!(
            fs::read_to_string(root.join("attachments/Tasks.csv")).unwrap(),
            "Home\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("attachments/Tasks (1).csv")).unwrap(),
            "Work\n"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn parenthesised_targets_are_matched_whole() {
        assert_eq!(
            rewrite_note_links("see [x](Meeting%20(draft).md) and [y](Trip%20(Rome)/Day%201.md)\n"),
            "see [[Meeting (draft)]] and [[Day 1]]\n"
        );
        let caps = LINK_RE
            .captures("![](Trip%20(Rome)/img.png) (after)")
            .expect("embed matches");
        assert_eq!(&caps[3], "Trip%20(Rome)/img.png");
    }
}
