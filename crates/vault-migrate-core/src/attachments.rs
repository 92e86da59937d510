use anyhow::{Context as _, Result};
use log::{debug, info, warn};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::context::MigrationContext;
use crate::entry::{is_hidden, EntryKind, NOTE_EXTENSION};
use crate::error::MigrateError;
use crate::paths::{encode_link_key, has_url_scheme, normalize_link_target, rel_posix_path};
use crate::rewrite::LINK_RE;
use crate::vault::Vault;

static GENERIC_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^untitled(\s*\d+)?$").expect("valid generic name regex"));

/// Old link key (`Photos/img%201.png`) -> new vault-relative path
/// (`attachments/img 1.png`), for one attachment folder.
pub type AttachmentRelocationMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub folders: usize,
    pub files_moved: usize,
    pub embeds_rewritten: usize,
}

pub fn is_generic_name(stem: &str) -> bool {
    GENERIC_NAME_RE.is_match(stem.trim())
}

/// Move every recorded attachment into the shared folder and point the
/// companion notes' embeds at the new locations.
pub fn consolidate_all(vault: &Vault, ctx: &MigrationContext) -> Result<ConsolidationStats> {
    let mut stats = ConsolidationStats::default();
    if ctx.attachment_dirs.is_empty() {
        return Ok(stats);
    }
    let attachments_dir = vault.ensure_attachments_dir()?;

    for folder in &ctx.attachment_dirs {
        if !folder.is_dir() {
            warn!("attachment folder vanished, skipping {}", folder.display());
            continue;
        }
        let (moved, rewritten) = consolidate_folder(vault, &attachments_dir, folder)
            .with_context(|| format!("consolidate attachments of {}", folder.display()))?;
        stats.folders += 1;
        stats.files_moved += moved;
        stats.embeds_rewritten += rewritten;
    }

    info!(
        "moved {} attachments from {} folders, rewrote {} embeds",
        stats.files_moved, stats.folders, stats.embeds_rewritten
    );
    Ok(stats)
}

/// Returns `(files moved, links rewritten in the companion note)`.
pub fn consolidate_folder(
    vault: &Vault,
    attachments_dir: &Path,
    folder: &Path,
) -> Result<(usize, usize)> {
    let folder_name = folder
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("attachment folder name is not UTF-8: {}", folder.display()))?
        .to_string();
    let at_root = folder == vault.root();
    let link_base = if at_root {
        vault.root()
    } else {
        folder
            .parent()
            .with_context(|| format!("attachment folder has no parent: {}", folder.display()))?
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for dent in fs::read_dir(folder).with_context(|| format!("read dir: {}", folder.display()))? {
        let dent = dent.with_context(|| format!("read dir: {}", folder.display()))?;
        let path = dent.path();
        if !dent.file_type().is_ok_and(|t| t.is_file()) || is_hidden(&path) {
            continue;
        }
        match EntryKind::classify(&path) {
            EntryKind::Attachment => files.push(path),
            EntryKind::Note | EntryKind::TabularExport => {}
        }
    }
    files.sort();

    let mut map = AttachmentRelocationMap::new();
    let mut generic_index = 0usize;
    for file in &files {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let new_name = if is_generic_name(&stem) {
            let name = format!("{folder_name} - {generic_index}{extension}");
            generic_index += 1;
            name
        } else {
            file_name
        };

        let dest = unique_destination(attachments_dir, &new_name);
        let old_key = encode_link_key(&rel_posix_path(file, link_base)?);
        vault.move_file(file, &dest)?;
        let new_rel = rel_posix_path(&dest, vault.root())?;
        debug!("attachment {old_key} -> {new_rel}");
        map.insert(old_key, new_rel);
    }

    if at_root {
        warn!("attachments found directly in the vault root; no companion note to rewrite");
        return Ok((files.len(), 0));
    }

    let companion = match find_companion_note(link_base, &folder_name)? {
        Some(companion) => companion,
        None => {
            return Err(MigrateError::MissingCompanion {
                source_path: folder.to_path_buf(),
                expected: link_base.join(format!("{folder_name}.{NOTE_EXTENSION}")),
            }
            .into())
        }
    };

    let text = vault.read_text(&companion)?;
    let (rewritten, count) = rewrite_embeds(&text, &map, &companion)?;
    if count > 0 {
        vault.write_text(&companion, &rewritten)?;
    }
    Ok((files.len(), count))
}

/// Replace `![alt](old)` with `![[new]]` via `map`. Plain links that point
/// at a relocated file become `[[new]]`. An embed without a mapping is an
/// error; external URLs are left alone.
pub fn rewrite_embeds(
    text: &str,
    map: &AttachmentRelocationMap,
    note: &Path,
) -> Result<(String, usize)> {
    let mut unresolved: Option<String> = None;
    let mut count = 0usize;

    let out = LINK_RE.replace_all(text, |caps: &Captures| {
        let whole = caps[0].to_string();
        let target = caps[3].trim();
        if has_url_scheme(target) {
            return whole;
        }
        let is_embed = !caps[1].is_empty();
        match map.get(&normalize_link_target(target)) {
            Some(new_path) => {
                count += 1;
                if is_embed {
                    format!("![[{new_path}]]")
                } else {
                    format!("[[{new_path}]]")
                }
            }
            None => {
                if is_embed && unresolved.is_none() {
                    unresolved = Some(target.to_string());
                }
                whole
            }
        }
    });
    let out = out.into_owned();

    if let Some(target) = unresolved {
        return Err(MigrateError::UnresolvedEmbed {
            note: note.to_path_buf(),
            target,
        }
        .into());
    }
    Ok((out, count))
}

/// The note in `dir` named `stem` with any casing of the note extension.
fn find_companion_note(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let exact = dir.join(format!("{stem}.{NOTE_EXTENSION}"));
    if exact.is_file() {
        return Ok(Some(exact));
    }

    for dent in fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))? {
        let dent = dent.with_context(|| format!("read dir: {}", dir.display()))?;
        let path = dent.path();
        if !dent.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        if EntryKind::classify(&path) == EntryKind::Note
            && path.file_stem().is_some_and(|s| s.to_string_lossy() == stem)
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// `name`, or `stem (n).ext` for the first free `n` in `dir`.
pub(crate) fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1usize;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){extension}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
