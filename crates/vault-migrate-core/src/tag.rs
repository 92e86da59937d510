use anyhow::{anyhow, Result};
use std::path::Path;

use crate::entry::EntryKind;
use crate::paths::to_posix_path;

/// Hierarchical tag for `path`: its location under `root`, `/`-nested, with
/// spaces removed. Note and table extensions are dropped.
pub fn derive_tag(path: &Path, root: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        anyhow!(
            "cannot derive tag: {} is not inside {}",
            path.display(),
            root.display()
        )
    })?;

    let rel = match EntryKind::classify(rel) {
        EntryKind::Note | EntryKind::TabularExport => rel.with_extension(""),
        EntryKind::Attachment => rel.to_path_buf(),
    };

    Ok(to_posix_path(&rel)?.replace(' ', ""))
}

pub fn tag_field(tag: &str) -> String {
    format!("tag: \"{tag}\"")
}
