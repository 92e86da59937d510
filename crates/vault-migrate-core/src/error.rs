use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a migration run.
///
/// These travel inside `anyhow::Error` with the surrounding context chain;
/// callers that need the kind use `err.downcast_ref::<MigrateError>()`.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("vault root is not a usable directory: {path}")]
    InvalidVault { path: PathBuf },

    #[error("invalid attachments folder name: {name:?}")]
    InvalidAttachmentsFolder { name: String },

    /// Renaming an entry would replace an existing one.
    #[error("rename target already exists: {from} -> {to}")]
    RenameCollision { from: PathBuf, to: PathBuf },

    /// Moving a note or export into place would replace an existing file.
    #[error("relocation target already exists: {from} -> {to}")]
    RelocationCollision { from: PathBuf, to: PathBuf },

    /// An image embed points at a file that was not consolidated.
    #[error("unresolved embed `{target}` in {note}")]
    UnresolvedEmbed { note: PathBuf, target: String },

    /// A row file carries none of its table's headers.
    #[error("no table header found in row file {file} (headers: {headers:?})")]
    MissingHeaders { file: PathBuf, headers: Vec<String> },

    #[error("table export has no header row: {file}")]
    EmptyTable { file: PathBuf },

    /// The note or folder paired with an export or attachment folder is absent.
    #[error("missing companion {expected} for {source_path}")]
    MissingCompanion {
        source_path: PathBuf,
        expected: PathBuf,
    },
}
