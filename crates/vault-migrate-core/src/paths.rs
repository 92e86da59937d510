use anyhow::{anyhow, Result};
use std::path::Path;

use crate::error::MigrateError;

const ENCODED_SPACE: &str = "%20";

pub fn to_posix_path(path: &Path) -> Result<String> {
  let s = path
    .to_str()
    .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))?;
  Ok(s.replace('\\', "/"))
}

/// `path` relative to `base`, forward-slash separated.
pub fn rel_posix_path(path: &Path, base: &Path) -> Result<String> {
  let rel = path
    .strip_prefix(base)
    .map_err(|_| anyhow!("{} is not inside {}", path.display(), base.display()))?;
  to_posix_path(rel)
}

/// Encode a relative posix path the way exported links spell it.
pub fn encode_link_key(rel_posix: &str) -> String {
  rel_posix.replace(' ', ENCODED_SPACE)
}

/// Bring a link target into link-key form: fully percent-decoded, then with
/// only spaces re-encoded.
pub fn normalize_link_target(target: &str) -> String {
  let target = target.trim().replace('\\', "/");
  let decoded = urlencoding::decode(&target)
    .map(|s| s.into_owned())
    .unwrap_or(target);
  encode_link_key(&decoded)
}

pub fn decode_link_segment(segment: &str) -> String {
  urlencoding::decode(segment)
    .map(|s| s.into_owned())
    .unwrap_or_else(|_| segment.to_string())
}

/// `scheme://...` style targets point outside the vault.
pub fn has_url_scheme(target: &str) -> bool {
  match target.split_once("://") {
    Some((scheme, _)) => {
      !scheme.is_empty()
        && scheme
          .chars()
          .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    }
    None => target.starts_with("mailto:") || target.starts_with("data:"),
  }
}

/// The attachments folder lives directly under the root: one plain segment.
pub fn validate_folder_name(name: &str) -> Result<()> {
  let trimmed = name.trim();
  if trimmed.is_empty()
    || trimmed != name
    || trimmed == "."
    || trimmed == ".."
    || trimmed.contains('/')
    || trimmed.contains('\\')
  {
    return Err(MigrateError::InvalidAttachmentsFolder {
      name: name.to_string(),
    }
    .into());
  }
  Ok(())
}
