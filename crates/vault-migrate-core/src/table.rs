use anyhow::{Context as _, Result};
use log::{debug, info};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::entry::EntryKind;
use crate::error::MigrateError;
use crate::frontmatter::{detect_line_ending, BLOCK_DELIMITER};
use crate::tag::{derive_tag, tag_field};
use crate::vault::Vault;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}/\d{1,2}/\d{1,2}").expect("valid date regex"));

/// Header row of a table export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    headers: Vec<String>,
}

impl TableSchema {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers }
    }

    /// Parse the first CSV record of `text`; a leading BOM is ignored.
    pub fn parse(text: &str, source: &Path) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let record = match reader.records().next() {
            Some(record) => {
                record.with_context(|| format!("parse header row: {}", source.display()))?
            }
            None => {
                return Err(MigrateError::EmptyTable {
                    file: source.to_path_buf(),
                }
                .into())
            }
        };

        let headers: Vec<String> = record
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if headers.is_empty() {
            return Err(MigrateError::EmptyTable {
                file: source.to_path_buf(),
            }
            .into());
        }
        Ok(Self { headers })
    }

    pub fn read(vault: &Vault, path: &Path) -> Result<Self> {
        let text = vault.read_text(path)?;
        Self::parse(&text, path)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Longest first, so `Due Date` claims its line before `Date` can.
    fn match_order(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        headers.sort_by(|a, b| b.len().cmp(&a.len()));
        headers
    }
}

/// `Due Date` -> `due-date`
pub fn normalize_key(header: &str) -> String {
    header.to_lowercase().replace(' ', "-")
}

/// `2024/3/5` -> `2024-3-5`, anywhere in the line.
pub fn normalize_dates(line: &str) -> String {
    DATE_RE
        .replace_all(line, |caps: &regex::Captures| caps[0].replace('/', "-"))
        .into_owned()
}

/// Turn the header lines of a row note into a metadata block closed by the
/// tag field. Everything before the first header line is dropped. Returns
/// `None` when no line carries a header.
pub fn convert_row_text(text: &str, schema: &TableSchema, tag: &str) -> Option<String> {
    let headers = schema.match_order();
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    let mut first: Option<usize> = None;
    let mut last: Option<usize> = None;

    for (ix, line) in lines.iter_mut().enumerate() {
        for header in &headers {
            let needle = format!("{header}:");
            if line.contains(&needle) {
                first.get_or_insert(ix);
                last = Some(ix);
                *line = line.replacen(&needle, &format!("{}:", normalize_key(header)), 1);
            }
        }
        *line = normalize_dates(line);
    }

    let (first, last) = (first?, last?);
    let newline = detect_line_ending(text);

    let mut out = String::with_capacity(text.len() + tag.len() + 24);
    out.push_str(BLOCK_DELIMITER);
    out.push_str(newline);
    for line in &lines[first..last] {
        out.push_str(line);
    }
    out.push_str(lines[last].trim_end());
    out.push_str(newline);
    out.push_str(&tag_field(tag));
    out.push_str(newline);
    out.push_str(BLOCK_DELIMITER);
    out.push_str(newline);
    for line in &lines[last + 1..] {
        out.push_str(line);
    }
    Some(out)
}

/// Convert every row note in the folder paired with `table_path`
/// (`Tasks.csv` -> `Tasks/`). Returns the number of rows rewritten.
pub fn convert_table(vault: &Vault, table_path: &Path) -> Result<usize> {
    let schema = TableSchema::read(vault, table_path)?;
    debug!(
        "table {} headers: {:?}",
        table_path.display(),
        schema.headers()
    );

    let folder = table_path.with_extension("");
    if !folder.is_dir() {
        return Err(MigrateError::MissingCompanion {
            source_path: table_path.to_path_buf(),
            expected: folder,
        }
        .into());
    }
    let tag = derive_tag(&folder, vault.root())?;

    let mut rows: Vec<PathBuf> = Vec::new();
    for dent in fs::read_dir(&folder).with_context(|| format!("read dir: {}", folder.display()))? {
        let dent = dent.with_context(|| format!("read dir: {}", folder.display()))?;
        let path = dent.path();
        if !dent.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        match EntryKind::classify(&path) {
            EntryKind::Note => rows.push(path),
            EntryKind::TabularExport | EntryKind::Attachment => {
                debug!("not a row note, skipping {}", path.display());
            }
        }
    }
    rows.sort();

    for row in &rows {
        let text = vault.read_text(row)?;
        let converted =
            convert_row_text(&text, &schema, &tag).ok_or_else(|| MigrateError::MissingHeaders {
                file: row.clone(),
                headers: schema.headers().to_vec(),
            })?;
        vault.write_text(row, &converted)?;
        debug!("converted row {}", row.display());
    }

    info!(
        "converted {} rows of {} (tag {tag})",
        rows.len(),
        table_path.display()
    );
    Ok(rows.len())
}
