use anyhow::{Context as _, Result};
use log::info;

use crate::attachments::{consolidate_all, ConsolidationStats};
use crate::context::MigrationContext;
use crate::rewrite::{
    finalize_pass, plan_note_relocations, strip_identifier_pass, RelocationStats,
};
use crate::table::convert_table;
use crate::vault::{Vault, VaultScan};
use crate::walk::TreeWalker;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub identifiers: usize,
    pub notes: usize,
    pub tables: usize,
    pub rows_converted: usize,
    pub notes_stripped: usize,
    pub attachments: ConsolidationStats,
    pub relocation: RelocationStats,
    pub pruned_dirs: usize,
    pub scan: VaultScan,
}

/// One migration run over a vault. Stages run strictly in order, each on
/// the settled output of the previous one; the first error aborts the run.
pub struct Migration {
    vault: Vault,
    ctx: MigrationContext,
}

impl Migration {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            ctx: MigrationContext::new(),
        }
    }

    pub fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    pub fn run(&mut self) -> Result<MigrationReport> {
        let root = self.vault.root().display().to_string();
        info!("migrating {root}");

        TreeWalker::new(&self.vault)
            .walk(&mut self.ctx)
            .context("rename pass failed")?;
        info!(
            "walk done: {} identifiers, {} notes, {} tables, {} attachment folders",
            self.ctx.identifiers.len(),
            self.ctx.notes.len(),
            self.ctx.tables.len(),
            self.ctx.attachment_dirs.len()
        );

        plan_note_relocations(&self.vault, &self.ctx).context("note relocation check failed")?;

        let notes_stripped = strip_identifier_pass(&self.vault, &self.ctx)
            .context("identifier stripping pass failed")?;

        let mut rows_converted = 0usize;
        for table in &self.ctx.tables {
            rows_converted += convert_table(&self.vault, table)
                .with_context(|| format!("convert table {}", table.display()))?;
        }

        let attachments =
            consolidate_all(&self.vault, &self.ctx).context("attachment consolidation failed")?;
        let relocation = finalize_pass(&self.vault, &self.ctx).context("note relocation failed")?;
        let pruned_dirs = self.vault.prune_empty_dirs()?;
        let scan = self.vault.scan()?;

        info!(
            "finished {root}: {} notes at root, {} attachments",
            scan.root_notes.len(),
            scan.attachments.len()
        );

        Ok(MigrationReport {
            identifiers: self.ctx.identifiers.len(),
            notes: self.ctx.notes.len(),
            tables: self.ctx.tables.len(),
            rows_converted,
            notes_stripped,
            attachments,
            relocation,
            pruned_dirs,
            scan,
        })
    }
}
