use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;
use vault_migrate_core::settings::{
    load_settings_from_path, save_settings_to_path, DEFAULT_SETTINGS_FILE,
};
use vault_migrate_core::{MigrateSettings, Migration, MigrationReport, Vault};

/// Flatten an exported workspace into a wiki-linked note vault, in place.
#[derive(Parser, Debug)]
#[command(name = "vault-migrate")]
#[command(version)]
struct Cli {
    /// Root of the exported workspace (overrides the settings file)
    #[arg(short, long, env = "VAULT_MIGRATE_ROOT")]
    root: Option<PathBuf>,

    /// Name of the shared attachments folder created under the root
    #[arg(short, long)]
    attachments: Option<String>,

    /// Settings file (JSON)
    #[arg(short = 'C', long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Save the effective settings back to the settings file
    #[arg(long)]
    write_config: bool,

    /// Debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overlay(&self) -> MigrateSettings {
        MigrateSettings {
            root_location: self.root.clone(),
            attachments_folder_name: self.attachments.clone().unwrap_or_default(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let file_settings = load_settings_from_path(&cli.config)?;
    let settings = file_settings.merge_overlay(&cli.overlay());
    if cli.write_config {
        save_settings_to_path(&cli.config, &settings)?;
        log::info!("saved settings to {}", cli.config.display());
    }

    let root = settings.require_root()?;
    let vault = Vault::open(root, &settings.attachments_folder_name)
        .with_context(|| format!("open vault: {}", root.display()))?;

    let report = Migration::new(vault).run()?;
    print_summary(&report);
    Ok(())
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn print_summary(report: &MigrationReport) {
    println!("identifiers stripped : {}", report.identifiers);
    println!("notes                : {}", report.notes);
    println!(
        "tables               : {} ({} rows converted)",
        report.tables, report.rows_converted
    );
    println!(
        "attachments moved    : {} from {} folders ({} links rewritten)",
        report.attachments.files_moved,
        report.attachments.folders,
        report.attachments.embeds_rewritten
    );
    println!(
        "notes relocated      : {} ({} tags added)",
        report.relocation.notes_relocated, report.relocation.tags_added
    );
    println!("empty dirs removed   : {}", report.pruned_dirs);
    if !report.scan.nested_notes.is_empty() {
        println!("notes left below root:");
        for note in &report.scan.nested_notes {
            println!("  {note}");
        }
    }
}
