pub mod attachments;
pub mod context;
pub mod entry;
pub mod error;
pub mod frontmatter;
pub mod identifier;
pub mod migrate;
pub mod paths;
pub mod rewrite;
pub mod settings;
pub mod table;
pub mod tag;
pub mod vault;
pub mod walk;

pub use error::MigrateError;
pub use migrate::{Migration, MigrationReport};
pub use settings::MigrateSettings;
pub use vault::Vault;
