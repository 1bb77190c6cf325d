//! CLI `reset` command — delete all submissions after user confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use crate::config::IntakeConfig;
use crate::storage::FileStorage;

/// Delete all submission records and stored photos after user confirmation.
pub fn reset(config: &IntakeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let upload_dir = config.resolved_upload_dir();

    println!("WARNING: This will permanently delete ALL submissions and uploaded photos.");
    println!("Database: {}", db_path.display());
    println!("Uploads:  {}", upload_dir.display());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let conn = crate::db::open_database(&db_path)?;
    let records = crate::submission::store::delete_all(&conn)?;

    let storage = FileStorage::new(&upload_dir)?;
    let files = storage.purge()?;

    println!("Cleared {records} submissions and {files} stored photos. Reset complete.");
    Ok(())
}
