//! CLI `stats` command — submission counts in the terminal.

use anyhow::Result;

use crate::config::IntakeConfig;

/// Display submission statistics in the terminal.
pub fn stats(config: &IntakeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let response = crate::submission::store::submission_stats(&conn, Some(&db_path))?;

    println!("Submission Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total submissions:   {}", response.total_submissions);
    println!("  Unique:              {}", response.unique_applications);
    println!("  Potential duplicates:{}", response.potential_duplicates);
    println!("  Errored:             {}", response.errored);
    println!();

    println!("Database size:         {} bytes", response.db_size_bytes);

    if let Some(ref oldest) = response.oldest_submission {
        println!("Oldest submission:     {oldest}");
    }
    if let Some(ref newest) = response.newest_submission {
        println!("Newest submission:     {newest}");
    }

    Ok(())
}
