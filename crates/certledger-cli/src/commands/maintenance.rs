//! Recovery, retention and status commands

use anyhow::{Context, Result};
use certledger::prelude::*;
use chrono::Utc;
use std::io::{self, Write};

pub fn recover(db: &CertLedger) -> Result<()> {
    let path = db.audit().fallback().path().to_path_buf();
    tracing::info!("Recovering fallback entries from {}", path.display());

    let report = db
        .recovery()
        .recover_failed_entries()
        .context("Failed to recover fallback entries")?;

    if report.recovered == 0 && report.failed == 0 {
        println!("No fallback entries to recover");
        return Ok(());
    }

    println!("✓ Recovered {} entr(ies)", report.recovered);
    if let Some(archived) = &report.archived_to {
        println!("  Archived fallback file to {}", archived.display());
    }
    if report.failed > 0 {
        println!(
            "⚠️  {} entr(ies) could not be recovered and remain in {}",
            report.failed,
            path.display()
        );
    }
    if report.lost > 0 {
        println!(
            "❌ {} entr(ies) could not be re-queued; see the error log and {}",
            report.lost,
            report
                .archived_to
                .as_deref()
                .unwrap_or(path.as_path())
                .display()
        );
    }
    Ok(())
}

pub fn cleanup(db: &CertLedger, days: Option<u32>, yes: bool) -> Result<()> {
    let cleaner = match days {
        Some(days) => RetentionCleaner::new(db.store().clone(), days),
        None => db.retention().clone(),
    };
    let now = Utc::now();
    let cutoff = cleaner.cutoff(now);

    if !yes {
        print!(
            "⚠️  WARNING: This permanently deletes ledger entries older than {}.\nContinue? [y/N] ",
            certledger::format_timestamp(&cutoff)
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cleanup cancelled");
            return Ok(());
        }
    }

    let deleted = cleaner
        .purge_expired(now)
        .context("Failed to delete expired ledger entries")?;
    println!(
        "✓ Deleted {} entr(ies) older than {} day(s)",
        deleted,
        cleaner.retention_days()
    );
    Ok(())
}

pub fn status(db: &CertLedger) -> Result<()> {
    let status = db.status().context("Failed to read ledger status")?;

    println!("\nLedger Status");
    println!("{}", "=".repeat(60));
    println!("Store: {}", status.store_path.display());
    println!("Schema Version: {}", status.schema_version);
    println!("Batches: {}", status.batches);
    println!("Retention: {} day(s)", status.retention_days);

    println!("\nAudit Fallback:");
    println!("  Path: {}", status.fallback_path.display());
    if status.pending_fallback_entries > 0 {
        println!(
            "\n⚠️  {} audit entr(ies) waiting in the fallback file",
            status.pending_fallback_entries
        );
        println!("Run 'certledger recover' to replay them");
    } else {
        println!("\n✓ Audit trail is complete");
    }

    Ok(())
}
