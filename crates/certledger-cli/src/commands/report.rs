//! Read-only report commands

use anyhow::{anyhow, Context, Result};
use certledger::prelude::*;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Args)]
pub struct LogArgs {
    /// Only entries for this batch
    #[arg(long)]
    batch: Option<String>,

    /// CREATE, MIGRATE, PRINT or BULK_DELETE
    #[arg(long)]
    action: Option<ActionKind>,

    /// Inclusive lower bound (RFC 3339)
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Exclusive upper bound (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    /// Substring of the description, actor or batch id
    #[arg(long)]
    search: Option<String>,

    /// Only entries touching a branch in this region
    #[arg(long)]
    region: Option<String>,

    #[arg(long, default_value_t = 50)]
    limit: usize,

    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Print one JSON object per line
    #[arg(long)]
    json: bool,
}

impl LogArgs {
    fn filter(&self) -> LogFilter {
        let mut filter = LogFilter::new()
            .between(self.from, self.to)
            .page(self.limit, self.offset);
        if let Some(batch) = &self.batch {
            filter = filter.batch(batch);
        }
        if let Some(action) = self.action {
            filter = filter.action(action);
        }
        if let Some(text) = &self.search {
            filter = filter.search(text);
        }
        if let Some(region) = &self.region {
            filter = filter.region(region);
        }
        filter
    }
}

pub fn summary(db: &CertLedger) -> Result<()> {
    let rows = db
        .reporting()
        .summary_by_branch()
        .context("Failed to load branch summary")?;

    println!("\nStock by Branch");
    println!("{:<10} {:>14} {:>10} {:>8}", "Branch", "Certificates", "Medals", "Batches");
    println!("{}", "=".repeat(45));
    for row in &rows {
        println!(
            "{:<10} {:>14} {:>10} {:>8}",
            row.branch, row.total.certificates, row.total.medals, row.batch_count
        );
    }
    println!("\nTotal: {} branch(es)", rows.len());
    Ok(())
}

pub fn cumulative(db: &CertLedger) -> Result<()> {
    let rows = db
        .reporting()
        .cumulative_totals()
        .context("Failed to load cumulative totals")?;

    println!("\nCumulative Totals");
    println!(
        "{:<20} {:<27} {:>10} {:>8} {:>12} {:>10}",
        "Batch", "Created", "Certs", "Medals", "Cum. Certs", "Cum. Medals"
    );
    println!("{}", "=".repeat(92));
    for row in rows {
        println!(
            "{:<20} {:<27} {:>10} {:>8} {:>12} {:>10}",
            row.batch_id,
            certledger::format_timestamp(&row.created_at),
            row.total.certificates,
            row.total.medals,
            row.cumulative.certificates,
            row.cumulative.medals
        );
    }
    Ok(())
}

pub fn stock(db: &CertLedger, batch_id: &str) -> Result<()> {
    let rows = db
        .reporting()
        .batch_stock(batch_id)
        .with_context(|| format!("Failed to load stock of {batch_id}"))?;

    println!("\nStock of {batch_id}");
    println!("{:<10} {:>14} {:>10}", "Branch", "Certificates", "Medals");
    println!("{}", "=".repeat(36));
    for row in &rows {
        println!(
            "{:<10} {:>14} {:>10}",
            row.branch, row.amount.certificates, row.amount.medals
        );
    }
    let total = StockAmount::checked_sum(rows.iter().map(|r| r.amount))
        .ok_or_else(|| anyhow!("stock total of {batch_id} overflows"))?;
    println!("\nTotal: {total}");
    Ok(())
}

pub fn logs(db: &CertLedger, args: LogArgs) -> Result<()> {
    let filter = args.filter();
    let records = db
        .reporting()
        .query_logs(&filter)
        .context("Failed to query ledger log")?;

    if args.json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    let total = db
        .reporting()
        .count_logs(&filter)
        .context("Failed to count ledger entries")?;

    for record in &records {
        let entry = &record.entry;
        println!(
            "#{:<6} {} {:<11} {:<16} {:>6} {:>5}  {} ({})",
            record.id,
            certledger::format_timestamp(&entry.timestamp),
            entry.action,
            entry.batch_id,
            entry.certificate_delta,
            entry.medal_delta,
            entry.description,
            entry.actor
        );
    }
    println!(
        "\nShowing {} of {} entr(ies) from offset {}",
        records.len(),
        total,
        filter.offset
    );
    Ok(())
}
