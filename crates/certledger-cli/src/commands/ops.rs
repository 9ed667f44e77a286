//! Stock-changing commands

use super::audit_note;
use anyhow::{anyhow, Context, Result};
use certledger::prelude::*;

/// Parse `BRANCH=CERTIFICATES:MEDALS` (medals may be omitted)
pub(crate) fn parse_allocation(raw: &str) -> Result<(String, i64, i64)> {
    let (branch, amounts) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("allocation {raw:?} must look like BRANCH=CERTIFICATES:MEDALS"))?;
    let (certificates, medals) = amounts.split_once(':').unwrap_or((amounts, "0"));

    let certificates = certificates
        .trim()
        .parse()
        .with_context(|| format!("bad certificate count in {raw:?}"))?;
    let medals = medals
        .trim()
        .parse()
        .with_context(|| format!("bad medal count in {raw:?}"))?;
    Ok((branch.trim().to_string(), certificates, medals))
}

pub fn create_batch(
    db: &CertLedger,
    ctx: &OperationContext,
    batch_id: &str,
    allocations: &[String],
) -> Result<()> {
    let mut plan = AllocationPlan::new();
    for raw in allocations {
        let (branch, certificates, medals) = parse_allocation(raw)?;
        plan.insert(&branch, certificates, medals)?;
    }

    let created = db
        .ledger()
        .create_batch(ctx, batch_id, &plan)
        .with_context(|| format!("Failed to create batch {batch_id}"))?;

    println!("✓ Created batch {}", created.batch_id);
    for (branch, amount) in &created.rows {
        println!("  {:<8} {}", branch, amount);
    }
    println!("Total: {}", created.total);
    println!("{}", audit_note(&created.audit));
    Ok(())
}

pub fn migrate(
    db: &CertLedger,
    ctx: &OperationContext,
    batch_id: &str,
    source: &str,
    destination: &str,
    amount: StockAmount,
) -> Result<()> {
    let moved = db
        .ledger()
        .migrate_stock(
            ctx,
            batch_id,
            source,
            destination,
            amount.certificates,
            amount.medals,
        )
        .with_context(|| format!("Failed to migrate stock of {batch_id}"))?;

    println!(
        "✓ Moved {} from {} to {}",
        moved.moved, moved.source, destination
    );
    println!("  {:<8} {} -> {}", moved.source, moved.source_before, moved.source_after);
    if let Some((branch, before, after)) = &moved.destination {
        println!("  {:<8} {} -> {}", branch, before, after);
    }
    println!("{}", audit_note(&moved.audit));
    Ok(())
}

pub fn consume(
    db: &CertLedger,
    ctx: &OperationContext,
    batch_id: &str,
    branch: &str,
    amount: StockAmount,
) -> Result<()> {
    let printed = db
        .ledger()
        .consume_stock(ctx, batch_id, branch, amount.certificates, amount.medals)
        .with_context(|| format!("Failed to consume stock of {batch_id}"))?;

    println!("✓ Consumed {} at {}", printed.moved, printed.source);
    println!("  Remaining: {}", printed.source_after);
    println!("{}", audit_note(&printed.audit));
    Ok(())
}

pub fn clear_all(db: &CertLedger, ctx: &OperationContext, confirm: &str) -> Result<()> {
    let ack = ResetAcknowledgement::confirm(confirm)?;

    let report = db
        .ledger()
        .clear_all_batches(ctx, ack)
        .context("Failed to clear batches")?;

    println!(
        "✓ Deleted {} batch(es) and {} stock row(s)",
        report.batches_deleted, report.stock_rows_deleted
    );
    println!("Destroyed: {}", report.total);
    println!("{}", audit_note(&report.audit));
    Ok(())
}
