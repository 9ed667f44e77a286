//! Ledger operation semantics against an isolated on-disk store.

use certledger::prelude::*;
use certledger::{ErrorKind, LedgerError, MAX_AMOUNT};
use tempfile::TempDir;

fn setup() -> (TempDir, CertLedger, OperationContext) {
    let dir = TempDir::new().unwrap();
    let db = CertLedger::open(dir.path()).unwrap();
    let ctx = OperationContext::new("registrar").unwrap();
    (dir, db, ctx)
}

fn stock_of(db: &CertLedger, batch: &str, branch: &str) -> Option<StockAmount> {
    db.store()
        .stock(batch, branch)
        .unwrap()
        .map(|row| row.amount)
}

fn batch_total(db: &CertLedger, batch: &str) -> StockAmount {
    let rows = db.store().batch_stock(batch).unwrap();
    StockAmount::checked_sum(rows.into_iter().map(|row| row.amount)).unwrap()
}

fn create_standard(db: &CertLedger, ctx: &OperationContext) {
    let plan = AllocationPlan::new()
        .with("SND", 50, 5)
        .and_then(|p| p.with("MKW", 20, 0))
        .unwrap();
    db.ledger().create_batch(ctx, "BATCH-X", &plan).unwrap();
}

#[test]
fn test_create_batch_writes_funded_rows_and_one_entry() {
    let (_dir, db, ctx) = setup();
    let plan = AllocationPlan::new()
        .with("snd", 10, 2)
        .and_then(|p| p.with("MKW", 0, 0))
        .and_then(|p| p.with("BKK", 0, 3))
        .unwrap();

    let created = db.ledger().create_batch(&ctx, "BATCH-007", &plan).unwrap();
    assert_eq!(created.total, StockAmount::new(10, 5));
    assert_eq!(created.rows.len(), 2);
    assert!(created.audit.is_recorded());

    assert_eq!(stock_of(&db, "BATCH-007", "SND"), Some(StockAmount::new(10, 2)));
    assert_eq!(stock_of(&db, "BATCH-007", "BKK"), Some(StockAmount::new(0, 3)));
    assert_eq!(stock_of(&db, "BATCH-007", "MKW"), None, "zero allocations get no row");

    let logs = db.reporting().query_logs(&LogFilter::new()).unwrap();
    assert_eq!(logs.len(), 1);
    let entry = &logs[0].entry;
    assert_eq!(entry.action, ActionKind::Create);
    assert_eq!(entry.actor, "registrar");
    assert_eq!((entry.certificate_delta, entry.medal_delta), (10, 5));
    assert!(entry.description.contains("SND"));
    assert!(entry.description.contains("BKK"));
    assert_eq!(entry.new_values["SND"]["certificates"], 10);
}

#[test]
fn test_create_all_zero_is_validation_error() {
    let (_dir, db, ctx) = setup();
    let plan = AllocationPlan::new().with("SND", 0, 0).unwrap();

    let err = db.ledger().create_batch(&ctx, "BATCH-X", &plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(db.store().list_batches().unwrap().is_empty());
    assert!(db.store().all_stock().unwrap().is_empty());
    assert_eq!(db.reporting().count_logs(&LogFilter::new()).unwrap(), 0);
}

#[test]
fn test_create_rejects_bad_ids_and_json_amounts() {
    let (_dir, db, ctx) = setup();
    let plan = AllocationPlan::new().with("SND", 1, 0).unwrap();

    for bad in ["AB", "BATCH 1", "BATCH/1", &"X".repeat(51)] {
        let err = db.ledger().create_batch(&ctx, bad, &plan).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError, "{bad}");
    }

    let negative = serde_json::json!({"SND": {"certificates": -1, "medals": 0}});
    assert!(AllocationPlan::from_json(&negative).is_err());
    let fractional = serde_json::json!({"SND": {"certificates": 2.5}});
    assert!(AllocationPlan::from_json(&fractional).is_err());
}

#[test]
fn test_duplicate_batch() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);

    let plan = AllocationPlan::new().with("SND", 1, 0).unwrap();
    let err = db.ledger().create_batch(&ctx, "BATCH-X", &plan).unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateEntry(_)));
    assert_eq!(stock_of(&db, "BATCH-X", "SND"), Some(StockAmount::new(50, 5)));
    assert_eq!(db.reporting().count_logs(&LogFilter::new()).unwrap(), 1);
}

#[test]
fn test_migrate_exact_balance_then_overdraw() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);

    let moved = db
        .ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 50, 0)
        .unwrap();
    assert_eq!(moved.source_before, StockAmount::new(50, 5));
    assert_eq!(moved.source_after, StockAmount::new(0, 5));
    let (dest, dest_before, dest_after) = moved.destination.clone().unwrap();
    assert_eq!(dest.as_str(), "MKW");
    assert_eq!(dest_before, StockAmount::new(20, 0));
    assert_eq!(dest_after, StockAmount::new(70, 0));
    assert_eq!(stock_of(&db, "BATCH-X", "SND"), Some(StockAmount::new(0, 5)));

    let before = db.store().batch_stock("BATCH-X").unwrap();
    let logs_before = db.reporting().count_logs(&LogFilter::new()).unwrap();

    let err = db
        .ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 1, 0)
        .unwrap_err();
    match &err {
        LedgerError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(*available, StockAmount::new(0, 5));
            assert_eq!(*requested, StockAmount::new(1, 0));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(db.store().batch_stock("BATCH-X").unwrap(), before);
    assert_eq!(
        db.reporting().count_logs(&LogFilter::new()).unwrap(),
        logs_before,
        "rejected operations write no audit entry"
    );
}

#[test]
fn test_migrate_51_of_50_changes_nothing() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let before = db.store().batch_stock("BATCH-X").unwrap();

    let err = db
        .ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 51, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert!(err.to_string().contains("Available: 50 certificates / 5 medals"));
    assert!(err.to_string().contains("Requested: 51 certificates / 0 medals"));

    assert_eq!(db.store().batch_stock("BATCH-X").unwrap(), before);
}

#[test]
fn test_migrate_preserves_batch_totals() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let total = batch_total(&db, "BATCH-X");

    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "BKK", 12, 3)
        .unwrap();
    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "BKK", "MKW", 2, 1)
        .unwrap();
    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "MKW", "SND", 7, 0)
        .unwrap();

    assert_eq!(batch_total(&db, "BATCH-X"), total);
    assert_eq!(stock_of(&db, "BATCH-X", "BKK"), Some(StockAmount::new(10, 2)));
}

#[test]
fn test_migrate_entry_snapshots_both_branches() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 10, 1)
        .unwrap();

    let logs = db
        .reporting()
        .query_logs(&LogFilter::new().action(ActionKind::Migrate))
        .unwrap();
    assert_eq!(logs.len(), 1);
    let entry = &logs[0].entry;
    assert_eq!(entry.source_branch.as_deref(), Some("SND"));
    assert_eq!(entry.dest_branch.as_deref(), Some("MKW"));
    assert_eq!((entry.certificate_delta, entry.medal_delta), (10, 1));
    assert_eq!(entry.old_values["SND"]["certificates"], 50);
    assert_eq!(entry.new_values["SND"]["certificates"], 40);
    assert_eq!(entry.old_values["MKW"]["certificates"], 20);
    assert_eq!(entry.new_values["MKW"]["medals"], 1);
}

#[test]
fn test_migrate_validation_and_not_found() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let ledger = db.ledger();

    let zero = ledger.migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 0, 0);
    assert_eq!(zero.unwrap_err().kind(), ErrorKind::ValidationError);

    let negative = ledger.migrate_stock(&ctx, "BATCH-X", "SND", "MKW", -5, 1);
    assert_eq!(negative.unwrap_err().kind(), ErrorKind::ValidationError);

    let same = ledger.migrate_stock(&ctx, "BATCH-X", "SND", "snd", 1, 0);
    assert_eq!(same.unwrap_err().kind(), ErrorKind::ValidationError);

    let unknown_batch = ledger.migrate_stock(&ctx, "BATCH-Y", "SND", "MKW", 1, 0);
    assert_eq!(unknown_batch.unwrap_err().kind(), ErrorKind::NotFound);

    let empty_source = ledger.migrate_stock(&ctx, "BATCH-X", "BKK", "MKW", 1, 0);
    assert_eq!(empty_source.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_hub_policy_restricts_sources() {
    let dir = TempDir::new().unwrap();
    let mut config = CertLedgerConfig::for_data_dir(dir.path());
    config.ledger = config.ledger.with_migration_policy(MigrationPolicy::FromHub {
        hub: "SND".into(),
    });
    let db = CertLedger::open_with_config(config).unwrap();
    let ctx = OperationContext::new("registrar").unwrap();
    create_standard(&db, &ctx);

    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 5, 0)
        .unwrap();
    let err = db
        .ledger()
        .migrate_stock(&ctx, "BATCH-X", "MKW", "SND", 5, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[test]
fn test_consume_decrements_only() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);

    let printed = db
        .ledger()
        .consume_stock(&ctx, "BATCH-X", "SND", 30, 5)
        .unwrap();
    assert_eq!(printed.source_after, StockAmount::new(20, 0));
    assert!(printed.destination.is_none());

    let err = db
        .ledger()
        .consume_stock(&ctx, "BATCH-X", "SND", 0, 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(stock_of(&db, "BATCH-X", "SND"), Some(StockAmount::new(20, 0)));

    let logs = db
        .reporting()
        .query_logs(&LogFilter::new().action(ActionKind::Print))
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(
        (logs[0].entry.certificate_delta, logs[0].entry.medal_delta),
        (-30, -5)
    );
    assert!(logs[0].entry.dest_branch.is_none());
}

#[test]
fn test_zero_row_stays_funded_and_can_be_credited() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);

    db.ledger()
        .consume_stock(&ctx, "BATCH-X", "MKW", 20, 0)
        .unwrap();
    assert_eq!(stock_of(&db, "BATCH-X", "MKW"), Some(StockAmount::ZERO));

    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 4, 0)
        .unwrap();
    assert_eq!(stock_of(&db, "BATCH-X", "MKW"), Some(StockAmount::new(4, 0)));
}

#[test]
fn test_clear_all_batches() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let plan = AllocationPlan::new().with("BKK", 3, 3).unwrap();
    db.ledger().create_batch(&ctx, "BATCH-Y", &plan).unwrap();

    assert!(ResetAcknowledgement::confirm("yes please").is_err());
    let ack = ResetAcknowledgement::confirm(ResetAcknowledgement::PHRASE).unwrap();
    let report = db.ledger().clear_all_batches(&ctx, ack).unwrap();

    assert_eq!(report.batches_deleted, 2);
    assert_eq!(report.stock_rows_deleted, 3);
    assert_eq!(report.total, StockAmount::new(73, 8));
    assert!(db.store().list_batches().unwrap().is_empty());
    assert!(db.store().all_stock().unwrap().is_empty());

    let logs = db
        .reporting()
        .query_logs(&LogFilter::new().action(ActionKind::BulkDelete))
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(
        (logs[0].entry.certificate_delta, logs[0].entry.medal_delta),
        (-73, -8)
    );
    assert_eq!(logs[0].entry.old_values["batches"], 2);

    // History survives the reset
    assert_eq!(db.reporting().count_logs(&LogFilter::new()).unwrap(), 3);
}

#[test]
fn test_oversized_amounts_rejected_before_any_write() {
    let (_dir, db, ctx) = setup();

    let err = AllocationPlan::new().with("SND", i64::MAX, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let err = AllocationPlan::new().with("SND", 0, MAX_AMOUNT + 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let err = AllocationPlan::from_json(&serde_json::json!({
        "SND": {"certificates": i64::MAX},
        "MKW": {"certificates": 1}
    }))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    create_standard(&db, &ctx);
    let err = db
        .ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", i64::MAX, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let err = db
        .ledger()
        .consume_stock(&ctx, "BATCH-X", "SND", 0, i64::MAX)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    assert_eq!(db.reporting().count_logs(&LogFilter::new()).unwrap(), 1);
}

#[test]
fn test_largest_amounts_sum_without_overflow() {
    let (_dir, db, ctx) = setup();
    let plan = AllocationPlan::new()
        .with("SND", MAX_AMOUNT, MAX_AMOUNT)
        .and_then(|p| p.with("MKW", MAX_AMOUNT, 0))
        .unwrap();

    for batch in ["BATCH-1", "BATCH-2", "BATCH-3"] {
        let created = db.ledger().create_batch(&ctx, batch, &plan).unwrap();
        assert_eq!(created.total, StockAmount::new(2 * MAX_AMOUNT, MAX_AMOUNT));
    }

    // Piling one batch onto a single branch stays exact
    db.ledger()
        .migrate_stock(&ctx, "BATCH-1", "MKW", "SND", MAX_AMOUNT, 0)
        .unwrap();
    assert_eq!(
        stock_of(&db, "BATCH-1", "SND"),
        Some(StockAmount::new(2 * MAX_AMOUNT, MAX_AMOUNT))
    );

    let summary = db.reporting().summary_by_branch().unwrap();
    let snd = summary.iter().find(|s| s.branch == "SND").unwrap();
    assert_eq!(snd.total, StockAmount::new(4 * MAX_AMOUNT, 3 * MAX_AMOUNT));
    let cumulative = db.reporting().cumulative_totals().unwrap();
    assert_eq!(
        cumulative.last().unwrap().cumulative,
        StockAmount::new(6 * MAX_AMOUNT, 3 * MAX_AMOUNT)
    );

    let ack = ResetAcknowledgement::confirm(ResetAcknowledgement::PHRASE).unwrap();
    let report = db.ledger().clear_all_batches(&ctx, ack).unwrap();
    assert_eq!(report.total, StockAmount::new(6 * MAX_AMOUNT, 3 * MAX_AMOUNT));
}

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let before = db.store().batch_stock("BATCH-X").unwrap();

    let token = CancelToken::new();
    token.cancel();
    let cancelled = ctx.clone().with_cancel_token(token);

    let err = db
        .ledger()
        .migrate_stock(&cancelled, "BATCH-X", "SND", "MKW", 5, 0)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Cancelled));
    assert_eq!(db.store().batch_stock("BATCH-X").unwrap(), before);
    assert_eq!(db.reporting().count_logs(&LogFilter::new()).unwrap(), 1);
}

#[test]
fn test_reports() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    let plan = AllocationPlan::new().with("SND", 5, 1).unwrap();
    db.ledger().create_batch(&ctx, "BATCH-Y", &plan).unwrap();

    let summary = db.reporting().summary_by_branch().unwrap();
    let snd = summary.iter().find(|s| s.branch == "SND").unwrap();
    assert_eq!(snd.total, StockAmount::new(55, 6));
    assert_eq!(snd.batch_count, 2);

    let cumulative = db.reporting().cumulative_totals().unwrap();
    assert_eq!(cumulative.len(), 2);
    assert_eq!(cumulative[0].batch_id, "BATCH-X");
    assert_eq!(cumulative[1].cumulative, StockAmount::new(75, 6));

    assert_eq!(
        db.reporting().batch_stock("BATCH-Z").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_log_region_filter() {
    let (_dir, db, ctx) = setup();
    create_standard(&db, &ctx);
    db.reporting().set_branch_region("MKW", "SOUTH").unwrap();
    db.reporting().set_branch_region("BKK", "EAST").unwrap();

    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "MKW", 1, 0)
        .unwrap();
    db.ledger()
        .migrate_stock(&ctx, "BATCH-X", "SND", "BKK", 1, 0)
        .unwrap();

    let south = db
        .reporting()
        .query_logs(&LogFilter::new().region("SOUTH"))
        .unwrap();
    assert_eq!(south.len(), 1);
    assert_eq!(south[0].entry.dest_branch.as_deref(), Some("MKW"));

    let registrar = LogFilter::new().search("registrar");
    assert_eq!(db.reporting().count_logs(&registrar).unwrap(), 3);
}
