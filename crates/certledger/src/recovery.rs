//! Replays the fallback file into the ledger table

use crate::audit::AuditTable;
use crate::fallback::{FallbackGuard, FallbackLog};
use certledger_core::error::Result;
use certledger_core::observe;
use certledger_core::types::{self, FailedLedgerEntry, LedgerEntry, RecoveryReport};
use certledger_sqlite::SqliteStockStore;
use std::sync::Arc;
use std::time::Duration;

/// Recovery Service
///
/// One pass reads every line of the fallback file and inserts each record
/// through the ordinary primary path, one transaction per line. A bad line
/// is counted and skipped, never aborting the pass. When at least one
/// record was recovered the file is renamed to a timestamped archive; any
/// records that parsed but still failed to insert are appended to a fresh
/// fallback file for the next pass. A record that cannot be re-appended
/// either is logged in full and counted in [`RecoveryReport::lost`]; the
/// archive still holds its original line.
///
/// The fallback file is locked for the whole pass, so entries diverted by
/// concurrent operations wait and land in the fresh file.
pub struct RecoveryService {
    store: SqliteStockStore,
    table: Arc<dyn AuditTable>,
    fallback: Arc<FallbackLog>,
    timeout: Duration,
}

impl RecoveryService {
    pub fn new(
        store: SqliteStockStore,
        table: Arc<dyn AuditTable>,
        fallback: Arc<FallbackLog>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            table,
            fallback,
            timeout,
        }
    }

    pub fn recover_failed_entries(&self) -> Result<RecoveryReport> {
        let guard = self.fallback.lock();

        let Some(lines) = guard.read_lines()? else {
            tracing::debug!(
                path = %self.fallback.path().display(),
                "No fallback file, nothing to recover"
            );
            return Ok(RecoveryReport::default());
        };

        let mut report = RecoveryReport::default();
        let mut retry = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: FailedLedgerEntry = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = line_no, "Skipping malformed fallback record: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.insert(&record.entry) {
                Ok(id) => {
                    tracing::debug!(line = line_no, id, batch_id = %record.entry.batch_id, "Recovered entry");
                    report.recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        line = line_no,
                        batch_id = %record.entry.batch_id,
                        "Fallback record still cannot be inserted: {}",
                        e
                    );
                    report.failed += 1;
                    retry.push(FailedLedgerEntry {
                        error: e.to_string(),
                        ..record
                    });
                }
            }
        }

        if report.recovered > 0 {
            let archived = guard.archive(types::now())?;
            let retried = retry.len();
            report.lost = requeue(&guard, retry);
            tracing::info!(
                recovered = report.recovered,
                failed = report.failed,
                requeued = retried - report.lost,
                lost = report.lost,
                archived_to = %archived.display(),
                "Recovered fallback audit entries"
            );
            report.archived_to = Some(archived);
        } else if report.failed > 0 {
            tracing::warn!(
                failed = report.failed,
                "No fallback entries recovered, file left in place"
            );
        }

        observe::record_recovery(report.recovered, report.failed);
        Ok(report)
    }

    fn insert(&self, entry: &LedgerEntry) -> Result<i64> {
        let txn = self.store.begin(self.timeout)?;
        let id = self.table.insert(&txn, entry)?;
        txn.commit()?;
        Ok(id)
    }
}

/// Append `records` to the fresh fallback file, returning how many could not be written
///
/// Runs after the archive rename, so an error here must not abort the pass.
fn requeue(guard: &FallbackGuard<'_>, records: Vec<FailedLedgerEntry>) -> usize {
    let mut lost = 0;
    for record in records {
        if let Err(err) = guard.append(&record) {
            let entry = &record.entry;
            tracing::error!(
                batch_id = %entry.batch_id,
                action = %entry.action,
                description = %entry.description,
                actor = %entry.actor,
                primary_error = %record.error,
                "AUDIT RECORD STRANDED: re-queue after archive failed: {}",
                err
            );
            observe::record_audit_lost();
            lost += 1;
        }
    }
    lost
}
