pub mod maintenance;
pub mod ops;
pub mod report;

use certledger::AuditOutcome;

/// One-line note on where the audit record went
pub(crate) fn audit_note(outcome: &AuditOutcome) -> String {
    match outcome {
        AuditOutcome::Recorded { id } => format!("ledger entry #{id}"),
        AuditOutcome::Deferred { path } => {
            format!("⚠️  audit entry deferred to {} (run 'certledger recover')", path.display())
        }
        AuditOutcome::Lost { error } => format!("⚠️  AUDIT ENTRY LOST: {error}"),
    }
}
