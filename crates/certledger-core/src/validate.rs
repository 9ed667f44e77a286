//! Input validation shared by every ledger operation
//!
//! Each check returns `Ok(value)` with the validated (and possibly
//! normalized) value, or `Err(LedgerError::Validation { field, message })`.

use crate::error::{LedgerError, Result};
use crate::types::{BatchId, BranchCode, StockAmount};

pub const BATCH_ID_MIN_LEN: usize = 3;
pub const BATCH_ID_MAX_LEN: usize = 50;
pub const BRANCH_CODE_MAX_LEN: usize = 20;
pub const ACTOR_MAX_LEN: usize = 100;

/// Largest count accepted for a single input amount
///
/// Keeps every sum over stock rows far from `i64` overflow, in Rust and in
/// SQLite `SUM`.
pub const MAX_AMOUNT: i64 = i32::MAX as i64;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// 3-50 characters, ASCII alphanumeric, dash or underscore. Case is preserved.
pub fn batch_id(raw: &str) -> Result<BatchId> {
    let len = raw.chars().count();
    if !(BATCH_ID_MIN_LEN..=BATCH_ID_MAX_LEN).contains(&len) {
        return Err(LedgerError::validation(
            "batch_id",
            format!(
                "must be {}-{} characters, got {}",
                BATCH_ID_MIN_LEN, BATCH_ID_MAX_LEN, len
            ),
        ));
    }
    if !raw.chars().all(is_id_char) {
        return Err(LedgerError::validation(
            "batch_id",
            format!("{raw:?} may only contain letters, digits, '-' and '_'"),
        ));
    }
    Ok(BatchId::new_unchecked(raw.to_string()))
}

/// 1-20 characters, ASCII alphanumeric, dash or underscore; upper-cased.
pub fn branch_code(raw: &str) -> Result<BranchCode> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > BRANCH_CODE_MAX_LEN {
        return Err(LedgerError::validation(
            "branch",
            format!("must be 1-{} characters, got {:?}", BRANCH_CODE_MAX_LEN, raw),
        ));
    }
    if !trimmed.chars().all(is_id_char) {
        return Err(LedgerError::validation(
            "branch",
            format!("{raw:?} may only contain letters, digits, '-' and '_'"),
        ));
    }
    Ok(BranchCode::new_unchecked(trimmed.to_ascii_uppercase()))
}

/// A single count in `0..=MAX_AMOUNT`
pub fn amount(field: &'static str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(LedgerError::validation(
            field,
            format!("must be a non-negative integer, got {value}"),
        ));
    }
    if value > MAX_AMOUNT {
        return Err(LedgerError::validation(
            field,
            format!("must be at most {MAX_AMOUNT}, got {value}"),
        ));
    }
    Ok(value)
}

/// A count supplied as JSON: integral numbers only (`10` or `10.0`)
pub fn amount_from_json(field: &'static str, value: &serde_json::Value) -> Result<i64> {
    if let Some(n) = value.as_i64() {
        return amount(field, n);
    }
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 && f >= 0.0 && f <= MAX_AMOUNT as f64 {
            return amount(field, f as i64);
        }
        return Err(LedgerError::validation(
            field,
            format!("must be a non-negative integer, got {f}"),
        ));
    }
    Err(LedgerError::validation(
        field,
        format!("must be a non-negative integer, got {value}"),
    ))
}

pub fn stock_amount(certificates: i64, medals: i64) -> Result<StockAmount> {
    Ok(StockAmount::new(
        amount("certificates", certificates)?,
        amount("medals", medals)?,
    ))
}

/// Non-negative amounts of which at least one is positive
pub fn movement(certificates: i64, medals: i64) -> Result<StockAmount> {
    let requested = stock_amount(certificates, medals)?;
    if requested.is_zero() {
        return Err(LedgerError::validation(
            "amount",
            "at least one of certificates or medals must be positive",
        ));
    }
    Ok(requested)
}

/// Identity recorded on every ledger entry
pub fn actor(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > ACTOR_MAX_LEN {
        return Err(LedgerError::validation(
            "actor",
            format!("must be 1-{ACTOR_MAX_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_batch_id_bounds() {
        assert!(batch_id("AB").is_err());
        assert!(batch_id("ABC").is_ok());
        assert!(batch_id(&"A".repeat(50)).is_ok());
        assert!(batch_id(&"A".repeat(51)).is_err());
        assert!(batch_id("BATCH 007").is_err());
        assert!(batch_id("BATCH;DROP").is_err());
        assert_eq!(batch_id("Batch_007-a").unwrap().as_str(), "Batch_007-a");
    }

    #[test]
    fn test_branch_code_normalized() {
        assert_eq!(branch_code(" snd ").unwrap().as_str(), "SND");
        assert!(branch_code("").is_err());
        assert!(branch_code("S N D").is_err());
        assert!(branch_code(&"X".repeat(21)).is_err());
    }

    #[test]
    fn test_movement_requires_positive() {
        assert!(movement(0, 0).is_err());
        assert!(movement(-1, 5).is_err());
        assert_eq!(movement(0, 5).unwrap(), StockAmount::new(0, 5));
    }

    #[test]
    fn test_amount_from_json() {
        assert_eq!(amount_from_json("certificates", &json!(7)).unwrap(), 7);
        assert_eq!(amount_from_json("certificates", &json!(7.0)).unwrap(), 7);
        assert!(amount_from_json("certificates", &json!(7.5)).is_err());
        assert!(amount_from_json("certificates", &json!(-7)).is_err());
        assert!(amount_from_json("certificates", &json!(null)).is_err());
        assert!(amount_from_json("certificates", &json!(MAX_AMOUNT + 1)).is_err());
        assert!(amount_from_json("certificates", &json!(1e300)).is_err());
    }

    #[test]
    fn test_amount_upper_bound() {
        assert_eq!(amount("medals", MAX_AMOUNT).unwrap(), MAX_AMOUNT);
        let err = amount("medals", MAX_AMOUNT + 1).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "medals", .. }));
        assert!(stock_amount(i64::MAX, 0).is_err());
        assert!(movement(0, i64::MAX).is_err());
    }

    #[test]
    fn test_actor() {
        assert_eq!(actor("  admin ").unwrap(), "admin");
        assert!(actor("   ").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_batch_ids_accepted(id in "[A-Za-z0-9_-]{3,50}") {
            let parsed = batch_id(&id).unwrap();
            prop_assert_eq!(parsed.as_str(), id.as_str());
        }

        #[test]
        fn prop_batch_ids_with_other_chars_rejected(
            prefix in "[A-Za-z0-9]{1,10}",
            bad in "[ !@#$%^&*().,;:'\"/\\\\]",
            suffix in "[A-Za-z0-9]{1,10}",
        ) {
            let id = format!("{prefix}{bad}{suffix}");
            prop_assert!(batch_id(&id).is_err());
        }

        #[test]
        fn prop_negative_amounts_rejected(c in i64::MIN..0, m in 0i64..1000) {
            prop_assert!(stock_amount(c, m).is_err());
            prop_assert!(stock_amount(m, c).is_err());
        }

        #[test]
        fn prop_oversized_amounts_rejected(c in (MAX_AMOUNT + 1)..=i64::MAX, m in 0i64..1000) {
            prop_assert!(stock_amount(c, m).is_err());
            prop_assert!(stock_amount(m, c).is_err());
        }

        #[test]
        fn prop_branch_codes_are_upper_case(code in "[a-z0-9_-]{1,20}") {
            let parsed = branch_code(&code).unwrap();
            prop_assert_eq!(parsed.as_str(), code.to_ascii_uppercase());
        }
    }
}
