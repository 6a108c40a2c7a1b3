// 🛂 Period Validator - is this escalation period legal for this contract?
//
// Rules run in a fixed order and the first failure wins:
//   1. both months present and parseable
//   2. end not before start
//   3. inside the contract term
//   4. after the initial grace window (one update cycle)
//   5. no overlap with an already-applied escalation

use crate::contract::{Contract, UpdateRecord};
use crate::period::{Period, YearMonth};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// INPUT
// ============================================================================

/// Period as entered by the user: two optional `YYYY-MM` strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedPeriod {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ProposedPeriod {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        ProposedPeriod {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }
}

// ============================================================================
// VALIDATION FAILURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("both the start and end month of the update period are required (YYYY-MM)")]
    MissingPeriod,

    #[error("end month {end} is before start month {start}")]
    InvertedPeriod { start: YearMonth, end: YearMonth },

    #[error("period {period} must lie within the contract term {contract_start}..{contract_end}")]
    OutsideContractTerm {
        period: Period,
        contract_start: YearMonth,
        contract_end: YearMonth,
    },

    #[error(
        "the first {update_frequency} months of the contract cannot be escalated; \
         earliest start is {first_allowed}, got {start}"
    )]
    WithinInitialGracePeriod {
        start: YearMonth,
        first_allowed: YearMonth,
        update_frequency: u32,
    },

    #[error(
        "period overlaps an escalation already applied ({} to {})",
        .0.period_start,
        .0.period_end
    )]
    OverlapsExistingUpdate(Box<UpdateRecord>),
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct PeriodValidator;

impl PeriodValidator {
    /// Check `proposed` against the contract term and its update history.
    ///
    /// History order is irrelevant; entries whose stored period does not
    /// parse are skipped. On success the parsed period is returned unchanged.
    pub fn validate(
        contract: &Contract,
        history: &[UpdateRecord],
        proposed: &ProposedPeriod,
    ) -> Result<Period, ValidationFailure> {
        let start = proposed
            .start
            .as_deref()
            .and_then(YearMonth::parse)
            .ok_or(ValidationFailure::MissingPeriod)?;
        let end = proposed
            .end
            .as_deref()
            .and_then(YearMonth::parse)
            .ok_or(ValidationFailure::MissingPeriod)?;

        let period =
            Period::new(start, end).ok_or(ValidationFailure::InvertedPeriod { start, end })?;

        let contract_start = contract.start_month();
        let contract_end = contract.end_month();
        if !period.within(contract_start, contract_end) {
            return Err(ValidationFailure::OutsideContractTerm {
                period,
                contract_start,
                contract_end,
            });
        }

        let first_allowed = contract.first_allowed_month();
        if period.start() < first_allowed {
            return Err(ValidationFailure::WithinInitialGracePeriod {
                start: period.start(),
                first_allowed,
                update_frequency: contract.update_frequency,
            });
        }

        let conflict = history.iter().find(|record| {
            record
                .period()
                .map_or(false, |existing| existing.overlaps(&period))
        });
        if let Some(record) = conflict {
            return Err(ValidationFailure::OverlapsExistingUpdate(Box::new(record.clone())));
        }

        Ok(period)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::IndexType;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    /// Contract running 2024-01-10 .. 2025-12-20, escalating every 3 months
    fn contract() -> Contract {
        Contract {
            id: "c-1".to_string(),
            property: "Depto Cabildo".to_string(),
            tenant: "Juan Pérez".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            update_frequency: 3,
            index_type: IndexType::Icl,
            deposit_multiplier: Decimal::new(15, 1),
            initial_rent: Decimal::new(500_000, 0),
            current_rent: Decimal::new(500_000, 0),
            active: true,
            owner: "owner".to_string(),
            created_at: Utc::now(),
            version: 1,
        }
    }

    fn record(start: &str, end: &str) -> UpdateRecord {
        UpdateRecord {
            id: format!("r-{}", start),
            contract_id: "c-1".to_string(),
            period_start: start.to_string(),
            period_end: end.to_string(),
            old_rent: Decimal::new(500_000, 0),
            new_rent: Decimal::new(510_000, 0),
            old_deposit: Decimal::new(750_000, 0),
            new_deposit: Decimal::new(765_000, 0),
            applied_indices: vec![Decimal::ONE, Decimal::ONE, Decimal::ZERO],
            applied_at: Utc::now(),
            updated_by: "owner".to_string(),
            idempotency_hash: String::new(),
        }
    }

    fn validate(history: &[UpdateRecord], start: &str, end: &str) -> Result<Period, ValidationFailure> {
        PeriodValidator::validate(&contract(), history, &ProposedPeriod::new(start, end))
    }

    #[test]
    fn test_accepts_valid_period() {
        let period = validate(&[], "2024-04", "2024-06").unwrap();
        assert_eq!(period, Period::parse("2024-04", "2024-06").unwrap());
    }

    #[test]
    fn test_accepts_period_ending_in_contract_end_month() {
        // end date is 2025-12-20; any day of December counts
        assert!(validate(&[], "2025-10", "2025-12").is_ok());
    }

    #[test]
    fn test_missing_period() {
        let missing_end = ProposedPeriod {
            start: Some("2024-04".to_string()),
            end: None,
        };
        assert_eq!(
            PeriodValidator::validate(&contract(), &[], &missing_end),
            Err(ValidationFailure::MissingPeriod)
        );
        assert_eq!(validate(&[], "", "2024-06"), Err(ValidationFailure::MissingPeriod));
        assert_eq!(validate(&[], "2024-04", "junio"), Err(ValidationFailure::MissingPeriod));
    }

    #[test]
    fn test_inverted_period() {
        assert!(matches!(
            validate(&[], "2024-06", "2024-04"),
            Err(ValidationFailure::InvertedPeriod { .. })
        ));
    }

    #[test]
    fn test_day_of_month_is_ignored() {
        // Same month, different days: not inverted
        assert!(validate(&[], "2024-04-30", "2024-04-01").is_ok());
    }

    #[test]
    fn test_outside_contract_term() {
        assert!(matches!(
            validate(&[], "2025-11", "2026-01"),
            Err(ValidationFailure::OutsideContractTerm { .. })
        ));
        assert!(matches!(
            validate(&[], "2023-12", "2024-02"),
            Err(ValidationFailure::OutsideContractTerm { .. })
        ));
    }

    #[test]
    fn test_grace_period() {
        let err = validate(&[], "2024-02", "2024-04").unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::WithinInitialGracePeriod {
                start: YearMonth::parse("2024-02").unwrap(),
                first_allowed: YearMonth::parse("2024-04").unwrap(),
                update_frequency: 3,
            }
        );

        assert!(validate(&[], "2024-04", "2024-06").is_ok());
    }

    #[test]
    fn test_overlap_on_shared_boundary_month() {
        let history = vec![record("2024-01", "2024-03")];

        match validate(&history, "2024-03", "2024-05") {
            Err(ValidationFailure::OverlapsExistingUpdate(conflict)) => {
                assert_eq!(conflict.period_start, "2024-01");
                assert_eq!(conflict.period_end, "2024-03");
            }
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    #[test]
    fn test_grace_checked_before_overlap() {
        let history = vec![record("2024-01", "2024-03")];
        assert!(matches!(
            validate(&history, "2024-02", "2024-05"),
            Err(ValidationFailure::WithinInitialGracePeriod { .. })
        ));
    }

    #[test]
    fn test_adjacent_history_is_fine_in_any_order() {
        let history = vec![record("2024-10", "2024-12"), record("2024-04", "2024-06")];
        assert!(validate(&history, "2024-07", "2024-09").is_ok());

        let err = validate(&history, "2024-06", "2024-08").unwrap_err();
        assert!(matches!(
            err,
            ValidationFailure::OverlapsExistingUpdate(ref r) if r.period_start == "2024-04"
        ));
    }

    #[test]
    fn test_malformed_history_is_skipped() {
        let history = vec![record("", "2024-06"), record("2024-06", "garbage")];
        assert!(validate(&history, "2024-04", "2024-06").is_ok());
    }

    #[test]
    fn test_failure_messages_carry_context() {
        let history = vec![record("2024-04", "2024-06")];
        let message = validate(&history, "2024-05", "2024-07").unwrap_err().to_string();
        assert!(message.contains("2024-04 to 2024-06"), "got: {}", message);
    }
}
