// 🧾 Rent Ledger - ties validator, calculator and store together
//
// quote  = read contract + history, validate period, compute (no writes)
// apply  = commit a quote, guarded by the contract version it was read at

use crate::contract::{Contract, ContractDraft, ContractEdit, UpdateRecord};
use crate::event::Event;
use crate::error::Result;
use crate::escalation::{check_index_count, parse_indices, EscalationResult, RentEscalationCalculator};
use crate::period::Period;
use crate::store::{ContractStore, StoreError};
use crate::validator::{PeriodValidator, ProposedPeriod};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// A validated, computed escalation that has not been saved yet
#[derive(Debug, Clone, Serialize)]
pub struct EscalationQuote {
    /// Contract as read; its `version` guards the commit
    pub contract: Contract,
    pub period: Period,
    pub result: EscalationResult,
}

pub struct RentLedger<S: ContractStore> {
    store: S,
}

impl<S: ContractStore> RentLedger<S> {
    pub fn new(store: S) -> Self {
        RentLedger { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // CONTRACTS
    // ========================================================================

    pub fn register_contract(&self, draft: ContractDraft, owner: &str) -> Result<Contract> {
        let contract = draft.into_contract(owner)?;
        self.store.insert_contract(&contract)?;

        info!(contract_id = %contract.id, property = %contract.property, "contract registered");
        Ok(contract)
    }

    pub fn list_contracts(&self, owner: &str) -> Result<Vec<Contract>> {
        Ok(self.store.list_active(owner)?)
    }

    pub fn contract(&self, id: &str) -> Result<Contract> {
        self.store
            .get_contract(id)?
            .ok_or_else(|| StoreError::ContractNotFound(id.to_string()).into())
    }

    pub fn contract_with_history(&self, id: &str) -> Result<(Contract, Vec<UpdateRecord>)> {
        let contract = self.contract(id)?;
        let history = self.store.history(id)?;
        Ok((contract, history))
    }

    pub fn edit_contract(&self, id: &str, edit: &ContractEdit) -> Result<Contract> {
        let current = self.contract(id)?;
        let edited = edit.apply(&current)?;
        let stored = self.store.update_contract(&edited, current.version)?;

        info!(contract_id = %id, version = stored.version, "contract edited");
        Ok(stored)
    }

    pub fn retire_contract(&self, id: &str) -> Result<Contract> {
        let current = self.contract(id)?;
        let retired = self.store.retire(id, current.version)?;

        info!(contract_id = %id, "contract retired");
        Ok(retired)
    }

    /// Audit trail of a contract, newest first
    pub fn events(&self, id: &str) -> Result<Vec<Event>> {
        self.contract(id)?;
        Ok(self.store.events(id)?)
    }

    // ========================================================================
    // ESCALATIONS
    // ========================================================================

    /// Validate and compute an escalation without saving it.
    ///
    /// Check order: contract exists and is active, index values parse,
    /// period rules, index count matches the update frequency.
    pub fn quote<T: AsRef<str>>(
        &self,
        contract_id: &str,
        proposed: &ProposedPeriod,
        raw_indices: &[T],
    ) -> Result<EscalationQuote> {
        let contract = self.contract(contract_id)?;
        if !contract.active {
            return Err(StoreError::ContractRetired(contract.id).into());
        }
        let history = self.store.history(contract_id)?;

        let indices = parse_indices(raw_indices)?;
        let period = PeriodValidator::validate(&contract, &history, proposed).map_err(|failure| {
            debug!(contract_id, %failure, "period rejected");
            failure
        })?;
        check_index_count(&indices, contract.update_frequency)?;

        let result = RentEscalationCalculator::compute(
            contract.current_rent,
            &indices,
            contract.deposit_multiplier,
        )?;

        debug!(
            contract_id,
            %period,
            old_rent = %result.old_rent,
            new_rent = %result.new_rent,
            "escalation quoted"
        );

        Ok(EscalationQuote {
            contract,
            period,
            result,
        })
    }

    /// Save a quote: new rent on the contract + one history entry.
    ///
    /// Fails with `StaleContract` if the contract changed after the quote
    /// was taken, and with `DuplicateUpdate` if the same escalation exists.
    pub fn apply(&self, quote: &EscalationQuote, actor: &str) -> Result<UpdateRecord> {
        let result = &quote.result;
        let record = UpdateRecord {
            id: uuid::Uuid::new_v4().to_string(),
            contract_id: quote.contract.id.clone(),
            period_start: quote.period.start().to_string(),
            period_end: quote.period.end().to_string(),
            old_rent: result.old_rent,
            new_rent: result.new_rent,
            old_deposit: result.old_deposit,
            new_deposit: result.new_deposit,
            applied_indices: result.applied_indices.clone(),
            applied_at: Utc::now(),
            updated_by: actor.to_string(),
            idempotency_hash: UpdateRecord::compute_idempotency_hash(
                &quote.contract.id,
                &quote.period,
                &result.applied_indices,
            ),
        };

        let updated =
            self.store
                .commit_escalation(&quote.contract.id, quote.contract.version, &record)?;

        info!(
            contract_id = %updated.id,
            period = %quote.period,
            new_rent = %updated.current_rent,
            version = updated.version,
            actor,
            "rent escalated"
        );
        Ok(record)
    }

    /// `quote` followed by `apply`
    pub fn escalate<T: AsRef<str>>(
        &self,
        contract_id: &str,
        proposed: &ProposedPeriod,
        raw_indices: &[T],
        actor: &str,
    ) -> Result<UpdateRecord> {
        let quote = self.quote(contract_id, proposed, raw_indices)?;
        self.apply(&quote, actor)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::error::Error;
    use crate::escalation::EscalationError;
    use crate::store::MemoryStore;
    use crate::validator::ValidationFailure;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const OWNER: &str = "owner@example.com";

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn draft() -> ContractDraft {
        ContractDraft {
            property: "Depto Cabildo".to_string(),
            tenant: "Juan Pérez".to_string(),
            start_date: "2024-01-05".to_string(),
            end_date: "2025-12-31".to_string(),
            initial_rent: Some(dec("500000")),
            ..ContractDraft::default()
        }
    }

    fn ledger() -> (RentLedger<MemoryStore>, Contract) {
        let ledger = RentLedger::new(MemoryStore::new());
        let contract = ledger.register_contract(draft(), OWNER).unwrap();
        (ledger, contract)
    }

    #[test]
    fn test_quote_does_not_write() {
        let (ledger, contract) = ledger();

        let quote = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1.2", "2.1", "3.0"])
            .unwrap();

        assert_eq!(quote.result.new_rent, dec("532124.78"));
        assert_eq!(quote.result.diff_deposit, dec("48187.17"));
        assert_eq!(ledger.contract(&contract.id).unwrap().current_rent, dec("500000"));
        assert!(ledger.store().history(&contract.id).unwrap().is_empty());
    }

    #[test]
    fn test_escalate_updates_rent_and_history() {
        let (ledger, contract) = ledger();

        let record = ledger
            .escalate(
                &contract.id,
                &ProposedPeriod::new("2024-04", "2024-06"),
                &["1.2", "2.1", "3.0"],
                OWNER,
            )
            .unwrap();

        assert_eq!(record.period_start, "2024-04");
        assert_eq!(record.old_rent, dec("500000"));
        assert_eq!(record.new_deposit, dec("798187.17"));
        assert_eq!(record.updated_by, OWNER);

        let (stored, history) = ledger.contract_with_history(&contract.id).unwrap();
        assert_eq!(stored.current_rent, dec("532124.78"));
        assert_eq!(history, vec![record]);
    }

    #[test]
    fn test_next_escalation_compounds_on_new_rent() {
        let (ledger, contract) = ledger();
        let indices = ["1.2", "2.1", "3.0"];

        ledger
            .escalate(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &indices, OWNER)
            .unwrap();
        let second = ledger
            .escalate(&contract.id, &ProposedPeriod::new("2024-07", "2024-09"), &["0", "0", "0"], OWNER)
            .unwrap();

        assert_eq!(second.old_rent, dec("532124.78"));
        assert_eq!(second.new_rent, dec("532124.78"));
    }

    #[test]
    fn test_overlapping_escalation_rejected() {
        let (ledger, contract) = ledger();
        ledger
            .escalate(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1", "1"], OWNER)
            .unwrap();

        let err = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-06", "2024-08"), &["1", "1", "1"])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationFailure::OverlapsExistingUpdate(_))
        ));
    }

    #[test]
    fn test_invalid_index_reported_before_period() {
        let (ledger, contract) = ledger();

        let err = ledger
            .quote(&contract.id, &ProposedPeriod::default(), &["1", "x", "1"])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Escalation(EscalationError::InvalidIndexValue { position: 2, .. })
        ));
    }

    #[test]
    fn test_huge_index_fails_without_writing() {
        let (ledger, contract) = ledger();

        let err = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1e26", "1", "1"])
            .unwrap_err();

        assert!(matches!(err, Error::Escalation(EscalationError::AmountOutOfRange)));
        assert_eq!(ledger.contract(&contract.id).unwrap().current_rent, dec("500000"));
    }

    #[test]
    fn test_index_count_must_match_frequency() {
        let (ledger, contract) = ledger();

        let err = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1"])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Escalation(EscalationError::IndexCountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_concurrent_quotes_only_first_commits() {
        let (ledger, contract) = ledger();

        let first = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1", "1"])
            .unwrap();
        let second = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-05", "2024-07"), &["2", "2", "2"])
            .unwrap();

        ledger.apply(&first, OWNER).unwrap();
        let err = ledger.apply(&second, "someone-else").unwrap_err();

        assert!(matches!(
            err,
            Error::Store(StoreError::StaleContract { expected: 1, found: 2, .. })
        ));
        assert_eq!(ledger.store().history(&contract.id).unwrap().len(), 1);
    }

    #[test]
    fn test_double_submit_of_same_quote() {
        let ledger = RentLedger::new(SqliteStore::open_in_memory().unwrap());
        let contract = ledger.register_contract(draft(), OWNER).unwrap();

        let quote = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1", "1"])
            .unwrap();

        ledger.apply(&quote, OWNER).unwrap();
        assert!(ledger.apply(&quote, OWNER).is_err());
        assert_eq!(ledger.store().history(&contract.id).unwrap().len(), 1);
    }

    #[test]
    fn test_retired_contract_cannot_be_escalated() {
        let (ledger, contract) = ledger();
        ledger.retire_contract(&contract.id).unwrap();

        let err = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1", "1"])
            .unwrap_err();

        assert!(matches!(err, Error::Store(StoreError::ContractRetired(_))));
        assert!(ledger.list_contracts(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_edit_contract_revalidates() {
        let (ledger, contract) = ledger();

        let edit = ContractEdit {
            update_frequency: Some(6),
            ..ContractEdit::default()
        };
        let edited = ledger.edit_contract(&contract.id, &edit).unwrap();
        assert_eq!(edited.update_frequency, 6);
        assert_eq!(edited.version, 2);

        // Grace window grew to six months
        let err = ledger
            .quote(&contract.id, &ProposedPeriod::new("2024-04", "2024-09"), &["1"; 6])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationFailure::WithinInitialGracePeriod { .. })
        ));

        let bad = ContractEdit {
            update_frequency: Some(0),
            ..ContractEdit::default()
        };
        assert!(matches!(
            ledger.edit_contract(&contract.id, &bad),
            Err(Error::Contract(_))
        ));
    }

    #[test]
    fn test_events_follow_contract_lifecycle() {
        let (ledger, contract) = ledger();
        ledger
            .escalate(&contract.id, &ProposedPeriod::new("2024-04", "2024-06"), &["1", "1", "1"], "admin")
            .unwrap();
        ledger.retire_contract(&contract.id).unwrap();

        let types: Vec<String> = ledger
            .events(&contract.id)
            .unwrap()
            .into_iter()
            .map(|event| event.event_type)
            .collect();

        assert_eq!(types, vec!["contract_retired", "rent_escalated", "contract_created"]);
        assert!(ledger.events("missing").is_err());
    }

    #[test]
    fn test_unknown_contract() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.contract("missing"),
            Err(Error::Store(StoreError::ContractNotFound(_)))
        ));
    }
}
