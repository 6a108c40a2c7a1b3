// 🗄️ Contract Store - persistence boundary for contracts + update history
//
// The escalation core never touches storage directly. Callers read a
// contract and its history, run the validator/calculator, then commit
// through `commit_escalation`, which is guarded by the contract version:
// if anything changed the contract since it was read, nothing is written.

use crate::contract::{Contract, UpdateRecord};
use crate::event::Event;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("contract {0} is retired")]
    ContractRetired(String),

    /// Someone else changed the contract since it was read
    #[error("contract {contract_id} changed concurrently (expected version {expected}, found {found})")]
    StaleContract {
        contract_id: String,
        expected: i64,
        found: i64,
    },

    #[error("contract {0} already exists")]
    DuplicateContract(String),

    #[error("this escalation was already saved for contract {contract_id}")]
    DuplicateUpdate {
        contract_id: String,
        idempotency_hash: String,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row could not be decoded
    #[error("corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("store lock poisoned")]
    Poisoned,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Read/write operations the ledger needs from a backing store.
///
/// Every mutation takes the version the caller read and fails with
/// `StaleContract` when it no longer matches. Successful mutations bump the
/// version by one and return the stored contract.
pub trait ContractStore {
    fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError>;

    fn get_contract(&self, id: &str) -> Result<Option<Contract>, StoreError>;

    /// Active contracts of `owner`, oldest first
    fn list_active(&self, owner: &str) -> Result<Vec<Contract>, StoreError>;

    /// Update history of a contract, oldest first
    fn history(&self, contract_id: &str) -> Result<Vec<UpdateRecord>, StoreError>;

    fn update_contract(&self, contract: &Contract, expected_version: i64) -> Result<Contract, StoreError>;

    /// Soft delete (`active = false`)
    fn retire(&self, contract_id: &str, expected_version: i64) -> Result<Contract, StoreError>;

    /// Atomically set `current_rent = record.new_rent` and append `record`
    fn commit_escalation(
        &self,
        contract_id: &str,
        expected_version: i64,
        record: &UpdateRecord,
    ) -> Result<Contract, StoreError>;

    /// Audit events for a contract, newest first
    fn events(&self, contract_id: &str) -> Result<Vec<Event>, StoreError>;
}

/// Shared precondition for every guarded mutation
pub(crate) fn check_writable(
    contract: &Contract,
    expected_version: i64,
) -> Result<(), StoreError> {
    if contract.version != expected_version {
        return Err(StoreError::StaleContract {
            contract_id: contract.id.clone(),
            expected: expected_version,
            found: contract.version,
        });
    }
    if !contract.active {
        return Err(StoreError::ContractRetired(contract.id.clone()));
    }
    Ok(())
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct MemoryState {
    contracts: HashMap<String, Contract>,
    history: HashMap<String, Vec<UpdateRecord>>,
    events: Vec<Event>,
}

/// Process-local store. The write lock is held across check + write, which
/// gives the same single-writer guarantee as the SQLite transaction.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl ContractStore for MemoryStore {
    fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.contracts.contains_key(&contract.id) {
            return Err(StoreError::DuplicateContract(contract.id.clone()));
        }
        state.contracts.insert(contract.id.clone(), contract.clone());
        state.events.push(Event::contract_created(contract));
        Ok(())
    }

    fn get_contract(&self, id: &str) -> Result<Option<Contract>, StoreError> {
        Ok(self.read()?.contracts.get(id).cloned())
    }

    fn list_active(&self, owner: &str) -> Result<Vec<Contract>, StoreError> {
        let state = self.read()?;
        let mut contracts: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| c.active && c.owner == owner)
            .cloned()
            .collect();
        contracts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(contracts)
    }

    fn history(&self, contract_id: &str) -> Result<Vec<UpdateRecord>, StoreError> {
        Ok(self
            .read()?
            .history
            .get(contract_id)
            .cloned()
            .unwrap_or_default())
    }

    fn update_contract(&self, contract: &Contract, expected_version: i64) -> Result<Contract, StoreError> {
        let mut state = self.write()?;
        let stored = state
            .contracts
            .get_mut(&contract.id)
            .ok_or_else(|| StoreError::ContractNotFound(contract.id.clone()))?;
        check_writable(stored, expected_version)?;

        let mut next = contract.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        state.events.push(Event::contract_edited(&next));
        Ok(next)
    }

    fn retire(&self, contract_id: &str, expected_version: i64) -> Result<Contract, StoreError> {
        let mut state = self.write()?;
        let stored = state
            .contracts
            .get_mut(contract_id)
            .ok_or_else(|| StoreError::ContractNotFound(contract_id.to_string()))?;
        check_writable(stored, expected_version)?;

        stored.active = false;
        stored.version += 1;
        let retired = stored.clone();
        state.events.push(Event::contract_retired(&retired));
        Ok(retired)
    }

    fn commit_escalation(
        &self,
        contract_id: &str,
        expected_version: i64,
        record: &UpdateRecord,
    ) -> Result<Contract, StoreError> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let stored = state
            .contracts
            .get_mut(contract_id)
            .ok_or_else(|| StoreError::ContractNotFound(contract_id.to_string()))?;
        check_writable(stored, expected_version)?;

        let history = state.history.entry(contract_id.to_string()).or_default();
        if history
            .iter()
            .any(|r| r.idempotency_hash == record.idempotency_hash)
        {
            return Err(StoreError::DuplicateUpdate {
                contract_id: contract_id.to_string(),
                idempotency_hash: record.idempotency_hash.clone(),
            });
        }

        stored.current_rent = record.new_rent;
        stored.version += 1;
        history.push(record.clone());

        let updated = stored.clone();
        state.events.push(Event::rent_escalated(record));
        Ok(updated)
    }

    fn events(&self, contract_id: &str) -> Result<Vec<Event>, StoreError> {
        let state = self.read()?;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.entity_id == contract_id)
            .cloned()
            .collect();
        events.reverse();
        Ok(events)
    }
}

// ============================================================================
// TESTS
// ============================================================================
