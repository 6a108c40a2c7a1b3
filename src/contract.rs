// 📝 Lease Contracts - contract records, form rules, update history entries
//
// A contract keeps a stable identity (UUID) while its current rent moves
// with every escalation. History entries are append-only.

use crate::period::{Period, YearMonth};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Longest allowed gap between escalations, in months
pub const MAX_UPDATE_FREQUENCY: u32 = 12;

/// Characters stripped from free-text names before storage
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', '=', '%', '&', '|', '#'];

// ============================================================================
// INDEX TYPE
// ============================================================================

/// Which published index a contract follows. Informational for the core.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexType {
    /// Índice para Contratos de Locación
    #[default]
    Icl,
    /// Consumer price inflation
    Ipc,
    CasaPropia,
    /// Fixed schedule agreed between the parties
    Fijo,
    Other(String),
}

impl IndexType {
    pub fn as_str(&self) -> &str {
        match self {
            IndexType::Icl => "ICL",
            IndexType::Ipc => "IPC",
            IndexType::CasaPropia => "Casa Propia",
            IndexType::Fijo => "Fijo",
            IndexType::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "icl" => IndexType::Icl,
            "ipc" => IndexType::Ipc,
            "casa propia" | "casa-propia" | "casapropia" => IndexType::CasaPropia,
            "fijo" => IndexType::Fijo,
            _ => IndexType::Other(tag.trim().to_string()),
        }
    }
}

impl From<String> for IndexType {
    fn from(value: String) -> Self {
        IndexType::parse(&value)
    }
}

impl From<IndexType> for String {
    fn from(value: IndexType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONTRACT ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("required field is empty: {0}")]
    MissingField(&'static str),

    #[error("{field} is not a valid YYYY-MM-DD date: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("end date {end} must be after start date {start}")]
    EndNotAfterStart { start: NaiveDate, end: NaiveDate },

    #[error("update frequency must be between 1 and 12 months, got {0}")]
    FrequencyOutOfRange(u32),

    #[error("rent must be greater than zero, got {0}")]
    NonPositiveRent(Decimal),

    #[error("deposit multiplier must be greater than zero, got {0}")]
    NonPositiveDeposit(Decimal),

    #[error("deposit for rent {rent} x {multiplier} is out of range")]
    DepositOutOfRange { rent: Decimal, multiplier: Decimal },
}

// ============================================================================
// CONTRACT
// ============================================================================

/// Lease contract
///
/// Identity: `id` (never changes)
/// Values: everything else; `current_rent` moves with each escalation
/// Concurrency: `version` is bumped on every stored mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub property: String,
    pub tenant: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Months between permitted escalations (also the initial grace window)
    pub update_frequency: u32,
    pub index_type: IndexType,

    /// Deposit = rent × multiplier (1.5 = a month and a half)
    pub deposit_multiplier: Decimal,
    pub initial_rent: Decimal,
    pub current_rent: Decimal,

    /// Soft-delete flag; retired contracts are never escalated
    pub active: bool,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl Contract {
    /// Lease start truncated to its month
    pub fn start_month(&self) -> YearMonth {
        YearMonth::from_date(self.start_date)
    }

    /// Lease end truncated to its month
    pub fn end_month(&self) -> YearMonth {
        YearMonth::from_date(self.end_date)
    }

    /// Earliest month an escalation period may start in
    pub fn first_allowed_month(&self) -> YearMonth {
        self.start_month().add_months(self.update_frequency)
    }

    /// `None` only for contracts that bypassed `check_invariants`
    pub fn current_deposit(&self) -> Option<Decimal> {
        self.current_rent
            .checked_mul(self.deposit_multiplier)
            .map(crate::escalation::round_currency)
    }

    /// Check the field invariants every stored contract must satisfy
    pub fn check_invariants(&self) -> Result<(), ContractError> {
        if self.property.is_empty() {
            return Err(ContractError::MissingField("property"));
        }
        if self.tenant.is_empty() {
            return Err(ContractError::MissingField("tenant"));
        }
        if self.end_date <= self.start_date {
            return Err(ContractError::EndNotAfterStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.update_frequency < 1 || self.update_frequency > MAX_UPDATE_FREQUENCY {
            return Err(ContractError::FrequencyOutOfRange(self.update_frequency));
        }
        if self.initial_rent <= Decimal::ZERO {
            return Err(ContractError::NonPositiveRent(self.initial_rent));
        }
        if self.current_rent <= Decimal::ZERO {
            return Err(ContractError::NonPositiveRent(self.current_rent));
        }
        if self.deposit_multiplier <= Decimal::ZERO {
            return Err(ContractError::NonPositiveDeposit(self.deposit_multiplier));
        }
        for rent in [self.initial_rent, self.current_rent] {
            if rent.checked_mul(self.deposit_multiplier).is_none() {
                return Err(ContractError::DepositOutOfRange {
                    rent,
                    multiplier: self.deposit_multiplier,
                });
            }
        }
        Ok(())
    }
}

/// Strip markup-ish characters and surrounding whitespace from a name
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !FORBIDDEN_NAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ContractError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ContractError::MissingField(field));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| ContractError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

// ============================================================================
// NEW CONTRACT FORM
// ============================================================================

/// Raw input for registering a contract, as typed by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDraft {
    pub property: String,
    pub tenant: String,
    pub start_date: String,
    pub end_date: String,
    pub update_frequency: u32,
    pub index_type: IndexType,
    pub deposit_multiplier: Decimal,
    pub initial_rent: Option<Decimal>,
}

impl Default for ContractDraft {
    fn default() -> Self {
        ContractDraft {
            property: String::new(),
            tenant: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            update_frequency: 3,
            index_type: IndexType::Icl,
            deposit_multiplier: Decimal::new(15, 1),
            initial_rent: None,
        }
    }
}

impl ContractDraft {
    /// Validate the form and build a fresh contract owned by `owner`.
    ///
    /// Checks run in form order: required fields, date order, frequency,
    /// rent, deposit multiplier.
    pub fn into_contract(self, owner: &str) -> Result<Contract, ContractError> {
        let property = sanitize_name(&self.property);
        let tenant = sanitize_name(&self.tenant);

        if property.is_empty() {
            return Err(ContractError::MissingField("property"));
        }
        if tenant.is_empty() {
            return Err(ContractError::MissingField("tenant"));
        }
        let start_date = parse_date("start_date", &self.start_date)?;
        let end_date = parse_date("end_date", &self.end_date)?;
        let initial_rent = self
            .initial_rent
            .ok_or(ContractError::MissingField("initial_rent"))?;

        let contract = Contract {
            id: uuid::Uuid::new_v4().to_string(),
            property,
            tenant,
            start_date,
            end_date,
            update_frequency: self.update_frequency,
            index_type: self.index_type,
            deposit_multiplier: self.deposit_multiplier,
            initial_rent,
            current_rent: initial_rent,
            active: true,
            owner: owner.to_string(),
            created_at: Utc::now(),
            version: 1,
        };

        contract.check_invariants()?;
        Ok(contract)
    }
}

// ============================================================================
// ADMIN EDIT
// ============================================================================

/// Partial edit of an existing contract. `None` leaves the field untouched.
///
/// `current_rent` is editable to fix data-entry mistakes; it does not
/// create a history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractEdit {
    pub property: Option<String>,
    pub tenant: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub update_frequency: Option<u32>,
    pub index_type: Option<IndexType>,
    pub deposit_multiplier: Option<Decimal>,
    pub initial_rent: Option<Decimal>,
    pub current_rent: Option<Decimal>,
}

impl ContractEdit {
    pub fn is_empty(&self) -> bool {
        self.property.is_none()
            && self.tenant.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.update_frequency.is_none()
            && self.index_type.is_none()
            && self.deposit_multiplier.is_none()
            && self.initial_rent.is_none()
            && self.current_rent.is_none()
    }

    /// Produce the edited contract, re-checking every invariant
    pub fn apply(&self, contract: &Contract) -> Result<Contract, ContractError> {
        let mut next = contract.clone();

        if let Some(property) = &self.property {
            next.property = sanitize_name(property);
        }
        if let Some(tenant) = &self.tenant {
            next.tenant = sanitize_name(tenant);
        }
        if let Some(start) = &self.start_date {
            next.start_date = parse_date("start_date", start)?;
        }
        if let Some(end) = &self.end_date {
            next.end_date = parse_date("end_date", end)?;
        }
        if let Some(frequency) = self.update_frequency {
            next.update_frequency = frequency;
        }
        if let Some(index_type) = &self.index_type {
            next.index_type = index_type.clone();
        }
        if let Some(multiplier) = self.deposit_multiplier {
            next.deposit_multiplier = multiplier;
        }
        if let Some(rent) = self.initial_rent {
            next.initial_rent = rent;
        }
        if let Some(rent) = self.current_rent {
            next.current_rent = rent;
        }

        next.check_invariants()?;
        Ok(next)
    }
}

// ============================================================================
// UPDATE RECORD (history entry)
// ============================================================================

/// One applied escalation. Append-only; owned by a contract.
///
/// The period is kept as the text that was accepted so that legacy rows
/// with unparseable periods survive a load (they are skipped by overlap
/// checks rather than failing the whole history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub id: String,
    pub contract_id: String,
    pub period_start: String,
    pub period_end: String,
    pub old_rent: Decimal,
    pub new_rent: Decimal,
    pub old_deposit: Decimal,
    pub new_deposit: Decimal,
    pub applied_indices: Vec<Decimal>,
    pub applied_at: DateTime<Utc>,
    pub updated_by: String,
    pub idempotency_hash: String,
}

impl UpdateRecord {
    /// Stored period, or `None` when it is not well-formed
    pub fn period(&self) -> Option<Period> {
        Period::parse(&self.period_start, &self.period_end)
    }

    /// Hash identifying "the same escalation" for duplicate detection.
    /// NOTE: this is for deduplication, identity is `id`.
    pub fn compute_idempotency_hash(
        contract_id: &str,
        period: &Period,
        indices: &[Decimal],
    ) -> String {
        let joined = indices
            .iter()
            .map(|value| value.normalize().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}|{}|{}", contract_id, period.start(), period.end(), joined));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================
