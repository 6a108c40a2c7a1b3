use crate::contract::ContractError;
use crate::escalation::EscalationError;
use crate::index_table::IndexTableError;
use crate::store::StoreError;
use crate::validator::ValidationFailure;
use thiserror::Error;

/// Every failure the ledger can report. All of them are recoverable input
/// or state conditions; none should abort the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Escalation(#[from] EscalationError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    IndexTable(#[from] IndexTableError),
}

pub type Result<T> = std::result::Result<T, Error>;
